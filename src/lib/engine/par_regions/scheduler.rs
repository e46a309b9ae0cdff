use crossbeam::channel::{bounded, Receiver, Sender};
use log::*;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::replay::OrderedReplay;
use super::types::{
    FailurePolicy, RegionFailure, RegionProcessor, RunSummary, REGIONS_IN_FLIGHT_PER_THREAD,
};
use crate::core::error::{FeatCountError, Result};
use crate::pipeline::count::region::Region;
use crate::pipeline::count::source::SourceFactory;

type Outcome<P> = (usize, Result<Vec<P>>);

/// How often a worker blocked on the window rechecks the cancel flag.
const WINDOW_POLL: Duration = Duration::from_millis(50);

/// Number of leading regions the consumer has released, shared with workers.
#[derive(Default)]
struct Released {
    count: Mutex<usize>,
    advanced: Condvar,
}

impl Released {
    fn advance(&self, released: usize) {
        *self.count.lock() = released;
        self.advanced.notify_all();
    }

    /// Block until `index` lies within `window` regions of the release point.
    /// Returns `false` when the run was cancelled while waiting.
    fn wait_for(&self, index: usize, window: usize, cancelled: &AtomicBool) -> bool {
        let mut released = self.count.lock();
        while index >= *released + window {
            if cancelled.load(Ordering::Acquire) {
                return false;
            }
            self.advanced.wait_for(&mut released, WINDOW_POLL);
        }
        true
    }
}

/// Parallel region executor driven by [`RegionProcessor`] implementations.
///
/// Workers on a dedicated Rayon pool claim regions in input order from a
/// shared counter. A region is only started once it lies within the
/// in-flight window of the last region handed to the sink, which bounds the
/// number of completed results held for reordering. Every worker checks an
/// alignment handle out of a pool for the duration of one region, so no
/// handle is ever used by two threads at once.
pub struct ParRegions<F: SourceFactory, R: RegionProcessor + Send + Sync> {
    factory: F,
    processor: R,
    threads: usize,
    window: usize,
    policy: FailurePolicy,
    cancelled: Arc<AtomicBool>,
    handles: Mutex<Vec<F::Source>>,
    pool: rayon::ThreadPool,
}

impl<F, R> ParRegions<F, R>
where
    F: SourceFactory,
    F::Source: Send,
    R: RegionProcessor + Send + Sync,
{
    /// Create a new [`ParRegions`] executor. `threads` defaults to all CPUs.
    pub fn new(
        factory: F,
        processor: R,
        threads: Option<usize>,
        policy: FailurePolicy,
    ) -> Result<Self> {
        let requested_threads = threads.unwrap_or_else(num_cpus::get);
        let threads = std::cmp::max(requested_threads, 1);
        info!("Using {} worker threads.", threads);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("featcount-worker-{}", idx))
            .build()
            .map_err(|err| FeatCountError::Config(format!("Failed to build thread pool: {}", err)))?;

        Ok(Self {
            factory,
            processor,
            threads,
            window: threads.saturating_mul(REGIONS_IN_FLIGHT_PER_THREAD),
            policy,
            cancelled: Arc::new(AtomicBool::new(false)),
            handles: Mutex::new(Vec::with_capacity(threads)),
            pool,
        })
    }

    /// Limit how far ahead of the oldest unreleased region workers may run.
    pub fn with_max_in_flight(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Hand an already opened source to the worker pool.
    pub fn with_handle(self, source: F::Source) -> Self {
        self.handles.lock().push(source);
        self
    }

    /// Flag that stops new regions from being started once set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Process every region and hand each region's items to `sink` in input order.
    ///
    /// Regions producing no items are not passed to the sink. Failed regions
    /// are logged and, after the remaining regions finish, the run returns
    /// [`FeatCountError::RegionsFailed`].
    pub fn process<K>(&self, regions: &[Region], mut sink: K) -> Result<RunSummary>
    where
        K: FnMut(usize, Vec<R::P>) -> Result<()>,
    {
        debug!("Creating channel of length {} regions", self.window);

        let (sender, receiver) = bounded::<Outcome<R::P>>(self.window);
        let next = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);
        let released = Released::default();

        thread::scope(|scope| {
            let (next, completed, released) = (&next, &completed, &released);
            let workers = scope.spawn(move || {
                self.pool.scope(|pool_scope| {
                    for _ in 0..self.threads {
                        let tx = sender.clone();
                        pool_scope.spawn(move |_| {
                            self.work(regions, tx, next, completed, released)
                        });
                    }
                });
                drop(sender);
            });

            let drained = self.drain(receiver, regions, released, &mut sink);
            if drained.is_err() {
                self.cancelled.store(true, Ordering::Release);
            }
            workers
                .join()
                .map_err(|_| FeatCountError::InvalidInput("Region worker panicked".to_string()))?;
            drained
        })
    }

    /// Claim regions in input order until none remain or the run is cancelled.
    fn work(
        &self,
        regions: &[Region],
        tx: Sender<Outcome<R::P>>,
        next: &AtomicUsize,
        completed: &AtomicUsize,
        released: &Released,
    ) {
        let total = regions.len();
        let log_step = std::cmp::max(1, total / 20);
        let cancelled = self.cancelled.as_ref();

        while !cancelled.load(Ordering::Acquire) {
            let index = next.fetch_add(1, Ordering::AcqRel);
            if index >= total || !released.wait_for(index, self.window, cancelled) {
                return;
            }

            let region = &regions[index];
            trace!("Processing {} ({})", region.id(), index);
            let outcome = self.run_region(index, region);
            if outcome.is_err() && self.policy == FailurePolicy::FailFast {
                cancelled.store(true, Ordering::Release);
            }

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done == total || done % log_step == 0 {
                let percent = (done as f64 / total as f64) * 100.0;
                info!("Processed {:.1}% ({} / {} regions)", percent, done, total);
            }

            if tx.send((index, outcome)).is_err() {
                warn!("Result channel closed; terminating region processing early");
                cancelled.store(true, Ordering::Release);
                return;
            }
        }
    }

    fn run_region(&self, index: usize, region: &Region) -> Result<Vec<R::P>> {
        let pooled = self.handles.lock().pop();
        let mut source = match pooled {
            Some(source) => source,
            None => self.factory.open()?,
        };
        let result = self.processor.process_region(&mut source, index, region);
        if result.is_ok() {
            self.handles.lock().push(source);
        }
        result
    }

    fn drain<K>(
        &self,
        receiver: Receiver<Outcome<R::P>>,
        regions: &[Region],
        released: &Released,
        sink: &mut K,
    ) -> Result<RunSummary>
    where
        K: FnMut(usize, Vec<R::P>) -> Result<()>,
    {
        let mut replay = OrderedReplay::new();
        let mut failures: Vec<RegionFailure> = Vec::new();
        let mut items = 0usize;

        for (index, outcome) in receiver {
            let batch = match outcome {
                Ok(batch) => {
                    items += batch.len();
                    if batch.is_empty() {
                        None
                    } else {
                        Some(batch)
                    }
                }
                Err(error) => {
                    let region_id = regions[index].id().to_string();
                    error!("Region {} failed: {}", region_id, error);
                    failures.push(RegionFailure {
                        index,
                        region_id,
                        error,
                    });
                    None
                }
            };
            let pushed = replay.push(index, batch, sink);
            released.advance(replay.released());
            pushed?;
        }

        if !failures.is_empty() {
            failures.sort_by_key(|failure| failure.index);
            let first = &failures[0];
            return Err(FeatCountError::RegionsFailed {
                failed: failures.len(),
                total: regions.len(),
                first: format!("{}: {}", first.region_id, first.error),
            });
        }
        if replay.released() < regions.len() {
            debug!(
                "Cancelled with {} of {} regions released ({} held back)",
                replay.released(),
                regions.len(),
                replay.buffered()
            );
            return Err(FeatCountError::Cancelled);
        }

        Ok(RunSummary {
            regions: regions.len(),
            items,
        })
    }
}
