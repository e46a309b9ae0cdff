pub mod concurrency;
pub mod error;
pub mod errors;
pub mod fs;
pub mod io;
pub mod read_filter;
pub mod record;

pub mod prelude {
    pub use super::concurrency::determine_allowed_cpus;
    pub use super::error::{FeatCountError, Result};
    pub use super::errors::is_broken_pipe;
    pub use super::fs::{is_bgzipped, make_parent_dirs, open_text};
    pub use super::io::{get_writer, WriterOptions};
    pub use super::read_filter::{AcceptedRead, CountReadFilter, ReadFilter};
    pub use super::record::AlignedRead;
}
