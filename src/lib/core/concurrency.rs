use crate::core::error::{FeatCountError, Result};
use log::{error, warn};

/// Validate and normalize a requested worker count.
pub fn determine_allowed_cpus(desired: usize) -> Result<usize> {
    if desired == 0 {
        error!("Must select > 0 threads");
        Err(FeatCountError::Config(
            "Too few threads selected. Min 1".to_string(),
        ))
    } else if desired > num_cpus::get() {
        warn!(
            "Specified {} threads but only {} CPUs are available",
            desired,
            num_cpus::get()
        );
        Ok(desired)
    } else {
        Ok(desired)
    }
}
