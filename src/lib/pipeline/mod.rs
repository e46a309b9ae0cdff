pub mod count;

pub mod prelude {
    pub use super::count::{
        count_region, BarcodeIndex, BamSourceFactory, CountConfig, CountEntry, Region,
        RegionCounter, RegionSource,
    };
}
