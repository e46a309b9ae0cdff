pub mod par_regions;
