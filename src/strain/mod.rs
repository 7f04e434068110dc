// Strain data module
// Time series value type and the archive fetch adapter

pub mod cache;
pub mod fetch;
pub mod series;

pub use cache::{CacheError, StrainCache};
pub use fetch::{FetchCause, FetchError, GwoscClient, StrainFile, StrainSource};
pub use series::TimeSeries;
