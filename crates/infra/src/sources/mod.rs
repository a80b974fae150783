//! Cost source adapters

pub mod cached;

pub use cached::{CachedCostSource, StatsCacheConfig};
