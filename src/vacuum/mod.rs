//! Space-efficient probabilistic data structure to test for membership in a set with the ability
//! to remove items, tuned to reach high load factors with good cache locality.

mod range;
mod vacuum_filter;

const DEFAULT_ENTRIES_PER_BUCKET: usize = 4;
const DEFAULT_FINGERPRINT_BIT_COUNT: usize = 16;
const DEFAULT_MAX_KICKS: usize = 500;
const DEFAULT_LOAD_FACTOR: f64 = 0.95;

pub use self::vacuum_filter::{VacuumConfig, VacuumFilter};
