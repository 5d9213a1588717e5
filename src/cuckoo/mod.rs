//! Space-efficient probabilistic data structure to test for membership in a set with the ability
//! to remove items.

mod cuckoo_filter;

const DEFAULT_ENTRIES_PER_BUCKET: usize = 4;
const DEFAULT_FINGERPRINT_BIT_COUNT: usize = 16;
const DEFAULT_MAX_KICKS: usize = 500;

pub use self::cuckoo_filter::{CuckooConfig, CuckooFilter};
