//! Space-efficient probabilistic data structures for approximate membership queries in a set.

mod bloom_filter;
mod counting_bloom_filter;

const DEFAULT_MAX_LOAD: f64 = 0.5;
const GROWTH_FACTOR: usize = 2;

pub use self::bloom_filter::BloomFilter;
pub use self::counting_bloom_filter::CountingBloomFilter;
