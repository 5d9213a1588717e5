//! Selection of the alternate ranges of a vacuum filter.
//!
//! Fingerprints are split into four classes by `fingerprint % 4`. Class `i` keeps both of its
//! candidate buckets inside an aligned chunk of `L_i` buckets, and roughly `1 - i / 4` of the
//! items are expected to be placed through class `i`'s range. `L_i` is the smallest power of two
//! for which a balls-into-bins tail bound says that no chunk overflows.

/// Fraction of a chunk's slots the tail bound may fill.
const CAPACITY_MARGIN: f64 = 0.97;
/// Standard deviations of slack added to the expected chunk load.
const DEVIATION_SLACK: f64 = 1.5;
const CLASS_COUNT: usize = 4;

/// Returns the number of buckets needed to hold `item_count` items at `load_factor`, rounded up
/// to a multiple of `range`.
pub(crate) fn bucket_count(
    item_count: usize,
    entries_per_bucket: usize,
    load_factor: f64,
    range: usize,
) -> usize {
    let chunk_items = entries_per_bucket as f64 * load_factor * range as f64;
    (item_count as f64 / chunk_items).ceil() as usize * range
}

/// Checks whether `ratio * item_count` items spread over chunks of `range` buckets fit with high
/// probability.
pub(crate) fn load_factor_test(
    item_count: usize,
    entries_per_bucket: usize,
    load_factor: f64,
    ratio: f64,
    range: usize,
) -> bool {
    let bucket_count = bucket_count(item_count, entries_per_bucket, load_factor, range);
    let chunk_count = (bucket_count / range) as f64;
    let expected = item_count as f64 * ratio / chunk_count;
    let deviation = DEVIATION_SLACK * (2.0 * expected * chunk_count.ln()).sqrt();
    expected + deviation < CAPACITY_MARGIN * (entries_per_bucket * range) as f64
}

fn select_range(
    item_count: usize,
    entries_per_bucket: usize,
    load_factor: f64,
    ratio: f64,
) -> usize {
    let mut range = 1;
    while !load_factor_test(item_count, entries_per_bucket, load_factor, ratio, range) {
        range *= 2;
    }
    range
}

/// Returns the alternate range of each fingerprint class. Every range is a power of two.
pub(crate) fn alternate_ranges(
    item_count: usize,
    entries_per_bucket: usize,
    load_factor: f64,
) -> [usize; CLASS_COUNT] {
    let mut ranges = [0; CLASS_COUNT];
    for (class, range) in ranges.iter_mut().enumerate() {
        let ratio = 1.0 - class as f64 / CLASS_COUNT as f64;
        *range = select_range(item_count, entries_per_bucket, load_factor, ratio);
    }
    ranges[CLASS_COUNT - 1] *= 2;
    ranges
}
