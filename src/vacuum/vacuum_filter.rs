use crate::bucket_table::{BucketTable, RelocationLog};
use crate::error::{ensure_fingerprint_bit_count, ensure_load_factor, ensure_non_zero, Result};
use crate::filter::{ApproximateMembership, Removable};
use crate::util::{self, fingerprint_and_index_hash};
use crate::vacuum::range;
use crate::vacuum::{
    DEFAULT_ENTRIES_PER_BUCKET, DEFAULT_FINGERPRINT_BIT_COUNT, DEFAULT_LOAD_FACTOR,
    DEFAULT_MAX_KICKS,
};
use crate::SipHasherBuilder;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use tracing::{debug, trace};

/// Parameters of a `VacuumFilter`.
///
/// # Examples
///
/// ```
/// use amq_filters::vacuum::VacuumConfig;
///
/// let config = VacuumConfig {
///     load_factor: 0.9,
///     ..VacuumConfig::new(10_000)
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
pub struct VacuumConfig {
    /// Number of items the filter is sized for.
    pub item_count: usize,
    /// Fraction of slots expected to be occupied once `item_count` items are inserted.
    pub load_factor: f64,
    /// Number of fingerprint slots in each bucket.
    pub entries_per_bucket: usize,
    /// Width of each fingerprint, between 2 and 32 bits.
    pub fingerprint_bit_count: usize,
    /// Maximum number of displacements before an insertion gives up.
    pub max_kicks: usize,
}

impl VacuumConfig {
    /// Returns a configuration sized for `item_count` items at a load factor of 0.95, with 4
    /// entries per bucket, 16-bit fingerprints, and at most 500 displacements per insertion.
    pub fn new(item_count: usize) -> Self {
        VacuumConfig {
            item_count,
            load_factor: DEFAULT_LOAD_FACTOR,
            entries_per_bucket: DEFAULT_ENTRIES_PER_BUCKET,
            fingerprint_bit_count: DEFAULT_FINGERPRINT_BIT_COUNT,
            max_kicks: DEFAULT_MAX_KICKS,
        }
    }

    /// Checks that the configuration describes a usable filter.
    ///
    /// # Errors
    ///
    /// Returns an error if `item_count` or `entries_per_bucket` is 0, if `load_factor` is not in
    /// `(0, 1)`, or if `fingerprint_bit_count` is not between 2 and 32.
    pub fn validate(&self) -> Result<()> {
        ensure_non_zero(self.item_count, "item_count")?;
        ensure_non_zero(self.entries_per_bucket, "entries_per_bucket")?;
        ensure_load_factor(self.load_factor)?;
        ensure_fingerprint_bit_count(self.fingerprint_bit_count)
    }
}

/// A space-efficient probabilistic data structure to test for membership in a set. Vacuum
/// filters also provide the flexibility to remove items.
///
/// A vacuum filter stores fingerprints in buckets like a cuckoo filter, but the alternate bucket
/// of a fingerprint is confined to an aligned chunk of nearby buckets. The chunk size depends on
/// the fingerprint's class (`fingerprint % 4`): the ranges are chosen when the filter is built so
/// that `item_count` items fit at the target load factor, and one class gets a doubled range to
/// absorb the overflow of the others. The bucket count is a multiple of the largest range and
/// does not need to be a power of two.
///
/// When both candidate buckets of an item are full, the filter first looks for an occupant of
/// the current bucket that can move to its own alternate bucket. Only if none can does it evict a
/// random occupant and carry it on. If `max_kicks` rounds pass without finding room, every
/// displacement is undone and the insertion reports failure.
///
/// # Examples
///
/// ```
/// use amq_filters::vacuum::VacuumFilter;
///
/// let mut filter = VacuumFilter::<String>::new(1000).unwrap();
///
/// assert!(!filter.contains("foo"));
/// assert!(filter.insert("foo"));
/// assert!(filter.contains("foo"));
///
/// assert!(filter.remove("foo"));
/// assert!(!filter.contains("foo"));
///
/// assert_eq!(filter.bucket_count(), 320);
/// assert_eq!(filter.alternate_ranges(), [64, 32, 8, 8]);
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
pub struct VacuumFilter<T, B = SipHasherBuilder> {
    table: BucketTable,
    alternate_ranges: [usize; 4],
    item_count: usize,
    load_factor: f64,
    max_kicks: usize,
    hash_builders: [B; 2],
    #[cfg_attr(feature = "serde", serde(skip, default = "XorShiftRng::from_entropy"))]
    rng: XorShiftRng,
    _marker: PhantomData<T>,
}

impl<T> VacuumFilter<T> {
    /// Constructs a new, empty `VacuumFilter` sized for `item_count` items at a load factor of
    /// 0.95.
    ///
    /// # Errors
    ///
    /// Returns an error if `item_count` is 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::vacuum::VacuumFilter;
    ///
    /// let filter = VacuumFilter::<String>::new(1000).unwrap();
    /// ```
    pub fn new(item_count: usize) -> Result<Self> {
        Self::from_config(VacuumConfig::new(item_count))
    }

    /// Constructs a new, empty `VacuumFilter` sized for `item_count` items at `load_factor`.
    ///
    /// # Errors
    ///
    /// Returns an error if `item_count` is 0 or `load_factor` is not in `(0, 1)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::vacuum::VacuumFilter;
    ///
    /// let filter = VacuumFilter::<String>::with_load_factor(1000, 0.5).unwrap();
    /// assert_eq!(filter.bucket_count(), 512);
    /// ```
    pub fn with_load_factor(item_count: usize, load_factor: f64) -> Result<Self> {
        Self::from_config(VacuumConfig {
            load_factor,
            ..VacuumConfig::new(item_count)
        })
    }

    /// Constructs a new, empty `VacuumFilter` from a configuration, seeding its hashers and its
    /// random number generator from entropy.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: VacuumConfig) -> Result<Self> {
        Self::with_hashers(
            config,
            [
                SipHasherBuilder::from_entropy(),
                SipHasherBuilder::from_entropy(),
            ],
            XorShiftRng::from_entropy(),
        )
    }
}

impl<T, B> VacuumFilter<T, B>
where
    B: BuildHasher,
{
    /// Constructs a new, empty `VacuumFilter` from a configuration, two hasher builders, and the
    /// random number generator used to choose which fingerprints to displace.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::vacuum::{VacuumConfig, VacuumFilter};
    /// use amq_filters::SipHasherBuilder;
    /// use rand::SeedableRng;
    /// use rand_xorshift::XorShiftRng;
    ///
    /// let filter = VacuumFilter::<String>::with_hashers(
    ///     VacuumConfig::new(1000),
    ///     [SipHasherBuilder::from_seed(0, 0), SipHasherBuilder::from_seed(1, 1)],
    ///     XorShiftRng::seed_from_u64(0),
    /// ).unwrap();
    /// ```
    pub fn with_hashers(config: VacuumConfig, hash_builders: [B; 2], rng: XorShiftRng) -> Result<Self> {
        config.validate()?;
        let alternate_ranges = range::alternate_ranges(
            config.item_count,
            config.entries_per_bucket,
            config.load_factor,
        );
        let max_range = alternate_ranges.iter().copied().max().unwrap_or(1);
        let bucket_count = range::bucket_count(
            config.item_count,
            config.entries_per_bucket,
            config.load_factor,
            max_range,
        );
        debug!(
            item_count = config.item_count,
            load_factor = config.load_factor,
            bucket_count,
            ?alternate_ranges,
            "constructed vacuum filter"
        );

        Ok(VacuumFilter {
            table: BucketTable::new(
                bucket_count,
                config.entries_per_bucket,
                config.fingerprint_bit_count,
            ),
            alternate_ranges,
            item_count: config.item_count,
            load_factor: config.load_factor,
            max_kicks: config.max_kicks,
            hash_builders,
            rng,
            _marker: PhantomData,
        })
    }

    /// Returns the other candidate bucket of a fingerprint stored in `bucket`. Applying it twice
    /// with the same fingerprint returns the original bucket.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::vacuum::VacuumFilter;
    ///
    /// let filter = VacuumFilter::<String>::new(1000).unwrap();
    /// let alternate = filter.alternate_bucket(17, 0xbeef);
    ///
    /// assert!(alternate < filter.bucket_count());
    /// assert_eq!(filter.alternate_bucket(alternate, 0xbeef), 17);
    /// ```
    pub fn alternate_bucket(&self, bucket: usize, fingerprint: u32) -> usize {
        let range = self.alternate_ranges[fingerprint as usize % self.alternate_ranges.len()];
        let offset = util::hash(&self.hash_builders[0], &fingerprint) as usize;
        bucket ^ (offset & (range - 1))
    }

    fn get_fingerprint_and_buckets<U>(&self, item: &U) -> (u32, usize, usize)
    where
        T: Borrow<U>,
        U: Hash + ?Sized,
    {
        let (fingerprint, index_hash) =
            fingerprint_and_index_hash(&self.hash_builders, item, self.fingerprint_bit_count());
        let bucket_1 = ((index_hash & 0xFFFF_FFFF) as u128 * self.bucket_count() as u128 >> 32)
            as usize;
        let bucket_2 = self.alternate_bucket(bucket_1, fingerprint);
        (fingerprint, bucket_1, bucket_2)
    }

    // Moves an occupant of `bucket` whose alternate bucket has room, and stores `fingerprint` in
    // the freed slot.
    fn relocate_occupant(
        &mut self,
        log: &mut RelocationLog,
        bucket: usize,
        fingerprint: u32,
    ) -> bool {
        for slot in 0..self.table.entries_per_bucket() {
            let occupant = self.table.get(bucket, slot);
            let alternate = self.alternate_bucket(bucket, occupant);
            if let Some(free_slot) = self.table.empty_slot(alternate) {
                log.replace(&mut self.table, alternate, free_slot, occupant);
                log.replace(&mut self.table, bucket, slot, fingerprint);
                return true;
            }
        }
        false
    }

    /// Inserts an element into the vacuum filter. Returns `false` if no room could be made for
    /// the element within the displacement budget, in which case the filter is left unchanged.
    ///
    /// Inserting an element twice stores its fingerprint twice.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::vacuum::VacuumFilter;
    ///
    /// let mut filter = VacuumFilter::<String>::new(1000).unwrap();
    /// assert!(filter.insert("foo"));
    /// ```
    pub fn insert<U>(&mut self, item: &U) -> bool
    where
        T: Borrow<U>,
        U: Hash + ?Sized,
    {
        let (mut fingerprint, bucket_1, bucket_2) = self.get_fingerprint_and_buckets(item);
        if self.table.try_push(bucket_1, fingerprint) || self.table.try_push(bucket_2, fingerprint)
        {
            return true;
        }

        let mut bucket = if self.rng.gen::<bool>() {
            bucket_1
        } else {
            bucket_2
        };
        let mut log = RelocationLog::with_capacity(self.max_kicks);

        for _ in 0..self.max_kicks {
            if self.relocate_occupant(&mut log, bucket, fingerprint) {
                return true;
            }

            let slot = self.rng.gen_range(0, self.table.entries_per_bucket());
            fingerprint = log.replace(&mut self.table, bucket, slot, fingerprint);
            bucket = self.alternate_bucket(bucket, fingerprint);
            if self.table.try_push(bucket, fingerprint) {
                return true;
            }
        }

        trace!(
            max_kicks = self.max_kicks,
            len = self.len(),
            "vacuum filter insertion exhausted its displacements"
        );
        log.rollback(&mut self.table);
        false
    }

    /// Removes one copy of an element from the vacuum filter. Returns `false` if the element's
    /// fingerprint is in neither of its buckets.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::vacuum::VacuumFilter;
    ///
    /// let mut filter = VacuumFilter::<String>::new(1000).unwrap();
    ///
    /// filter.insert("foo");
    /// assert!(filter.remove("foo"));
    /// assert!(!filter.remove("foo"));
    /// ```
    pub fn remove<U>(&mut self, item: &U) -> bool
    where
        T: Borrow<U>,
        U: Hash + ?Sized,
    {
        let (fingerprint, bucket_1, bucket_2) = self.get_fingerprint_and_buckets(item);
        self.table.remove(bucket_1, fingerprint) || self.table.remove(bucket_2, fingerprint)
    }

    /// Checks if an element is possibly in the vacuum filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::vacuum::VacuumFilter;
    ///
    /// let mut filter = VacuumFilter::<String>::new(1000).unwrap();
    ///
    /// filter.insert("foo");
    /// assert!(filter.contains("foo"));
    /// ```
    pub fn contains<U>(&self, item: &U) -> bool
    where
        T: Borrow<U>,
        U: Hash + ?Sized,
    {
        let (fingerprint, bucket_1, bucket_2) = self.get_fingerprint_and_buckets(item);
        self.table.contains(bucket_1, fingerprint) || self.table.contains(bucket_2, fingerprint)
    }

    /// Clears the vacuum filter, removing all elements.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Returns the number of occupied entries in the vacuum filter.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if there are no occupied entries in the vacuum filter.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the total number of entries in the vacuum filter.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns the number of buckets in the vacuum filter.
    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    /// Returns the number of entries in each bucket.
    pub fn entries_per_bucket(&self) -> usize {
        self.table.entries_per_bucket()
    }

    /// Returns the number of bits in each item fingerprint.
    pub fn fingerprint_bit_count(&self) -> usize {
        self.table.fingerprint_bit_count()
    }

    /// Returns the maximum number of displacement rounds made by a single insertion.
    pub fn max_kicks(&self) -> usize {
        self.max_kicks
    }

    /// Returns the alternate range of each fingerprint class.
    pub fn alternate_ranges(&self) -> [usize; 4] {
        self.alternate_ranges
    }

    /// Returns the number of items the vacuum filter was sized for.
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Returns the load factor the vacuum filter was sized for.
    pub fn target_load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Returns the percentage of occupied entries.
    pub fn load_factor(&self) -> f64 {
        self.len() as f64 / self.capacity() as f64 * 100.0
    }

    /// Returns the number of bytes used to store fingerprints.
    pub fn byte_len(&self) -> usize {
        self.table.byte_len()
    }

    /// Returns the estimated false positive probability of the vacuum filter. This value will
    /// increase as more items are added.
    pub fn estimated_fpp(&self) -> f64 {
        let fingerprints_count = 2.0f64.powi(self.fingerprint_bit_count() as i32);
        let single_fpp = (fingerprints_count - 2.0) / (fingerprints_count - 1.0);
        let occupied_ratio = self.len() as f64 / self.capacity() as f64;
        1.0 - single_fpp.powf(2.0 * self.entries_per_bucket() as f64 * occupied_ratio)
    }

    /// Returns a reference to the vacuum filter's hasher builders.
    pub fn hashers(&self) -> &[B; 2] {
        &self.hash_builders
    }
}

impl<T, B> PartialEq for VacuumFilter<T, B>
where
    B: PartialEq,
{
    fn eq(&self, other: &VacuumFilter<T, B>) -> bool {
        self.alternate_ranges == other.alternate_ranges
            && self.item_count == other.item_count
            && self.load_factor == other.load_factor
            && self.max_kicks == other.max_kicks
            && self.table == other.table
            && self.hash_builders == other.hash_builders
    }
}

impl<T, U, B> ApproximateMembership<U> for VacuumFilter<T, B>
where
    T: Borrow<U>,
    U: Hash + ?Sized,
    B: BuildHasher,
{
    fn insert(&mut self, item: &U) -> bool {
        VacuumFilter::insert(self, item)
    }

    fn contains(&self, item: &U) -> bool {
        VacuumFilter::contains(self, item)
    }
}

impl<T, U, B> Removable<U> for VacuumFilter<T, B>
where
    T: Borrow<U>,
    U: Hash + ?Sized,
    B: BuildHasher,
{
    fn remove(&mut self, item: &U) -> bool {
        VacuumFilter::remove(self, item)
    }
}

#[cfg(test)]
mod tests {
    use super::{VacuumConfig, VacuumFilter};
    use crate::error::FilterError;
    use crate::util::tests::{hash_builder_1, hash_builder_2, rng};
    use proptest::prelude::*;

    fn seeded_filter<T>(config: VacuumConfig) -> VacuumFilter<T> {
        VacuumFilter::with_hashers(config, [hash_builder_1(), hash_builder_2()], rng()).unwrap()
    }

    #[test]
    fn test_new() {
        let filter = seeded_filter::<String>(VacuumConfig::new(1000));
        assert!(filter.is_empty());
        assert_eq!(filter.alternate_ranges(), [64, 32, 8, 8]);
        assert_eq!(filter.bucket_count(), 320);
        assert_eq!(filter.capacity(), 1280);
        assert_eq!(filter.entries_per_bucket(), 4);
        assert_eq!(filter.fingerprint_bit_count(), 16);
        assert_eq!(filter.max_kicks(), 500);
        assert_eq!(filter.item_count(), 1000);
        assert!((filter.target_load_factor() - 0.95).abs() < std::f64::EPSILON);
    }

    #[test]
    fn test_single_item_filter() {
        let mut filter = seeded_filter::<u32>(VacuumConfig::new(1));
        assert_eq!(filter.alternate_ranges(), [1, 1, 1, 2]);
        assert_eq!(filter.bucket_count(), 2);
        assert!(filter.insert(&1));
        assert!(filter.contains(&1));
    }

    #[test]
    fn test_invalid_config() {
        assert_eq!(
            VacuumFilter::<String>::new(0).unwrap_err(),
            FilterError::ZeroCapacity { name: "item_count" },
        );
        assert_eq!(
            VacuumFilter::<String>::with_load_factor(100, 1.0).unwrap_err(),
            FilterError::InvalidLoadFactor { load_factor: 1.0 },
        );
        assert_eq!(
            VacuumFilter::<String>::with_load_factor(100, 0.0).unwrap_err(),
            FilterError::InvalidLoadFactor { load_factor: 0.0 },
        );
        assert_eq!(
            VacuumFilter::<String>::from_config(VacuumConfig {
                fingerprint_bit_count: 1,
                ..VacuumConfig::new(100)
            })
            .unwrap_err(),
            FilterError::InvalidFingerprintBitCount { bit_count: 1 },
        );
    }

    #[test]
    fn test_insert_contains_remove() {
        let mut filter = seeded_filter::<String>(VacuumConfig::new(100));
        assert!(filter.insert("a"));
        assert!(filter.insert("b"));
        assert!(filter.insert("c"));

        assert!(filter.contains("a"));
        assert!(filter.contains("c"));
        assert!(!filter.contains("z"));

        assert!(filter.remove("b"));
        assert!(!filter.contains("b"));
        assert!(!filter.remove("z"));
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_insert_existing_item() {
        let mut filter = seeded_filter::<String>(VacuumConfig::new(100));
        filter.insert("foo");
        filter.insert("foo");
        assert_eq!(filter.len(), 2);

        assert!(filter.remove("foo"));
        assert!(filter.contains("foo"));
        assert!(filter.remove("foo"));
        assert!(!filter.contains("foo"));
    }

    #[test]
    fn test_fill_to_item_count() {
        let mut filter = seeded_filter::<u32>(VacuumConfig::new(1000));
        let inserted = (0..1000u32).filter(|item| filter.insert(item)).count();

        assert!(inserted >= 990);
        assert_eq!(filter.len(), inserted);
        assert!((0..1000u32).filter(|item| filter.contains(item)).count() >= inserted);
    }

    #[test]
    fn test_overfill_keeps_inserted_items() {
        let mut filter = seeded_filter::<u32>(VacuumConfig::new(100));
        let mut inserted = Vec::new();
        for item in 0..400u32 {
            let before = filter.table.clone();
            if filter.insert(&item) {
                inserted.push(item);
            } else {
                assert_eq!(filter.table, before);
            }
        }

        assert_eq!(filter.len(), inserted.len());
        assert!(filter.len() <= filter.capacity());
        assert!(filter.load_factor() > 80.0);
        assert!(inserted.iter().all(|item| filter.contains(item)));
    }

    #[test]
    fn test_repeated_item_fails_without_changes() {
        let mut filter = seeded_filter::<u32>(VacuumConfig::new(1000));
        let (_, bucket_1, bucket_2) = filter.get_fingerprint_and_buckets(&7);
        let copies = if bucket_1 == bucket_2 { 4 } else { 8 };
        for _ in 0..copies {
            assert!(filter.insert(&7));
        }

        let before = filter.table.clone();
        assert!(!filter.insert(&7));
        assert_eq!(filter.table, before);
    }

    #[test]
    fn test_clear() {
        let mut filter = seeded_filter::<String>(VacuumConfig::new(100));
        filter.insert("foo");
        filter.clear();

        assert!(filter.is_empty());
        assert!(!filter.contains("foo"));
        assert!(filter.estimated_fpp() < std::f64::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_alternate_bucket_is_involution(
            item_count in 1usize..200_000,
            bucket in any::<usize>(),
            fingerprint in 1u32..(1 << 16),
        ) {
            let filter = seeded_filter::<u32>(VacuumConfig::new(item_count));
            let bucket = bucket % filter.bucket_count();
            let alternate = filter.alternate_bucket(bucket, fingerprint);
            prop_assert!(alternate < filter.bucket_count());
            prop_assert_eq!(filter.alternate_bucket(alternate, fingerprint), bucket);
        }

        #[test]
        fn prop_buckets_never_overflow(ops in prop::collection::vec((any::<bool>(), 0u32..64), 1..400)) {
            let mut filter = seeded_filter::<u32>(VacuumConfig::new(16));
            for (is_insert, item) in ops {
                if is_insert {
                    filter.insert(&item);
                } else {
                    filter.remove(&item);
                }
                for bucket in 0..filter.bucket_count() {
                    prop_assert!(filter.table.bucket_len(bucket) <= filter.entries_per_bucket());
                }
            }
            prop_assert!(filter.len() <= filter.capacity());
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_ser_de() {
        let mut filter = VacuumFilter::<String>::new(100).unwrap();
        filter.insert("foo");

        let serialized_filter = bincode::serialize(&filter).unwrap();
        let de_filter: VacuumFilter<String> = bincode::deserialize(&serialized_filter).unwrap();

        assert!(de_filter.contains("foo"));
        assert_eq!(filter, de_filter);
    }
}
