use crate::bucket_table::{BucketTable, RelocationLog};
use crate::cuckoo::{DEFAULT_ENTRIES_PER_BUCKET, DEFAULT_FINGERPRINT_BIT_COUNT, DEFAULT_MAX_KICKS};
use crate::error::{ensure_fingerprint_bit_count, ensure_non_zero, Result};
use crate::filter::{ApproximateMembership, Removable};
use crate::util::{self, fingerprint_and_index_hash};
use crate::SipHasherBuilder;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use tracing::trace;

/// Parameters of a `CuckooFilter`.
///
/// # Examples
///
/// ```
/// use amq_filters::cuckoo::CuckooConfig;
///
/// let config = CuckooConfig {
///     max_kicks: 100,
///     ..CuckooConfig::new(1024)
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
pub struct CuckooConfig {
    /// Number of buckets. Rounded up to the next power of two.
    pub bucket_count: usize,
    /// Number of fingerprint slots in each bucket.
    pub entries_per_bucket: usize,
    /// Width of each fingerprint, between 2 and 32 bits.
    pub fingerprint_bit_count: usize,
    /// Maximum number of displacements before an insertion gives up.
    pub max_kicks: usize,
}

impl CuckooConfig {
    /// Returns a configuration with `bucket_count` buckets, 4 entries per bucket, 16-bit
    /// fingerprints, and at most 500 displacements per insertion.
    pub fn new(bucket_count: usize) -> Self {
        CuckooConfig {
            bucket_count,
            entries_per_bucket: DEFAULT_ENTRIES_PER_BUCKET,
            fingerprint_bit_count: DEFAULT_FINGERPRINT_BIT_COUNT,
            max_kicks: DEFAULT_MAX_KICKS,
        }
    }

    /// Checks that the configuration describes a usable filter.
    ///
    /// # Errors
    ///
    /// Returns an error if `bucket_count` or `entries_per_bucket` is 0, or if
    /// `fingerprint_bit_count` is not between 2 and 32.
    pub fn validate(&self) -> Result<()> {
        ensure_non_zero(self.bucket_count, "bucket_count")?;
        ensure_non_zero(self.entries_per_bucket, "entries_per_bucket")?;
        ensure_fingerprint_bit_count(self.fingerprint_bit_count)
    }
}

/// A space-efficient probabilistic data structure to test for membership in a set. Cuckoo filters
/// also provide the flexibility to remove items.
///
/// A cuckoo filter is based on cuckoo hashing and is essentially a cuckoo hash table storing
/// each keys' fingerprint. Each item has two candidate buckets: `i1 = hash(item)` and
/// `i2 = i1 ^ hash(fingerprint)`, both taken modulo the bucket count. Because the second index
/// only depends on the first index and the fingerprint, a stored fingerprint can be moved to its
/// other bucket without knowing the original item. When both buckets are full, a random
/// fingerprint is kicked out to its alternate bucket, and so on, for at most `max_kicks` moves.
/// If the moves run out, every displacement is undone and the insertion reports failure.
///
/// The bucket count is rounded up to the next power of two so that the alternate bucket of an
/// alternate bucket is the original bucket.
///
/// # Examples
///
/// ```
/// use amq_filters::cuckoo::CuckooFilter;
///
/// let mut filter = CuckooFilter::<String>::new(100, 4).unwrap();
///
/// assert!(!filter.contains("foo"));
/// assert!(filter.insert("foo"));
/// assert!(filter.contains("foo"));
///
/// assert!(filter.remove("foo"));
/// assert!(!filter.contains("foo"));
///
/// assert_eq!(filter.len(), 0);
/// assert_eq!(filter.capacity(), 512);
/// assert_eq!(filter.bucket_count(), 128);
/// assert_eq!(filter.fingerprint_bit_count(), 16);
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
pub struct CuckooFilter<T, B = SipHasherBuilder> {
    table: BucketTable,
    max_kicks: usize,
    hash_builders: [B; 2],
    #[cfg_attr(feature = "serde", serde(skip, default = "XorShiftRng::from_entropy"))]
    rng: XorShiftRng,
    _marker: PhantomData<T>,
}

impl<T> CuckooFilter<T> {
    /// Constructs a new, empty `CuckooFilter` with `bucket_count` buckets of `entries_per_bucket`
    /// entries each. By default, the cuckoo filter will have 16 bits per item fingerprint and a
    /// maximum of 500 item displacements before terminating the insertion process.
    ///
    /// # Errors
    ///
    /// Returns an error if `bucket_count` or `entries_per_bucket` is 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::CuckooFilter;
    ///
    /// let filter = CuckooFilter::<String>::new(100, 4).unwrap();
    /// ```
    pub fn new(bucket_count: usize, entries_per_bucket: usize) -> Result<Self> {
        Self::from_config(CuckooConfig {
            entries_per_bucket,
            ..CuckooConfig::new(bucket_count)
        })
    }

    /// Constructs a new, empty `CuckooFilter` from a configuration, seeding its hashers and its
    /// random number generator from entropy.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::{CuckooConfig, CuckooFilter};
    ///
    /// let filter = CuckooFilter::<String>::from_config(CuckooConfig {
    ///     fingerprint_bit_count: 8,
    ///     ..CuckooConfig::new(100)
    /// }).unwrap();
    /// ```
    pub fn from_config(config: CuckooConfig) -> Result<Self> {
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

impl<T, B> CuckooFilter<T, B>
where
    B: BuildHasher,
{
    /// Constructs a new, empty `CuckooFilter` from a configuration, two hasher builders, and the
    /// random number generator used to choose which fingerprints to displace. Seeding all three
    /// makes the filter fully deterministic.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::{CuckooConfig, CuckooFilter};
    /// use amq_filters::SipHasherBuilder;
    /// use rand::SeedableRng;
    /// use rand_xorshift::XorShiftRng;
    ///
    /// let filter = CuckooFilter::<String>::with_hashers(
    ///     CuckooConfig::new(100),
    ///     [SipHasherBuilder::from_seed(0, 0), SipHasherBuilder::from_seed(1, 1)],
    ///     XorShiftRng::seed_from_u64(0),
    /// ).unwrap();
    /// ```
    pub fn with_hashers(config: CuckooConfig, hash_builders: [B; 2], rng: XorShiftRng) -> Result<Self> {
        config.validate()?;
        Ok(CuckooFilter {
            table: BucketTable::new(
                config.bucket_count.next_power_of_two(),
                config.entries_per_bucket,
                config.fingerprint_bit_count,
            ),
            max_kicks: config.max_kicks,
            hash_builders,
            rng,
            _marker: PhantomData,
        })
    }

    fn alternate_index(&self, index: usize, fingerprint: u32) -> usize {
        let offset = util::hash(&self.hash_builders[0], &fingerprint) as usize;
        (index ^ offset) & (self.bucket_count() - 1)
    }

    fn get_fingerprint_and_indexes<U>(&self, item: &U) -> (u32, usize, usize)
    where
        T: Borrow<U>,
        U: Hash + ?Sized,
    {
        let (fingerprint, index_hash) =
            fingerprint_and_index_hash(&self.hash_builders, item, self.fingerprint_bit_count());
        let index_1 = (index_hash % self.bucket_count() as u64) as usize;
        let index_2 = self.alternate_index(index_1, fingerprint);
        (fingerprint, index_1, index_2)
    }

    /// Inserts an element into the cuckoo filter. Returns `false` if no room could be made for
    /// the element within the displacement budget, in which case the filter is left unchanged.
    ///
    /// Inserting an element twice stores its fingerprint twice.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::CuckooFilter;
    ///
    /// let mut filter = CuckooFilter::<String>::new(100, 4).unwrap();
    /// assert!(filter.insert("foo"));
    /// ```
    pub fn insert<U>(&mut self, item: &U) -> bool
    where
        T: Borrow<U>,
        U: Hash + ?Sized,
    {
        let (mut fingerprint, index_1, index_2) = self.get_fingerprint_and_indexes(item);
        if self.table.try_push(index_1, fingerprint) || self.table.try_push(index_2, fingerprint) {
            return true;
        }

        // have to kick out an entry
        let mut index = if self.rng.gen::<bool>() {
            index_1
        } else {
            index_2
        };
        let mut log = RelocationLog::with_capacity(self.max_kicks);

        for _ in 0..self.max_kicks {
            let slot = self.rng.gen_range(0, self.table.entries_per_bucket());
            fingerprint = log.replace(&mut self.table, index, slot, fingerprint);
            index = self.alternate_index(index, fingerprint);
            if self.table.try_push(index, fingerprint) {
                return true;
            }
        }

        trace!(
            max_kicks = self.max_kicks,
            len = self.len(),
            "cuckoo filter insertion exhausted its displacements"
        );
        log.rollback(&mut self.table);
        false
    }

    /// Removes one copy of an element from the cuckoo filter. Returns `false` if the element's
    /// fingerprint is in neither of its buckets.
    ///
    /// Removing an element that was never inserted removes any element sharing its fingerprint
    /// and buckets.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::CuckooFilter;
    ///
    /// let mut filter = CuckooFilter::<String>::new(100, 4).unwrap();
    ///
    /// filter.insert("foo");
    /// assert!(filter.remove("foo"));
    /// assert!(!filter.contains("foo"));
    /// assert!(!filter.remove("foo"));
    /// ```
    pub fn remove<U>(&mut self, item: &U) -> bool
    where
        T: Borrow<U>,
        U: Hash + ?Sized,
    {
        let (fingerprint, index_1, index_2) = self.get_fingerprint_and_indexes(item);
        self.table.remove(index_1, fingerprint) || self.table.remove(index_2, fingerprint)
    }

    /// Checks if an element is possibly in the cuckoo filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::CuckooFilter;
    ///
    /// let mut filter = CuckooFilter::<String>::new(100, 4).unwrap();
    ///
    /// filter.insert("foo");
    /// assert!(filter.contains("foo"));
    /// ```
    pub fn contains<U>(&self, item: &U) -> bool
    where
        T: Borrow<U>,
        U: Hash + ?Sized,
    {
        let (fingerprint, index_1, index_2) = self.get_fingerprint_and_indexes(item);
        self.table.contains(index_1, fingerprint) || self.table.contains(index_2, fingerprint)
    }

    /// Clears the cuckoo filter, removing all elements.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Returns the number of occupied entries in the cuckoo filter.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if there are no occupied entries in the cuckoo filter.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the total number of entries in the cuckoo filter.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns the number of buckets in the cuckoo filter.
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

    /// Returns the maximum number of displacements made by a single insertion.
    pub fn max_kicks(&self) -> usize {
        self.max_kicks
    }

    /// Returns the percentage of occupied entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::CuckooFilter;
    ///
    /// let mut filter = CuckooFilter::<u32>::new(1, 4).unwrap();
    /// filter.insert(&0);
    ///
    /// assert!((filter.load_factor() - 25.0).abs() < std::f64::EPSILON);
    /// ```
    pub fn load_factor(&self) -> f64 {
        self.len() as f64 / self.capacity() as f64 * 100.0
    }

    /// Returns the number of bytes used to store fingerprints.
    pub fn byte_len(&self) -> usize {
        self.table.byte_len()
    }

    /// Returns the estimated false positive probability of the cuckoo filter. This value will
    /// increase as more items are added.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::CuckooFilter;
    ///
    /// let mut filter = CuckooFilter::<String>::new(100, 4).unwrap();
    /// assert!(filter.estimated_fpp() < std::f64::EPSILON);
    ///
    /// filter.insert("foo");
    /// assert!(filter.estimated_fpp() > std::f64::EPSILON);
    /// assert!(filter.estimated_fpp() < 0.01);
    /// ```
    pub fn estimated_fpp(&self) -> f64 {
        let fingerprints_count = 2.0f64.powi(self.fingerprint_bit_count() as i32);
        let single_fpp = (fingerprints_count - 2.0) / (fingerprints_count - 1.0);
        let occupied_ratio = self.len() as f64 / self.capacity() as f64;
        1.0 - single_fpp.powf(2.0 * self.entries_per_bucket() as f64 * occupied_ratio)
    }

    /// Returns a reference to the cuckoo filter's hasher builders.
    pub fn hashers(&self) -> &[B; 2] {
        &self.hash_builders
    }
}

impl<T, B> PartialEq for CuckooFilter<T, B>
where
    B: PartialEq,
{
    fn eq(&self, other: &CuckooFilter<T, B>) -> bool {
        self.max_kicks == other.max_kicks
            && self.table == other.table
            && self.hash_builders == other.hash_builders
    }
}

impl<T, U, B> ApproximateMembership<U> for CuckooFilter<T, B>
where
    T: Borrow<U>,
    U: Hash + ?Sized,
    B: BuildHasher,
{
    fn insert(&mut self, item: &U) -> bool {
        CuckooFilter::insert(self, item)
    }

    fn contains(&self, item: &U) -> bool {
        CuckooFilter::contains(self, item)
    }
}

impl<T, U, B> Removable<U> for CuckooFilter<T, B>
where
    T: Borrow<U>,
    U: Hash + ?Sized,
    B: BuildHasher,
{
    fn remove(&mut self, item: &U) -> bool {
        CuckooFilter::remove(self, item)
    }
}

#[cfg(test)]
mod tests {
    use super::{CuckooConfig, CuckooFilter};
    use crate::error::FilterError;
    use crate::util::tests::{hash_builder_1, hash_builder_2, rng};
    use proptest::prelude::*;

    fn filter<T>(config: CuckooConfig) -> CuckooFilter<T> {
        CuckooFilter::with_hashers(config, [hash_builder_1(), hash_builder_2()], rng()).unwrap()
    }

    #[test]
    fn test_new() {
        let filter = filter::<String>(CuckooConfig::new(100));
        assert_eq!(filter.len(), 0);
        assert!(filter.is_empty());
        assert_eq!(filter.capacity(), 512);
        assert_eq!(filter.bucket_count(), 128);
        assert_eq!(filter.fingerprint_bit_count(), 16);
        assert_eq!(filter.entries_per_bucket(), 4);
        assert_eq!(filter.max_kicks(), 500);
        assert_eq!(filter.byte_len(), 1024);
    }

    #[test]
    fn test_invalid_config() {
        assert_eq!(
            CuckooFilter::<String>::new(0, 4).unwrap_err(),
            FilterError::ZeroCapacity {
                name: "bucket_count"
            },
        );
        assert_eq!(
            CuckooFilter::<String>::new(100, 0).unwrap_err(),
            FilterError::ZeroCapacity {
                name: "entries_per_bucket"
            },
        );
        assert_eq!(
            CuckooFilter::<String>::from_config(CuckooConfig {
                fingerprint_bit_count: 33,
                ..CuckooConfig::new(100)
            })
            .unwrap_err(),
            FilterError::InvalidFingerprintBitCount { bit_count: 33 },
        );
    }

    #[test]
    fn test_insert_contains_remove() {
        let mut filter = filter::<String>(CuckooConfig::new(100));
        assert!(filter.insert("a"));
        assert!(filter.insert("b"));
        assert!(filter.insert("c"));

        assert!(filter.contains("a"));
        assert!(filter.contains("b"));
        assert!(filter.contains("c"));
        assert!(!filter.contains("z"));

        assert!(filter.remove("b"));
        assert!(!filter.contains("b"));
        assert!(filter.contains("a"));
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_insert_existing_item() {
        let mut filter = filter::<String>(CuckooConfig::new(100));
        filter.insert("foo");
        filter.insert("foo");
        assert_eq!(filter.len(), 2);

        assert!(filter.remove("foo"));
        assert!(filter.contains("foo"));
        assert!(filter.remove("foo"));
        assert!(!filter.contains("foo"));
    }

    #[test]
    fn test_remove_absent_item() {
        let mut filter = filter::<String>(CuckooConfig::new(100));
        filter.insert("foo");
        assert!(!filter.remove("bar"));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_alternate_index_is_involution() {
        let filter = filter::<u32>(CuckooConfig::new(100));
        for index in 0..filter.bucket_count() {
            for fingerprint in 1..200 {
                let alternate = filter.alternate_index(index, fingerprint);
                assert!(alternate < filter.bucket_count());
                assert_eq!(filter.alternate_index(alternate, fingerprint), index);
            }
        }
    }

    #[test]
    fn test_repeated_item_fills_both_buckets() {
        // every copy shares the same two buckets, so one copy past their capacity cannot be placed
        let mut filter = filter::<u32>(CuckooConfig::new(64));
        let (_, index_1, index_2) = filter.get_fingerprint_and_indexes(&7);
        let copies = if index_1 == index_2 { 4 } else { 8 };
        for _ in 0..copies {
            assert!(filter.insert(&7));
        }

        let before = filter.table.clone();
        assert!(!filter.insert(&7));
        assert_eq!(filter.table, before);
        assert_eq!(filter.len(), copies);
        assert!(filter.contains(&7));
    }

    #[test]
    fn test_fill_until_failure() {
        let mut filter = filter::<u32>(CuckooConfig::new(16));
        let mut inserted = Vec::new();
        for item in 0..200u32 {
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
    fn test_clear() {
        let mut filter = filter::<String>(CuckooConfig::new(100));
        filter.insert("foo");
        filter.insert("bar");
        filter.clear();

        assert!(filter.is_empty());
        assert!(!filter.contains("foo"));
        assert!(!filter.contains("bar"));
    }

    #[test]
    fn test_estimated_fpp() {
        let mut filter = filter::<String>(CuckooConfig::new(100));
        assert!(filter.estimated_fpp() < std::f64::EPSILON);

        filter.insert("foo");

        let expected_fpp =
            1.0 - ((2f64.powi(16) - 2.0) / (2f64.powi(16) - 1.0)).powf(8.0 / 512.0);
        assert!((filter.estimated_fpp() - expected_fpp).abs() < std::f64::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_buckets_never_overflow(ops in prop::collection::vec((any::<bool>(), 0u32..64), 1..400)) {
            let mut filter = filter::<u32>(CuckooConfig {
                entries_per_bucket: 2,
                ..CuckooConfig::new(8)
            });
            for (is_insert, item) in ops {
                if is_insert {
                    filter.insert(&item);
                } else {
                    filter.remove(&item);
                }
                for bucket in 0..filter.bucket_count() {
                    prop_assert!(filter.table.bucket_len(bucket) <= 2);
                }
            }
            prop_assert!(filter.len() <= filter.capacity());
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_ser_de() {
        let mut filter = CuckooFilter::<String>::new(100, 4).unwrap();
        filter.insert("foo");

        let serialized_filter = bincode::serialize(&filter).unwrap();
        let de_filter: CuckooFilter<String> = bincode::deserialize(&serialized_filter).unwrap();

        assert!(de_filter.contains("foo"));
        assert_eq!(filter, de_filter);
    }
}
