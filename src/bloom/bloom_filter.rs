use crate::bit_vec::BitVec;
use crate::error::{ensure_non_zero, FilterError, Result};
use crate::filter::ApproximateMembership;
use crate::util::DoubleHasher;
use crate::SipHasherBuilder;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

/// A space-efficient probabilistic data structure to test for membership in a set.
///
/// At its core, a bloom filter is a bit array, initially all set to zero. `K` hash functions
/// map each element to `K` bits in the bit array. An element definitely does not exist in the
/// bloom filter if any of the `K` bits are unset. An element is possibly in the set if all of the
/// `K` bits are set. This particular implementation of a bloom filter uses two hash functions to
/// simulate `K` hash functions.
///
/// Bits are never cleared by insertions, so there is no removal and every insertion succeeds.
///
/// # Examples
///
/// ```
/// use amq_filters::bloom::BloomFilter;
///
/// let mut filter = BloomFilter::<String>::new(1000, 3).unwrap();
///
/// assert!(!filter.contains("foo"));
/// assert!(filter.insert("foo"));
/// assert!(filter.contains("foo"));
///
/// filter.clear();
/// assert!(!filter.contains("foo"));
///
/// assert_eq!(filter.len(), 1000);
/// assert_eq!(filter.hasher_count(), 3);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
pub struct BloomFilter<T, B = SipHasherBuilder> {
    bit_vec: BitVec,
    hasher: DoubleHasher<T, B>,
    hasher_count: usize,
    _marker: PhantomData<T>,
}

impl<T> BloomFilter<T> {
    /// Constructs a new, empty `BloomFilter` with `bit_count` bits probed by `hasher_count` hash
    /// functions.
    ///
    /// # Errors
    ///
    /// Returns an error if `bit_count` or `hasher_count` is 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bloom::BloomFilter;
    ///
    /// let filter = BloomFilter::<String>::new(1000, 3).unwrap();
    /// ```
    pub fn new(bit_count: usize, hasher_count: usize) -> Result<Self> {
        Self::with_hashers(
            bit_count,
            hasher_count,
            [
                SipHasherBuilder::from_entropy(),
                SipHasherBuilder::from_entropy(),
            ],
        )
    }

    /// Constructs a new, empty `BloomFilter` sized for `item_count` items at a maximum false
    /// positive probability of `fpp`. The bit count is `-n * log2(fpp) / ln 2` and the hasher
    /// count is `(m / n) * ln 2`, rounded up.
    ///
    /// # Errors
    ///
    /// Returns an error if `item_count` is 0 or if `fpp` is not in `(0, 1)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bloom::BloomFilter;
    ///
    /// let filter = BloomFilter::<String>::from_fpp(10, 0.01).unwrap();
    /// assert_eq!(filter.len(), 96);
    /// assert_eq!(filter.hasher_count(), 7);
    /// ```
    pub fn from_fpp(item_count: usize, fpp: f64) -> Result<Self> {
        Self::from_fpp_with_hashers(
            item_count,
            fpp,
            [
                SipHasherBuilder::from_entropy(),
                SipHasherBuilder::from_entropy(),
            ],
        )
    }
}

impl<T, B> BloomFilter<T, B>
where
    B: BuildHasher,
{
    fn get_hasher_count(bit_count: usize, item_count: usize) -> usize {
        ((bit_count as f64) / (item_count as f64) * 2f64.ln()).ceil() as usize
    }

    /// Constructs a new, empty `BloomFilter` with `bit_count` bits, `hasher_count` probes, and two
    /// hasher builders for double hashing.
    ///
    /// # Errors
    ///
    /// Returns an error if `bit_count` or `hasher_count` is 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bloom::BloomFilter;
    /// use amq_filters::SipHasherBuilder;
    ///
    /// let filter = BloomFilter::<String>::with_hashers(
    ///     1000,
    ///     3,
    ///     [SipHasherBuilder::from_seed(0, 0), SipHasherBuilder::from_seed(1, 1)],
    /// ).unwrap();
    /// ```
    pub fn with_hashers(
        bit_count: usize,
        hasher_count: usize,
        hash_builders: [B; 2],
    ) -> Result<Self> {
        ensure_non_zero(bit_count, "bit_count")?;
        if hasher_count == 0 {
            return Err(FilterError::ZeroHasherCount);
        }
        Ok(BloomFilter {
            bit_vec: BitVec::new(bit_count),
            hasher: DoubleHasher::with_hashers(hash_builders),
            hasher_count,
            _marker: PhantomData,
        })
    }

    /// Constructs a new, empty `BloomFilter` sized for `item_count` items at a maximum false
    /// positive probability of `fpp`, and two hasher builders for double hashing.
    ///
    /// # Errors
    ///
    /// Returns an error if `item_count` is 0 or if `fpp` is not in `(0, 1)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bloom::BloomFilter;
    /// use amq_filters::SipHasherBuilder;
    ///
    /// let filter = BloomFilter::<String>::from_fpp_with_hashers(
    ///     10,
    ///     0.01,
    ///     [SipHasherBuilder::from_seed(0, 0), SipHasherBuilder::from_seed(1, 1)],
    /// ).unwrap();
    /// ```
    pub fn from_fpp_with_hashers(item_count: usize, fpp: f64, hash_builders: [B; 2]) -> Result<Self> {
        ensure_non_zero(item_count, "item_count")?;
        if !(fpp > 0.0 && fpp < 1.0) {
            return Err(FilterError::InvalidFpp { fpp });
        }
        let bit_count = (-fpp.log2() * (item_count as f64) / 2f64.ln()).ceil() as usize;
        Self::with_hashers(
            bit_count,
            Self::get_hasher_count(bit_count, item_count),
            hash_builders,
        )
    }

    /// Inserts an element into the bloom filter. Always returns `true`.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bloom::BloomFilter;
    ///
    /// let mut filter = BloomFilter::<String>::new(1000, 3).unwrap();
    ///
    /// assert!(filter.insert("foo"));
    /// ```
    pub fn insert<U>(&mut self, item: &U) -> bool
    where
        T: Borrow<U>,
        U: Hash + ?Sized,
    {
        let bit_count = self.bit_vec.len() as u64;
        for hash in self.hasher.hash(item).take(self.hasher_count) {
            self.bit_vec.set((hash % bit_count) as usize, true);
        }
        true
    }

    /// Checks if an element is possibly in the bloom filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bloom::BloomFilter;
    ///
    /// let mut filter = BloomFilter::<String>::new(1000, 3).unwrap();
    ///
    /// assert!(!filter.contains("foo"));
    /// filter.insert("foo");
    /// assert!(filter.contains("foo"));
    /// ```
    pub fn contains<U>(&self, item: &U) -> bool
    where
        T: Borrow<U>,
        U: Hash + ?Sized,
    {
        let bit_count = self.bit_vec.len() as u64;
        self.hasher
            .hash(item)
            .take(self.hasher_count)
            .all(|hash| self.bit_vec[(hash % bit_count) as usize])
    }

    /// Returns the number of bits in the bloom filter.
    pub fn len(&self) -> usize {
        self.bit_vec.len()
    }

    /// Returns `true` if the bloom filter has no bits. Constructors reject a bit count of 0, so
    /// this is always `false`.
    pub fn is_empty(&self) -> bool {
        self.bit_vec.is_empty()
    }

    /// Returns the number of hash functions used by the bloom filter.
    pub fn hasher_count(&self) -> usize {
        self.hasher_count
    }

    /// Clears the bloom filter, removing all elements.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bloom::BloomFilter;
    ///
    /// let mut filter = BloomFilter::<String>::new(1000, 3).unwrap();
    ///
    /// filter.insert("foo");
    /// filter.clear();
    ///
    /// assert!(!filter.contains("foo"));
    /// ```
    pub fn clear(&mut self) {
        self.bit_vec.set_all(false)
    }

    /// Returns the number of set bits in the bloom filter.
    pub fn count_ones(&self) -> usize {
        self.bit_vec.count_ones()
    }

    /// Returns the number of unset bits in the bloom filter.
    pub fn count_zeros(&self) -> usize {
        self.bit_vec.count_zeros()
    }

    /// Returns the estimated false positive probability of the bloom filter. This value will
    /// increase as more items are added.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bloom::BloomFilter;
    ///
    /// let mut filter = BloomFilter::<String>::from_fpp(100, 0.01).unwrap();
    /// assert!(filter.estimated_fpp() < std::f64::EPSILON);
    ///
    /// filter.insert("foo");
    /// assert!(filter.estimated_fpp() > std::f64::EPSILON);
    /// assert!(filter.estimated_fpp() < 0.01);
    /// ```
    pub fn estimated_fpp(&self) -> f64 {
        let single_fpp = self.bit_vec.count_ones() as f64 / self.bit_vec.len() as f64;
        single_fpp.powi(self.hasher_count as i32)
    }

    /// Returns a reference to the bloom filter's hasher builders.
    pub fn hashers(&self) -> &[B; 2] {
        self.hasher.hashers()
    }
}

impl<T, U, B> ApproximateMembership<U> for BloomFilter<T, B>
where
    T: Borrow<U>,
    U: Hash + ?Sized,
    B: BuildHasher,
{
    fn insert(&mut self, item: &U) -> bool {
        BloomFilter::insert(self, item)
    }

    fn contains(&self, item: &U) -> bool {
        BloomFilter::contains(self, item)
    }
}

#[cfg(test)]
mod tests {
    use super::BloomFilter;
    use crate::error::FilterError;
    use crate::util::tests::{hash_builder_1, hash_builder_2};

    fn filter(bit_count: usize, hasher_count: usize) -> BloomFilter<u32> {
        BloomFilter::with_hashers(
            bit_count,
            hasher_count,
            [hash_builder_1(), hash_builder_2()],
        )
        .unwrap()
    }

    #[test]
    fn test_new() {
        let mut filter =
            BloomFilter::<String>::with_hashers(1000, 3, [hash_builder_1(), hash_builder_2()])
                .unwrap();

        assert!(!filter.contains("foo"));
        filter.insert("foo");
        assert!(filter.contains("foo"));
        assert!(filter.count_ones() > 0 && filter.count_ones() <= 3);
        assert_eq!(filter.count_ones() + filter.count_zeros(), 1000);

        filter.clear();
        assert!(!filter.contains("foo"));
        assert_eq!(filter.count_ones(), 0);

        assert_eq!(filter.len(), 1000);
        assert!(!filter.is_empty());
        assert_eq!(filter.hasher_count(), 3);
    }

    #[test]
    fn test_from_fpp() {
        let filter = BloomFilter::<String>::from_fpp_with_hashers(
            10,
            0.01,
            [hash_builder_1(), hash_builder_2()],
        )
        .unwrap();

        assert_eq!(filter.len(), 96);
        assert_eq!(filter.hasher_count(), 7);
    }

    #[test]
    fn test_invalid_parameters() {
        assert_eq!(
            BloomFilter::<u32>::new(0, 3),
            Err(FilterError::ZeroCapacity { name: "bit_count" }),
        );
        assert_eq!(
            BloomFilter::<u32>::new(100, 0),
            Err(FilterError::ZeroHasherCount),
        );
        assert_eq!(
            BloomFilter::<u32>::from_fpp(0, 0.01),
            Err(FilterError::ZeroCapacity { name: "item_count" }),
        );
        assert_eq!(
            BloomFilter::<u32>::from_fpp(10, 1.0),
            Err(FilterError::InvalidFpp { fpp: 1.0 }),
        );
    }

    #[test]
    fn test_no_false_negatives() {
        let mut filter = filter(1000, 3);
        for item in 1..=100u32 {
            assert!(filter.insert(&item));
        }
        for item in 1..=100u32 {
            assert!(filter.contains(&item));
        }

        let false_positives = (10_000..10_100u32).filter(|item| filter.contains(item)).count();
        assert!((false_positives as f64 / 100.0) < 0.05);
    }

    #[test]
    fn test_false_positive_rate_near_theory() {
        let (bit_count, hasher_count, item_count) = (10_000, 3, 1000);
        let mut filter = filter(bit_count, hasher_count);
        for item in 0..item_count as u32 {
            filter.insert(&item);
        }

        let false_positives = (1_000_000..1_002_000u32)
            .filter(|item| filter.contains(item))
            .count();
        let rate = false_positives as f64 / 2000.0;
        let exponent = -(hasher_count as f64) * item_count as f64 / bit_count as f64;
        let theoretical = (1.0 - exponent.exp()).powi(hasher_count as i32);
        assert!(rate < theoretical * 3.0, "{} vs {}", rate, theoretical);
    }

    #[test]
    fn test_estimated_fpp() {
        let mut filter = filter(100, 7);
        assert!(filter.estimated_fpp() < std::f64::EPSILON);

        filter.insert(&7u32);

        let expected_fpp = (filter.count_ones() as f64 / 100.0).powi(7);
        assert!((filter.estimated_fpp() - expected_fpp).abs() < std::f64::EPSILON);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_ser_de() {
        let mut filter = BloomFilter::<String>::new(1000, 3).unwrap();
        filter.insert("foo");

        let serialized_filter = bincode::serialize(&filter).unwrap();
        let de_filter: BloomFilter<String> = bincode::deserialize(&serialized_filter).unwrap();

        assert!(de_filter.contains("foo"));
        assert_eq!(filter.bit_vec, de_filter.bit_vec);
        assert_eq!(filter.hasher_count(), de_filter.hasher_count());
        assert_eq!(filter.hashers(), de_filter.hashers());
    }
}
