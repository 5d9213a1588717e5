use crate::bloom::{DEFAULT_MAX_LOAD, GROWTH_FACTOR};
use crate::error::{ensure_non_zero, FilterError, Result};
use crate::filter::{ApproximateMembership, Growable, Removable};
use crate::util::DoubleHasher;
use crate::SipHasherBuilder;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use tracing::debug;

/// A growable bloom filter of saturating counters that supports removal.
///
/// Each insertion increments `K` counters and each removal decrements them, so an item is
/// possibly present while all of its counters are non-zero. Counters saturate at `u8::MAX` and
/// then stay saturated.
///
/// The filter also keeps a log of the items it holds together with their multiplicities. Once the
/// fraction of non-zero counters passes `max_load`, the counter array doubles and is rebuilt by
/// reinserting the logged items, so growth never loses an item. The log also makes `remove`
/// exact: removing an item that was never inserted returns `false` and leaves the counters
/// untouched. The cost is that the filter stores every distinct item it holds.
///
/// # Examples
///
/// ```
/// use amq_filters::bloom::CountingBloomFilter;
///
/// let mut filter = CountingBloomFilter::<String>::new(64, 3).unwrap();
///
/// assert!(!filter.contains("foo"));
/// filter.insert("foo");
/// assert!(filter.contains("foo"));
///
/// assert!(filter.remove("foo"));
/// assert!(!filter.contains("foo"));
/// assert!(!filter.remove("foo"));
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(
        crate = "serde_crate",
        bound(deserialize = "T: Eq + Hash + Deserialize<'de>, B: Deserialize<'de>")
    )
)]
pub struct CountingBloomFilter<T, B = SipHasherBuilder> {
    counters: Vec<u8>,
    hasher: DoubleHasher<T, B>,
    hasher_count: usize,
    max_load: f64,
    items: HashMap<T, usize>,
    occupied_len: usize,
}

impl<T> CountingBloomFilter<T>
where
    T: Eq + Hash,
{
    /// Constructs a new, empty `CountingBloomFilter` with `counter_count` counters probed by
    /// `hasher_count` hash functions. The filter grows once more than half of its counters are
    /// non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error if `counter_count` or `hasher_count` is 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bloom::CountingBloomFilter;
    ///
    /// let filter = CountingBloomFilter::<String>::new(64, 3).unwrap();
    /// ```
    pub fn new(counter_count: usize, hasher_count: usize) -> Result<Self> {
        Self::with_hashers(
            counter_count,
            hasher_count,
            DEFAULT_MAX_LOAD,
            [
                SipHasherBuilder::from_entropy(),
                SipHasherBuilder::from_entropy(),
            ],
        )
    }
}

impl<T, B> CountingBloomFilter<T, B>
where
    T: Eq + Hash,
    B: BuildHasher,
{
    /// Constructs a new, empty `CountingBloomFilter` with `counter_count` counters, `hasher_count`
    /// probes, a growth threshold of `max_load`, and two hasher builders for double hashing.
    ///
    /// # Errors
    ///
    /// Returns an error if `counter_count` or `hasher_count` is 0, or if `max_load` is not in
    /// `(0, 1]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bloom::CountingBloomFilter;
    /// use amq_filters::SipHasherBuilder;
    ///
    /// let filter = CountingBloomFilter::<String>::with_hashers(
    ///     64,
    ///     3,
    ///     0.5,
    ///     [SipHasherBuilder::from_seed(0, 0), SipHasherBuilder::from_seed(1, 1)],
    /// ).unwrap();
    /// ```
    pub fn with_hashers(
        counter_count: usize,
        hasher_count: usize,
        max_load: f64,
        hash_builders: [B; 2],
    ) -> Result<Self> {
        ensure_non_zero(counter_count, "counter_count")?;
        if hasher_count == 0 {
            return Err(FilterError::ZeroHasherCount);
        }
        if !(max_load > 0.0 && max_load <= 1.0) {
            return Err(FilterError::InvalidLoadFactor {
                load_factor: max_load,
            });
        }
        Ok(CountingBloomFilter {
            counters: vec![0; counter_count],
            hasher: DoubleHasher::with_hashers(hash_builders),
            hasher_count,
            max_load,
            items: HashMap::new(),
            occupied_len: 0,
        })
    }

    fn increment<U>(&mut self, item: &U)
    where
        T: Borrow<U>,
        U: Hash + ?Sized,
    {
        let counter_count = self.counters.len() as u64;
        for hash in self.hasher.hash(item).take(self.hasher_count) {
            let counter = &mut self.counters[(hash % counter_count) as usize];
            if *counter == 0 {
                self.occupied_len += 1;
            }
            *counter = counter.saturating_add(1);
        }
    }

    fn decrement<U>(&mut self, item: &U)
    where
        T: Borrow<U>,
        U: Hash + ?Sized,
    {
        let counter_count = self.counters.len() as u64;
        for hash in self.hasher.hash(item).take(self.hasher_count) {
            let counter = &mut self.counters[(hash % counter_count) as usize];
            if *counter == u8::max_value() || *counter == 0 {
                continue;
            }
            *counter -= 1;
            if *counter == 0 {
                self.occupied_len -= 1;
            }
        }
    }

    /// Inserts an element into the counting bloom filter, growing it if the load passes the
    /// threshold. Always returns `true`.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bloom::CountingBloomFilter;
    ///
    /// let mut filter = CountingBloomFilter::<String>::new(64, 3).unwrap();
    ///
    /// assert!(filter.insert("foo"));
    /// ```
    pub fn insert<U>(&mut self, item: &U) -> bool
    where
        T: Borrow<U>,
        U: Hash + Eq + ToOwned<Owned = T> + ?Sized,
    {
        self.increment(item);
        match self.items.get_mut(item) {
            Some(count) => *count += 1,
            None => {
                self.items.insert(item.to_owned(), 1);
            }
        }
        while self.maybe_grow() {}
        true
    }

    /// Removes one copy of an element from the counting bloom filter. Returns `false` if the
    /// element is not held by the filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bloom::CountingBloomFilter;
    ///
    /// let mut filter = CountingBloomFilter::<String>::new(64, 3).unwrap();
    ///
    /// filter.insert("foo");
    /// filter.insert("foo");
    ///
    /// assert!(filter.remove("foo"));
    /// assert!(filter.contains("foo"));
    /// assert!(filter.remove("foo"));
    /// assert!(!filter.contains("foo"));
    /// ```
    pub fn remove<U>(&mut self, item: &U) -> bool
    where
        T: Borrow<U>,
        U: Hash + Eq + ?Sized,
    {
        let remaining = match self.items.get_mut(item) {
            Some(count) => {
                *count -= 1;
                *count
            }
            None => return false,
        };
        if remaining == 0 {
            self.items.remove(item);
        }
        self.decrement(item);
        true
    }

    /// Checks if an element is possibly in the counting bloom filter.
    pub fn contains<U>(&self, item: &U) -> bool
    where
        T: Borrow<U>,
        U: Hash + ?Sized,
    {
        let counter_count = self.counters.len() as u64;
        self.hasher
            .hash(item)
            .take(self.hasher_count)
            .all(|hash| self.counters[(hash % counter_count) as usize] > 0)
    }

    /// Returns the number of items held by the counting bloom filter, counting duplicates.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bloom::CountingBloomFilter;
    ///
    /// let mut filter = CountingBloomFilter::<String>::new(64, 3).unwrap();
    /// filter.insert("foo");
    /// filter.insert("foo");
    ///
    /// assert_eq!(filter.len(), 2);
    /// ```
    pub fn len(&self) -> usize {
        self.items.values().sum()
    }

    /// Returns `true` if the counting bloom filter holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of counters in the counting bloom filter.
    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }

    /// Returns the number of hash functions used by the counting bloom filter.
    pub fn hasher_count(&self) -> usize {
        self.hasher_count
    }

    /// Returns the fraction of non-zero counters.
    pub fn load(&self) -> f64 {
        self.occupied_len as f64 / self.counters.len() as f64
    }

    /// Returns the load above which the counting bloom filter grows.
    pub fn max_load(&self) -> f64 {
        self.max_load
    }

    /// Clears the counting bloom filter, removing all elements. The counter count is kept.
    pub fn clear(&mut self) {
        for counter in &mut self.counters {
            *counter = 0;
        }
        self.items.clear();
        self.occupied_len = 0;
    }

    /// Returns a reference to the counting bloom filter's hasher builders.
    pub fn hashers(&self) -> &[B; 2] {
        self.hasher.hashers()
    }
}

impl<T, B> Growable for CountingBloomFilter<T, B>
where
    T: Eq + Hash,
    B: BuildHasher,
{
    /// Doubles the counter array and reinserts every logged item once the load passes
    /// `max_load`. A single call grows at most once.
    fn maybe_grow(&mut self) -> bool {
        if self.load() <= self.max_load {
            return false;
        }

        let counter_count = self.counters.len() * GROWTH_FACTOR;
        debug!(
            from = self.counters.len(),
            to = counter_count,
            items = self.items.len(),
            "growing counting bloom filter"
        );
        self.counters = vec![0; counter_count];
        self.occupied_len = 0;

        let items = std::mem::replace(&mut self.items, HashMap::new());
        for (item, count) in &items {
            for _ in 0..*count {
                self.increment(item);
            }
        }
        self.items = items;
        true
    }
}

impl<T, U, B> ApproximateMembership<U> for CountingBloomFilter<T, B>
where
    T: Eq + Hash + Borrow<U>,
    U: Hash + Eq + ToOwned<Owned = T> + ?Sized,
    B: BuildHasher,
{
    fn insert(&mut self, item: &U) -> bool {
        CountingBloomFilter::insert(self, item)
    }

    fn contains(&self, item: &U) -> bool {
        CountingBloomFilter::contains(self, item)
    }
}

impl<T, U, B> Removable<U> for CountingBloomFilter<T, B>
where
    T: Eq + Hash + Borrow<U>,
    U: Hash + Eq + ToOwned<Owned = T> + ?Sized,
    B: BuildHasher,
{
    fn remove(&mut self, item: &U) -> bool {
        CountingBloomFilter::remove(self, item)
    }
}
