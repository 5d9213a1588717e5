//! Capabilities shared by the filters in this crate.
//!
//! Every filter answers approximate membership queries. Filters that store fingerprints can also
//! remove items, and filters that keep enough information to rebuild themselves can grow.
//!
//! # Examples
//!
//! ```
//! use amq_filters::bloom::BloomFilter;
//! use amq_filters::cuckoo::CuckooFilter;
//! use amq_filters::vacuum::VacuumFilter;
//! use amq_filters::ApproximateMembership;
//!
//! fn false_positives<F: ApproximateMembership<u32>>(filter: &mut F) -> usize {
//!     for item in 0..100 {
//!         assert!(filter.insert(&item));
//!     }
//!     (1000..2000).filter(|item| filter.contains(item)).count()
//! }
//!
//! false_positives(&mut BloomFilter::<u32>::new(1000, 3).unwrap());
//! false_positives(&mut CuckooFilter::<u32>::new(100, 4).unwrap());
//! false_positives(&mut VacuumFilter::<u32>::new(100).unwrap());
//! ```

/// An approximate membership query filter.
///
/// `contains` never returns `false` for an item whose `insert` returned `true`, unless the item
/// was removed since. It may return `true` for items that were never inserted.
pub trait ApproximateMembership<U: ?Sized> {
    /// Inserts an item, returning `false` if the filter had no room for it. A failed insertion
    /// leaves the filter holding exactly what it held before.
    fn insert(&mut self, item: &U) -> bool;

    /// Checks if an item is possibly in the filter.
    fn contains(&self, item: &U) -> bool;
}

/// A filter that supports deletion.
///
/// Removal works on fingerprints or counters rather than items, so removing an item that was
/// never inserted can remove a colliding item instead.
pub trait Removable<U: ?Sized>: ApproximateMembership<U> {
    /// Removes one copy of an item, returning `false` if it was not found.
    fn remove(&mut self, item: &U) -> bool;
}

/// A filter that can enlarge its storage once it becomes too full.
pub trait Growable {
    /// Grows the filter if its load exceeds its threshold. Returns `true` if it grew.
    fn maybe_grow(&mut self) -> bool;
}
