//! # amq-filters
//!
//! `amq-filters` contains approximate membership query filters: set-like collections that answer
//! "is this item present?" using far less memory than storing the items, at the cost of
//! occasionally answering "yes" for an item that was never inserted. A filter never answers "no"
//! for an item it holds.
//!
//! - [`BloomFilter`](bloom/struct.BloomFilter.html): a bit vector probed by `k` hashes. Inserts
//!   always succeed, nothing can be removed.
//! - [`CountingBloomFilter`](bloom/struct.CountingBloomFilter.html): a Bloom filter with counters
//!   that supports removal and doubles its size once it becomes too full.
//! - [`CuckooFilter`](cuckoo/struct.CuckooFilter.html): fingerprints in buckets, with two
//!   candidate buckets per item and displacement of existing fingerprints to make room.
//! - [`VacuumFilter`](vacuum/struct.VacuumFilter.html): a cuckoo-style filter whose alternate
//!   buckets are kept close together, with ranges sized for a target load factor.
//!
//! All filters implement [`ApproximateMembership`](trait.ApproximateMembership.html); the ones
//! that can delete implement [`Removable`](trait.Removable.html).
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! amq-filters = "*"
//! ```
//!
//! Enable the `serde` feature to serialize filters and their configurations.
//!
//! ## References
//!
//!  - [Space/Time Trade-offs in Hash Coding with Allowable Errors](https://dl.acm.org/citation.cfm?id=362692)
//!  > Bloom, Burton H. 1970. “Space/Time Trade-Offs in Hash Coding with Allowable Errors.” *Commun. ACM* 13 (7). New York, NY, USA: ACM: 422–26. doi:[10.1145/362686.362692](https://doi.org/10.1145/362686.362692).
//!  - [Cuckoo Filter: Practically Better Than Bloom](https://dl.acm.org/citation.cfm?id=2674994)
//!  > Fan, Bin, Dave G. Andersen, Michael Kaminsky, and Michael D. Mitzenmacher. 2014. “Cuckoo Filter: Practically Better Than Bloom.” In *Proceedings of the 10th Acm International on Conference on Emerging Networking Experiments and Technologies*, 75–88. CoNEXT ’14. New York, NY, USA: ACM. doi:[10.1145/2674005.2674994](https://doi.org/10.1145/2674005.2674994).
//!  - [Vacuum Filters: More Space-Efficient and Faster Replacement for Bloom and Cuckoo Filters](https://dl.acm.org/doi/10.14778/3372716.3372723)
//!  > Wang, Minmei, Mingxun Zhou, Shouqian Shi, and Chen Qian. 2019. “Vacuum Filters: More Space-Efficient and Faster Replacement for Bloom and Cuckoo Filters.” *Proc. VLDB Endow.* 13 (2): 197–210. doi:[10.14778/3372716.3372723](https://doi.org/10.14778/3372716.3372723).
//!  - [Less hashing, same performance: Building a better Bloom filter](https://dl.acm.org/citation.cfm?id=1400125)
//!  > Kirsch, Adam, and Michael Mitzenmacher. 2008. “Less Hashing, Same Performance: Building a Better Bloom Filter.” *Random Struct. Algorithms* 33 (2). New York, NY, USA: John Wiley & Sons, Inc.: 187–218. doi:[10.1002/rsa.v33:2](https://doi.org/10.1002/rsa.v33:2).

#![warn(missing_docs)]

pub mod bit_vec;
pub mod bloom;
mod bucket_table;
pub mod cuckoo;
pub mod error;
mod filter;
pub mod fingerprint_vec;
mod util;
pub mod vacuum;

pub use crate::error::{FilterError, Result};
pub use crate::filter::{ApproximateMembership, Growable, Removable};
pub use crate::util::SipHasherBuilder;
