use crate::fingerprint_vec::FingerprintVec;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

/// Buckets of fingerprint slots laid out contiguously in a `FingerprintVec`. A zero entry is an
/// empty slot; occupied slots may appear anywhere within a bucket.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
pub(crate) struct BucketTable {
    fingerprint_vec: FingerprintVec,
    entries_per_bucket: usize,
}

impl BucketTable {
    pub fn new(bucket_count: usize, entries_per_bucket: usize, fingerprint_bit_count: usize) -> Self {
        BucketTable {
            fingerprint_vec: FingerprintVec::new(
                fingerprint_bit_count,
                bucket_count * entries_per_bucket,
            ),
            entries_per_bucket,
        }
    }

    #[inline]
    fn get_vec_index(&self, bucket: usize, slot: usize) -> usize {
        bucket * self.entries_per_bucket + slot
    }

    pub fn get(&self, bucket: usize, slot: usize) -> u32 {
        self.fingerprint_vec.get(self.get_vec_index(bucket, slot))
    }

    /// Overwrites a slot, returning its previous fingerprint.
    pub fn replace(&mut self, bucket: usize, slot: usize, fingerprint: u32) -> u32 {
        let vec_index = self.get_vec_index(bucket, slot);
        let prev = self.fingerprint_vec.get(vec_index);
        self.fingerprint_vec.set(vec_index, fingerprint);
        prev
    }

    pub fn bucket_len(&self, bucket: usize) -> usize {
        (0..self.entries_per_bucket)
            .filter(|slot| self.get(bucket, *slot) != 0)
            .count()
    }

    pub fn has_room(&self, bucket: usize) -> bool {
        self.empty_slot(bucket).is_some()
    }

    pub fn empty_slot(&self, bucket: usize) -> Option<usize> {
        (0..self.entries_per_bucket).find(|slot| self.get(bucket, *slot) == 0)
    }

    /// Stores `fingerprint` in the first empty slot of `bucket`.
    pub fn try_push(&mut self, bucket: usize, fingerprint: u32) -> bool {
        match self.empty_slot(bucket) {
            Some(slot) => {
                self.replace(bucket, slot, fingerprint);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, bucket: usize, fingerprint: u32) -> bool {
        (0..self.entries_per_bucket).any(|slot| self.get(bucket, slot) == fingerprint)
    }

    /// Clears one slot of `bucket` holding `fingerprint`.
    pub fn remove(&mut self, bucket: usize, fingerprint: u32) -> bool {
        match (0..self.entries_per_bucket).find(|slot| self.get(bucket, *slot) == fingerprint) {
            Some(slot) => {
                self.replace(bucket, slot, 0);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.fingerprint_vec.clear();
    }

    pub fn len(&self) -> usize {
        self.fingerprint_vec.occupied_len()
    }

    pub fn capacity(&self) -> usize {
        self.fingerprint_vec.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.fingerprint_vec.len() / self.entries_per_bucket
    }

    pub fn entries_per_bucket(&self) -> usize {
        self.entries_per_bucket
    }

    pub fn fingerprint_bit_count(&self) -> usize {
        self.fingerprint_vec.bit_count()
    }

    pub fn byte_len(&self) -> usize {
        self.fingerprint_vec.byte_len()
    }
}

/// Slot writes made while relocating fingerprints, replayed backwards to restore the table when
/// the relocation budget runs out.
#[derive(Debug, Default)]
pub(crate) struct RelocationLog {
    writes: Vec<(usize, usize, u32)>,
}

impl RelocationLog {
    pub fn with_capacity(capacity: usize) -> Self {
        RelocationLog {
            writes: Vec::with_capacity(capacity),
        }
    }

    /// Writes `fingerprint` into the slot and records what it displaced.
    pub fn replace(
        &mut self,
        table: &mut BucketTable,
        bucket: usize,
        slot: usize,
        fingerprint: u32,
    ) -> u32 {
        let prev = table.replace(bucket, slot, fingerprint);
        self.writes.push((bucket, slot, prev));
        prev
    }

    pub fn rollback(self, table: &mut BucketTable) {
        for (bucket, slot, prev) in self.writes.into_iter().rev() {
            table.replace(bucket, slot, prev);
        }
    }
}
