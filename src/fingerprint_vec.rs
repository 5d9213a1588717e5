//! Fixed-length list of densely packed fingerprints.

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::mem;
use std::ops::Range;

/// A fixed-length list of `bit_count`-bit values packed into a `Vec<u64>`.
///
/// Values may straddle two blocks, so no space is wasted for widths that do not divide 64. A
/// value of zero is treated as an empty entry and `occupied_len` counts the non-zero entries.
///
/// # Examples
///
/// ```
/// use amq_filters::fingerprint_vec::FingerprintVec;
///
/// let mut fv = FingerprintVec::new(12, 4);
///
/// fv.set(0, 0xABC);
/// fv.set(3, 0x001);
///
/// assert_eq!(fv.iter().collect::<Vec<u32>>(), vec![0xABC, 0, 0, 0x001]);
/// assert_eq!(fv.occupied_len(), 2);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
pub struct FingerprintVec {
    blocks: Vec<u64>,
    bit_count: usize,
    occupied_len: usize,
    len: usize,
}

const BLOCK_BIT_COUNT: usize = mem::size_of::<u64>() * 8;

impl FingerprintVec {
    fn get_block_count(bit_count: usize, len: usize) -> usize {
        (bit_count * len + BLOCK_BIT_COUNT - 1) / BLOCK_BIT_COUNT
    }

    #[inline]
    fn mask(&self) -> u64 {
        (1u64 << self.bit_count) - 1
    }

    /// Constructs a new `FingerprintVec` of `len` entries of `bit_count` bits each, all zero.
    ///
    /// # Panics
    ///
    /// Panics if `bit_count` is 0 or greater than 32.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::fingerprint_vec::FingerprintVec;
    ///
    /// let fv = FingerprintVec::new(5, 4);
    /// assert_eq!(fv.iter().collect::<Vec<u32>>(), vec![0, 0, 0, 0]);
    /// ```
    pub fn new(bit_count: usize, len: usize) -> Self {
        assert!(bit_count > 0 && bit_count <= 32);
        FingerprintVec {
            blocks: vec![0; Self::get_block_count(bit_count, len)],
            bit_count,
            occupied_len: 0,
            len,
        }
    }

    /// Sets the entry at index `index` to the low `bit_count` bits of `value`.
    ///
    /// # Panics
    ///
    /// Panics if attempt to set an index out-of-bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::fingerprint_vec::FingerprintVec;
    ///
    /// let mut fv = FingerprintVec::new(5, 4);
    /// fv.set(1, 0b111_11111);
    ///
    /// assert_eq!(fv.get(0), 0);
    /// assert_eq!(fv.get(1), 0b11111);
    /// ```
    pub fn set(&mut self, index: usize, value: u32) {
        assert!(index < self.len);
        let prev_is_zero = self.get(index) == 0;
        let mask = self.mask();
        let value = u64::from(value) & mask;
        let offset = index * self.bit_count;
        let block = offset / BLOCK_BIT_COUNT;
        let shift = offset % BLOCK_BIT_COUNT;

        self.blocks[block] &= !(mask << shift);
        self.blocks[block] |= value << shift;

        // the entry spills into the next block
        if shift + self.bit_count > BLOCK_BIT_COUNT {
            let written = BLOCK_BIT_COUNT - shift;
            self.blocks[block + 1] &= !(mask >> written);
            self.blocks[block + 1] |= value >> written;
        }

        match (prev_is_zero, value == 0) {
            (true, false) => self.occupied_len += 1,
            (false, true) => self.occupied_len -= 1,
            _ => {}
        }
    }

    /// Returns the entry at index `index`.
    ///
    /// # Panics
    ///
    /// Panics if attempt to get an index out-of-bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::fingerprint_vec::FingerprintVec;
    ///
    /// let mut fv = FingerprintVec::new(20, 4);
    /// fv.set(3, 0xF_FFFF);
    ///
    /// assert_eq!(fv.get(3), 0xF_FFFF);
    /// ```
    pub fn get(&self, index: usize) -> u32 {
        assert!(index < self.len);
        let offset = index * self.bit_count;
        let block = offset / BLOCK_BIT_COUNT;
        let shift = offset % BLOCK_BIT_COUNT;

        let mut value = self.blocks[block] >> shift;
        if shift + self.bit_count > BLOCK_BIT_COUNT {
            value |= self.blocks[block + 1] << (BLOCK_BIT_COUNT - shift);
        }
        (value & self.mask()) as u32
    }

    /// Resets every entry to zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::fingerprint_vec::FingerprintVec;
    ///
    /// let mut fv = FingerprintVec::new(5, 4);
    /// fv.set(2, 3);
    /// fv.clear();
    ///
    /// assert_eq!(fv.occupied_len(), 0);
    /// ```
    pub fn clear(&mut self) {
        self.occupied_len = 0;
        for block in &mut self.blocks {
            *block = 0;
        }
    }

    /// Returns an iterator over the entries in order.
    pub fn iter(&self) -> FingerprintVecIter<'_> {
        FingerprintVecIter {
            fingerprint_vec: self,
            range: 0..self.len,
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the `FingerprintVec` has no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of non-zero entries.
    pub fn occupied_len(&self) -> usize {
        self.occupied_len
    }

    /// Returns the width of each entry in bits.
    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    /// Returns the number of bytes used by the packed entries.
    pub fn byte_len(&self) -> usize {
        self.blocks.len() * mem::size_of::<u64>()
    }
}

/// An iterator over the entries of a `FingerprintVec`.
pub struct FingerprintVecIter<'a> {
    fingerprint_vec: &'a FingerprintVec,
    range: Range<usize>,
}

impl<'a> Iterator for FingerprintVecIter<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.range
            .next()
            .map(|index| self.fingerprint_vec.get(index))
    }
}

impl<'a> IntoIterator for &'a FingerprintVec {
    type IntoIter = FingerprintVecIter<'a>;
    type Item = u32;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
