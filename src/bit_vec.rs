//! Fixed-length list of bits.

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::mem;
use std::ops::{Index, Range};

/// A fixed-length list of bits implemented using a `Vec<u8>`. Tracks the number of set bits so
/// that occupancy queries are constant time.
///
/// # Examples
///
/// ```
/// use amq_filters::bit_vec::BitVec;
///
/// let mut bv = BitVec::new(5);
///
/// bv.set(0, true);
/// bv.set(2, true);
/// assert_eq!(
///     bv.iter().collect::<Vec<bool>>(),
///     vec![true, false, true, false, false],
/// );
/// assert_eq!(bv.count_ones(), 2);
///
/// bv.set_all(false);
/// assert_eq!(bv.count_zeros(), 5);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
pub struct BitVec {
    blocks: Vec<u8>,
    len: usize,
    one_count: usize,
}

const BLOCK_BIT_COUNT: usize = mem::size_of::<u8>() * 8;

static TRUE: bool = true;
static FALSE: bool = false;

impl BitVec {
    fn get_block_count(len: usize) -> usize {
        (len + BLOCK_BIT_COUNT - 1) / BLOCK_BIT_COUNT
    }

    /// Constructs a new `BitVec` with a certain number of bits. All bits are initialized to false.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bit_vec::BitVec;
    ///
    /// let bv = BitVec::new(5);
    /// assert_eq!(bv.count_ones(), 0);
    /// ```
    pub fn new(len: usize) -> Self {
        BitVec {
            blocks: vec![0; Self::get_block_count(len)],
            len,
            one_count: 0,
        }
    }

    /// Sets the value at index `index` to `bit`.
    ///
    /// # Panics
    ///
    /// Panics if attempt to set an index out-of-bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bit_vec::BitVec;
    ///
    /// let mut bv = BitVec::new(5);
    /// bv.set(1, true);
    ///
    /// assert_eq!(bv.get(0), Some(false));
    /// assert_eq!(bv.get(1), Some(true));
    /// ```
    pub fn set(&mut self, index: usize, bit: bool) {
        assert!(index < self.len);
        let block = &mut self.blocks[index / BLOCK_BIT_COUNT];
        let mask = 1 << (index % BLOCK_BIT_COUNT);
        let prev = *block & mask != 0;
        if bit {
            *block |= mask;
        } else {
            *block &= !mask;
        }
        match (prev, bit) {
            (false, true) => self.one_count += 1,
            (true, false) => self.one_count -= 1,
            _ => {}
        }
    }

    /// Returns the value at index `index`, or `None` if index is out of bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bit_vec::BitVec;
    ///
    /// let mut bv = BitVec::new(5);
    /// bv.set(1, true);
    ///
    /// assert_eq!(bv.get(1), Some(true));
    /// assert_eq!(bv.get(5), None);
    /// ```
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        Some(self.blocks[index / BLOCK_BIT_COUNT] & (1 << (index % BLOCK_BIT_COUNT)) != 0)
    }

    /// Sets all values in the `BitVec` to `bit`.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::bit_vec::BitVec;
    ///
    /// let mut bv = BitVec::new(5);
    /// bv.set_all(true);
    ///
    /// assert_eq!(bv.count_ones(), 5);
    /// ```
    pub fn set_all(&mut self, bit: bool) {
        let fill = if bit { !0 } else { 0 };
        for block in &mut self.blocks {
            *block = fill;
        }
        let extra_bits = self.len % BLOCK_BIT_COUNT;
        if bit && extra_bits > 0 {
            if let Some(last) = self.blocks.last_mut() {
                *last &= (1 << extra_bits) - 1;
            }
        }
        self.one_count = if bit { self.len } else { 0 };
    }

    /// Returns an iterator over the bits of the `BitVec` in order.
    pub fn iter(&self) -> BitVecIter<'_> {
        BitVecIter {
            bit_vec: self,
            range: 0..self.len,
        }
    }

    /// Returns the number of bits in the `BitVec`.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the `BitVec` holds no bits.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of set bits.
    pub fn count_ones(&self) -> usize {
        self.one_count
    }

    /// Returns the number of unset bits.
    pub fn count_zeros(&self) -> usize {
        self.len - self.one_count
    }
}

impl Index<usize> for BitVec {
    type Output = bool;

    fn index(&self, index: usize) -> &bool {
        match self.get(index) {
            Some(true) => &TRUE,
            Some(false) => &FALSE,
            None => panic!("Index out of bounds: {} >= {}", index, self.len),
        }
    }
}

/// An iterator over the bits of a `BitVec`.
pub struct BitVecIter<'a> {
    bit_vec: &'a BitVec,
    range: Range<usize>,
}

impl<'a> Iterator for BitVecIter<'a> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        self.range.next().map(|index| self.bit_vec[index])
    }
}

impl<'a> IntoIterator for &'a BitVec {
    type IntoIter = BitVecIter<'a>;
    type Item = bool;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::BitVec;

    #[test]
    fn test_set_tracks_one_count() {
        let mut bv = BitVec::new(10);
        bv.set(3, true);
        bv.set(3, true);
        bv.set(9, true);
        assert_eq!(bv.count_ones(), 2);
        assert_eq!(bv.count_zeros(), 8);

        bv.set(3, false);
        assert_eq!(bv.count_ones(), 1);
        assert!(bv[9]);
        assert!(!bv[3]);
    }

    #[test]
    fn test_set_all() {
        let mut bv = BitVec::new(10);
        bv.set_all(true);
        assert_eq!(bv.count_ones(), 10);
        assert!(bv.iter().all(|bit| bit));

        bv.set(0, false);
        assert_eq!(bv.count_ones(), 9);

        bv.set_all(false);
        assert_eq!(bv.count_ones(), 0);
        assert!(bv.iter().all(|bit| !bit));
    }

    #[test]
    fn test_empty() {
        let bv = BitVec::new(0);
        assert!(bv.is_empty());
        assert_eq!(bv.get(0), None);
    }

    #[test]
    #[should_panic]
    fn test_index_out_of_bounds() {
        let bv = BitVec::new(8);
        let _ = bv[8];
    }
}
