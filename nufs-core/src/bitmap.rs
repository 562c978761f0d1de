//! A one-word-per-slot allocator over a byte slice of [`BitmapWord`]s.
//!
//! The image format (`nufs_types::layout`) charges each inode and block
//! slot one full [`BitmapWord`], not one bit — "nonzero ⇒ slot
//! allocated" per the on-image spec, not a packed bitset. Mirrors the
//! scan-for-the-lowest-free-slot allocator used for inodes and data
//! blocks: linear scan, first free slot wins, no free list.

use std::mem::size_of;

use dataview::DataView;
use nufs_types::BitmapWord;

/// A read/write view over one bitmap region: one [`BitmapWord`] per
/// tracked slot.
pub struct Bitmap<'a> {
    bytes: &'a mut [u8],
    len: usize,
}

impl<'a> Bitmap<'a> {
    /// Wraps `bytes` (must be exactly `len` [`BitmapWord`]s) as a bitmap
    /// tracking `len` slots.
    pub fn new(bytes: &'a mut [u8], len: usize) -> Self {
        debug_assert_eq!(bytes.len(), len * size_of::<BitmapWord>());
        Self { bytes, len }
    }

    fn word_offset(index: usize) -> usize {
        index * size_of::<BitmapWord>()
    }

    pub fn is_set(&self, index: usize) -> bool {
        *DataView::from(&*self.bytes).get::<BitmapWord>(Self::word_offset(index)) != 0
    }

    fn set(&mut self, index: usize, value: bool) {
        let offset = Self::word_offset(index);
        *DataView::from_mut(self.bytes).get_mut::<BitmapWord>(offset) = BitmapWord::from(value);
    }

    /// Finds the lowest-indexed free slot, marks it allocated, and
    /// returns it. `None` if every slot is taken.
    pub fn alloc(&mut self) -> Option<usize> {
        let index = (0..self.len).find(|&i| !self.is_set(i))?;
        self.set(index, true);
        Some(index)
    }

    /// Marks `index` free.
    pub fn free(&mut self, index: usize) {
        assert!(self.is_set(index), "freeing an already-free slot");
        self.set(index, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_picks_lowest_free_slot() {
        let mut bytes = [0u8; 40 * size_of::<BitmapWord>()];
        let mut bm = Bitmap::new(&mut bytes, 40);
        assert_eq!(bm.alloc(), Some(0));
        assert_eq!(bm.alloc(), Some(1));
        bm.free(0);
        assert_eq!(bm.alloc(), Some(0));
        assert_eq!(bm.alloc(), Some(2));
    }

    #[test]
    fn alloc_returns_none_when_full() {
        let mut bytes = [0u8; 3 * size_of::<BitmapWord>()];
        let mut bm = Bitmap::new(&mut bytes, 3);
        for _ in 0..3 {
            assert!(bm.alloc().is_some());
        }
        assert_eq!(bm.alloc(), None);
    }

    #[test]
    #[should_panic(expected = "freeing an already-free slot")]
    fn free_on_unset_slot_panics() {
        let mut bytes = [0u8; 8 * size_of::<BitmapWord>()];
        let mut bm = Bitmap::new(&mut bytes, 8);
        bm.free(0);
    }
}
