//! The image mapper: owns the single memory-mapped backing file and hands
//! out typed views into its four regions.

use std::fs::{File, OpenOptions};
use std::mem::size_of;
use std::path::Path;

use dataview::{Pod, PodMethods as _};
use memmap2::{MmapMut, MmapOptions};
use nufs_types::{BLOCKS, BLOCK_SIZE, BitmapWord, IMAGE_BYTES, INODES, Inode, layout};

use crate::error::{FsError, FsResult};

/// The memory-mapped backing store.
///
/// Holds the file handle alongside the mapping purely so the descriptor
/// stays open for the mapping's lifetime; all reads and writes go through
/// `mmap`.
pub struct Image {
    #[allow(dead_code)]
    file: File,
    mmap: MmapMut,
}

impl Image {
    /// Creates a new, zeroed image file at `path` and maps it.
    pub fn create(path: &Path) -> FsResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|_| FsError::Io)?;
        file.set_len(IMAGE_BYTES as u64).map_err(|_| FsError::Io)?;
        let mmap = unsafe { MmapOptions::new().map_mut(&file) }.map_err(|_| FsError::Io)?;
        Ok(Self { file, mmap })
    }

    /// Opens an existing image file and maps it, extending it with zeros
    /// first if it is shorter than [`IMAGE_BYTES`].
    pub fn open(path: &Path) -> FsResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|_| FsError::Io)?;
        let len = file.metadata().map_err(|_| FsError::Io)?.len();
        if len < IMAGE_BYTES as u64 {
            file.set_len(IMAGE_BYTES as u64).map_err(|_| FsError::Io)?;
        }
        let mmap = unsafe { MmapOptions::new().map_mut(&file) }.map_err(|_| FsError::Io)?;
        Ok(Self { file, mmap })
    }

    /// Opens `path`, creating and zero-initializing it first if it does
    /// not already exist. Returns whether the image was freshly created
    /// so the caller can decide whether to populate the root inode.
    pub fn open_or_create(path: &Path) -> FsResult<(Self, bool)> {
        if path.exists() {
            Ok((Self::open(path)?, false))
        } else {
            Ok((Self::create(path)?, true))
        }
    }

    /// Flushes pending writes back to the backing file.
    pub fn flush(&self) -> FsResult<()> {
        self.mmap.flush().map_err(|_| FsError::Io)
    }

    fn region(&self, offset: usize, len: usize) -> &[u8] {
        &self.mmap[offset..offset + len]
    }

    fn region_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.mmap[offset..offset + len]
    }

    pub fn inode_bitmap(&self) -> &[u8] {
        self.region(layout::INODE_BITMAP_OFFSET, INODES * size_of_word())
    }

    pub fn inode_bitmap_mut(&mut self) -> &mut [u8] {
        self.region_mut(layout::INODE_BITMAP_OFFSET, INODES * size_of_word())
    }

    pub fn block_bitmap(&self) -> &[u8] {
        self.region(layout::BLOCK_BITMAP_OFFSET, BLOCKS * size_of_word())
    }

    pub fn block_bitmap_mut(&mut self) -> &mut [u8] {
        self.region_mut(layout::BLOCK_BITMAP_OFFSET, BLOCKS * size_of_word())
    }

    /// Reads inode slot `index` (0-based) out of the inode table.
    pub fn read_inode(&self, index: usize) -> Inode {
        let off = layout::INODE_TABLE_OFFSET + index * size_of::<Inode>();
        let mut inode = Inode::zeroed();
        inode.as_bytes_mut().copy_from_slice(&self.mmap[off..off + size_of::<Inode>()]);
        inode
    }

    /// Writes `inode` into slot `index` of the inode table.
    pub fn write_inode(&mut self, index: usize, inode: &Inode) {
        let off = layout::INODE_TABLE_OFFSET + index * size_of::<Inode>();
        self.mmap[off..off + size_of::<Inode>()].copy_from_slice(inode.as_bytes());
    }

    /// Reads data block `index` (0-based within the data region) as a
    /// Pod value `T`. `T` must be no larger than [`BLOCK_SIZE`]; bytes
    /// beyond `size_of::<T>()` in the block are ignored (a zeroed block
    /// reads back as a zeroed `T`).
    pub fn read_block<T: Pod>(&self, index: usize) -> T {
        debug_assert!(size_of::<T>() <= BLOCK_SIZE);
        let off = layout::DATA_BLOCKS_OFFSET + index * BLOCK_SIZE;
        let mut value = T::zeroed();
        value.as_bytes_mut().copy_from_slice(&self.mmap[off..off + size_of::<T>()]);
        value
    }

    /// Writes a Pod value `T` into data block `index`. `T` must be no
    /// larger than [`BLOCK_SIZE`]; any trailing bytes of the block are
    /// left untouched.
    pub fn write_block<T: Pod>(&mut self, index: usize, value: &T) {
        debug_assert!(size_of::<T>() <= BLOCK_SIZE);
        let off = layout::DATA_BLOCKS_OFFSET + index * BLOCK_SIZE;
        self.mmap[off..off + size_of::<T>()].copy_from_slice(value.as_bytes());
    }

    /// Borrows data block `index` as a raw byte slice.
    pub fn block_bytes(&self, index: usize) -> &[u8] {
        let off = layout::DATA_BLOCKS_OFFSET + index * BLOCK_SIZE;
        &self.mmap[off..off + BLOCK_SIZE]
    }

    /// Mutably borrows data block `index` as a raw byte slice.
    pub fn block_bytes_mut(&mut self, index: usize) -> &mut [u8] {
        let off = layout::DATA_BLOCKS_OFFSET + index * BLOCK_SIZE;
        &mut self.mmap[off..off + BLOCK_SIZE]
    }

    pub fn zero_block(&mut self, index: usize) {
        self.block_bytes_mut(index).fill(0);
    }
}

fn size_of_word() -> usize {
    size_of::<BitmapWord>()
}
