//! On-image data types for the nufs storage engine.
//!
//! The image is one contiguous byte region, laid out as four consecutive
//! regions:
//!
//! | region         | element size    | count    | purpose                       |
//! |----------------|------------------|----------|--------------------------------|
//! | inode bitmap   | [`BITMAP_WORD_BYTES`] | [`INODES`] | nonzero => inode slot allocated |
//! | block bitmap   | [`BITMAP_WORD_BYTES`] | [`BLOCKS`] | nonzero => data block allocated |
//! | inode table    | `size_of::<Inode>()` | [`INODES`] | inode slots                    |
//! | data blocks    | [`BLOCK_SIZE`]   | [`BLOCKS`] | raw blocks                     |
//!
//! Region offsets ([`layout`]) are computed from the live size of [`Inode`],
//! not hard-coded, so that changing a field keeps the image self-consistent.

use dataview::Pod;

/// Total size of the backing image file.
pub const IMAGE_BYTES: usize = 1024 * 1024;

/// Number of inode slots.
pub const INODES: usize = 112;

/// Number of data block slots.
pub const BLOCKS: usize = 254;

/// Size of one data block.
pub const BLOCK_SIZE: usize = 4096;

/// Number of block numbers an indirect index block can hold.
pub const INDIRECT_COUNT: usize = BLOCK_SIZE / 4;

/// Maximum live entries a directory map can hold.
pub const MAP_ENTRY_LIMIT: usize = 44;

/// Maximum bytes (including the NUL terminator) for one entry's name.
pub const NAME_LIMIT: usize = 89;

/// Bytes reachable through the direct block alone.
pub const DIRECT_CAP: usize = BLOCK_SIZE;

/// Bytes reachable through the indirect index block.
pub const INDIRECT_CAP: usize = INDIRECT_COUNT * BLOCK_SIZE;

/// Largest file content this layout can address.
pub const MAX_FILE_BYTES: usize = DIRECT_CAP + INDIRECT_CAP;

/// Width of one bitmap slot.
pub type BitmapWord = u32;

/// Bytes per bitmap slot.
pub const BITMAP_WORD_BYTES: usize = core::mem::size_of::<BitmapWord>();

/// Inode number: a stable index into the inode table.
///
/// Carried as a plain number everywhere rather than recovered from a
/// pointer into the mapped image, so identity comparisons never touch
/// address arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Pod)]
#[repr(transparent)]
pub struct InodeNo(u32);

impl InodeNo {
    /// The root directory always lives at inode 0.
    pub const ROOT: Self = Self(0);

    #[must_use]
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

/// Data block number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Pod)]
#[repr(transparent)]
pub struct BlockNo(u32);

impl BlockNo {
    #[must_use]
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

/// On-disk inode metadata.
///
/// Field widths deviate from a literal "all `int`" reading in two places:
/// `mtime` is kept 64-bit to dodge a year-2038 rollover, and `block`/
/// `indirect` are signed so that `-1` is a representable "no block" value.
#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct Inode {
    /// POSIX mode bits, including the file-type bits.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Logical byte length of content (nominally 4 for directories).
    pub size: u32,
    /// Seconds since the epoch.
    pub mtime: i64,
    /// Hard-link count.
    pub refs: u32,
    /// Data blocks charged to this inode (direct + indirect-listed; the
    /// indirect index block itself is not counted).
    pub blocks: u32,
    /// Redundant with `mode`, but stored directly per the original layout.
    pub isdir: u32,
    /// Direct data block number. Always valid once the inode is live.
    pub block: i32,
    /// Index block number, or `-1` if this inode has none.
    pub indirect: i32,
}

const _: () = assert!(core::mem::size_of::<Inode>() <= 512, "inode grew unexpectedly large");

impl Inode {
    #[must_use]
    pub fn direct_block(&self) -> BlockNo {
        BlockNo::new(self.block.try_into().expect("inode.block must not be negative"))
    }

    #[must_use]
    pub fn indirect_block(&self) -> Option<BlockNo> {
        u32::try_from(self.indirect).ok().map(BlockNo::new)
    }

    pub fn set_indirect_block(&mut self, bn: Option<BlockNo>) {
        self.indirect = bn.map_or(-1, |bn| bn.get() as i32);
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.isdir != 0
    }
}

/// One live directory-map entry: a name paired with the inode it names.
///
/// `inode_num` is narrower than a full 32-bit int so that
/// [`DirMap`] fits inside one [`BLOCK_SIZE`] block using an ordinary,
/// naturally-aligned `#[repr(C)]` struct (no unaligned-field hazards).
/// `INODES` fits an `i16` with room to spare.
#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct DirEntry {
    inode_num: i16,
    name: [u8; NAME_LIMIT],
}

impl DirEntry {
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            inode_num: 0,
            name: [0; NAME_LIMIT],
        }
    }

    #[must_use]
    pub fn inode_no(&self) -> InodeNo {
        InodeNo::new(u32::from(u16::try_from(self.inode_num).unwrap_or(0)))
    }

    pub fn set_inode_no(&mut self, n: InodeNo) {
        self.inode_num = i16::try_from(n.get()).expect("inode number exceeds entry width");
    }

    #[must_use]
    pub fn name(&self) -> &[u8] {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        &self.name[..len]
    }

    #[must_use]
    pub fn is_same_name(&self, name: &[u8]) -> bool {
        self.name() == name
    }

    /// Copies `name` in, truncating to `NAME_LIMIT - 1` bytes and leaving
    /// the final byte zero.
    pub fn set_name(&mut self, name: &[u8]) {
        let len = usize::min(name.len(), NAME_LIMIT - 1);
        self.name[..len].copy_from_slice(&name[..len]);
        self.name[len..].fill(0);
    }
}

/// The content of a directory's direct block.
#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct DirMap {
    size: u32,
    entries: [DirEntry; MAP_ENTRY_LIMIT],
}

const _: () = assert!(core::mem::size_of::<DirMap>() <= BLOCK_SIZE);

impl DirMap {
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            size: 0,
            entries: [DirEntry::zeroed(); MAP_ENTRY_LIMIT],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.size as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[must_use]
    pub fn entries(&self) -> &[DirEntry] {
        &self.entries[..self.len()]
    }

    #[must_use]
    pub fn get(&self, name: &[u8]) -> Option<InodeNo> {
        self.entries().iter().find(|e| e.is_same_name(name)).map(DirEntry::inode_no)
    }

    /// Appends a new entry. Caller must ensure `len() < MAP_ENTRY_LIMIT`.
    pub fn add(&mut self, name: &[u8], inode_no: InodeNo) {
        assert!(self.len() < MAP_ENTRY_LIMIT, "directory map is full");
        let idx = self.len();
        self.entries[idx] = DirEntry::zeroed();
        self.entries[idx].set_name(name);
        self.entries[idx].set_inode_no(inode_no);
        self.size += 1;
    }

    /// Removes the entry named `name`, sliding later entries down one
    /// slot. Returns `false` (map unchanged) if no entry matched.
    pub fn remove(&mut self, name: &[u8]) -> bool {
        let Some(idx) = self.entries().iter().position(|e| e.is_same_name(name)) else {
            return false;
        };
        let len = self.len();
        for i in idx..len - 1 {
            self.entries[i] = self.entries[i + 1];
        }
        self.entries[len - 1] = DirEntry::zeroed();
        self.size -= 1;
        true
    }
}

/// An indirect index block: up to [`INDIRECT_COUNT`] further block
/// numbers. `-1` means "no block allocated at this slot yet" — deliberately
/// not `0`, which would alias the root directory's direct block.
#[derive(Debug, Clone, Copy, Pod)]
#[repr(transparent)]
pub struct IndirectBlock([i32; INDIRECT_COUNT]);

const _: () = assert!(core::mem::size_of::<IndirectBlock>() == BLOCK_SIZE);

impl IndirectBlock {
    const UNASSIGNED: i32 = -1;

    #[must_use]
    pub fn unassigned() -> Self {
        Self([Self::UNASSIGNED; INDIRECT_COUNT])
    }

    #[must_use]
    pub fn get(&self, i: usize) -> Option<BlockNo> {
        u32::try_from(self.0[i]).ok().map(BlockNo::new)
    }

    pub fn set(&mut self, i: usize, bn: Option<BlockNo>) {
        self.0[i] = bn.map_or(Self::UNASSIGNED, |bn| bn.get() as i32);
    }
}

/// Attributes returned by `stat`-like operations. Not itself an on-image
/// type; assembled on demand from an [`Inode`].
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub ino: InodeNo,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub blocks: u32,
    pub blksize: u32,
    pub mtime: i64,
}

pub mod layout {
    //! Byte offsets of the four image regions, computed from the live
    //! sizes of the types above rather than hard-coded.
    use super::{BITMAP_WORD_BYTES, BLOCKS, BLOCK_SIZE, IMAGE_BYTES, INODES, Inode};

    pub const INODE_BITMAP_OFFSET: usize = 0;
    pub const BLOCK_BITMAP_OFFSET: usize = INODE_BITMAP_OFFSET + INODES * BITMAP_WORD_BYTES;
    pub const INODE_TABLE_OFFSET: usize = BLOCK_BITMAP_OFFSET + BLOCKS * BITMAP_WORD_BYTES;
    pub const DATA_BLOCKS_OFFSET: usize =
        INODE_TABLE_OFFSET + INODES * core::mem::size_of::<Inode>();
    pub const TOTAL_USED_BYTES: usize = DATA_BLOCKS_OFFSET + BLOCKS * BLOCK_SIZE;

    const _: () = assert!(
        TOTAL_USED_BYTES <= IMAGE_BYTES,
        "image layout does not fit inside IMAGE_BYTES"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_map_fits_in_one_block() {
        assert!(core::mem::size_of::<DirMap>() <= BLOCK_SIZE);
        assert_eq!(core::mem::size_of::<IndirectBlock>(), BLOCK_SIZE);
    }

    #[test]
    fn dir_map_add_get_remove() {
        let mut map = DirMap::zeroed();
        map.add(b"a", InodeNo::new(1));
        map.add(b"bb", InodeNo::new(2));
        map.add(b"ccc", InodeNo::new(3));
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(b"bb"), Some(InodeNo::new(2)));
        assert_eq!(map.get(b"missing"), None);

        assert!(map.remove(b"a"));
        assert_eq!(map.len(), 2);
        let names: Vec<&[u8]> = map.entries().iter().map(DirEntry::name).collect();
        assert_eq!(names, vec![b"bb".as_slice(), b"ccc".as_slice()]);

        assert!(!map.remove(b"a"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn dir_entry_name_truncates() {
        let mut e = DirEntry::zeroed();
        let long = vec![b'x'; NAME_LIMIT + 10];
        e.set_name(&long);
        assert_eq!(e.name().len(), NAME_LIMIT - 1);
    }

    #[test]
    fn indirect_block_default_is_unassigned() {
        let block = IndirectBlock::unassigned();
        for i in 0..INDIRECT_COUNT {
            assert_eq!(block.get(i), None);
        }
    }

    #[test]
    fn indirect_block_set_and_get() {
        let mut block = IndirectBlock::unassigned();
        block.set(0, Some(BlockNo::new(5)));
        assert_eq!(block.get(0), Some(BlockNo::new(5)));
        block.set(0, None);
        assert_eq!(block.get(0), None);
    }

    #[test]
    fn layout_regions_are_nonoverlapping_and_ordered() {
        use layout::*;
        assert_eq!(INODE_BITMAP_OFFSET, 0);
        assert!(BLOCK_BITMAP_OFFSET >= INODE_BITMAP_OFFSET + INODES * BITMAP_WORD_BYTES);
        assert!(INODE_TABLE_OFFSET >= BLOCK_BITMAP_OFFSET + BLOCKS * BITMAP_WORD_BYTES);
        assert!(DATA_BLOCKS_OFFSET >= INODE_TABLE_OFFSET + INODES * core::mem::size_of::<Inode>());
        assert!(TOTAL_USED_BYTES <= IMAGE_BYTES);
    }
}
