//! Inode construction and teardown on top of the raw table and allocators.
//!
//! Inode identity is carried as a plain [`InodeNo`] everywhere; callers
//! fetch a fresh [`Inode`] snapshot from [`Image::read_inode`] at each
//! use-site rather than recovering identity from a pointer into the
//! mapped table.

use dataview::Pod;
use nufs_types::{DirMap, INDIRECT_COUNT, Inode, InodeNo, IndirectBlock};

use crate::alloc::{alloc_block, free_block, free_inode};
use crate::error::FsResult;
use crate::image::Image;

/// Populates a freshly allocated, still-zeroed inode slot `ino`: charges
/// it a direct block, sets metadata from `mode`/`uid`/`gid`/`mtime`, and
/// (for directories) writes an empty [`DirMap`] into that block.
pub fn make_inode(
    image: &mut Image,
    ino: InodeNo,
    mode: u32,
    uid: u32,
    gid: u32,
    mtime: i64,
) -> FsResult<()> {
    let is_dir = mode & libc::S_IFMT == libc::S_IFDIR;
    let block = alloc_block(image)?;

    let mut inode = Inode::zeroed();
    inode.mode = mode;
    inode.uid = uid;
    inode.gid = gid;
    inode.size = if is_dir { 4 } else { 0 };
    inode.mtime = mtime;
    inode.refs = if is_dir { 2 } else { 1 };
    inode.blocks = 1;
    inode.isdir = u32::from(is_dir);
    inode.block = i32::try_from(block.get()).expect("block number fits in i32");
    inode.set_indirect_block(None);
    image.write_inode(ino.as_index(), &inode);

    if is_dir {
        image.write_block(block.as_index(), &DirMap::zeroed());
    }
    Ok(())
}

/// Releases everything charged to `ino`'s content — the direct block,
/// every indirect-listed block, and the indirect index block itself —
/// and then releases the inode slot. Called once `refs` has reached
/// zero; the caller is responsible for that check.
pub fn release_inode(image: &mut Image, ino: InodeNo) {
    let inode = image.read_inode(ino.as_index());
    free_block(image, inode.direct_block());
    if let Some(indirect_bn) = inode.indirect_block() {
        let indirect: IndirectBlock = image.read_block(indirect_bn.as_index());
        for i in 0..INDIRECT_COUNT {
            if let Some(bn) = indirect.get(i) {
                free_block(image, bn);
            }
        }
        free_block(image, indirect_bn);
    }
    free_inode(image, ino);
}
