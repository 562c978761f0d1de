//! File content I/O across the direct block and, once content grows past
//! it, the indirect index block.

use nufs_types::{BLOCK_SIZE, INDIRECT_COUNT, Inode, IndirectBlock, InodeNo, MAX_FILE_BYTES};

use crate::alloc::alloc_block;
use crate::error::{FsError, FsResult};
use crate::image::Image;

/// Copies out the inode's full logical content: the direct block, then
/// (once `size` exceeds one block) as many indirect-listed blocks as the
/// remaining length needs.
pub fn read_all(image: &Image, ino: InodeNo) -> Vec<u8> {
    let inode = image.read_inode(ino.as_index());
    let size = inode.size as usize;
    let mut buf = Vec::with_capacity(size);
    if size == 0 {
        return buf;
    }

    let direct = image.block_bytes(inode.direct_block().as_index());
    let direct_take = size.min(BLOCK_SIZE);
    buf.extend_from_slice(&direct[..direct_take]);
    if size <= BLOCK_SIZE {
        return buf;
    }

    let mut remaining = size - BLOCK_SIZE;
    let indirect_bn = inode
        .indirect_block()
        .expect("size beyond direct_cap implies an indirect index block is allocated");
    let indirect: IndirectBlock = image.read_block(indirect_bn.as_index());
    for i in 0..INDIRECT_COUNT {
        if remaining == 0 {
            break;
        }
        let bn = indirect
            .get(i)
            .expect("size accounts for this slot, so it must be assigned");
        let bytes = image.block_bytes(bn.as_index());
        let take = remaining.min(BLOCK_SIZE);
        buf.extend_from_slice(&bytes[..take]);
        remaining -= take;
    }
    buf
}

/// Writes `buf` at `offset`, growing `size` as needed and allocating
/// whatever direct/indirect blocks the write newly touches.
///
/// Fails with [`FsError::FileTooLarge`] if the write would extend past
/// [`MAX_FILE_BYTES`], or with an allocator error if no block/indirect
/// index is available. Returns the number of bytes written on success.
pub fn write(image: &mut Image, ino: InodeNo, buf: &[u8], offset: usize) -> FsResult<usize> {
    let end = offset.checked_add(buf.len()).ok_or(FsError::FileTooLarge)?;
    if end > MAX_FILE_BYTES {
        return Err(FsError::FileTooLarge);
    }
    if buf.is_empty() {
        return Ok(0);
    }

    let mut inode = image.read_inode(ino.as_index());

    if end > BLOCK_SIZE && inode.indirect_block().is_none() {
        let index_bn = alloc_block(image)?;
        image.write_block(index_bn.as_index(), &IndirectBlock::unassigned());
        inode.set_indirect_block(Some(index_bn));
        image.write_inode(ino.as_index(), &inode);
    }

    let mut pos = offset;
    while pos < end {
        let block_index = pos / BLOCK_SIZE;
        let block_off = pos % BLOCK_SIZE;
        let chunk_len = (BLOCK_SIZE - block_off).min(end - pos);

        let bn = if block_index == 0 {
            inode.direct_block()
        } else {
            resolve_indirect_slot(image, &mut inode, ino, block_index - 1)?
        };

        let src = &buf[pos - offset..pos - offset + chunk_len];
        image.block_bytes_mut(bn.as_index())[block_off..block_off + chunk_len].copy_from_slice(src);
        pos += chunk_len;
    }

    inode.size = inode.size.max(u32::try_from(end).expect("end <= MAX_FILE_BYTES fits in u32"));
    image.write_inode(ino.as_index(), &inode);
    Ok(buf.len())
}

/// Returns the data block backing indirect slot `slot`, allocating it
/// (and charging it to `inode.blocks`) if this is the first write to
/// reach it.
fn resolve_indirect_slot(
    image: &mut Image,
    inode: &mut Inode,
    ino: InodeNo,
    slot: usize,
) -> FsResult<nufs_types::BlockNo> {
    let index_bn = inode.indirect_block().expect("allocated above for any write reaching here");
    let mut index: IndirectBlock = image.read_block(index_bn.as_index());
    if let Some(bn) = index.get(slot) {
        return Ok(bn);
    }
    let bn = alloc_block(image)?;
    index.set(slot, Some(bn));
    image.write_block(index_bn.as_index(), &index);
    inode.blocks += 1;
    image.write_inode(ino.as_index(), inode);
    Ok(bn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::make_inode;
    use crate::testutil::temp_image;

    fn file_inode(image: &mut Image) -> InodeNo {
        let ino = crate::alloc::alloc_inode(image).unwrap();
        make_inode(image, ino, libc::S_IFREG | 0o644, 0, 0, 0).unwrap();
        ino
    }

    #[test]
    fn small_write_then_read_round_trips() {
        let mut image = temp_image();
        let ino = file_inode(&mut image);
        write(&mut image, ino, b"hello", 0).unwrap();
        assert_eq!(read_all(&image, ino), b"hello");
        assert_eq!(image.read_inode(ino.as_index()).size, 5);
    }

    #[test]
    fn offset_write_zero_fills_the_gap() {
        let mut image = temp_image();
        let ino = file_inode(&mut image);
        write(&mut image, ino, b"end", 10).unwrap();
        let content = read_all(&image, ino);
        assert_eq!(content.len(), 13);
        assert_eq!(&content[..10], &[0u8; 10]);
        assert_eq!(&content[10..], b"end");
    }

    #[test]
    fn write_spanning_indirect_block_uses_indirect_index() {
        let mut image = temp_image();
        let ino = file_inode(&mut image);
        let data = vec![0xabu8; 8192];
        write(&mut image, ino, &data, 0).unwrap();
        let inode = image.read_inode(ino.as_index());
        assert!(inode.indirect_block().is_some());
        assert!(inode.blocks >= 2);
        assert_eq!(read_all(&image, ino), data);
    }

    #[test]
    fn write_past_max_file_bytes_fails() {
        let mut image = temp_image();
        let ino = file_inode(&mut image);
        let one = [0u8; 1];
        assert_eq!(write(&mut image, ino, &one, MAX_FILE_BYTES), Err(FsError::FileTooLarge));
    }
}
