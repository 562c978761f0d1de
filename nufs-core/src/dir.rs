//! Directory-map access layered on top of a directory inode's direct
//! block.
//!
//! The map itself ([`DirMap::get`]/`add`/`remove`) lives in `nufs-types`
//! since it operates on the in-memory struct alone; this module is the
//! thin bridge that loads/stores that struct from/to the mapped image.

use nufs_types::{DirMap, InodeNo};

use crate::image::Image;

/// Loads the directory map out of `dir_ino`'s direct block.
///
/// Callers must already know `dir_ino` is a directory; this does not
/// check `Inode::is_dir`.
pub fn read_dir_map(image: &Image, dir_ino: InodeNo) -> DirMap {
    let inode = image.read_inode(dir_ino.as_index());
    image.read_block(inode.direct_block().as_index())
}

fn write_dir_map(image: &mut Image, dir_ino: InodeNo, map: &DirMap) {
    let inode = image.read_inode(dir_ino.as_index());
    image.write_block(inode.direct_block().as_index(), map);
}

/// Looks up `name` in `dir_ino`'s map.
pub fn dir_get(image: &Image, dir_ino: InodeNo, name: &[u8]) -> Option<InodeNo> {
    read_dir_map(image, dir_ino).get(name)
}

/// Appends `(name, target)` to `dir_ino`'s map. Caller must have already
/// checked `name` is not present and the map has room.
pub fn dir_add(image: &mut Image, dir_ino: InodeNo, name: &[u8], target: InodeNo) {
    let mut map = read_dir_map(image, dir_ino);
    map.add(name, target);
    write_dir_map(image, dir_ino, &map);
}

/// Removes `name` from `dir_ino`'s map, sliding later entries down.
/// Returns `false` (map unchanged) if no entry matched.
pub fn dir_remove(image: &mut Image, dir_ino: InodeNo, name: &[u8]) -> bool {
    let mut map = read_dir_map(image, dir_ino);
    let removed = map.remove(name);
    if removed {
        write_dir_map(image, dir_ino, &map);
    }
    removed
}
