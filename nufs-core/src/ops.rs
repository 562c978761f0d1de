//! The public operation-level contract: everything a FUSE-style bridge
//! would call into. Each operation logs one line at the boundary (the
//! source's unconditional `printf("access(%s)\n", path)` tracing, routed
//! through `log` instead of stdout) and returns a [`FsError`] a bridge
//! can turn into `-errno`.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use nufs_types::{BLOCK_SIZE, InodeNo, Stat};

use crate::alloc::alloc_inode;
use crate::dir::{dir_add, dir_get, dir_remove, read_dir_map};
use crate::error::{FsError, FsResult};
use crate::fileio;
use crate::image::Image;
use crate::path::{resolve, resolve_parent};
use crate::table::{make_inode, release_inode};

/// An open, mounted image and the operations layered on top of it.
///
/// Holds the entire mapped image behind one value with no internal
/// aliasing, so a future threaded caller has exactly one place to add a
/// lock (see the crate's concurrency notes).
pub struct Filesystem {
    image: Image,
}

impl Filesystem {
    /// Opens `path` as a filesystem image, creating and zero-initializing
    /// it (including the root directory) if it does not already exist.
    pub fn mount(path: &Path) -> FsResult<Self> {
        let (mut image, fresh) = Image::open_or_create(path)?;
        if fresh {
            init_root(&mut image)?;
        }
        Ok(Self { image })
    }

    /// Flushes the mapping back to the backing file.
    pub fn flush(&self) -> FsResult<()> {
        self.image.flush()
    }

    /// Returns `(used_inodes, used_blocks)`, for occupancy reporting.
    #[must_use]
    pub fn occupancy(&self) -> (usize, usize) {
        (crate::alloc::used_inodes(&self.image), crate::alloc::used_blocks(&self.image))
    }

    /// Verifies `path` resolves to something. No per-open state is kept.
    pub fn access(&self, path: &str) -> FsResult<()> {
        log::debug!("access({path})");
        resolve(&self.image, path).map(|_| ()).ok_or(FsError::NotFound)
    }

    /// Same existence check as `access`; kept distinct because a bridge's
    /// `open` and `access` are logically different calls even though this
    /// core keeps no per-handle state.
    pub fn open(&self, path: &str) -> FsResult<()> {
        log::debug!("open({path})");
        resolve(&self.image, path).map(|_| ()).ok_or(FsError::NotFound)
    }

    pub fn getattr(&self, path: &str) -> FsResult<Stat> {
        log::debug!("getattr({path})");
        let ino = resolve(&self.image, path).ok_or(FsError::NotFound)?;
        Ok(self.stat_of(ino))
    }

    fn stat_of(&self, ino: InodeNo) -> Stat {
        let inode = self.image.read_inode(ino.as_index());
        Stat {
            ino,
            mode: inode.mode,
            nlink: inode.refs,
            uid: inode.uid,
            gid: inode.gid,
            size: u64::from(inode.size),
            blocks: inode.blocks,
            blksize: u32::try_from(BLOCK_SIZE).expect("BLOCK_SIZE fits in u32"),
            mtime: inode.mtime,
        }
    }

    /// Lists `path`'s directory entries, `.` first, as `(name, inode)`
    /// pairs. The `.` entry's own attributes are whatever `getattr(path)`
    /// would return; this call only hands back names and inode numbers.
    pub fn list(&self, path: &str) -> FsResult<Vec<(String, InodeNo)>> {
        log::debug!("readdir({path})");
        let ino = resolve(&self.image, path).ok_or(FsError::NotFound)?;
        let inode = self.image.read_inode(ino.as_index());
        if !inode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let map = read_dir_map(&self.image, ino);
        let mut out = Vec::with_capacity(map.len() + 1);
        out.push((".".to_owned(), ino));
        for entry in map.entries() {
            let name = String::from_utf8_lossy(entry.name()).into_owned();
            out.push((name, entry.inode_no()));
        }
        Ok(out)
    }

    /// Calls `filler` for every entry `list` would return.
    pub fn readdir(&self, path: &str, mut filler: impl FnMut(&str, InodeNo)) -> FsResult<()> {
        for (name, ino) in self.list(path)? {
            filler(&name, ino);
        }
        Ok(())
    }

    /// Creates a file or directory node at `path`; `mode` carries both
    /// the file-type bits and the permission bits.
    pub fn mknod(&mut self, path: &str, mode: u32) -> FsResult<()> {
        log::debug!("mknod({path}, {mode:o})");
        let (parent, name) = resolve_parent(&self.image, path)?;
        if dir_get(&self.image, parent, name.as_bytes()).is_some() {
            log::warn!("mknod({path}): already exists");
            return Err(FsError::AlreadyExists);
        }

        let ino = alloc_inode(&mut self.image)?;
        let uid = current_uid();
        let gid = current_gid();
        make_inode(&mut self.image, ino, mode, uid, gid, now())?;

        dir_add(&mut self.image, parent, name.as_bytes(), ino);
        bump_refs(&mut self.image, parent, 1);
        Ok(())
    }

    /// Equivalent to `mknod(path, DIR | mode)`.
    pub fn mkdir(&mut self, path: &str, mode: u32) -> FsResult<()> {
        log::debug!("mkdir({path}, {mode:o})");
        self.mknod(path, libc::S_IFDIR | (mode & 0o7777))
    }

    /// `unlink(path)` from the host bridge: fails `EISDIR` on a directory
    /// target.
    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        log::debug!("unlink({path})");
        self.remove(path, false)
    }

    /// `rmdir(path)` from the host bridge: fails `ENOTDIR` on a file
    /// target, `ENOTEMPTY`/`EINVAL` on `..`/`.`.
    pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
        log::debug!("rmdir({path})");
        self.remove(path, true)
    }

    fn remove(&mut self, path: &str, require_dir: bool) -> FsResult<()> {
        match crate::path::split_path(path).last() {
            Some(".") => return Err(FsError::InvalidArgument),
            Some("..") => return Err(FsError::DirectoryNotEmpty),
            _ => {}
        }

        let (parent, name) = resolve_parent(&self.image, path)?;
        let target = dir_get(&self.image, parent, name.as_bytes()).ok_or(FsError::NotFound)?;
        let target_inode = self.image.read_inode(target.as_index());
        if target_inode.is_dir() && !require_dir {
            return Err(FsError::IsADirectory);
        }
        if !target_inode.is_dir() && require_dir {
            return Err(FsError::NotADirectory);
        }

        let removed = dir_remove(&mut self.image, parent, name.as_bytes());
        debug_assert!(removed, "resolved entry must exist in its parent's map");
        bump_refs(&mut self.image, parent, -1);

        let remaining = bump_refs(&mut self.image, target, -1);
        if remaining == 0 {
            release_inode(&mut self.image, target);
        }
        Ok(())
    }

    /// `link(from)` then `unlink(from)`; on a failed link the filesystem
    /// is left unchanged.
    pub fn rename(&mut self, from: &str, to: &str) -> FsResult<()> {
        log::debug!("rename({from}, {to})");
        self.link(from, to)?;
        self.remove(from, false)
    }

    pub fn link(&mut self, from: &str, to: &str) -> FsResult<()> {
        log::debug!("link({from}, {to})");
        let target = resolve(&self.image, from).ok_or(FsError::NotFound)?;
        let (to_parent, to_name) = resolve_parent(&self.image, to)?;
        if dir_get(&self.image, to_parent, to_name.as_bytes()).is_some() {
            return Err(FsError::AlreadyExists);
        }
        dir_add(&mut self.image, to_parent, to_name.as_bytes(), target);
        bump_refs(&mut self.image, target, 1);
        Ok(())
    }

    pub fn chmod(&mut self, path: &str, mode: u32) -> FsResult<()> {
        log::debug!("chmod({path}, {mode:o})");
        let ino = resolve(&self.image, path).ok_or(FsError::NotFound)?;
        let mut inode = self.image.read_inode(ino.as_index());
        inode.mode = mode;
        self.image.write_inode(ino.as_index(), &inode);
        Ok(())
    }

    /// Sets `mtime`. `times` is `None` for a null times argument, which
    /// is surfaced as `EACCES`.
    pub fn utimens(&mut self, path: &str, times: Option<i64>) -> FsResult<()> {
        log::debug!("utimens({path})");
        let Some(mtime) = times else {
            return Err(FsError::PermissionDenied);
        };
        let ino = resolve(&self.image, path).ok_or(FsError::NotFound)?;
        let mut inode = self.image.read_inode(ino.as_index());
        inode.mtime = mtime;
        self.image.write_inode(ino.as_index(), &inode);
        Ok(())
    }

    /// Returns up to `len` bytes starting at `offset`. An offset past the
    /// end of content yields zero bytes, not an error.
    pub fn read(&self, path: &str, offset: u64, len: usize) -> FsResult<Vec<u8>> {
        log::debug!("read({path}, offset={offset}, len={len})");
        let ino = resolve(&self.image, path).ok_or(FsError::NotFound)?;
        let content = fileio::read_all(&self.image, ino);
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        if offset >= content.len() {
            return Ok(Vec::new());
        }
        let end = content.len().min(offset + len);
        Ok(content[offset..end].to_vec())
    }

    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> FsResult<usize> {
        log::debug!("write({path}, offset={offset}, len={})", buf.len());
        let ino = resolve(&self.image, path).ok_or(FsError::NotFound)?;
        let offset = usize::try_from(offset).map_err(|_| FsError::FileTooLarge)?;
        let written = fileio::write(&mut self.image, ino, buf, offset);
        if let Err(err) = written {
            log::warn!("write({path}): {err}");
        }
        written
    }

    /// Stubbed out: no target-size semantics are defined here, only a
    /// generic failure.
    pub fn truncate(&mut self, path: &str, _size: u64) -> FsResult<()> {
        log::debug!("truncate({path})");
        Err(FsError::InvalidArgument)
    }
}

/// Adds `delta` to `ino`'s `refs` and returns the new value.
fn bump_refs(image: &mut Image, ino: InodeNo, delta: i32) -> u32 {
    let mut inode = image.read_inode(ino.as_index());
    inode.refs = inode.refs.saturating_add_signed(delta);
    image.write_inode(ino.as_index(), &inode);
    inode.refs
}

fn init_root(image: &mut Image) -> FsResult<()> {
    let ino = alloc_inode(image)?;
    debug_assert_eq!(ino, InodeNo::ROOT);
    make_inode(image, ino, libc::S_IFDIR | 0o755, current_uid(), current_gid(), now())
}

fn current_uid() -> u32 {
    // SAFETY: getuid() has no preconditions and cannot fail.
    unsafe { libc::getuid() }
}

fn current_gid() -> u32 {
    // SAFETY: getgid() has no preconditions and cannot fail.
    unsafe { libc::getgid() }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn fresh_fs() -> Filesystem {
        let file = NamedTempFile::new().unwrap();
        let path = file.into_temp_path();
        let fs = Filesystem::mount(&path).unwrap();
        std::mem::forget(path);
        fs
    }

    #[test]
    fn fresh_image_root_attrs() {
        let fs = fresh_fs();
        let stat = fs.getattr("/").unwrap();
        assert_eq!(stat.mode & libc::S_IFMT, libc::S_IFDIR);
        assert_eq!(stat.nlink, 2);
        assert_eq!(stat.size, 4);
    }

    #[test]
    fn mknod_then_readdir_lists_dot_and_child() {
        let mut fs = fresh_fs();
        fs.mknod("/a", 0o644).unwrap();
        let entries = fs.list("/").unwrap();
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec![".", "a"]);
        assert_eq!(fs.getattr("/a").unwrap().nlink, 1);
    }

    #[test]
    fn mknod_duplicate_name_fails_eexist() {
        let mut fs = fresh_fs();
        fs.mknod("/a", 0).unwrap();
        assert_eq!(fs.mknod("/a", 0), Err(FsError::AlreadyExists));
    }

    #[test]
    fn write_then_read_round_trips_and_updates_size() {
        let mut fs = fresh_fs();
        fs.mknod("/f", 0o644).unwrap();
        fs.write("/f", b"hello", 0).unwrap();
        assert_eq!(fs.read("/f", 0, 5).unwrap(), b"hello");
        assert_eq!(fs.getattr("/f").unwrap().size, 5);
    }

    #[test]
    fn large_write_uses_indirect_block() {
        let mut fs = fresh_fs();
        fs.mknod("/f", 0o644).unwrap();
        let data = vec![7u8; 8192];
        fs.write("/f", &data, 0).unwrap();
        assert_eq!(fs.read("/f", 0, 8192).unwrap(), data);
        let stat = fs.getattr("/f").unwrap();
        assert!(stat.blocks >= 2);
    }

    #[test]
    fn link_then_unlink_keeps_content_reachable() {
        let mut fs = fresh_fs();
        fs.mknod("/a", 0o644).unwrap();
        fs.write("/a", b"content", 0).unwrap();
        fs.link("/a", "/b").unwrap();
        fs.unlink("/a").unwrap();
        assert_eq!(fs.read("/b", 0, 7).unwrap(), b"content");
        assert_eq!(fs.getattr("/b").unwrap().nlink, 1);
    }

    #[test]
    fn rmdir_rejects_dot_and_dotdot() {
        let mut fs = fresh_fs();
        fs.mkdir("/d", 0o755).unwrap();
        assert_eq!(fs.rmdir("/d/."), Err(FsError::InvalidArgument));
        assert_eq!(fs.rmdir("/d/.."), Err(FsError::DirectoryNotEmpty));
    }

    /// The `.`/`..` rejection must run before parent resolution, so it
    /// fires even when the rest of the path does not exist.
    #[test]
    fn rmdir_rejects_dotdot_even_under_a_missing_parent() {
        let mut fs = fresh_fs();
        assert_eq!(fs.rmdir("/missing/.."), Err(FsError::DirectoryNotEmpty));
        assert_eq!(fs.rmdir("/missing/."), Err(FsError::InvalidArgument));
    }

    #[test]
    fn rmdir_on_file_is_enotdir_unlink_on_dir_is_eisdir() {
        let mut fs = fresh_fs();
        fs.mknod("/f", 0o644).unwrap();
        fs.mkdir("/d", 0o755).unwrap();
        assert_eq!(fs.rmdir("/f"), Err(FsError::NotADirectory));
        assert_eq!(fs.unlink("/d"), Err(FsError::IsADirectory));
    }

    #[test]
    fn mkdir_then_rmdir_frees_the_inode_slot() {
        let mut fs = fresh_fs();
        fs.mkdir("/d", 0o755).unwrap();
        let before = fs.image.inode_bitmap().to_vec();
        fs.rmdir("/d").unwrap();
        fs.mkdir("/d", 0o755).unwrap();
        let after = fs.image.inode_bitmap().to_vec();
        assert_eq!(before, after);
        fs.rmdir("/d").unwrap();
        fs.mkdir("/e", 0o755).unwrap();
    }

    #[test]
    fn chmod_is_idempotent() {
        let mut fs = fresh_fs();
        fs.mknod("/a", 0o644).unwrap();
        fs.chmod("/a", 0o600).unwrap();
        let first = fs.getattr("/a").unwrap();
        fs.chmod("/a", 0o600).unwrap();
        let second = fs.getattr("/a").unwrap();
        assert_eq!(first.mode, second.mode);
    }

    #[test]
    fn utimens_without_times_is_eacces() {
        let mut fs = fresh_fs();
        fs.mknod("/a", 0o644).unwrap();
        assert_eq!(fs.utimens("/a", None), Err(FsError::PermissionDenied));
    }

    #[test]
    fn read_past_end_of_file_yields_empty() {
        let mut fs = fresh_fs();
        fs.mknod("/a", 0o644).unwrap();
        fs.write("/a", b"hi", 0).unwrap();
        assert_eq!(fs.read("/a", 100, 10).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn truncate_is_stubbed() {
        let mut fs = fresh_fs();
        fs.mknod("/a", 0o644).unwrap();
        assert!(fs.truncate("/a", 0).is_err());
    }
}
