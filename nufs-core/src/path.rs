//! Splits absolute paths into components and walks directory maps to
//! resolve them, returning owned [`InodeNo`]s instead of pointers.

use nufs_types::InodeNo;

use crate::dir::dir_get;
use crate::error::{FsError, FsResult};
use crate::image::Image;

/// Splits `path` on `/`, dropping empty components (so leading, trailing,
/// and repeated slashes are all ignored). `"/"` yields no components at
/// all, which every caller below treats as "already at root".
pub fn split_path(path: &str) -> impl Iterator<Item = &str> + Clone {
    path.split('/').filter(|c| !c.is_empty())
}

/// Walks from the root through each component of `path`. Returns `None`
/// ("absent") if any component is missing or a non-leaf component is not
/// a directory; this is not itself an error, callers convert it to the
/// appropriate operation-level kind.
pub fn resolve(image: &Image, path: &str) -> Option<InodeNo> {
    let mut current = InodeNo::ROOT;
    for component in split_path(path) {
        let inode = image.read_inode(current.as_index());
        if !inode.is_dir() {
            return None;
        }
        current = dir_get(image, current, component.as_bytes())?;
    }
    Some(current)
}

/// Resolves everything but the last component of `path`, returning the
/// parent directory's inode and the final component's name. The parent
/// must exist and be a directory; `path` must name at least one
/// component (the root itself has no parent).
pub fn resolve_parent<'a>(image: &Image, path: &'a str) -> FsResult<(InodeNo, &'a str)> {
    let components: Vec<&str> = split_path(path).collect();
    let Some((&last, parents)) = components.split_last() else {
        return Err(FsError::InvalidArgument);
    };

    let mut current = InodeNo::ROOT;
    for component in parents {
        let inode = image.read_inode(current.as_index());
        if !inode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        current = dir_get(image, current, component.as_bytes()).ok_or(FsError::NotFound)?;
    }

    let inode = image.read_inode(current.as_index());
    if !inode.is_dir() {
        return Err(FsError::NotADirectory);
    }
    Ok((current, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_path_ignores_empty_components() {
        assert_eq!(split_path("/").collect::<Vec<_>>(), Vec::<&str>::new());
        assert_eq!(split_path("/a/bb/c").collect::<Vec<_>>(), vec!["a", "bb", "c"]);
        assert_eq!(split_path("///a//bb").collect::<Vec<_>>(), vec!["a", "bb"]);
    }

    #[test]
    fn resolve_root_is_always_present() {
        let image = crate::testutil::temp_image();
        assert_eq!(resolve(&image, "/"), Some(InodeNo::ROOT));
    }

    #[test]
    fn resolve_parent_of_root_is_invalid() {
        let image = crate::testutil::temp_image();
        assert!(matches!(resolve_parent(&image, "/"), Err(FsError::InvalidArgument)));
    }

    #[test]
    fn resolve_missing_component_is_absent_not_error() {
        let image = crate::testutil::temp_image();
        assert_eq!(resolve(&image, "/nope"), None);
    }
}
