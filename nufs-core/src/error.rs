//! Error model for filesystem operations.
//!
//! Every variant corresponds to a POSIX errno that the eventual FUSE
//! bridge would return as `-errno`. Keeping the discriminants aligned to
//! the real errno values means [`FsError::errno`] never needs a match
//! table of its own.

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[repr(i32)]
pub enum FsError {
    // ENOENT
    #[error("no such file or directory")]
    NotFound = 2,
    // EIO
    #[error("input/output error")]
    Io = 5,
    // EACCES
    #[error("permission denied")]
    PermissionDenied = 13,
    // EEXIST
    #[error("file exists")]
    AlreadyExists = 17,
    // ENOTDIR
    #[error("not a directory")]
    NotADirectory = 20,
    // EISDIR
    #[error("is a directory")]
    IsADirectory = 21,
    // EINVAL
    #[error("invalid argument")]
    InvalidArgument = 22,
    // EDQUOT
    #[error("no free inode slots")]
    NoFreeInodes = 122,
    // ENOSPC
    #[error("no space left on device")]
    StorageFull = 28,
    // ENOTEMPTY
    #[error("directory not empty")]
    DirectoryNotEmpty = 39,
    // EFBIG
    #[error("file too large")]
    FileTooLarge = 27,
}

impl FsError {
    /// The POSIX errno a FUSE-style caller would surface for this error.
    #[must_use]
    pub const fn errno(self) -> i32 {
        self as i32
    }
}

pub type FsResult<T> = Result<T, FsError>;
