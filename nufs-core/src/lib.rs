//! The on-image storage engine for `nufs`: image layout, inode and block
//! allocators, path resolution, direct+indirect file I/O, and the
//! operation layer a FUSE-style bridge calls into.
//!
//! Everything here is single-threaded and synchronous by design (see the
//! crate's concurrency notes in `DESIGN.md`): one [`ops::Filesystem`]
//! wraps the entire mapped image, and no operation suspends partway
//! through.

pub mod alloc;
mod bitmap;
mod dir;
pub mod error;
mod fileio;
mod image;
mod ops;
mod path;
mod table;

#[cfg(test)]
mod testutil;

pub use error::{FsError, FsResult};
pub use image::Image;
pub use ops::Filesystem;
pub use path::split_path;
