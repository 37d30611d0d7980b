//! Virtual filesystem layer
//!
//! A [`VirtualFs`] is path-addressable byte storage rooted at one archive
//! container. Two implementations ship with the crate:
//!
//! - [`DirFs`]: entries live in a host directory
//! - [`PackedFs`]: entries live in a single packed container file, staged to a
//!   temporary directory while open and repacked on [`close`](VirtualFs::close)
//!
//! # Contract
//!
//! - Paths are [`ArchivePath`]s obtained from [`resolve`](VirtualFs::resolve).
//! - Streams returned by [`open_read`](VirtualFs::open_read) and
//!   [`open_write`](VirtualFs::open_write) are owned by the caller and released
//!   by dropping them. Deleting an entry while a stream to it is open is
//!   platform dependent.
//! - After `close` every operation fails with
//!   [`CombineError::Closed`](crate::CombineError::Closed) and `exists` answers
//!   `false`. A second `close` fails too.
//! - Implementations are not synchronized; callers drive one instance from one
//!   thread at a time.

mod dir;
mod packed;
mod path;

pub use dir::DirFs;
pub use packed::PackedFs;
pub use path::{ArchivePath, MAX_PATH_LENGTH};

use crate::error::Result;
use std::io::{Read, Write};

/// Byte storage rooted at one archive container
pub trait VirtualFs {
    /// Stream type for reading an entry from offset 0
    type Reader: Read;

    /// Stream type for overwriting an entry from offset 0
    type Writer: Write;

    /// Resolve a raw path string into this filesystem's path space
    fn resolve(&self, raw: &str) -> Result<ArchivePath> {
        ArchivePath::parse(raw)
    }

    /// True if a file or directory exists at `path`
    fn exists(&self, path: &ArchivePath) -> bool;

    /// True if a directory exists at `path`
    fn is_dir(&self, path: &ArchivePath) -> bool;

    /// Create `path` and any missing ancestors as directories
    fn create_directories(&mut self, path: &ArchivePath) -> Result<()>;

    /// Create an empty file; fails if anything already exists at `path`
    fn create_file(&mut self, path: &ArchivePath) -> Result<()>;

    /// Delete a file or an empty directory
    fn delete(&mut self, path: &ArchivePath) -> Result<()>;

    /// Copy all bytes of `source` into `dest`, returning the byte count.
    /// Without `overwrite`, an existing `dest` is an error.
    fn copy(&mut self, source: &mut dyn Read, dest: &ArchivePath, overwrite: bool)
        -> Result<u64>;

    /// Open an existing file for reading
    fn open_read(&self, path: &ArchivePath) -> Result<Self::Reader>;

    /// Open a file for writing, creating it or truncating it to zero length
    fn open_write(&mut self, path: &ArchivePath) -> Result<Self::Writer>;

    /// Release the container resource
    fn close(&mut self) -> Result<()>;

    /// True once `close` has succeeded
    fn is_closed(&self) -> bool;
}
