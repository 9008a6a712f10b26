//! Filesystem collaborator contract (§6), used by the static file responder
//! (C7). Streams are read in fixed-size chunks and explicitly closed; the
//! full file content is never held in memory at once.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// An open, readable file handle.
pub trait FileStream {
    /// Reads the next chunk; `Ok(0)` means end of file.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl FileStream for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }
}

/// Filesystem collaborator.
pub trait Filesystem {
    type Stream: FileStream;

    fn exists(&self, path: &Path) -> bool;
    fn size(&self, path: &Path) -> io::Result<u64>;
    fn open_read(&self, path: &Path) -> io::Result<Self::Stream>;
}

/// Default [`Filesystem`] over `std::fs`.
pub struct StdFilesystem;

impl Filesystem for StdFilesystem {
    type Stream = File;

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    fn open_read(&self, path: &Path) -> io::Result<File> {
        File::open(path)
    }
}
