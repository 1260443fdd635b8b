//! Data sources a [`crate::file::File`] can sit on.
//!
//! Probed modules are memory-mapped read-only and without any locking, so a probe never
//! blocks writers and never keeps more than a mapping alive. Tests and the fuzzer feed
//! owned buffers instead.

use std::{fs, path::Path};

use memmap2::Mmap;

use crate::{Error, Result};

/// Uniform byte access over a mapped file or an owned buffer.
pub trait Backend: Send + Sync {
    /// Returns `len` bytes starting at `offset`, or [`Error::OutOfBounds`].
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let data = self.data();
        let end = offset
            .checked_add(len)
            .ok_or_else(|| out_of_bounds_error!())?;
        data.get(offset..end).ok_or_else(|| out_of_bounds_error!())
    }

    /// The whole underlying buffer.
    fn data(&self) -> &[u8];

    /// Length of the underlying buffer.
    fn len(&self) -> usize {
        self.data().len()
    }
}

/// A read-only memory mapping of a file on disk.
#[derive(Debug)]
pub struct Physical {
    mmap: Mmap,
}

impl Physical {
    /// Opens and maps `path`.
    ///
    /// Zero-length files are rejected with [`Error::Empty`] before mapping, as several
    /// platforms refuse to map them.
    pub fn new(path: &Path) -> Result<Physical> {
        let file = fs::File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(Error::Empty);
        }

        // The mapping is read-only; a concurrent writer can still change the bytes underneath,
        // which the parsers tolerate by bounds-checking every access.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|error| Error::Error(error.to_string()))?;
        Ok(Physical { mmap })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        &self.mmap
    }
}

/// An owned in-memory image.
#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Wraps `data`.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Memory {
        Memory { data }
    }
}

impl Backend for Memory {
    fn data(&self) -> &[u8] {
        &self.data
    }
}
