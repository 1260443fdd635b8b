//! Metadata stream directory and the two heaps identity extraction reads from.
//!
//! - [`StreamHeader`] - one entry of the stream directory in the metadata root
//! - [`Strings`] - the `#Strings` heap of NUL-terminated UTF-8 identifiers
//! - [`Blob`] - the `#Blob` heap of length-prefixed byte sequences (public keys, signatures,
//!   custom attribute values)
//!
//! The `#GUID` and `#US` heaps carry nothing a probe reports and are never read.

use std::ffi::CStr;

use crate::{
    file::{io::read_le, parser::Parser},
    Result,
};

const STREAM_NAMES: [&str; 6] = ["#~", "#-", "#Strings", "#US", "#Blob", "#GUID"];

/// One entry of the stream directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream from the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Stream name, such as `#~` or `#Strings`
    pub name: String,
}

impl StreamHeader {
    /// Reads a stream header at the start of `data`.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] on truncated input, [`crate::Error::Malformed`] for an
    /// unterminated or unknown stream name.
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(out_of_bounds_error!());
        }

        let name_area = &data[8..data.len().min(8 + 32)];
        let name = CStr::from_bytes_until_nul(name_area)
            .map_err(|_| malformed_error!("Unterminated stream name"))?
            .to_str()
            .map_err(|_| malformed_error!("Stream name is not ASCII"))?;

        if !STREAM_NAMES.contains(&name) {
            return Err(malformed_error!("Invalid stream header name - {}", name));
        }

        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            name: name.to_string(),
        })
    }

    /// Length of this header in the directory, name padded to 4 bytes.
    #[must_use]
    pub fn header_len(&self) -> usize {
        8 + ((self.name.len() + 1 + 3) & !3)
    }
}

/// The `#Strings` heap.
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Wraps heap bytes; the heap must start with the empty string.
    ///
    /// # Errors
    /// [`crate::Error::Malformed`] if `data` is empty or does not start with NUL.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("Provided #Strings heap is invalid"));
        }

        Ok(Strings { data })
    }

    /// The string at heap offset `index`.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] for an index past the heap, [`crate::Error::Malformed`]
    /// for an unterminated or non-UTF-8 string.
    pub fn get(&self, index: usize) -> Result<&'a str> {
        let Some(rest) = self.data.get(index..) else {
            return Err(out_of_bounds_error!());
        };

        CStr::from_bytes_until_nul(rest)
            .ok()
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| malformed_error!("Invalid string at index - {}", index))
    }
}

/// The `#Blob` heap.
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Wraps heap bytes; the heap must start with the empty blob.
    ///
    /// # Errors
    /// [`crate::Error::Malformed`] if `data` is empty or does not start with a zero length.
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob { data })
    }

    /// The blob at heap offset `index`, without its length prefix.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] if the index or the encoded length leave the heap.
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        let Some(rest) = self.data.get(index..) else {
            return Err(out_of_bounds_error!());
        };

        let mut parser = Parser::new(rest);
        let len = parser.read_compressed_uint()? as usize;
        parser.read_bytes(len)
    }
}
