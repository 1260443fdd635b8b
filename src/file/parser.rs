//! A cursor over a byte slice for sequential metadata decoding.
//!
//! Used for blob contents (custom attribute values, member signatures) and any other
//! structure that is read front to back. Every read is bounds-checked.

use crate::{
    file::io::{read_le_at, CilIO},
    Result,
};

/// Sequential reader over borrowed bytes.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Starts a cursor at the beginning of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the underlying data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Bytes left after the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// True while unread bytes remain.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Moves to an absolute position.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] if `pos` is past the end.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Skips `step` bytes.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] if that would move past the end.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let target = self
            .position
            .checked_add(step)
            .ok_or_else(|| out_of_bounds_error!())?;
        self.seek(target)
    }

    /// Moves forward to the next multiple of `alignment`.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] if the aligned position is past the end.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let misalignment = self.position % alignment;
        if misalignment == 0 {
            return Ok(());
        }
        self.advance_by(alignment - misalignment)
    }

    /// Reads a little-endian `T`.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Reads `length` raw bytes.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] if fewer than `length` bytes remain.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(length)
            .ok_or_else(|| out_of_bounds_error!())?;
        let Some(bytes) = self.data.get(self.position..end) else {
            return Err(out_of_bounds_error!());
        };

        self.position = end;
        Ok(bytes)
    }

    /// Reads an ECMA-335 II.23.2 compressed unsigned integer (1, 2 or 4 bytes).
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] on truncated input, [`crate::Error::Malformed`] for an
    /// invalid lead byte.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_le::<u8>()?;

        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_le::<u8>()?;
            return Ok(((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte));
        }

        if (first_byte & 0xE0) == 0xC0 {
            let rest = self.read_bytes(3)?;
            return Ok(((u32::from(first_byte) & 0x1F) << 24)
                | (u32::from(rest[0]) << 16)
                | (u32::from(rest[1]) << 8)
                | u32::from(rest[2]));
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Reads a null-terminated UTF-8 string. A missing terminator ends the string at the end
    /// of the data.
    ///
    /// # Errors
    /// [`crate::Error::Malformed`] for invalid UTF-8.
    pub fn read_string_utf8(&mut self) -> Result<String> {
        let start = self.position;
        let rest = &self.data[start.min(self.data.len())..];
        let length = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());

        let text = std::str::from_utf8(&rest[..length])
            .map_err(|e| malformed_error!("Invalid UTF-8 string at offset {}: {}", start, e))?
            .to_string();

        self.position = (start + length + 1).min(self.data.len());
        Ok(text)
    }

    /// Reads a custom-attribute `SerString`: a compressed length followed by UTF-8 bytes, or
    /// the single byte `0xFF` for a null string.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] on truncated input, [`crate::Error::Malformed`] for
    /// invalid UTF-8.
    pub fn read_ser_string(&mut self) -> Result<Option<String>> {
        if self.data.get(self.position) == Some(&0xFF) {
            self.position += 1;
            return Ok(None);
        }

        let length = self.read_compressed_uint()? as usize;
        let bytes = self.read_bytes(length)?;
        let text = std::str::from_utf8(bytes)
            .map_err(|e| malformed_error!("Invalid SerString - {}", e))?;
        Ok(Some(text.to_string()))
    }
}
