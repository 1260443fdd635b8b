//! The metadata root (ECMA-335 II.24.2.1).
//!
//! The root carries the runtime version string the module was built against (for example
//! `v4.0.30319` or `v2.0.50727`) followed by the stream directory.

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Result,
};

/// Magic signature of the metadata root, "BSJB".
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The parsed metadata root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    /// Major version of the metadata format, 1
    pub major_version: u16,
    /// Minor version of the metadata format, 1
    pub minor_version: u16,
    /// Runtime version string with trailing padding removed
    pub version: String,
    /// Stream directory in file order
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Reads the metadata root at the start of `data`, which must span the whole metadata.
    ///
    /// # Errors
    /// [`crate::Error::Malformed`] for a bad signature or stream directory and
    /// [`crate::Error::OutOfBounds`] if the root or a stream leaves `data`.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(out_of_bounds_error!());
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {:#x}",
                signature
            ));
        }

        let mut offset = 4;
        let major_version = read_le_at::<u16>(data, &mut offset)?;
        let minor_version = read_le_at::<u16>(data, &mut offset)?;
        offset += 4;

        let version_length = read_le_at::<u32>(data, &mut offset)? as usize;
        let Some(version_bytes) = version_length
            .checked_add(16)
            .and_then(|end| data.get(16..end))
        else {
            return Err(out_of_bounds_error!());
        };

        let version = String::from_utf8_lossy(version_bytes)
            .trim_end_matches('\0')
            .to_string();

        let mut offset = 16 + version_length;
        let _flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_count = read_le_at::<u16>(data, &mut offset)?;
        if stream_count == 0 || usize::from(stream_count) * 9 > data.len() {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut stream_headers = Vec::with_capacity(usize::from(stream_count));
        for _ in 0..stream_count {
            let Some(rest) = data.get(offset..) else {
                return Err(out_of_bounds_error!());
            };

            let header = StreamHeader::from(rest)?;
            let in_bounds = header
                .offset
                .checked_add(header.size)
                .is_some_and(|end| end as usize <= data.len());
            if !in_bounds {
                return Err(out_of_bounds_error!());
            }

            offset += header.header_len();
            stream_headers.push(header);
        }

        Ok(Root {
            major_version,
            minor_version,
            version,
            stream_headers,
        })
    }

    /// Looks up a stream by name.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|header| header.name == name)
    }
}
