//! The CLI header (`IMAGE_COR20_HEADER`, ECMA-335 II.25.3.3).

use bitflags::bitflags;

use crate::{file::parser::Parser, Result};

/// Size of the CLI header in bytes.
pub const COR20_HEADER_SIZE: usize = 72;

bitflags! {
    /// Runtime flags of the CLI header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CorFlags: u32 {
        /// Image contains only IL code
        const ILONLY = 0x0000_0001;
        /// Image can only be loaded into a 32-bit process
        const REQUIRES_32BIT = 0x0000_0002;
        /// Image is a library with IL only, deprecated
        const IL_LIBRARY = 0x0000_0004;
        /// Image carries a strong-name signature
        const STRONGNAMESIGNED = 0x0000_0008;
        /// Entry point is an unmanaged method
        const NATIVE_ENTRYPOINT = 0x0000_0010;
        /// Debug data is tracked
        const TRACKDEBUGDATA = 0x0001_0000;
        /// AnyCPU image that prefers a 32-bit process
        const PREFERS_32BIT = 0x0002_0000;
    }
}

/// The parts of the CLI header a probe needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cor20Header {
    /// Minimum major runtime version required
    pub major_runtime_version: u16,
    /// Minor runtime version
    pub minor_runtime_version: u16,
    /// RVA of the metadata root
    pub meta_data_rva: u32,
    /// Size of the metadata
    pub meta_data_size: u32,
    /// Runtime flags, unknown bits retained
    pub flags: CorFlags,
    /// RVA of the strong-name signature, zero if unsigned
    pub strong_name_signature_rva: u32,
}

impl Cor20Header {
    /// Reads and validates a CLI header.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] if `data` is shorter than 72 bytes and
    /// [`crate::Error::Malformed`] for an invalid size field or a missing metadata directory.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if data.len() < COR20_HEADER_SIZE {
            return Err(out_of_bounds_error!());
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb as usize != COR20_HEADER_SIZE {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;

        let meta_data_rva = parser.read_le::<u32>()?;
        let meta_data_size = parser.read_le::<u32>()?;
        if meta_data_rva == 0 || meta_data_size == 0 {
            return Err(malformed_error!("CLR header has no metadata directory"));
        }
        if meta_data_size > 0x1000_0000 {
            return Err(malformed_error!(
                "Metadata size {} exceeds reasonable limit (256MB)",
                meta_data_size
            ));
        }

        let flags = CorFlags::from_bits_retain(parser.read_le::<u32>()?);

        // entry point token, managed resources
        parser.advance_by(12)?;
        let strong_name_signature_rva = parser.read_le::<u32>()?;

        Ok(Cor20Header {
            major_runtime_version,
            minor_runtime_version,
            meta_data_rva,
            meta_data_size,
            flags,
            strong_name_signature_rva,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[rustfmt::skip]
    const HEADER: [u8; 72] = [
        0x48, 0x00, 0x00, 0x00, // cb = 72
        0x02, 0x00,             // major_runtime_version = 2
        0x05, 0x00,             // minor_runtime_version = 5
        0x50, 0x20, 0x00, 0x00, // meta_data_rva = 0x2050
        0x00, 0x04, 0x00, 0x00, // meta_data_size = 0x400
        0x03, 0x00, 0x02, 0x00, // flags = ILONLY | 32BITREQUIRED | 32BITPREFERRED
        0x00, 0x00, 0x00, 0x06, // entry_point_token
        0x00, 0x00, 0x00, 0x00, // resource_rva
        0x00, 0x00, 0x00, 0x00, // resource_size
        0x00, 0x30, 0x00, 0x00, // strong_name_signature_rva = 0x3000
        0x80, 0x00, 0x00, 0x00, // strong_name_signature_size
        0, 0, 0, 0, 0, 0, 0, 0, // code manager
        0, 0, 0, 0, 0, 0, 0, 0, // vtable fixups
        0, 0, 0, 0, 0, 0, 0, 0, // export address table jumps
        0, 0, 0, 0, 0, 0, 0, 0, // managed native header
    ];

    #[test]
    fn crafted() {
        let header = Cor20Header::read(&HEADER).unwrap();

        assert_eq!(header.major_runtime_version, 2);
        assert_eq!(header.minor_runtime_version, 5);
        assert_eq!(header.meta_data_rva, 0x2050);
        assert_eq!(header.meta_data_size, 0x400);
        assert!(header.flags.contains(CorFlags::ILONLY | CorFlags::REQUIRES_32BIT));
        assert!(header.flags.contains(CorFlags::PREFERS_32BIT));
        assert_eq!(header.strong_name_signature_rva, 0x3000);
    }

    #[test]
    fn invalid() {
        assert!(matches!(
            Cor20Header::read(&HEADER[..40]),
            Err(Error::OutOfBounds { .. })
        ));

        let mut bad_size = HEADER;
        bad_size[0] = 0x40;
        assert!(matches!(
            Cor20Header::read(&bad_size),
            Err(Error::Malformed { .. })
        ));

        let mut no_metadata = HEADER;
        no_metadata[8..12].copy_from_slice(&[0, 0, 0, 0]);
        assert!(Cor20Header::read(&no_metadata).is_err());
    }
}
