//! PE container access.
//!
//! [`File`] wraps a goblin [`PE`] together with the bytes it borrows from, so that a parsed
//! image can be handed around as one owned value. The metadata reader in
//! [`crate::metadata`] and the version-resource reader in [`version`] both sit on top of it.
//!
//! Unlike a pure metadata reader, a [`File`] loads any well-formed PE image, managed or not:
//! native binaries still carry a version resource worth reporting when metadata extraction
//! fails. Whether the image is managed is answered by [`File::clr`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotprobe::file::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("System.Xml.dll"))?;
//! if let Some((rva, size)) = file.clr() {
//!     let offset = file.rva_to_offset(rva)?;
//!     println!("CLI header at 0x{offset:x} ({size} bytes)");
//! }
//! # Ok::<(), dotprobe::Error>(())
//! ```

pub mod io;
pub mod parser;
pub mod version;

mod backend;

use std::path::Path;

use goblin::pe::{data_directories::DataDirectoryType, PE};
use ouroboros::self_referencing;

pub use backend::{Backend, Memory, Physical};
pub use version::VersionInfo;

use crate::{Error, Result};

/// `IMAGE_FILE_MACHINE_I386`
pub const MACHINE_I386: u16 = 0x014C;
/// `IMAGE_FILE_MACHINE_AMD64`
pub const MACHINE_AMD64: u16 = 0x8664;
/// `IMAGE_FILE_MACHINE_IA64`
pub const MACHINE_IA64: u16 = 0x0200;
/// `IMAGE_FILE_MACHINE_ARMNT`
pub const MACHINE_ARMNT: u16 = 0x01C4;
/// `IMAGE_FILE_MACHINE_ARM64`
pub const MACHINE_ARM64: u16 = 0xAA64;

/// A parsed PE image and the bytes backing it.
#[self_referencing]
pub struct File {
    data: Box<dyn Backend>,
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

impl File {
    /// Memory-maps and parses the file at `path`.
    ///
    /// # Errors
    /// [`Error::FileError`] if the file cannot be opened, [`Error::Empty`] for zero-length
    /// files and [`Error::GoblinErr`] if the content is not a PE image.
    pub fn from_file(path: &Path) -> Result<File> {
        Self::load(Physical::new(path)?)
    }

    /// Parses an in-memory image.
    ///
    /// # Errors
    /// [`Error::Empty`] for an empty buffer and [`Error::GoblinErr`] if the content is not a
    /// PE image.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        Self::load(Memory::new(data))
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Error::Empty);
        }

        File::try_new(Box::new(data), |data| {
            let pe = PE::parse(data.data())?;
            if pe.header.optional_header.is_none() {
                return Err(malformed_error!("File does not have an OptionalHeader"));
            }
            Ok(pe)
        })
    }

    /// Length of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.borrow_data().len()
    }

    /// Returns true if the image has no bytes (never the case for a loaded file).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw bytes of the image.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.borrow_data().data()
    }

    /// `len` bytes at file offset `offset`.
    ///
    /// # Errors
    /// [`Error::OutOfBounds`] if the range leaves the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.borrow_data().data_slice(offset, len)
    }

    /// The COFF machine field.
    #[must_use]
    pub fn machine(&self) -> u16 {
        self.with_pe(|pe| pe.header.coff_header.machine)
    }

    /// True for PE32+ images.
    #[must_use]
    pub fn is_pe32_plus(&self) -> bool {
        self.with_pe(|pe| pe.is_64)
    }

    /// RVA and size of the CLR runtime header, if this is a managed image.
    #[must_use]
    pub fn clr(&self) -> Option<(usize, usize)> {
        self.data_directory(DataDirectoryType::ClrRuntimeHeader)
            .map(|(rva, size)| (rva as usize, size as usize))
    }

    /// RVA and size of a data directory, if present and non-empty.
    #[must_use]
    pub fn data_directory(&self, dir_type: DataDirectoryType) -> Option<(u32, u32)> {
        self.with_pe(|pe| {
            pe.header
                .optional_header
                .as_ref()?
                .data_directories
                .dirs()
                .find(|(directory_type, directory)| {
                    *directory_type == dir_type
                        && directory.virtual_address != 0
                        && directory.size != 0
                })
                .map(|(_, directory)| (directory.virtual_address, directory.size))
        })
    }

    /// Translates a relative virtual address into a file offset.
    ///
    /// # Errors
    /// [`Error::Malformed`] if no section maps `rva`.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        let rva = u32::try_from(rva).map_err(|_| malformed_error!("RVA too large - {}", rva))?;

        self.with_pe(|pe| {
            for section in &pe.sections {
                let extent = section.virtual_size.max(section.size_of_raw_data);
                let Some(section_end) = section.virtual_address.checked_add(extent) else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.virtual_address,
                        extent
                    ));
                };

                if section.virtual_address <= rva && rva < section_end {
                    return Ok((rva - section.virtual_address) as usize
                        + section.pointer_to_raw_data as usize);
                }
            }

            Err(malformed_error!(
                "RVA could not be converted to offset - {}",
                rva
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::ImageBuilder;

    #[test]
    fn loads_managed_image() {
        let file = File::from_mem(ImageBuilder::new("Sample").build()).unwrap();

        assert_eq!(file.data_slice(0, 2).unwrap(), b"MZ");
        assert_eq!(file.machine(), MACHINE_I386);
        assert!(!file.is_pe32_plus());

        let (rva, size) = file.clr().unwrap();
        assert_eq!(size, 72);
        let offset = file.rva_to_offset(rva).unwrap();
        assert_eq!(file.data_slice(offset, 4).unwrap(), &72u32.to_le_bytes());
    }

    #[test]
    fn loads_native_image_without_clr() {
        let file = File::from_mem(ImageBuilder::native("Native").build()).unwrap();
        assert!(file.clr().is_none());
    }

    #[test]
    fn pe32_plus() {
        let file = File::from_mem(ImageBuilder::new("Wide").amd64().build()).unwrap();
        assert!(file.is_pe32_plus());
        assert_eq!(file.machine(), MACHINE_AMD64);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(File::from_mem(Vec::new()), Err(Error::Empty)));
        assert!(File::from_mem(b"just some text, not a PE".to_vec()).is_err());
    }

    #[test]
    fn unmapped_rva() {
        let file = File::from_mem(ImageBuilder::new("Sample").build()).unwrap();
        assert!(matches!(
            file.rva_to_offset(0x00FF_0000),
            Err(Error::Malformed { .. })
        ));
    }
}
