//! Win32 version resource (`VS_VERSIONINFO`) decoding.
//!
//! The file and product versions of a module live outside the CLI metadata, in the
//! `RT_VERSION` entry of the PE resource directory. Native binaries carry the same resource,
//! which is why this reader works on any [`File`], managed or not.
//!
//! Layout (all values little-endian, every node 32-bit aligned relative to the block):
//!
//! ```text
//! VS_VERSIONINFO   { wLength, wValueLength, wType, "VS_VERSION_INFO", VS_FIXEDFILEINFO, children }
//!   StringFileInfo { .., "StringFileInfo", children }
//!     StringTable  { .., "040904b0", children }
//!       String     { .., "FileVersion", L"1.2.3.4" }
//!   VarFileInfo    { .. }
//! ```

use goblin::pe::data_directories::DataDirectoryType;
use widestring::U16Str;

use crate::{
    file::{io::read_le_at, File},
    Result,
};

/// Resource type id of version resources.
pub const RT_VERSION: u32 = 16;

const FIXED_FILE_INFO_SIGNATURE: u32 = 0xFEEF_04BD;
const FIXED_FILE_INFO_SIZE: usize = 52;

/// The binary part of a version resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFileInfo {
    /// File version as `major.minor.build.revision`
    pub file_version: [u16; 4],
    /// Product version as `major.minor.build.revision`
    pub product_version: [u16; 4],
    /// `VS_FF_*` flags, already masked with the flags mask
    pub file_flags: u32,
}

impl FixedFileInfo {
    fn read(value: &[u8]) -> Result<Option<FixedFileInfo>> {
        if value.len() < FIXED_FILE_INFO_SIZE {
            return Ok(None);
        }

        let mut offset = 0;
        if read_le_at::<u32>(value, &mut offset)? != FIXED_FILE_INFO_SIGNATURE {
            return Ok(None);
        }

        let _struct_version = read_le_at::<u32>(value, &mut offset)?;
        let file_ms = read_le_at::<u32>(value, &mut offset)?;
        let file_ls = read_le_at::<u32>(value, &mut offset)?;
        let product_ms = read_le_at::<u32>(value, &mut offset)?;
        let product_ls = read_le_at::<u32>(value, &mut offset)?;
        let flags_mask = read_le_at::<u32>(value, &mut offset)?;
        let flags = read_le_at::<u32>(value, &mut offset)?;

        Ok(Some(FixedFileInfo {
            file_version: split_version(file_ms, file_ls),
            product_version: split_version(product_ms, product_ls),
            file_flags: flags & flags_mask,
        }))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn split_version(ms: u32, ls: u32) -> [u16; 4] {
    [(ms >> 16) as u16, ms as u16, (ls >> 16) as u16, ls as u16]
}

fn format_version(parts: [u16; 4]) -> String {
    format!("{}.{}.{}.{}", parts[0], parts[1], parts[2], parts[3])
}

/// Decoded version resource of a PE image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfo {
    /// `VS_FIXEDFILEINFO`, when present and signed
    pub fixed: Option<FixedFileInfo>,
    /// Entries of the first `StringFileInfo` string table, in file order
    pub strings: Vec<(String, String)>,
}

impl VersionInfo {
    /// Reads the version resource of `file`.
    ///
    /// Returns `Ok(None)` when the image has no resource directory or no `RT_VERSION` entry.
    ///
    /// # Errors
    /// [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] if the resource directory
    /// or the version block is damaged.
    pub fn read(file: &File) -> Result<Option<VersionInfo>> {
        let Some(block) = version_block(file)? else {
            return Ok(None);
        };

        VersionInfo::parse(block).map(Some)
    }

    /// Decodes a raw `VS_VERSIONINFO` block.
    ///
    /// # Errors
    /// [`crate::Error::Malformed`] if the root node is not `VS_VERSION_INFO` or a node length
    /// leaves the block.
    pub fn parse(block: &[u8]) -> Result<VersionInfo> {
        let root = Node::read(block, 0)?;
        if root.key != "VS_VERSION_INFO" {
            return Err(malformed_error!(
                "Version resource starts with '{}'",
                root.key
            ));
        }

        let mut info = VersionInfo {
            fixed: FixedFileInfo::read(root.value)?,
            strings: Vec::new(),
        };

        for child in root.children(block)? {
            if child.key != "StringFileInfo" {
                continue;
            }

            if let Some(table) = child.children(block)?.into_iter().next() {
                for entry in table.children(block)? {
                    let text = utf16_until_nul(entry.value);
                    info.strings.push((entry.key, text));
                }
                break;
            }
        }

        Ok(info)
    }

    /// Looks up a `StringFileInfo` entry by key.
    #[must_use]
    pub fn string(&self, key: &str) -> Option<&str> {
        self.strings
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// The `FileVersion` string, or the fixed file version when no string is present.
    #[must_use]
    pub fn file_version(&self) -> Option<String> {
        self.string("FileVersion")
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .or_else(|| self.fixed.map(|fixed| format_version(fixed.file_version)))
    }

    /// The `ProductVersion` string, or the fixed product version when no string is present.
    #[must_use]
    pub fn product_version(&self) -> Option<String> {
        self.string("ProductVersion")
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .or_else(|| self.fixed.map(|fixed| format_version(fixed.product_version)))
    }
}

/// Walks type -> name -> language of the resource directory down to the first `RT_VERSION`
/// data entry.
fn version_block(file: &File) -> Result<Option<&[u8]>> {
    let Some((rva, size)) = file.data_directory(DataDirectoryType::ResourceTable) else {
        return Ok(None);
    };

    let start = file.rva_to_offset(rva as usize)?;
    let size = (size as usize).min(file.len().saturating_sub(start));
    let section = file.data_slice(start, size)?;

    let Some(names) = directory_entry(section, 0, Some(RT_VERSION))? else {
        return Ok(None);
    };
    let ResourceEntry::Directory(names) = names else {
        return Err(malformed_error!("RT_VERSION entry is not a directory"));
    };
    let Some(ResourceEntry::Directory(languages)) = directory_entry(section, names, None)? else {
        return Ok(None);
    };
    let Some(ResourceEntry::Data(data_entry)) = directory_entry(section, languages, None)? else {
        return Ok(None);
    };

    let mut offset = data_entry;
    let data_rva = read_le_at::<u32>(section, &mut offset)?;
    let data_size = read_le_at::<u32>(section, &mut offset)?;

    let data_start = file.rva_to_offset(data_rva as usize)?;
    file.data_slice(data_start, data_size as usize).map(Some)
}

enum ResourceEntry {
    Directory(usize),
    Data(usize),
}

/// Finds the entry with integer id `id` in the directory at `offset`, or the first entry when
/// `id` is `None`.
fn directory_entry(section: &[u8], offset: usize, id: Option<u32>) -> Result<Option<ResourceEntry>> {
    let mut cursor = offset + 12;
    let named = read_le_at::<u16>(section, &mut cursor)?;
    let ids = read_le_at::<u16>(section, &mut cursor)?;

    for _ in 0..(usize::from(named) + usize::from(ids)) {
        let name = read_le_at::<u32>(section, &mut cursor)?;
        let target = read_le_at::<u32>(section, &mut cursor)?;

        let matches = match id {
            Some(id) => name & 0x8000_0000 == 0 && name == id,
            None => true,
        };
        if !matches {
            continue;
        }

        let child = (target & 0x7FFF_FFFF) as usize;
        if child >= section.len() {
            return Err(out_of_bounds_error!());
        }

        return Ok(Some(if target & 0x8000_0000 != 0 {
            ResourceEntry::Directory(child)
        } else {
            ResourceEntry::Data(child)
        }));
    }

    Ok(None)
}

struct Node<'a> {
    key: String,
    value: &'a [u8],
    children_start: usize,
    end: usize,
}

impl<'a> Node<'a> {
    fn read(block: &'a [u8], offset: usize) -> Result<Node<'a>> {
        let mut cursor = offset;
        let length = usize::from(read_le_at::<u16>(block, &mut cursor)?);
        let value_length = usize::from(read_le_at::<u16>(block, &mut cursor)?);
        let value_type = read_le_at::<u16>(block, &mut cursor)?;

        let end = offset + length;
        if length < 6 || end > block.len() {
            return Err(malformed_error!(
                "Version node at {} has invalid length {}",
                offset,
                length
            ));
        }

        let (key, key_end) = read_key(block, cursor, end);

        let value_start = align4(key_end).min(end);
        let value_size = if value_type == 1 {
            value_length * 2
        } else {
            value_length
        };
        let value_end = (value_start + value_size).min(end);

        Ok(Node {
            key,
            value: &block[value_start..value_end],
            children_start: align4(value_end),
            end,
        })
    }

    fn children(&self, block: &'a [u8]) -> Result<Vec<Node<'a>>> {
        let mut children = Vec::new();
        let mut offset = self.children_start;

        while offset + 6 <= self.end {
            let child = Node::read(block, offset)?;
            if child.end <= offset {
                break;
            }
            offset = align4(child.end);
            children.push(child);
        }

        Ok(children)
    }
}

fn align4(value: usize) -> usize {
    (value + 3) & !3
}

/// Reads a NUL-terminated UTF-16 key starting at `start`, returning it and the offset after
/// the terminator.
fn read_key(block: &[u8], start: usize, end: usize) -> (String, usize) {
    let mut units = Vec::new();
    let mut offset = start;

    while offset + 2 <= end {
        let unit = u16::from_le_bytes([block[offset], block[offset + 1]]);
        offset += 2;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }

    (U16Str::from_slice(&units).to_string_lossy(), offset)
}

fn utf16_until_nul(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();

    U16Str::from_slice(&units).to_string_lossy()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{version_block as build_block, ImageBuilder};

    #[test]
    fn reads_strings_from_image() {
        let image = ImageBuilder::new("Versioned")
            .version_resource("1.2.3.4", "2.3.4.5")
            .build();
        let file = File::from_mem(image).unwrap();

        let info = VersionInfo::read(&file).unwrap().unwrap();
        assert_eq!(info.file_version().as_deref(), Some("1.2.3.4"));
        assert_eq!(info.product_version().as_deref(), Some("2.3.4.5"));
        assert_eq!(info.fixed.unwrap().file_version, [1, 2, 3, 4]);
    }

    #[test]
    fn native_image_versions() {
        let image = ImageBuilder::native("Native")
            .version_resource("10.0.19041.1", "10.0.19041.1")
            .build();
        let file = File::from_mem(image).unwrap();

        let info = VersionInfo::read(&file).unwrap().unwrap();
        assert_eq!(info.file_version().as_deref(), Some("10.0.19041.1"));
    }

    #[test]
    fn missing_resource() {
        let file = File::from_mem(ImageBuilder::new("Plain").build()).unwrap();
        assert!(VersionInfo::read(&file).unwrap().is_none());
    }

    #[test]
    fn fixed_info_fallback() {
        let block = build_block(None, None, [7, 0, 1, 2], [7, 0, 0, 0]);
        let info = VersionInfo::parse(&block).unwrap();

        assert!(info.strings.is_empty());
        assert_eq!(info.file_version().as_deref(), Some("7.0.1.2"));
        assert_eq!(info.product_version().as_deref(), Some("7.0.0.0"));
    }

    #[test]
    fn rejects_foreign_block() {
        let mut block = build_block(Some("1.0"), None, [1, 0, 0, 0], [1, 0, 0, 0]);
        // Corrupt the first key character: 'V' -> 'W'
        block[6] = b'W';
        assert!(VersionInfo::parse(&block).is_err());

        assert!(VersionInfo::parse(&[0x02, 0x00]).is_err());
    }
}
