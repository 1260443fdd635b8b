use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::{
    file::io::{read_le, read_le_at, read_le_at_dyn},
    Result,
};

/// Identifiers of the ECMA-335 metadata tables, numbered as in the `valid` bit vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
#[allow(missing_docs)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRVA = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOS = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOS = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// Size in bytes of one row of this table under the index widths of `info`.
    #[must_use]
    pub fn row_size(self, info: &TableInfo) -> usize {
        let s = info.str_bytes();
        let g = info.guid_bytes();
        let b = info.blob_bytes();
        let t = |table: TableId| info.table_index_bytes(table);
        let c = |coded: CodedIndexType| info.coded_index_bytes(coded);

        match self {
            TableId::Module => 2 + s + g * 3,
            TableId::TypeRef => c(CodedIndexType::ResolutionScope) + s * 2,
            TableId::TypeDef => {
                4 + s * 2
                    + c(CodedIndexType::TypeDefOrRef)
                    + t(TableId::Field)
                    + t(TableId::MethodDef)
            }
            TableId::FieldPtr => t(TableId::Field),
            TableId::Field => 2 + s + b,
            TableId::MethodPtr => t(TableId::MethodDef),
            TableId::MethodDef => 4 + 2 + 2 + s + b + t(TableId::Param),
            TableId::ParamPtr => t(TableId::Param),
            TableId::Param => 2 + 2 + s,
            TableId::InterfaceImpl => t(TableId::TypeDef) + c(CodedIndexType::TypeDefOrRef),
            TableId::MemberRef => c(CodedIndexType::MemberRefParent) + s + b,
            TableId::Constant => 1 + 1 + c(CodedIndexType::HasConstant) + b,
            TableId::CustomAttribute => {
                c(CodedIndexType::HasCustomAttribute) + c(CodedIndexType::CustomAttributeType) + b
            }
            TableId::FieldMarshal => c(CodedIndexType::HasFieldMarshal) + b,
            TableId::DeclSecurity => 2 + c(CodedIndexType::HasDeclSecurity) + b,
            TableId::ClassLayout => 2 + 4 + t(TableId::TypeDef),
            TableId::FieldLayout => 4 + t(TableId::Field),
            TableId::StandAloneSig => b,
            TableId::EventMap => t(TableId::TypeDef) + t(TableId::Event),
            TableId::EventPtr => t(TableId::Event),
            TableId::Event => 2 + s + c(CodedIndexType::TypeDefOrRef),
            TableId::PropertyMap => t(TableId::TypeDef) + t(TableId::Property),
            TableId::PropertyPtr => t(TableId::Property),
            TableId::Property => 2 + s + b,
            TableId::MethodSemantics => {
                2 + t(TableId::MethodDef) + c(CodedIndexType::HasSemantics)
            }
            TableId::MethodImpl => t(TableId::TypeDef) + c(CodedIndexType::MethodDefOrRef) * 2,
            TableId::ModuleRef => s,
            TableId::TypeSpec => b,
            TableId::ImplMap => {
                2 + c(CodedIndexType::MemberForwarded) + s + t(TableId::ModuleRef)
            }
            TableId::FieldRVA => 4 + t(TableId::Field),
            TableId::EncLog => 8,
            TableId::EncMap => 4,
            TableId::Assembly => 4 + 2 * 4 + 4 + b + s * 2,
            TableId::AssemblyProcessor => 4,
            TableId::AssemblyOS => 12,
            TableId::AssemblyRef => 2 * 4 + 4 + b + s * 2 + b,
            TableId::AssemblyRefProcessor => 4 + t(TableId::AssemblyRef),
            TableId::AssemblyRefOS => 12 + t(TableId::AssemblyRef),
            TableId::File => 4 + s + b,
            TableId::ExportedType => 4 + 4 + s * 2 + c(CodedIndexType::Implementation),
            TableId::ManifestResource => 4 + 4 + s + c(CodedIndexType::Implementation),
            TableId::NestedClass => t(TableId::TypeDef) * 2,
            TableId::GenericParam => 2 + 2 + c(CodedIndexType::TypeOrMethodDef) + s,
            TableId::MethodSpec => c(CodedIndexType::MethodDefOrRef) + b,
            TableId::GenericParamConstraint => {
                t(TableId::GenericParam) + c(CodedIndexType::TypeDefOrRef)
            }
        }
    }

    fn from_bit(bit: usize) -> Option<TableId> {
        TableId::iter().find(|table| *table as usize == bit)
    }
}

/// The kinds of coded index (ECMA-335 II.24.2.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCount)]
#[allow(missing_docs)]
pub enum CodedIndexType {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// Target tables by tag value. Unused tags are `None`.
    #[must_use]
    pub fn tables(self) -> &'static [Option<TableId>] {
        match self {
            CodedIndexType::TypeDefOrRef => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasConstant => &[
                Some(TableId::Field),
                Some(TableId::Param),
                Some(TableId::Property),
            ],
            CodedIndexType::HasCustomAttribute => &[
                Some(TableId::MethodDef),
                Some(TableId::Field),
                Some(TableId::TypeRef),
                Some(TableId::TypeDef),
                Some(TableId::Param),
                Some(TableId::InterfaceImpl),
                Some(TableId::MemberRef),
                Some(TableId::Module),
                Some(TableId::DeclSecurity),
                Some(TableId::Property),
                Some(TableId::Event),
                Some(TableId::StandAloneSig),
                Some(TableId::ModuleRef),
                Some(TableId::TypeSpec),
                Some(TableId::Assembly),
                Some(TableId::AssemblyRef),
                Some(TableId::File),
                Some(TableId::ExportedType),
                Some(TableId::ManifestResource),
                Some(TableId::GenericParam),
                Some(TableId::GenericParamConstraint),
                Some(TableId::MethodSpec),
            ],
            CodedIndexType::HasFieldMarshal => &[Some(TableId::Field), Some(TableId::Param)],
            CodedIndexType::HasDeclSecurity => &[
                Some(TableId::TypeDef),
                Some(TableId::MethodDef),
                Some(TableId::Assembly),
            ],
            CodedIndexType::MemberRefParent => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::ModuleRef),
                Some(TableId::MethodDef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasSemantics => &[Some(TableId::Event), Some(TableId::Property)],
            CodedIndexType::MethodDefOrRef => {
                &[Some(TableId::MethodDef), Some(TableId::MemberRef)]
            }
            CodedIndexType::MemberForwarded => &[Some(TableId::Field), Some(TableId::MethodDef)],
            CodedIndexType::Implementation => &[
                Some(TableId::File),
                Some(TableId::AssemblyRef),
                Some(TableId::ExportedType),
            ],
            CodedIndexType::CustomAttributeType => &[
                None,
                None,
                Some(TableId::MethodDef),
                Some(TableId::MemberRef),
                None,
            ],
            CodedIndexType::ResolutionScope => &[
                Some(TableId::Module),
                Some(TableId::ModuleRef),
                Some(TableId::AssemblyRef),
                Some(TableId::TypeRef),
            ],
            CodedIndexType::TypeOrMethodDef => &[Some(TableId::TypeDef), Some(TableId::MethodDef)],
        }
    }

    /// Number of low bits used for the tag.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn tag_bits(self) -> u8 {
        let count = self.tables().len() as u32;
        (u32::BITS - (count - 1).leading_zeros()) as u8
    }
}

/// A decoded coded index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodedIndex {
    /// The table the index points into
    pub table: TableId,
    /// The 1-based row, 0 for a null reference
    pub row: u32,
}

/// Row count and index width of one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableRowInfo {
    /// Number of rows
    pub rows: u32,
    /// Bits needed to address a row
    pub bits: u8,
}

impl TableRowInfo {
    /// Derives the addressing width of a table with `rows` rows.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            (32 - rows.leading_zeros()) as u8
        };

        TableRowInfo { rows, bits }
    }
}

/// Row counts and index widths of a tables stream.
#[derive(Debug, Clone, Default)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_indexes: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
    rows_offset: usize,
}

impl TableInfo {
    /// Reads the tables stream header: heap size flags, `valid` bit vector and row counts.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] on a truncated header and [`crate::Error::NotSupported`]
    /// if the stream declares a table outside ECMA-335 (such as portable PDB tables).
    pub fn new(data: &[u8]) -> Result<Self> {
        if data.len() < 24 {
            return Err(out_of_bounds_error!());
        }

        let heap_size_flags = read_le::<u8>(&data[6..])?;
        let valid_bitvec = read_le::<u64>(&data[8..])?;

        let mut rows = vec![TableRowInfo::default(); TableId::COUNT];
        let mut offset = 24;
        for bit in 0..64 {
            if valid_bitvec & (1 << bit) == 0 {
                continue;
            }

            let Some(table_id) = TableId::from_bit(bit) else {
                return Err(crate::Error::NotSupported);
            };

            let row_count = read_le_at::<u32>(data, &mut offset)?;
            rows[table_id as usize] = TableRowInfo::new(row_count);
        }

        // Uncompressed (#-) streams may carry an extra 4 bytes after the row counts
        if heap_size_flags & 0x40 != 0 {
            offset += 4;
        }

        let mut info = TableInfo {
            rows,
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: heap_size_flags & 1 == 1,
            is_large_index_guid: heap_size_flags & 2 == 2,
            is_large_index_blob: heap_size_flags & 4 == 4,
            rows_offset: offset,
        };
        info.calculate_coded_index_bits();

        Ok(info)
    }

    #[cfg(test)]
    pub(crate) fn new_test(valid_tables: &[(TableId, u32)], large_heaps: bool) -> Self {
        let mut info = TableInfo {
            rows: vec![TableRowInfo::default(); TableId::COUNT],
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: large_heaps,
            is_large_index_guid: large_heaps,
            is_large_index_blob: large_heaps,
            rows_offset: 0,
        };

        for (table, rows) in valid_tables {
            info.rows[*table as usize] = TableRowInfo::new(*rows);
        }

        info.calculate_coded_index_bits();
        info
    }

    fn calculate_coded_index_bits(&mut self) {
        for coded_index in CodedIndexType::iter() {
            let max_bits = coded_index
                .tables()
                .iter()
                .flatten()
                .map(|table| self.rows[*table as usize].bits)
                .max()
                .unwrap_or(1);

            self.coded_indexes[coded_index as usize] = max_bits + coded_index.tag_bits();
        }
    }

    /// Offset of the first row of the first table, relative to the stream start.
    #[must_use]
    pub fn rows_offset(&self) -> usize {
        self.rows_offset
    }

    /// Row information of `table`.
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Width of `#Strings` indexes.
    #[must_use]
    pub fn str_bytes(&self) -> usize {
        if self.is_large_index_str {
            4
        } else {
            2
        }
    }

    /// Width of `#GUID` indexes.
    #[must_use]
    pub fn guid_bytes(&self) -> usize {
        if self.is_large_index_guid {
            4
        } else {
            2
        }
    }

    /// Width of `#Blob` indexes.
    #[must_use]
    pub fn blob_bytes(&self) -> usize {
        if self.is_large_index_blob {
            4
        } else {
            2
        }
    }

    /// Width of a simple index into `table`.
    #[must_use]
    pub fn table_index_bytes(&self, table: TableId) -> usize {
        if self.rows[table as usize].bits > 16 {
            4
        } else {
            2
        }
    }

    /// Width of a coded index of kind `coded_index`.
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index: CodedIndexType) -> usize {
        if self.coded_indexes[coded_index as usize] > 16 {
            4
        } else {
            2
        }
    }

    /// Reads a `#Strings` index at `offset`.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] if the read leaves `data`.
    pub fn read_str(&self, data: &[u8], offset: &mut usize) -> Result<usize> {
        Ok(read_le_at_dyn(data, offset, self.is_large_index_str)? as usize)
    }

    /// Reads a `#Blob` index at `offset`.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] if the read leaves `data`.
    pub fn read_blob(&self, data: &[u8], offset: &mut usize) -> Result<usize> {
        Ok(read_le_at_dyn(data, offset, self.is_large_index_blob)? as usize)
    }

    /// Reads a simple index into `table` at `offset`.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] if the read leaves `data`.
    pub fn read_index(&self, data: &[u8], offset: &mut usize, table: TableId) -> Result<u32> {
        read_le_at_dyn(data, offset, self.table_index_bytes(table) == 4)
    }

    /// Reads and decodes a coded index at `offset`.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] if the read leaves `data`, [`crate::Error::Malformed`]
    /// for a tag that maps to no table.
    pub fn read_coded(
        &self,
        data: &[u8],
        offset: &mut usize,
        coded_index: CodedIndexType,
    ) -> Result<CodedIndex> {
        let value = read_le_at_dyn(data, offset, self.coded_index_bytes(coded_index) == 4)?;
        Self::decode(value, coded_index)
    }

    /// Splits a raw coded index value into table and row.
    ///
    /// # Errors
    /// [`crate::Error::Malformed`] for a tag that maps to no table.
    pub fn decode(value: u32, coded_index: CodedIndexType) -> Result<CodedIndex> {
        let tag_bits = coded_index.tag_bits();
        let tag = (value & ((1 << tag_bits) - 1)) as usize;

        match coded_index.tables().get(tag) {
            Some(Some(table)) => Ok(CodedIndex {
                table: *table,
                row: value >> tag_bits,
            }),
            _ => Err(malformed_error!(
                "Invalid tag {} for coded index {:?}",
                tag,
                coded_index
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_bits() {
        assert_eq!(CodedIndexType::TypeDefOrRef.tag_bits(), 2);
        assert_eq!(CodedIndexType::HasCustomAttribute.tag_bits(), 5);
        assert_eq!(CodedIndexType::CustomAttributeType.tag_bits(), 3);
        assert_eq!(CodedIndexType::MemberRefParent.tag_bits(), 3);
        assert_eq!(CodedIndexType::HasFieldMarshal.tag_bits(), 1);
        assert_eq!(CodedIndexType::ResolutionScope.tag_bits(), 2);
    }

    #[test]
    fn small_row_sizes() {
        let info = TableInfo::new_test(&[(TableId::Assembly, 1), (TableId::AssemblyRef, 3)], false);

        assert_eq!(TableId::Module.row_size(&info), 10);
        assert_eq!(TableId::TypeRef.row_size(&info), 6);
        assert_eq!(TableId::TypeDef.row_size(&info), 14);
        assert_eq!(TableId::MethodDef.row_size(&info), 14);
        assert_eq!(TableId::MemberRef.row_size(&info), 6);
        assert_eq!(TableId::CustomAttribute.row_size(&info), 6);
        assert_eq!(TableId::Assembly.row_size(&info), 22);
        assert_eq!(TableId::AssemblyRef.row_size(&info), 20);
    }

    #[test]
    fn large_indexes() {
        let info = TableInfo::new_test(&[(TableId::MethodDef, 0x1_0000), (TableId::MemberRef, 0x2000)], true);

        assert_eq!(info.table_index_bytes(TableId::MethodDef), 4);
        assert_eq!(info.table_index_bytes(TableId::TypeDef), 2);
        assert_eq!(info.coded_index_bytes(CodedIndexType::HasCustomAttribute), 4);
        assert_eq!(info.coded_index_bytes(CodedIndexType::TypeDefOrRef), 2);
        assert_eq!(TableId::Assembly.row_size(&info), 4 + 8 + 4 + 4 + 8);
    }

    #[test]
    fn decode_coded_index() {
        let assembly = TableInfo::decode((1 << 5) | 14, CodedIndexType::HasCustomAttribute).unwrap();
        assert_eq!(assembly.table, TableId::Assembly);
        assert_eq!(assembly.row, 1);

        let member_ref = TableInfo::decode((7 << 3) | 3, CodedIndexType::CustomAttributeType).unwrap();
        assert_eq!(member_ref.table, TableId::MemberRef);
        assert_eq!(member_ref.row, 7);

        assert!(TableInfo::decode(1, CodedIndexType::CustomAttributeType).is_err());
    }

    #[test]
    fn reads_stream_header() {
        #[rustfmt::skip]
        let mut data = vec![
            0, 0, 0, 0,             // reserved
            2, 0,                   // major, minor
            0x05,                   // large strings and blobs
            1,                      // reserved
        ];
        let valid: u64 = (1 << 0x00) | (1 << 0x20) | (1 << 0x23);
        data.extend_from_slice(&valid.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&4u32.to_le_bytes());

        let info = TableInfo::new(&data).unwrap();
        assert_eq!(info.get(TableId::Module).rows, 1);
        assert_eq!(info.get(TableId::AssemblyRef).rows, 4);
        assert_eq!(info.get(TableId::TypeDef).rows, 0);
        assert_eq!(info.str_bytes(), 4);
        assert_eq!(info.guid_bytes(), 2);
        assert_eq!(info.blob_bytes(), 4);
        assert_eq!(info.rows_offset(), 36);
    }

    #[test]
    fn rejects_unknown_tables() {
        let mut data = vec![0, 0, 0, 0, 2, 0, 0, 1];
        data.extend_from_slice(&(1u64 << 0x30).to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());

        assert!(matches!(TableInfo::new(&data), Err(crate::Error::NotSupported)));
    }
}
