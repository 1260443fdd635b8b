//! Raw rows of the tables identity extraction decodes.
//!
//! Heap references stay as indexes; resolving them against `#Strings` / `#Blob` is the
//! caller's job (see [`crate::metadata::AssemblyView`]).

use crate::{
    file::io::read_le_at,
    metadata::tables::{CodedIndex, CodedIndexType, TableId, TableInfo},
    Result,
};

/// A row of the TypeRef table (0x01).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRefRaw {
    /// ResolutionScope coded index
    pub resolution_scope: CodedIndex,
    /// `#Strings` index of the type name
    pub type_name: usize,
    /// `#Strings` index of the namespace
    pub type_namespace: usize,
}

impl TypeRefRaw {
    /// Decodes one row.
    ///
    /// # Errors
    /// Fails if `data` is shorter than the row.
    pub fn read(data: &[u8], info: &TableInfo) -> Result<Self> {
        let mut offset = 0;
        Ok(TypeRefRaw {
            resolution_scope: info.read_coded(data, &mut offset, CodedIndexType::ResolutionScope)?,
            type_name: info.read_str(data, &mut offset)?,
            type_namespace: info.read_str(data, &mut offset)?,
        })
    }
}

/// A row of the TypeDef table (0x02).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefRaw {
    /// `TypeAttributes`
    pub flags: u32,
    /// `#Strings` index of the type name
    pub type_name: usize,
    /// `#Strings` index of the namespace
    pub type_namespace: usize,
    /// Base type
    pub extends: CodedIndex,
    /// First row of this type's fields
    pub field_list: u32,
    /// First row of this type's methods
    pub method_list: u32,
}

impl TypeDefRaw {
    /// Decodes one row.
    ///
    /// # Errors
    /// Fails if `data` is shorter than the row.
    pub fn read(data: &[u8], info: &TableInfo) -> Result<Self> {
        let mut offset = 0;
        Ok(TypeDefRaw {
            flags: read_le_at::<u32>(data, &mut offset)?,
            type_name: info.read_str(data, &mut offset)?,
            type_namespace: info.read_str(data, &mut offset)?,
            extends: info.read_coded(data, &mut offset, CodedIndexType::TypeDefOrRef)?,
            field_list: info.read_index(data, &mut offset, TableId::Field)?,
            method_list: info.read_index(data, &mut offset, TableId::MethodDef)?,
        })
    }
}

/// A row of the MethodDef table (0x06).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDefRaw {
    /// RVA of the method body
    pub rva: u32,
    /// `MethodImplAttributes`
    pub impl_flags: u16,
    /// `MethodAttributes`
    pub flags: u16,
    /// `#Strings` index of the method name
    pub name: usize,
    /// `#Blob` index of the method signature
    pub signature: usize,
    /// First row of this method's parameters
    pub param_list: u32,
}

impl MethodDefRaw {
    /// Decodes one row.
    ///
    /// # Errors
    /// Fails if `data` is shorter than the row.
    pub fn read(data: &[u8], info: &TableInfo) -> Result<Self> {
        let mut offset = 0;
        Ok(MethodDefRaw {
            rva: read_le_at::<u32>(data, &mut offset)?,
            impl_flags: read_le_at::<u16>(data, &mut offset)?,
            flags: read_le_at::<u16>(data, &mut offset)?,
            name: info.read_str(data, &mut offset)?,
            signature: info.read_blob(data, &mut offset)?,
            param_list: info.read_index(data, &mut offset, TableId::Param)?,
        })
    }
}

/// A row of the MemberRef table (0x0A).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRefRaw {
    /// MemberRefParent coded index
    pub class: CodedIndex,
    /// `#Strings` index of the member name
    pub name: usize,
    /// `#Blob` index of the member signature
    pub signature: usize,
}

impl MemberRefRaw {
    /// Decodes one row.
    ///
    /// # Errors
    /// Fails if `data` is shorter than the row.
    pub fn read(data: &[u8], info: &TableInfo) -> Result<Self> {
        let mut offset = 0;
        Ok(MemberRefRaw {
            class: info.read_coded(data, &mut offset, CodedIndexType::MemberRefParent)?,
            name: info.read_str(data, &mut offset)?,
            signature: info.read_blob(data, &mut offset)?,
        })
    }
}

/// A row of the CustomAttribute table (0x0C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAttributeRaw {
    /// HasCustomAttribute coded index of the owner
    pub parent: CodedIndex,
    /// CustomAttributeType coded index of the constructor
    pub constructor: CodedIndex,
    /// `#Blob` index of the encoded arguments
    pub value: usize,
}

impl CustomAttributeRaw {
    /// Decodes one row.
    ///
    /// # Errors
    /// Fails if `data` is shorter than the row or a coded index carries an invalid tag.
    pub fn read(data: &[u8], info: &TableInfo) -> Result<Self> {
        let mut offset = 0;
        Ok(CustomAttributeRaw {
            parent: info.read_coded(data, &mut offset, CodedIndexType::HasCustomAttribute)?,
            constructor: info.read_coded(data, &mut offset, CodedIndexType::CustomAttributeType)?,
            value: info.read_blob(data, &mut offset)?,
        })
    }
}

/// A row of the Assembly table (0x20), the manifest of the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRaw {
    /// `AssemblyHashAlgorithm`
    pub hash_alg_id: u32,
    /// Version major
    pub major_version: u16,
    /// Version minor
    pub minor_version: u16,
    /// Version build
    pub build_number: u16,
    /// Version revision
    pub revision_number: u16,
    /// `AssemblyFlags`
    pub flags: u32,
    /// `#Blob` index of the full public key
    pub public_key: usize,
    /// `#Strings` index of the simple name
    pub name: usize,
    /// `#Strings` index of the culture
    pub culture: usize,
}

impl AssemblyRaw {
    /// Decodes one row.
    ///
    /// # Errors
    /// Fails if `data` is shorter than the row.
    pub fn read(data: &[u8], info: &TableInfo) -> Result<Self> {
        let mut offset = 0;
        Ok(AssemblyRaw {
            hash_alg_id: read_le_at::<u32>(data, &mut offset)?,
            major_version: read_le_at::<u16>(data, &mut offset)?,
            minor_version: read_le_at::<u16>(data, &mut offset)?,
            build_number: read_le_at::<u16>(data, &mut offset)?,
            revision_number: read_le_at::<u16>(data, &mut offset)?,
            flags: read_le_at::<u32>(data, &mut offset)?,
            public_key: info.read_blob(data, &mut offset)?,
            name: info.read_str(data, &mut offset)?,
            culture: info.read_str(data, &mut offset)?,
        })
    }
}

/// A row of the AssemblyRef table (0x23).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRefRaw {
    /// Version major
    pub major_version: u16,
    /// Version minor
    pub minor_version: u16,
    /// Version build
    pub build_number: u16,
    /// Version revision
    pub revision_number: u16,
    /// `AssemblyFlags`; `PublicKey` set means the blob holds a full key instead of a token
    pub flags: u32,
    /// `#Blob` index of the public key or token
    pub public_key_or_token: usize,
    /// `#Strings` index of the simple name
    pub name: usize,
    /// `#Strings` index of the culture
    pub culture: usize,
    /// `#Blob` index of the hash value
    pub hash_value: usize,
}

impl AssemblyRefRaw {
    /// Decodes one row.
    ///
    /// # Errors
    /// Fails if `data` is shorter than the row.
    pub fn read(data: &[u8], info: &TableInfo) -> Result<Self> {
        let mut offset = 0;
        Ok(AssemblyRefRaw {
            major_version: read_le_at::<u16>(data, &mut offset)?,
            minor_version: read_le_at::<u16>(data, &mut offset)?,
            build_number: read_le_at::<u16>(data, &mut offset)?,
            revision_number: read_le_at::<u16>(data, &mut offset)?,
            flags: read_le_at::<u32>(data, &mut offset)?,
            public_key_or_token: info.read_blob(data, &mut offset)?,
            name: info.read_str(data, &mut offset)?,
            culture: info.read_str(data, &mut offset)?,
            hash_value: info.read_blob(data, &mut offset)?,
        })
    }
}
