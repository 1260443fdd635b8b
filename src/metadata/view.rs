//! Read-only view over the metadata of one managed module.
//!
//! [`AssemblyView`] locates the CLI header, the metadata root and the streams of a loaded
//! [`File`], then answers the identity questions a probe asks: the assembly's own name, the
//! names of the assemblies it references, its architecture and runtime version, and the
//! build attributes applied to the assembly.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotprobe::{file::File, metadata::AssemblyView};
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("MyApp.exe"))?;
//! let view = AssemblyView::new(&file)?;
//!
//! println!("{}", view.assembly_name()?);
//! for reference in view.references()? {
//!     println!("  -> {reference}");
//! }
//! # Ok::<(), dotprobe::Error>(())
//! ```

use crate::{
    file::File,
    metadata::{
        attributes::{
            decode_debuggable, decode_string_argument, DEBUGGABLE_NAME, DEBUGGABLE_NAMESPACE,
            TARGET_FRAMEWORK_NAME, TARGET_FRAMEWORK_NAMESPACE,
        },
        cor20header::Cor20Header,
        identity::{
            AssemblyName, AssemblyVersion, ProcessorArchitecture, PublicKeyToken,
            ASSEMBLY_FLAG_PUBLIC_KEY, ASSEMBLY_FLAG_RETARGETABLE,
        },
        root::Root,
        streams::{Blob, Strings},
        tables::{
            rows::{
                AssemblyRaw, AssemblyRefRaw, CustomAttributeRaw, MemberRefRaw, MethodDefRaw,
                TypeDefRaw, TypeRefRaw,
            },
            CodedIndex, TableId, TablesHeader,
        },
    },
    Error, Result,
};

/// Metadata of a managed module, borrowed from its [`File`].
pub struct AssemblyView<'a> {
    file: &'a File,
    cor20header: Cor20Header,
    root: Root,
    tables: TablesHeader<'a>,
    strings: Strings<'a>,
    blobs: Blob<'a>,
}

impl<'a> AssemblyView<'a> {
    /// Locates and parses the metadata of `file`.
    ///
    /// # Errors
    /// [`Error::NotSupported`] if the image has no CLR runtime header, [`Error::Malformed`]
    /// or [`Error::OutOfBounds`] if the header, the root or a required stream is damaged.
    pub fn new(file: &'a File) -> Result<AssemblyView<'a>> {
        let Some((clr_rva, clr_size)) = file.clr() else {
            return Err(Error::NotSupported);
        };

        let clr_offset = file.rva_to_offset(clr_rva)?;
        let cor20header = Cor20Header::read(file.data_slice(clr_offset, clr_size)?)?;

        let metadata_offset = file.rva_to_offset(cor20header.meta_data_rva as usize)?;
        let metadata = file.data_slice(metadata_offset, cor20header.meta_data_size as usize)?;
        let root = Root::read(metadata)?;

        let mut tables = None;
        let mut strings = None;
        let mut blobs = None;

        for stream in &root.stream_headers {
            let start = stream.offset as usize;
            let Some(stream_data) = metadata.get(start..start + stream.size as usize) else {
                return Err(out_of_bounds_error!());
            };

            match stream.name.as_str() {
                "#~" | "#-" => tables = Some(TablesHeader::from(stream_data)?),
                "#Strings" => strings = Some(Strings::from(stream_data)?),
                "#Blob" => blobs = Some(Blob::from(stream_data)?),
                _ => {}
            }
        }

        let (Some(tables), Some(strings), Some(blobs)) = (tables, strings, blobs) else {
            return Err(malformed_error!(
                "Metadata lacks one of the #~, #Strings or #Blob streams"
            ));
        };

        Ok(AssemblyView {
            file,
            cor20header,
            root,
            tables,
            strings,
            blobs,
        })
    }

    /// The CLI header.
    #[must_use]
    pub fn cor20header(&self) -> &Cor20Header {
        &self.cor20header
    }

    /// The metadata root.
    #[must_use]
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// The tables stream.
    #[must_use]
    pub fn tables(&self) -> &TablesHeader<'a> {
        &self.tables
    }

    /// The runtime version the module was built against, e.g. `v4.0.30319`.
    #[must_use]
    pub fn runtime_version(&self) -> &str {
        &self.root.version
    }

    /// The processor architecture, derived from the PE header and the CLI flags.
    #[must_use]
    pub fn architecture(&self) -> ProcessorArchitecture {
        ProcessorArchitecture::from_image(
            self.file.machine(),
            self.file.is_pe32_plus(),
            self.cor20header.flags,
        )
    }

    fn assembly_row(&self) -> Result<AssemblyRaw> {
        if self.tables.rows(TableId::Assembly) == 0 {
            return Err(Error::NotSupported);
        }

        AssemblyRaw::read(self.tables.row(TableId::Assembly, 1)?, self.tables.info())
    }

    /// The identity from the assembly manifest.
    ///
    /// # Errors
    /// [`Error::NotSupported`] for a module without a manifest (a netmodule).
    pub fn assembly_name(&self) -> Result<AssemblyName> {
        let row = self.assembly_row()?;

        let public_key = self.blobs.get(row.public_key)?;
        let token = (!public_key.is_empty()).then(|| PublicKeyToken::from_public_key(public_key));

        let mut name = AssemblyName::new(
            self.strings.get(row.name)?,
            AssemblyVersion::new(
                row.major_version,
                row.minor_version,
                row.build_number,
                row.revision_number,
            ),
            self.strings.get(row.culture)?,
            token,
        );
        name.retargetable = row.flags & ASSEMBLY_FLAG_RETARGETABLE != 0;

        Ok(name)
    }

    /// Display names of all referenced assemblies, in table order.
    ///
    /// # Errors
    /// Fails if an AssemblyRef row or one of its heap entries is damaged.
    pub fn references(&self) -> Result<Vec<String>> {
        let count = self.tables.rows(TableId::AssemblyRef);
        let mut references = Vec::with_capacity(count as usize);

        for index in 1..=count {
            let row = AssemblyRefRaw::read(
                self.tables.row(TableId::AssemblyRef, index)?,
                self.tables.info(),
            )?;

            let key_or_token = self.blobs.get(row.public_key_or_token)?;
            let mut name = AssemblyName::new(
                self.strings.get(row.name)?,
                AssemblyVersion::new(
                    row.major_version,
                    row.minor_version,
                    row.build_number,
                    row.revision_number,
                ),
                self.strings.get(row.culture)?,
                PublicKeyToken::from_blob(key_or_token, row.flags & ASSEMBLY_FLAG_PUBLIC_KEY != 0),
            );
            name.retargetable = row.flags & ASSEMBLY_FLAG_RETARGETABLE != 0;

            references.push(name.display_name());
        }

        Ok(references)
    }

    /// Whether the module was built for debugging, from its `DebuggableAttribute`.
    ///
    /// `None` if the assembly carries no such attribute.
    ///
    /// # Errors
    /// Fails if the attribute tables or the attribute value are damaged.
    pub fn debuggable(&self) -> Result<Option<bool>> {
        match self.assembly_attribute(DEBUGGABLE_NAMESPACE, DEBUGGABLE_NAME)? {
            Some((signature, value)) => Ok(Some(decode_debuggable(signature, value)?)),
            None => Ok(None),
        }
    }

    /// The framework moniker from the assembly's `TargetFrameworkAttribute`, e.g.
    /// `.NETFramework,Version=v4.7.2`.
    ///
    /// # Errors
    /// Fails if the attribute tables or the attribute value are damaged.
    pub fn target_framework(&self) -> Result<Option<String>> {
        match self.assembly_attribute(TARGET_FRAMEWORK_NAMESPACE, TARGET_FRAMEWORK_NAME)? {
            Some((_, value)) => decode_string_argument(value),
            None => Ok(None),
        }
    }

    /// Constructor signature and value blob of the first attribute of type
    /// `namespace.name` applied to the assembly.
    fn assembly_attribute(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<(&'a [u8], &'a [u8])>> {
        if self.tables.rows(TableId::Assembly) == 0 {
            return Ok(None);
        }

        let assembly = CodedIndex {
            table: TableId::Assembly,
            row: 1,
        };

        for index in 1..=self.tables.rows(TableId::CustomAttribute) {
            let row = CustomAttributeRaw::read(
                self.tables.row(TableId::CustomAttribute, index)?,
                self.tables.info(),
            )?;
            if row.parent != assembly {
                continue;
            }

            let Some((type_namespace, type_name, signature)) =
                self.constructor_type(row.constructor)?
            else {
                continue;
            };

            if type_namespace == namespace && type_name == name {
                return Ok(Some((
                    self.blobs.get(signature)?,
                    self.blobs.get(row.value)?,
                )));
            }
        }

        Ok(None)
    }

    /// Namespace, name and signature blob index of an attribute constructor's declaring type.
    fn constructor_type(&self, ctor: CodedIndex) -> Result<Option<(&'a str, &'a str, usize)>> {
        match ctor.table {
            TableId::MemberRef => {
                let member = MemberRefRaw::read(
                    self.tables.row(TableId::MemberRef, ctor.row)?,
                    self.tables.info(),
                )?;
                Ok(self
                    .type_name(member.class)?
                    .map(|(namespace, name)| (namespace, name, member.signature)))
            }
            TableId::MethodDef => {
                let method = MethodDefRaw::read(
                    self.tables.row(TableId::MethodDef, ctor.row)?,
                    self.tables.info(),
                )?;
                let Some(owner) = self.method_owner(ctor.row)? else {
                    return Ok(None);
                };
                Ok(self
                    .type_name(owner)?
                    .map(|(namespace, name)| (namespace, name, method.signature)))
            }
            _ => Ok(None),
        }
    }

    fn type_name(&self, index: CodedIndex) -> Result<Option<(&'a str, &'a str)>> {
        match index.table {
            TableId::TypeRef => {
                let row = TypeRefRaw::read(
                    self.tables.row(TableId::TypeRef, index.row)?,
                    self.tables.info(),
                )?;
                Ok(Some((
                    self.strings.get(row.type_namespace)?,
                    self.strings.get(row.type_name)?,
                )))
            }
            TableId::TypeDef => {
                let row = TypeDefRaw::read(
                    self.tables.row(TableId::TypeDef, index.row)?,
                    self.tables.info(),
                )?;
                Ok(Some((
                    self.strings.get(row.type_namespace)?,
                    self.strings.get(row.type_name)?,
                )))
            }
            _ => Ok(None),
        }
    }

    /// The TypeDef whose method list contains MethodDef `method`.
    fn method_owner(&self, method: u32) -> Result<Option<CodedIndex>> {
        let mut owner = None;
        for index in 1..=self.tables.rows(TableId::TypeDef) {
            let row = TypeDefRaw::read(
                self.tables.row(TableId::TypeDef, index)?,
                self.tables.info(),
            )?;
            if row.method_list == 0 || row.method_list > method {
                break;
            }
            owner = Some(CodedIndex {
                table: TableId::TypeDef,
                row: index,
            });
        }

        Ok(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::ImageBuilder;

    fn load(builder: &ImageBuilder) -> File {
        File::from_mem(builder.build()).unwrap()
    }

    #[test]
    fn minimal_assembly() {
        let file = load(&ImageBuilder::new("Sample"));
        let view = AssemblyView::new(&file).unwrap();

        assert_eq!(
            view.assembly_name().unwrap().display_name(),
            "Sample, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null"
        );
        assert_eq!(view.runtime_version(), "v4.0.30319");
        assert_eq!(view.architecture(), ProcessorArchitecture::MSIL);
        assert!(view.references().unwrap().is_empty());
        assert_eq!(view.debuggable().unwrap(), None);
        assert_eq!(view.target_framework().unwrap(), None);
    }

    #[test]
    fn identity_and_references() {
        let file = load(
            &ImageBuilder::new("App")
                .version(2, 1, 0, 7)
                .public_key(&[0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0])
                .reference("mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089")
                .reference("Dep, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null"),
        );
        let view = AssemblyView::new(&file).unwrap();

        assert_eq!(
            view.assembly_name().unwrap().display_name(),
            "App, Version=2.1.0.7, Culture=neutral, PublicKeyToken=b77a5c561934e089"
        );
        assert_eq!(
            view.references().unwrap(),
            vec![
                "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"
                    .to_string(),
                "Dep, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null".to_string(),
            ]
        );
    }

    #[test]
    fn build_attributes() {
        let file = load(
            &ImageBuilder::new("Debug")
                .debuggable_flags(true, false)
                .target_framework(".NETFramework,Version=v4.7.2"),
        );
        let view = AssemblyView::new(&file).unwrap();
        assert_eq!(view.debuggable().unwrap(), Some(true));
        assert_eq!(
            view.target_framework().unwrap().as_deref(),
            Some(".NETFramework,Version=v4.7.2")
        );

        let file = load(&ImageBuilder::new("Release").debuggable_modes(0x2));
        let view = AssemblyView::new(&file).unwrap();
        assert_eq!(view.debuggable().unwrap(), Some(false));
    }

    #[test]
    fn architectures() {
        let file = load(&ImageBuilder::new("Wide").amd64());
        assert_eq!(
            AssemblyView::new(&file).unwrap().architecture(),
            ProcessorArchitecture::Amd64
        );

        let file = load(&ImageBuilder::new("Narrow").requires_32bit());
        assert_eq!(
            AssemblyView::new(&file).unwrap().architecture(),
            ProcessorArchitecture::X86
        );
    }

    #[test]
    fn native_image() {
        let file = load(&ImageBuilder::native("Native"));
        assert!(matches!(AssemblyView::new(&file), Err(Error::NotSupported)));
    }

    #[test]
    fn module_without_manifest() {
        let file = load(&ImageBuilder::new("Module").without_manifest());
        let view = AssemblyView::new(&file).unwrap();
        assert!(matches!(view.assembly_name(), Err(Error::NotSupported)));
        assert_eq!(view.debuggable().unwrap(), None);
    }
}
