//! Fixture images for the integration tests.
//!
//! Writes minimal IL-only PE32 assemblies: a `.text` section with the CLI header and a
//! metadata block holding the Module, TypeDef, AssemblyRef and Assembly tables.

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use dotprobe::metadata::identity::AssemblyName;

const PE_OFFSET: usize = 0x80;
const FILE_ALIGNMENT: u32 = 0x200;
const SECTION_ALIGNMENT: u32 = 0x1000;
const TEXT_RVA: u32 = 0x2000;
const CLI_HEADER_SIZE: u32 = 72;

const TABLE_MODULE: u8 = 0x00;
const TABLE_TYPEDEF: u8 = 0x02;
const TABLE_ASSEMBLY: u8 = 0x20;
const TABLE_ASSEMBLYREF: u8 = 0x23;

fn put16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn align(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) & !(alignment - 1)
}

fn pad4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

/// A managed assembly to write to disk.
pub struct Assembly {
    name: String,
    version: [u16; 4],
    references: Vec<String>,
}

impl Assembly {
    pub fn new(name: &str) -> Self {
        Assembly {
            name: name.to_string(),
            version: [1, 0, 0, 0],
            references: Vec::new(),
        }
    }

    pub fn version(mut self, major: u16, minor: u16, build: u16, revision: u16) -> Self {
        self.version = [major, minor, build, revision];
        self
    }

    pub fn reference(mut self, display_name: &str) -> Self {
        self.references.push(display_name.to_string());
        self
    }

    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(file_name);
        std::fs::write(&path, self.image()).unwrap();
        path
    }

    fn image(&self) -> Vec<u8> {
        let metadata = self.metadata();

        let mut text = vec![0u8; 8];
        put32(&mut text, CLI_HEADER_SIZE);
        put16(&mut text, 2);
        put16(&mut text, 5);
        put32(&mut text, TEXT_RVA + 8 + CLI_HEADER_SIZE);
        put32(&mut text, metadata.len() as u32);
        put32(&mut text, 1);
        put32(&mut text, 0);
        text.extend_from_slice(&[0u8; 48]);
        text.extend_from_slice(&metadata);

        let raw_size = align(text.len() as u32, FILE_ALIGNMENT);

        let mut image = vec![0u8; PE_OFFSET];
        image[0..2].copy_from_slice(b"MZ");
        image[0x3C..0x40].copy_from_slice(&(PE_OFFSET as u32).to_le_bytes());

        image.extend_from_slice(b"PE\0\0");
        put16(&mut image, 0x14C);
        put16(&mut image, 1);
        put32(&mut image, 0);
        put32(&mut image, 0);
        put32(&mut image, 0);
        put16(&mut image, 224);
        put16(&mut image, 0x2102);

        put16(&mut image, 0x10B);
        image.push(11);
        image.push(0);
        put32(&mut image, raw_size);
        put32(&mut image, 0);
        put32(&mut image, 0);
        put32(&mut image, 0);
        put32(&mut image, TEXT_RVA);
        put32(&mut image, 0);
        put32(&mut image, 0x1000_0000);
        put32(&mut image, SECTION_ALIGNMENT);
        put32(&mut image, FILE_ALIGNMENT);
        for value in [4, 0, 0, 0, 4, 0] {
            put16(&mut image, value);
        }
        put32(&mut image, 0);
        put32(&mut image, align(TEXT_RVA + text.len() as u32, SECTION_ALIGNMENT));
        put32(&mut image, FILE_ALIGNMENT);
        put32(&mut image, 0);
        put16(&mut image, 3);
        put16(&mut image, 0x8540);
        for value in [0x10_0000, 0x1000, 0x10_0000, 0x1000] {
            put32(&mut image, value);
        }
        put32(&mut image, 0);
        put32(&mut image, 16);
        for index in 0..16 {
            if index == 14 {
                put32(&mut image, TEXT_RVA + 8);
                put32(&mut image, CLI_HEADER_SIZE);
            } else {
                put64(&mut image, 0);
            }
        }

        image.extend_from_slice(b".text\0\0\0");
        put32(&mut image, text.len() as u32);
        put32(&mut image, TEXT_RVA);
        put32(&mut image, raw_size);
        put32(&mut image, FILE_ALIGNMENT);
        put32(&mut image, 0);
        put32(&mut image, 0);
        put32(&mut image, 0);
        put32(&mut image, 0x6000_0020);

        image.resize(FILE_ALIGNMENT as usize, 0);
        image.extend_from_slice(&text);
        image.resize((FILE_ALIGNMENT + raw_size) as usize, 0);
        image
    }

    fn metadata(&self) -> Vec<u8> {
        let mut strings = Strings::default();
        let mut blobs = vec![0u8];
        let mut tables: BTreeMap<u8, (u32, Vec<u8>)> = BTreeMap::new();
        let mut push = |table: u8, row: Vec<u8>| {
            let entry = tables.entry(table).or_default();
            entry.0 += 1;
            entry.1.extend_from_slice(&row);
        };

        let mut module = Vec::new();
        put16(&mut module, 0);
        put16(&mut module, strings.add(&format!("{}.dll", self.name)));
        put16(&mut module, 1);
        put16(&mut module, 0);
        put16(&mut module, 0);
        push(TABLE_MODULE, module);

        let mut type_def = Vec::new();
        put32(&mut type_def, 0);
        put16(&mut type_def, strings.add("<Module>"));
        put16(&mut type_def, 0);
        put16(&mut type_def, 0);
        put16(&mut type_def, 1);
        put16(&mut type_def, 1);
        push(TABLE_TYPEDEF, type_def);

        for reference in &self.references {
            let name = AssemblyName::parse(reference).unwrap();
            let version = name.version.unwrap_or_default();

            let mut row = Vec::new();
            for part in [version.major, version.minor, version.build, version.revision] {
                put16(&mut row, part);
            }
            put32(&mut row, 0);
            let token = match name.public_key_token.flatten() {
                Some(token) => {
                    let index = blobs.len() as u16;
                    blobs.push(8);
                    blobs.extend_from_slice(&token.0);
                    index
                }
                None => 0,
            };
            put16(&mut row, token);
            put16(&mut row, strings.add(&name.name));
            put16(&mut row, strings.add(name.culture.as_deref().unwrap_or_default()));
            put16(&mut row, 0);
            push(TABLE_ASSEMBLYREF, row);
        }

        let mut assembly = Vec::new();
        put32(&mut assembly, 0x8004);
        for part in self.version {
            put16(&mut assembly, part);
        }
        put32(&mut assembly, 0);
        put16(&mut assembly, 0);
        put16(&mut assembly, strings.add(&self.name));
        put16(&mut assembly, 0);
        push(TABLE_ASSEMBLY, assembly);

        let mut stream = Vec::new();
        put32(&mut stream, 0);
        stream.extend_from_slice(&[2, 0, 0, 1]);
        put64(
            &mut stream,
            tables.keys().fold(0u64, |valid, table| valid | (1u64 << *table)),
        );
        put64(&mut stream, 0);
        for (count, _) in tables.values() {
            put32(&mut stream, *count);
        }
        for (_, rows) in tables.values() {
            stream.extend_from_slice(rows);
        }

        let streams: [(&str, Vec<u8>); 5] = [
            ("#~", stream),
            ("#Strings", strings.data),
            ("#US", vec![0]),
            ("#GUID", vec![0x11; 16]),
            ("#Blob", blobs),
        ];

        let version = b"v4.0.30319\0\0";
        let mut offset = 16 + version.len() + 4;
        for (name, _) in &streams {
            offset += 8 + ((name.len() + 1 + 3) & !3);
        }

        let mut root = Vec::new();
        put32(&mut root, 0x424A_5342);
        put16(&mut root, 1);
        put16(&mut root, 1);
        put32(&mut root, 0);
        put32(&mut root, version.len() as u32);
        root.extend_from_slice(version);
        put16(&mut root, 0);
        put16(&mut root, streams.len() as u16);
        for (name, data) in &streams {
            let size = (data.len() + 3) & !3;
            put32(&mut root, offset as u32);
            put32(&mut root, size as u32);
            root.extend_from_slice(name.as_bytes());
            root.push(0);
            pad4(&mut root);
            offset += size;
        }
        for (_, data) in &streams {
            root.extend_from_slice(data);
            pad4(&mut root);
        }
        root
    }
}

struct Strings {
    data: Vec<u8>,
    index: HashMap<String, u16>,
}

impl Default for Strings {
    fn default() -> Self {
        Strings {
            data: vec![0],
            index: HashMap::new(),
        }
    }
}

impl Strings {
    fn add(&mut self, value: &str) -> u16 {
        if value.is_empty() {
            return 0;
        }
        if let Some(index) = self.index.get(value) {
            return *index;
        }
        let index = self.data.len() as u16;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.index.insert(value.to_string(), index);
        index
    }
}
