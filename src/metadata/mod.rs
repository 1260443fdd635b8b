//! ECMA-335 metadata, read just far enough to identify a managed module.
//!
//! The reader walks CLI header → metadata root → streams → tables and decodes only the
//! Assembly, AssemblyRef and custom attribute rows (plus the type and member rows needed to
//! name an attribute's type). Method bodies, signatures beyond attribute constructors and
//! the type system are never touched.
//!
//! # Key Components
//!
//! - [`AssemblyView`] - the metadata of one loaded [`crate::file::File`]
//! - [`identity`] - assembly names, versions, public key tokens and architectures
//! - [`tables`] - table layout and raw rows
//! - [`streams`] - the `#Strings` and `#Blob` heaps
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotprobe::{file::File, metadata::AssemblyView};
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("System.Xml.dll"))?;
//! let view = AssemblyView::new(&file)?;
//! println!("{} ({})", view.assembly_name()?, view.architecture());
//! # Ok::<(), dotprobe::Error>(())
//! ```

/// Decoding of assembly-level build attributes
pub mod attributes;
/// Implementation of the Header of CIL
pub mod cor20header;
/// Assembly names and their parts
pub mod identity;
/// Implementation of the root metadata structure
pub mod root;
/// Metadata stream headers and heaps
pub mod streams;
/// The metadata tables stream
pub mod tables;

mod view;

pub use view::AssemblyView;
