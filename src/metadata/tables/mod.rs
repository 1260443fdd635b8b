//! The `#~` tables stream, reduced to what identity extraction needs.
//!
//! Row sizes depend on every table's row count and on the heap index widths, so the layout
//! of all ECMA-335 tables is known here ([`TableInfo`], [`TableId::row_size`]) even though
//! only a few are ever decoded ([`rows`]).
//!
//! # Key Components
//! - [`TableId`] - the metadata tables, in stream order
//! - [`CodedIndexType`] - the coded index kinds and the tables each can point to
//! - [`TableInfo`] - row counts and index widths of one tables stream
//! - [`TablesHeader`] - locates every table's rows inside the stream

mod header;
mod info;
pub mod rows;

pub use header::TablesHeader;
pub use info::{CodedIndex, CodedIndexType, TableId, TableInfo, TableRowInfo};
