//! File format parsing layer.
//!
//! This module bridges raw byte access and the high-level
//! [`OaReader`](crate::oadb::reader::OaReader).
//!
//! # Module Organization
//!
//! - [`header`]: Parses the file header and the table directory
//! - [`tables`]: Typed decoders for table IDs with a known layout
//! - [`strings`]: String pool extraction and aligned string blocks
//!
//! # Architecture
//!
//! ```text
//! File Structure:
//! ┌──────────────────┐
//! │  FileHeader      │ ← header::parse()
//! ├──────────────────┤
//! │  ids[n]          │
//! │  offsets[n]      │ ← header::parse()
//! │  sizes[n]        │
//! ├──────────────────┤
//! │  Table regions   │ ← tables::decode() / scan::*
//! │  (index-relative │
//! │   or absolute)   │
//! └──────────────────┘
//! ```

pub mod header;
pub mod strings;
pub mod tables;
