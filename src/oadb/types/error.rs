//! Custom error types for the oa-reader crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
///
/// File-level variants (`Io`, `HeaderTruncated`, `DirectoryTruncated`) abort a decode
/// pass. The remaining variants are scoped to a single table and are recovered by the
/// dispatcher, which records them against the table and moves on.
#[derive(Debug, Error)]
pub enum OaError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The file is shorter than the fixed-size file header.
    #[error("File header truncated: expected {expected} bytes, but found {found} bytes")]
    HeaderTruncated { expected: u64, found: u64 },

    /// One of the three parallel directory arrays could not be read in full.
    #[error("Table directory truncated while reading {array} ({entries} entries): expected {expected} bytes, but found {found} bytes")]
    DirectoryTruncated {
        array: &'static str,
        entries: u32,
        expected: u64,
        found: u64,
    },

    /// A table declares fewer bytes than its decoder needs.
    #[error("Table {table_id:#x} too small: {declared} bytes declared, at least {required} required")]
    TableTooSmall {
        table_id: u64,
        declared: u64,
        required: u64,
    },

    /// A string inside a version/build table has no NUL terminator before the payload ends.
    #[error("Malformed string block in table {table_id:#x}: {field} is unterminated")]
    MalformedStringBlock { table_id: u64, field: &'static str },

    /// A map table reports fewer total entries than resource entries.
    #[error("Negative derived count in table {table_id:#x}: total {total} < resource count {resource_count}")]
    NegativeDerivedCount {
        table_id: u64,
        total: u64,
        resource_count: u64,
    },

    /// A read at a given offset came up short.
    #[error("Truncated read at offset {offset:#x}: requested {requested} bytes, but only {available} available")]
    TruncatedRead {
        offset: u64,
        requested: u64,
        available: u64,
    },

    /// A table's declared size exceeds the configured allocation cap.
    #[error("Table {table_id:#x} payload of {declared} bytes exceeds the {cap} byte cap")]
    PayloadTooLarge { table_id: u64, declared: u64, cap: u64 },
}

impl OaError {
    /// Whether this failure concerns one table only, so the pass can continue.
    pub fn is_table_scoped(&self) -> bool {
        matches!(
            self,
            OaError::TableTooSmall { .. }
                | OaError::MalformedStringBlock { .. }
                | OaError::NegativeDerivedCount { .. }
                | OaError::TruncatedRead { .. }
                | OaError::PayloadTooLarge { .. }
        )
    }

    /// Short machine-friendly name of the variant, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            OaError::Io(_) => "Io",
            OaError::HeaderTruncated { .. } => "HeaderTruncated",
            OaError::DirectoryTruncated { .. } => "DirectoryTruncated",
            OaError::TableTooSmall { .. } => "TableTooSmall",
            OaError::MalformedStringBlock { .. } => "MalformedStringBlock",
            OaError::NegativeDerivedCount { .. } => "NegativeDerivedCount",
            OaError::TruncatedRead { .. } => "TruncatedRead",
            OaError::PayloadTooLarge { .. } => "PayloadTooLarge",
        }
    }
}

/// A convenience `Result` type alias using the crate's `OaError` type.
pub type Result<T> = std::result::Result<T, OaError>;
