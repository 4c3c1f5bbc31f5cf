//! Foundational data structures, records and error types.

pub mod error;
pub mod models;
pub mod records;
