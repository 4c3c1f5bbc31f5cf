//! Heuristic scanners for tables whose layout is unknown or fails its shape check.
//!
//! All scanners are total over an in-memory payload: they never fail, they only
//! return fewer results on adverse input. Reading the payload happens before.
//!
//! - [`pairs`]: overlapping `(u32, u32)` windows
//! - [`connectivity`]: string index followed by plausible object IDs
//! - [`probe`]: exact occurrences of one string index

pub mod connectivity;
pub mod pairs;
pub mod probe;

pub use connectivity::ConnectivityLimits;
