//! Fault code map and its CSV loader
//!
//! This module contains the read-only lookup from fault code to localized
//! description (and optional severity), plus the loader for the CSV tables it
//! is built from.

pub mod loader;
pub mod table;

// Re-export key types for convenience
pub use loader::{parse_code_map_file, CodeMapColumns};
pub use table::{CodeEntry, CodeMap, CodeMapStats, NO_CODE_MAP, NO_MAPPING};
