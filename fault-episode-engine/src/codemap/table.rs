//! Code map lookup table
//!
//! Built once per run and shared read-only by every device worker.

use std::collections::HashMap;

/// Description used when a code is absent from the code map
pub const NO_MAPPING: &str = "no mapping";

/// Description used when the run has no code map at all
pub const NO_CODE_MAP: &str = "_";

/// One code map entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeEntry {
    /// Localized (Chinese) description
    pub description: String,
    /// Severity level, if the source table carries one
    pub severity: Option<String>,
}

/// Read-only lookup from fault code to localized description
#[derive(Debug, Clone, Default)]
pub struct CodeMap {
    entries: HashMap<String, CodeEntry>,
    /// Source file name, for logging
    source: Option<String>,
}

impl CodeMap {
    /// Create a new empty code map
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty code map tagged with its source file name
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            entries: HashMap::new(),
            source: Some(source.into()),
        }
    }

    /// Add an entry; the first entry for a code wins
    ///
    /// Returns false if the code was already present.
    pub fn insert(&mut self, code: impl Into<String>, entry: CodeEntry) -> bool {
        let code = code.into();
        if self.entries.contains_key(&code) {
            return false;
        }
        self.entries.insert(code, entry);
        true
    }

    /// Look up a code
    pub fn lookup(&self, code: &str) -> Option<&CodeEntry> {
        self.entries.get(code)
    }

    /// Localized description, or [`NO_MAPPING`] when the code is unknown
    pub fn describe(&self, code: &str) -> &str {
        self.lookup(code)
            .map(|e| e.description.as_str())
            .unwrap_or(NO_MAPPING)
    }

    pub fn severity(&self, code: &str) -> Option<&str> {
        self.lookup(code).and_then(|e| e.severity.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Get code map statistics
    pub fn stats(&self) -> CodeMapStats {
        CodeMapStats {
            num_codes: self.entries.len(),
            num_with_severity: self
                .entries
                .values()
                .filter(|e| e.severity.is_some())
                .count(),
        }
    }
}

/// Code map statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeMapStats {
    /// Number of distinct codes
    pub num_codes: usize,
    /// Codes carrying a severity level
    pub num_with_severity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(description: &str, severity: Option<&str>) -> CodeEntry {
        CodeEntry {
            description: description.to_string(),
            severity: severity.map(str::to_string),
        }
    }

    #[test]
    fn test_empty_map() {
        let map = CodeMap::new();
        assert!(map.is_empty());
        assert_eq!(map.describe("1234"), NO_MAPPING);
        assert_eq!(map.stats().num_codes, 0);
    }

    #[test]
    fn test_first_entry_wins() {
        let mut map = CodeMap::with_source("fault_map.csv");
        assert!(map.insert("1001", entry("电网掉电", Some("2"))));
        assert!(!map.insert("1001", entry("duplicate", None)));
        assert!(map.insert("1002", entry("变桨故障", None)));

        assert_eq!(map.describe("1001"), "电网掉电");
        assert_eq!(map.severity("1001"), Some("2"));
        assert_eq!(map.severity("1002"), None);
        assert_eq!(map.source(), Some("fault_map.csv"));

        let stats = map.stats();
        assert_eq!(stats.num_codes, 2);
        assert_eq!(stats.num_with_severity, 1);
    }

    #[test]
    fn test_unknown_code_placeholder() {
        let mut map = CodeMap::new();
        map.insert("1001", entry("电网掉电", None));
        assert_eq!(map.describe("SC_XYZ"), "no mapping");
    }
}
