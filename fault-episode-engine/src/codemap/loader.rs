//! Code map CSV loader
//!
//! Reads a header-first CSV table and converts it into a [`CodeMap`]. Columns
//! are located by name so the same loader handles the onshore status-code map
//! and the offshore fault table (which adds a severity column).

use crate::codemap::table::{CodeEntry, CodeMap};
use crate::types::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Names of the code map columns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeMapColumns {
    #[serde(default = "default_code_column")]
    pub code: String,
    #[serde(default = "default_description_column")]
    pub description: String,
    /// Severity column; None when the table has none
    #[serde(default)]
    pub severity: Option<String>,
}

fn default_code_column() -> String {
    "故障代码".to_string()
}

fn default_description_column() -> String {
    "中文描述".to_string()
}

impl Default for CodeMapColumns {
    fn default() -> Self {
        Self {
            code: default_code_column(),
            description: default_description_column(),
            severity: None,
        }
    }
}

impl CodeMapColumns {
    /// Column set of the offshore fault table
    pub fn offshore() -> Self {
        Self {
            code: default_code_column(),
            description: "故障描述_中文".to_string(),
            severity: Some("故障等级".to_string()),
        }
    }
}

/// Parse a code map file
pub fn parse_code_map_file(path: &Path, columns: &CodeMapColumns) -> Result<CodeMap> {
    log::info!("Parsing code map: {:?}", path);

    let file = std::fs::File::open(path).map_err(|e| {
        EngineError::CodeMapParseError(format!("Failed to open {:?}: {}", path, e))
    })?;

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.csv");

    let map = parse_code_map(file, columns, source)?;

    log::info!("Parsed {} codes from {:?}", map.len(), path);
    Ok(map)
}

/// Parse a code map from any reader
pub fn parse_code_map<R: Read>(reader: R, columns: &CodeMapColumns, source: &str) -> Result<CodeMap> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let find = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}') == name)
            .ok_or_else(|| {
                EngineError::CodeMapParseError(format!("{}: column '{}' not found", source, name))
            })
    };

    let code_idx = find(&columns.code)?;
    let description_idx = find(&columns.description)?;
    let severity_idx = columns.severity.as_deref().map(find).transpose()?;

    let mut map = CodeMap::with_source(source);
    let mut duplicates = 0usize;

    for record in csv_reader.records() {
        let record = record?;
        let code = match record.get(code_idx).map(str::trim) {
            Some(code) if !code.is_empty() => code,
            _ => continue,
        };
        let entry = CodeEntry {
            description: record
                .get(description_idx)
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            severity: severity_idx
                .and_then(|idx| record.get(idx))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        };
        if !map.insert(code, entry) {
            duplicates += 1;
            log::debug!("Duplicate code {} in {}, keeping first entry", code, source);
        }
    }

    if duplicates > 0 {
        log::warn!("{} duplicate codes ignored in {}", duplicates, source);
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_code_map() {
        let csv = "故障代码,中文描述,备注\n1001, 电网掉电 ,x\n1002,变桨故障,\n1001,重复,\n,空代码,\n";
        let map = parse_code_map(csv.as_bytes(), &CodeMapColumns::default(), "fault_map.csv").unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.describe("1001"), "电网掉电");
        assert_eq!(map.describe("1002"), "变桨故障");
        assert_eq!(map.severity("1001"), None);
    }

    #[test]
    fn test_parse_offshore_map_with_severity() {
        let csv = "\u{feff}故障代码,故障描述_中文,故障描述_英文,故障等级\n\
                   A01,发电机过温,A01_SC_GenOverTemp,3\n";
        let map = parse_code_map(csv.as_bytes(), &CodeMapColumns::offshore(), "offshore.csv").unwrap();

        assert_eq!(map.describe("A01"), "发电机过温");
        assert_eq!(map.severity("A01"), Some("3"));
    }

    #[test]
    fn test_missing_column() {
        let csv = "code,description\n1,a\n";
        let err = parse_code_map(csv.as_bytes(), &CodeMapColumns::default(), "bad.csv").unwrap_err();
        assert!(matches!(err, EngineError::CodeMapParseError(_)));
    }
}
