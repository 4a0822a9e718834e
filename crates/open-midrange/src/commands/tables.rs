//! Tables command implementation - list bundled conversion tables.

use std::io::Write;

use miette::{IntoDiagnostic, Result};

use open_midrange_ccsid::TableRegistry;

use crate::output::{print_json, OutputFormat, TableEntry};

/// Collect one entry per bundled CCSID.
pub fn entries(registry: &TableRegistry) -> Result<Vec<TableEntry>> {
    registry
        .supported_ccsids()
        .into_iter()
        .map(|ccsid| -> Result<TableEntry> {
            let table = registry.table(ccsid)?;
            Ok(TableEntry {
                ccsid,
                encoding: table.encoding().to_string(),
                category: table.category().to_string(),
            })
        })
        .collect()
}

/// List bundled tables.
pub fn run<W: Write>(registry: &TableRegistry, format: OutputFormat, out: &mut W) -> Result<()> {
    let entries = entries(registry)?;
    if format.is_json() {
        return print_json(out, &entries);
    }
    writeln!(out, "{:>6}  {:<20}  CATEGORY", "CCSID", "ENCODING").into_diagnostic()?;
    for entry in &entries {
        writeln!(out, "{:>6}  {:<20}  {}", entry.ccsid, entry.encoding, entry.category)
            .into_diagnostic()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_every_table() {
        let registry = TableRegistry::new();
        let entries = entries(&registry).unwrap();
        assert_eq!(entries.len(), registry.supported_ccsids().len());
        let cp933 = entries.iter().find(|e| e.ccsid == 933).unwrap();
        assert_eq!(cp933.category, "mixed-byte");
    }

    #[test]
    fn test_json_output() {
        let registry = TableRegistry::new();
        let mut out = Vec::new();
        run(&registry, OutputFormat::Json, &mut out).unwrap();
        let entries: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let entries = entries.as_array().unwrap();
        assert_eq!(entries.len(), registry.supported_ccsids().len());
        assert!(entries
            .iter()
            .any(|e| e["ccsid"] == 1208 && e["category"] == "utf-8"));
    }

    #[test]
    fn test_text_output() {
        let registry = TableRegistry::new();
        let mut out = Vec::new();
        run(&registry, OutputFormat::Text, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(" CCSID"));
        assert!(text.contains("Cp037"));
        assert!(text.contains("UTF-8"));
    }
}
