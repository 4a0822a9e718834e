//! Structured output types for machine-readable CLI responses.
//!
//! When `--format json` is specified, commands emit these types as JSON
//! instead of human-readable text.

use std::io::Write;

use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Serialize;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

/// One row of `tables` output.
#[derive(Debug, Clone, Serialize)]
pub struct TableEntry {
    pub ccsid: u16,
    pub encoding: String,
    pub category: String,
}

/// One received frame in `frames` output.
#[derive(Debug, Clone, Serialize)]
pub struct FrameEntry {
    pub index: usize,
    pub length: u32,
    pub header_id: u16,
    pub server_id: u16,
    pub server: Option<String>,
    pub cs_instance: u32,
    pub correlation: u32,
    pub template_len: u16,
    pub req_rep_id: u16,
    pub variant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code: Option<u32>,
    pub payload_hex: String,
}

/// Summary of a `frames` run.
#[derive(Debug, Clone, Serialize)]
pub struct FramesOutput {
    pub frames: Vec<FrameEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Write a value as pretty JSON, followed by a newline.
pub fn print_json<T: Serialize, W: Write>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)
        .into_diagnostic()
        .wrap_err("Failed to serialize JSON")?;
    writeln!(out).into_diagnostic()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_json_to_writer() {
        let entry = TableEntry {
            ccsid: 37,
            encoding: "Cp037".to_string(),
            category: "single-byte".to_string(),
        };
        let mut out = Vec::new();
        print_json(&mut out, &entry).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("}\n"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["encoding"], "Cp037");
    }
}
