//! Encode command implementation - UTF-8 text to host bytes.

use std::io::Write;
use std::path::Path;

use miette::{IntoDiagnostic, Result, WrapErr};

use open_midrange_ccsid::ConvTable;
use open_midrange_datastream::hex_preview;

/// Encode the text in `input` through `table`.
///
/// Writes raw bytes to `output` when given, otherwise a hex dump to `out`.
pub fn run<W: Write>(input: &Path, table: &ConvTable, output: Option<&Path>, out: &mut W) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read input file: {}", input.display()))?;

    tracing::info!(ccsid = table.ccsid(), "Encoding {}", input.display());
    let bytes = table.encode(&text)?;

    match output {
        Some(path) => {
            std::fs::write(path, &bytes)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to write output file: {}", path.display()))?;
            tracing::debug!(bytes = bytes.len(), path = %path.display(), "Wrote encoded bytes");
        }
        None => {
            writeln!(out, "{}", hex_preview(&bytes, bytes.len())).into_diagnostic()?;
        }
    }
    Ok(())
}
