//! Decode command implementation - host bytes to UTF-8 text.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use miette::{IntoDiagnostic, Result, WrapErr};

use open_midrange_ccsid::{ConvTable, ConvTableReader, ReaderOptions};

/// Decode `input` through `table` and write the text to `out`.
pub fn run<W: Write>(
    input: &Path,
    table: Arc<ConvTable>,
    options: &ReaderOptions,
    skip: u64,
    out: &mut W,
) -> Result<()> {
    let file = std::fs::File::open(input)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to open input file: {}", input.display()))?;

    tracing::info!(ccsid = table.ccsid(), "Decoding {}", input.display());
    let mut reader = ConvTableReader::with_options(file, table, options)?;
    if skip > 0 {
        let skipped = reader.skip(skip)?;
        tracing::debug!(skipped, "Skipped leading characters");
    }

    let mut chars = vec!['\0'; options.cache_size];
    let mut text = String::new();
    let mut total = 0usize;
    while let Some(n) = reader.read(&mut chars)? {
        text.clear();
        text.extend(&chars[..n]);
        out.write_all(text.as_bytes()).into_diagnostic()?;
        total += n;
    }
    out.flush().into_diagnostic()?;
    reader.close();

    tracing::debug!(chars = total, "Decode complete");
    Ok(())
}
