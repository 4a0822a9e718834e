//! OpenMidrange CLI — CCSID conversion and host data-stream tools.
//!
//! Decodes host-encoded files to UTF-8, encodes text for a CCSID, lists the
//! available conversion tables and dumps captured server data streams.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::EnvFilter;

use open_midrange_ccsid::TableRegistry;
use open_midrange_lib::commands;
use open_midrange_lib::config::OpenMidrangeConfig;
use open_midrange_lib::output::OutputFormat;
use open_midrange_lib::resolve_table;

/// OpenMidrange CLI.
#[derive(Parser)]
#[command(
    name = "open-midrange",
    version,
    about = "OpenMidrange — CCSID conversion and host data-stream tools"
)]
struct Cli {
    /// Configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a host-encoded file to UTF-8 on stdout.
    Decode {
        /// Input file.
        input: PathBuf,

        /// CCSID number or encoding name (defaults to the configured CCSID).
        #[arg(long)]
        ccsid: Option<String>,

        /// Characters to skip before writing output.
        #[arg(long, default_value_t = 0)]
        skip: u64,
    },

    /// Encode a UTF-8 text file for a CCSID.
    Encode {
        /// Input text file.
        input: PathBuf,

        /// CCSID number or encoding name (defaults to the configured CCSID).
        #[arg(long)]
        ccsid: Option<String>,

        /// Write raw bytes here instead of a hex dump on stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Dump the data-stream frames in a capture file.
    Frames {
        /// Raw byte capture of server replies.
        capture: PathBuf,
    },

    /// List the supported CCSIDs.
    Tables,
}

fn init_tracing(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = OpenMidrangeConfig::load(cli.config.as_deref())?;
    let registry = TableRegistry::new();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Decode { input, ccsid, skip } => {
            let table = resolve_table(&registry, ccsid.as_deref(), config.default_ccsid)?;
            commands::decode::run(&input, table, &config.reader, skip, &mut out)?;
        }
        Commands::Encode { input, ccsid, output } => {
            let table = resolve_table(&registry, ccsid.as_deref(), config.default_ccsid)?;
            commands::encode::run(&input, &table, output.as_deref(), &mut out)?;
        }
        Commands::Frames { capture } => {
            commands::frames::run(&capture, config.datastream, cli.format, &mut out).await?;
        }
        Commands::Tables => {
            commands::tables::run(&registry, cli.format, &mut out)?;
        }
    }

    out.flush().ok();
    Ok(())
}
