//! noa-pack command-line entry point
//!
//! ```bash
//! noa-pack assets.noa 'assets/*.*'
//! noa-pack -v --codec lz4 backup.noa data/
//! ```
//!
//! The process exit status is the number of entries that could not be
//! packed (0 on full success). Argument errors exit with 255; failing to
//! create or finalize the archive exits with 1.

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use noa_pack::{
    pack_to_path, Codec, ConsoleProgress, NoProgress, PackConfig, PackReport, ProgressObserver,
};
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status for usage errors (the `-1` of the classic tool)
const USAGE_EXIT: u8 = 255;

/// Error counts are clamped below the usage status
const MAX_ERROR_EXIT: usize = 254;

#[derive(Parser)]
#[command(
    name = "noa-pack",
    about = "Pack a directory tree into a single NOA archive",
    version
)]
struct Cli {
    /// Archive file to create (overwritten if it exists)
    destination: PathBuf,

    /// Source file or wildcard pattern, e.g. `data/*.*`
    source: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Codec for compressible files
    #[arg(long, value_enum)]
    codec: Option<Codec>,

    /// Zstd compression level (1-22)
    #[arg(long)]
    level: Option<i32>,

    /// Encrypt file contents with a password
    #[arg(long, env = "NOA_PACK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Do not print per-file progress
    #[arg(short, long)]
    quiet: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl fmt::Debug for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cli")
            .field("destination", &self.destination)
            .field("source", &self.source)
            .field("config", &self.config)
            .field("codec", &self.codec)
            .field("level", &self.level)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("quiet", &self.quiet)
            .field("verbose", &self.verbose)
            .finish()
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(USAGE_EXIT),
            };
        }
    };

    init_logging(cli.verbose);
    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    match run(&cli) {
        Ok(report) => {
            let destination = cli.destination.display();
            if report.is_success() {
                println!(
                    "{}: archived {} files, {} directories",
                    destination, report.files, report.directories
                );
            } else {
                println!("{}: {} errors", destination, report.error_count());
            }
            ExitCode::from(report.error_count().min(MAX_ERROR_EXIT) as u8)
        }
        Err(e) => {
            tracing::error!("Packing failed: {:?}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<PackReport> {
    let mut config = match &cli.config {
        Some(path) => PackConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PackConfig::default(),
    };
    if let Some(codec) = cli.codec {
        config.compression.codec = codec;
    }
    if let Some(level) = cli.level {
        config.compression.level = level;
    }
    if let Some(password) = &cli.password {
        config.encryption.password = Some(password.clone());
    }

    let mut observer: Box<dyn ProgressObserver> = if cli.quiet {
        Box::new(NoProgress)
    } else {
        Box::new(ConsoleProgress::stdout())
    };

    pack_to_path(&cli.destination, &cli.source, &config, observer.as_mut())
        .with_context(|| format!("Cannot pack into {}", cli.destination.display()))
}
