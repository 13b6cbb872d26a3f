//! downsaver: convert Rhino .3dm files to an older version from the command line.
//!
//! `downsaver convert a.3dm models/ -r -d out` converts `a.3dm` and every `.3dm` under
//! `models/`, writing `out/a.3dm` and `out/models/...`.
//!
//! Reads CONVERTER_API_URL / RELAY_URL / STAGING_THRESHOLD_BYTES from the environment or `.env`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use downsaver_cli::{init_tracing, render_event, run_batch, BatchArgs};
use downsaver_client::ConverterClient;
use downsaver_core::models::TargetVersion;
use downsaver_core::Config;
use serde::Serialize;

/// Exit status after Ctrl+C, as shells report SIGINT.
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "downsaver", about = "Save Rhino .3dm files down to an older version")]
struct Cli {
    /// Converter base URL; files are sent to it directly
    #[arg(long, global = true)]
    converter_url: Option<String>,
    /// Relay base URL, used when no converter URL is set
    #[arg(long, global = true)]
    relay_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert .3dm files, or every .3dm file in the given directories
    Convert {
        /// Files or directories to convert
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Rhino version to write (2 to 7)
        #[arg(long, short, default_value = "7")]
        target: TargetVersion,
        /// Output file for a single input; defaults to <name>_v<target>.3dm next to the input
        #[arg(long, short, conflicts_with = "output_dir")]
        output: Option<PathBuf>,
        /// Write every output under this directory, keeping relative paths
        #[arg(long, short = 'd')]
        output_dir: Option<PathBuf>,
        /// Descend into subdirectories
        #[arg(long, short)]
        recursive: bool,
        /// Replace the output file if it exists
        #[arg(long)]
        overwrite: bool,
        /// Files above this size go through object storage
        #[arg(long)]
        threshold_bytes: Option<u64>,
        /// Use the filename suggested by the converter
        #[arg(long)]
        server_filename: bool,
    },
    /// Request a presigned upload grant and print it
    Presign {
        /// Name of the file to be uploaded
        filename: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(url) = cli.converter_url {
        config = config.with_converter_url(Some(url));
    }
    if let Some(url) = cli.relay_url {
        config = config.with_relay_url(url);
    }

    match cli.command {
        Commands::Convert {
            inputs,
            target,
            output,
            output_dir,
            recursive,
            overwrite,
            threshold_bytes,
            server_filename,
        } => {
            if let Some(bytes) = threshold_bytes {
                config = config.with_staging_threshold(bytes);
            }
            config.validate()?;

            let args = BatchArgs {
                inputs,
                target,
                output,
                output_dir,
                recursive,
                overwrite,
                server_filename,
            };
            let shutdown = async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("Interrupt received, cancelling"),
                    Err(e) => {
                        tracing::warn!(error = %e, "Ctrl+C handler unavailable");
                        std::future::pending::<()>().await;
                    }
                }
            };

            let summary = run_batch(&config, args, shutdown, |event| {
                eprintln!("{}", render_event(event))
            })
            .await?;
            print_json(&summary)?;

            eprintln!("Successfully processed: {} files", summary.processed.len());
            if summary.cancelled {
                eprintln!("Conversion cancelled");
                return Ok(ExitCode::from(EXIT_CANCELLED));
            }
            if !summary.errors.is_empty() {
                eprintln!("Errors occurred during processing:");
                for error in &summary.errors {
                    eprintln!("  - {}", error);
                }
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Presign { filename } => {
            config.validate()?;
            let client = ConverterClient::from_config(&config)?;
            let grant = client.request_grant(&filename).await?;
            print_json(&grant)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
