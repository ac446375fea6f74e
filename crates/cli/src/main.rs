//! xpisign CLI - Main Entry Point
//!
//! Generates manifests and signature files for JAR/XPI archives and
//! assembles signed archives around an external signature block.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use xpisign_common::SigningConfig;

mod commands;
mod output;

use commands::{keygen, manifest, sign, verify};

/// xpisign - JAR/XPI signing toolkit
#[derive(Parser)]
#[command(name = "xpisign")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to ~/.xpisign/config.toml)
    #[arg(long, env = "XPISIGN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the manifest.mf for an archive
    Manifest(manifest::ManifestArgs),

    /// Print the signature file header to hand to a signer
    Signature(manifest::SignatureArgs),

    /// Write a signed copy of an archive
    Sign(sign::SignArgs),

    /// Check the structure and digests of a signed archive
    Verify(verify::VerifyArgs),

    /// Generate an Ed25519 development signing key
    Keygen(keygen::KeygenArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(xpisign_common::default_config_path);
    let config = SigningConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    match cli.command {
        Commands::Manifest(args) => manifest::manifest(args, config, cli.format).await?,
        Commands::Signature(args) => manifest::signature(args, config).await?,
        Commands::Sign(args) => sign::execute(args, config).await?,
        Commands::Verify(args) => verify::execute(args, config, cli.format).await?,
        Commands::Keygen(args) => keygen::execute(args).await?,
        Commands::Version => {
            println!("xpisign v{}", xpisign_common::VERSION);
            println!("JAR/XPI manifest and signature file generator");
        }
    }

    Ok(())
}
