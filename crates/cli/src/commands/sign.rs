//! Sign command

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use sha2::{Digest, Sha256};
use tracing::info;
use xpisign_common::{CommandSigner, KeyPair, SigningConfig, SigningProvider};

use super::open_archive;
use crate::output::print_success;

#[derive(Args)]
pub struct SignArgs {
    /// Archive to sign
    pub input: PathBuf,

    /// Destination of the signed archive (must not exist)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Precomputed signature block (DER) over the signature file header
    #[arg(long, conflicts_with_all = ["key", "command"])]
    pub signature_file: Option<PathBuf>,

    /// Ed25519 development key
    #[arg(long, conflicts_with = "command")]
    pub key: Option<PathBuf>,

    /// External signer program and arguments; reads data on stdin, writes
    /// the signature block to stdout
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Include per-entry sections in the signature file
    #[arg(long)]
    pub keep_sections: bool,
}

enum SignatureSource {
    Precomputed(Vec<u8>),
    Provider(Box<dyn SigningProvider + Send>),
}

async fn select_source(args: &SignArgs, config: &SigningConfig) -> Result<SignatureSource> {
    if let Some(ref path) = args.signature_file {
        let block = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read signature block {}", path.display()))?;
        return Ok(SignatureSource::Precomputed(block));
    }
    if let Some(ref path) = args.key {
        return Ok(SignatureSource::Provider(Box::new(load_key(path).await?)));
    }
    if !args.command.is_empty() {
        return Ok(SignatureSource::Provider(Box::new(CommandSigner::from_argv(&args.command)?)));
    }
    if !config.signer.command.is_empty() {
        return Ok(SignatureSource::Provider(Box::new(CommandSigner::from_argv(
            &config.signer.command,
        )?)));
    }
    if let Some(ref path) = config.signer.key_path {
        return Ok(SignatureSource::Provider(Box::new(load_key(path).await?)));
    }
    bail!("No signing provider: pass --signature-file, --key or --command, or configure [signer]");
}

async fn load_key(path: &Path) -> Result<KeyPair> {
    KeyPair::load(path)
        .await
        .with_context(|| format!("Failed to load key {}", path.display()))
}

pub async fn execute(args: SignArgs, mut config: SigningConfig) -> Result<()> {
    if args.keep_sections {
        config.omit_signature_sections = false;
    }
    if args.output.exists() {
        bail!("Output file already exists: {}", args.output.display());
    }

    let source = select_source(&args, &config).await?;
    let jar = open_archive(args.input.clone(), config).await?;
    let output = args.output.clone();

    let written = tokio::task::spawn_blocking(move || match source {
        SignatureSource::Precomputed(block) => jar.make_signed(&block, Some(&output)),
        SignatureSource::Provider(signer) => jar.sign_with(signer.as_ref(), Some(&output)),
    })
    .await??;

    let data = tokio::fs::read(&written).await?;
    let sha256 = hex::encode(Sha256::digest(&data));
    info!("Signed archive sha256 {}", sha256);

    print_success(&format!(
        "Signed {} -> {} ({} bytes)",
        args.input.display(),
        written.display(),
        data.len()
    ));
    println!("   SHA256: {}", sha256);
    Ok(())
}
