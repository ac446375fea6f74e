//! Development key generation

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use xpisign_common::KeyPair;

use crate::output::{print_info, print_success};

#[derive(Args)]
pub struct KeygenArgs {
    /// Where to write the raw 32-byte secret key
    pub path: PathBuf,

    /// Overwrite an existing key file
    #[arg(long)]
    pub force: bool,
}

pub async fn execute(args: KeygenArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        bail!("Key file already exists: {} (use --force)", args.path.display());
    }

    let key = KeyPair::generate();
    key.save(&args.path)
        .await
        .with_context(|| format!("Failed to write key {}", args.path.display()))?;

    print_success(&format!("Wrote Ed25519 key to {}", args.path.display()));
    print_info(&format!("Public key: {}", key.public_key_hex()));
    print_info("Ed25519 blocks are for development; release builds need a PKCS#7 signer");
    Ok(())
}
