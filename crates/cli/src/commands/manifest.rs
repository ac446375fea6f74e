//! Manifest and signature file commands

use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Args;
use serde::Serialize;
use xpisign_common::{file_key, DigestAlgorithm, Section, SigningConfig};

use super::open_archive;
use crate::output::{print_list, print_success, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ManifestArgs {
    /// Path to the archive
    pub path: PathBuf,

    /// List entries with their ordering key instead of printing manifest.mf
    #[arg(long)]
    pub entries: bool,
}

#[derive(Args)]
pub struct SignatureArgs {
    /// Path to the archive
    pub path: PathBuf,

    /// Print the whole signature file, including per-entry sections
    #[arg(long)]
    pub full: bool,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Manifest entry display wrapper
#[derive(Serialize)]
pub struct EntryDisplay {
    pub name: String,
    pub key: String,
    pub md5: String,
    pub sha1: String,
}

impl From<&Section> for EntryDisplay {
    fn from(section: &Section) -> Self {
        let encode = |algo| section.digest(algo).map(|d| STANDARD.encode(d)).unwrap_or_default();
        Self {
            name: section.name().to_string(),
            key: file_key(section.name()).to_string(),
            md5: encode(DigestAlgorithm::Md5),
            sha1: encode(DigestAlgorithm::Sha1),
        }
    }
}

impl TableDisplay for EntryDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Key", "MD5", "SHA1"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.key.clone(),
            self.md5.clone(),
            self.sha1.clone(),
        ]
    }
}

pub async fn manifest(args: ManifestArgs, config: SigningConfig, format: OutputFormat) -> Result<()> {
    let jar = open_archive(args.path, config).await?;

    if args.entries {
        let entries: Vec<EntryDisplay> = jar.manifest().iter().map(EntryDisplay::from).collect();
        print_list(&entries, format);
    } else {
        print!("{}", jar.manifest());
    }
    Ok(())
}

pub async fn signature(args: SignatureArgs, mut config: SigningConfig) -> Result<()> {
    if args.full {
        config.omit_signature_sections = false;
    }
    let jar = open_archive(args.path, config).await?;

    let text = if args.full {
        jar.signatures().to_string()
    } else {
        jar.signature()
    };

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, text.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!("Wrote signature file to {}", path.display()));
        }
        None => print!("{}", text),
    }
    Ok(())
}
