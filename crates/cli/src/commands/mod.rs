//! CLI Commands

pub mod keygen;
pub mod manifest;
pub mod sign;
pub mod verify;

use std::path::PathBuf;

use anyhow::Context;
use xpisign_common::{JarExtractor, SigningConfig};

/// Open an archive on the blocking pool
pub async fn open_archive(path: PathBuf, config: SigningConfig) -> anyhow::Result<JarExtractor> {
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || JarExtractor::open(&path, config))
        .await?
        .with_context(|| format!("Failed to read archive {}", display))
}
