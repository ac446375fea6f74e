//! Signing configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Directory holding every generated signing artifact
pub const META_INF: &str = "META-INF";

/// Archive path of the generated manifest
pub const MANIFEST_PATH: &str = "META-INF/manifest.mf";

/// Compression applied to the entries xpisign generates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflated,
    Stored,
}

impl Compression {
    pub fn method(self) -> zip::CompressionMethod {
        match self {
            Compression::Deflated => zip::CompressionMethod::Deflated,
            Compression::Stored => zip::CompressionMethod::Stored,
        }
    }
}

/// Signing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// File name of the detached signature block under `META-INF/`
    pub signature_block_name: String,

    /// File name of the signature file under `META-INF/`
    pub signature_file_name: String,

    /// Write only the header of the signature file
    pub omit_signature_sections: bool,

    /// Compression for generated entries
    pub compression: Compression,

    /// Signing provider selection
    pub signer: SignerConfig,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            signature_block_name: "zigbert.rsa".to_string(),
            signature_file_name: "zigbert.sf".to_string(),
            omit_signature_sections: true,
            compression: Compression::default(),
            signer: SignerConfig::default(),
        }
    }
}

/// Signing provider configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// External signing program and its arguments; receives the signature
    /// file header on stdin and writes the signature block to stdout
    pub command: Vec<String>,

    /// Ed25519 development key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
}

impl SigningConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("signature_block_name", &self.signature_block_name),
            ("signature_file_name", &self.signature_file_name),
        ] {
            if value.is_empty() {
                return Err(Error::InvalidConfig(format!("{} must not be empty", field)));
            }
            if value.contains(['/', '\\']) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a bare file name, got {}",
                    field, value
                )));
            }
        }
        if self.signature_block_name.eq_ignore_ascii_case(&self.signature_file_name)
            || self.signature_file_name.eq_ignore_ascii_case("manifest.mf")
            || self.signature_block_name.eq_ignore_ascii_case("manifest.mf")
        {
            return Err(Error::InvalidConfig(
                "generated META-INF names must be distinct".to_string(),
            ));
        }
        Ok(())
    }

    /// Archive path of the signature block
    pub fn signature_block_path(&self) -> String {
        format!("{}/{}", META_INF, self.signature_block_name)
    }

    /// Archive path of the signature file
    pub fn signature_file_path(&self) -> String {
        format!("{}/{}", META_INF, self.signature_file_name)
    }

    /// Whether an archive path names one of the generated artifacts
    pub fn is_generated(&self, name: &str) -> bool {
        [
            MANIFEST_PATH.to_string(),
            self.signature_block_path(),
            self.signature_file_path(),
        ]
        .iter()
        .any(|generated| generated.eq_ignore_ascii_case(name))
    }
}
