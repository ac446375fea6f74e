//! xpisign Common Library
//!
//! Manifest and signature file generation for JAR/XPI signing, and assembly
//! of the signed archive around an externally produced signature block.

pub mod config;
pub mod crypto;
pub mod digest;
pub mod error;
pub mod extractor;
pub mod inspect;
pub mod manifest;
pub mod ordering;
pub mod parser;

// Re-export commonly used types
pub use config::{Compression, SignerConfig, SigningConfig, MANIFEST_PATH};
pub use crypto::{CommandSigner, KeyPair, SigningProvider, Verifier};
pub use digest::{digest, DigestAlgorithm, Digests};
pub use error::{Error, Result};
pub use extractor::JarExtractor;
pub use inspect::{inspect_signed, InspectionReport};
pub use manifest::{check_name, Manifest, ManifestKind, Section};
pub use ordering::{file_key, sort_entries, FileKey, PriorityClass};
pub use parser::{parse, ParsedDocument};

/// xpisign version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration directory
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".xpisign")
}

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}
