//! Content digests used by the manifest format
//!
//! The legacy JAR/XPI format only ever carries MD5 and SHA-1 digests, so the
//! algorithm set is closed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::{Digest as _, Sha1};

use crate::{Error, Result};

/// Digest algorithm
///
/// Variants are declared in lexicographic order of their canonical names so
/// that the derived `Ord` matches the serialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
}

impl DigestAlgorithm {
    /// All supported algorithms, in serialization order
    pub const ALL: [DigestAlgorithm; 2] = [DigestAlgorithm::Md5, DigestAlgorithm::Sha1];

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha1 => "sha1",
        }
    }

    /// Label used in header names, e.g. `SHA1` in `SHA1-Digest`
    pub fn header_label(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA1",
        }
    }

    /// Digest a buffer with this algorithm
    pub fn compute(&self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Md5 => md5::compute(data).0.to_vec(),
            DigestAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha1" => Ok(DigestAlgorithm::Sha1),
            other => Err(Error::Crypto(format!(
                "Unsupported digest algorithm: {}",
                other
            ))),
        }
    }
}

/// Raw digest bytes keyed by algorithm, iterated in serialization order
pub type Digests = BTreeMap<DigestAlgorithm, Vec<u8>>;

/// Compute every supported digest of `data`
pub fn digest(data: &[u8]) -> Digests {
    DigestAlgorithm::ALL
        .iter()
        .map(|algo| (*algo, algo.compute(data)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        let digests = digest(b"abc");
        assert_eq!(
            hex::encode(&digests[&DigestAlgorithm::Md5]),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            hex::encode(&digests[&DigestAlgorithm::Sha1]),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_deterministic() {
        let data = b"install.rdf contents";
        assert_eq!(digest(data), digest(data));
    }

    #[test]
    fn test_single_byte_change() {
        let a = digest(b"hello world");
        let b = digest(b"hello worle");
        assert_ne!(a[&DigestAlgorithm::Md5], b[&DigestAlgorithm::Md5]);
        assert_ne!(a[&DigestAlgorithm::Sha1], b[&DigestAlgorithm::Sha1]);
    }

    #[test]
    fn test_empty_input() {
        let digests = digest(b"");
        assert_eq!(digests.len(), 2);
        assert_eq!(
            hex::encode(&digests[&DigestAlgorithm::Sha1]),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!("SHA1".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha1);
        assert_eq!("md5".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Md5);
        assert!("sha256".parse::<DigestAlgorithm>().is_err());
        assert!(DigestAlgorithm::Md5 < DigestAlgorithm::Sha1);
        assert_eq!(DigestAlgorithm::Sha1.header_label(), "SHA1");
    }
}
