//! Signed archive inspection
//!
//! Checks the structure of an archive produced by [`JarExtractor`]:
//! - signature block presence and placement
//! - manifest parsing and per-entry digest verification
//! - signature file digest chain
//!
//! The signature block itself is opaque here; verifying the PKCS#7
//! signature is the signing provider's concern.
//!
//! [`JarExtractor`]: crate::extractor::JarExtractor

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::config::{SigningConfig, MANIFEST_PATH};
use crate::digest::{digest, Digests};
use crate::extractor::section_signature;
use crate::manifest::Manifest;
use crate::ordering::is_directory;
use crate::Result;

/// Complete inspection report
#[derive(Debug, Clone, Serialize, Default)]
pub struct InspectionReport {
    pub input_path: String,
    pub signature_block: SignatureBlockCheck,
    pub manifest: ManifestCheck,
    pub signature_file: SignatureFileCheck,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SignatureBlockCheck {
    pub found: bool,
    pub first_entry: bool,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ManifestCheck {
    pub found: bool,
    pub parsed_ok: bool,
    pub total_entries: usize,
    pub verified_entries: usize,
    pub missing_files: Vec<String>,
    pub mismatched_files: Vec<String>,
    pub unlisted_files: Vec<String>,
    pub parse_errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SignatureFileCheck {
    pub found: bool,
    pub parsed_ok: bool,
    pub digest_manifest_ok: bool,
    pub sections_checked: usize,
    pub mismatched_sections: Vec<String>,
    pub parse_errors: Vec<String>,
}

/// Inspect a signed archive against the naming in `config`
pub fn inspect_signed(path: impl AsRef<Path>, config: &SigningConfig) -> Result<InspectionReport> {
    let path = path.as_ref();
    let mut report = InspectionReport {
        input_path: path.display().to_string(),
        ..Default::default()
    };

    debug!("Inspecting signed archive: {}", path.display());
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let names: Vec<String> = archive.file_names().map(String::from).collect();

    check_signature_block(&mut archive, config, &mut report)?;

    let manifest_bytes = read_entry(&mut archive, MANIFEST_PATH)?;
    let manifest = match manifest_bytes {
        Some(ref bytes) => {
            report.manifest.found = true;
            parse_text(bytes, Manifest::parse, &mut report.manifest.parse_errors)
        }
        None => {
            report.errors.push(format!("{} not found", MANIFEST_PATH));
            None
        }
    };

    if let Some(ref manifest) = manifest {
        report.manifest.parsed_ok = true;
        verify_entries(&mut archive, &names, manifest, config, &mut report)?;
    }

    let signature_path = config.signature_file_path();
    match read_entry(&mut archive, &signature_path)? {
        Some(bytes) => {
            report.signature_file.found = true;
            let parsed = parse_text(
                &bytes,
                |text| Manifest::parse_signature(text, false),
                &mut report.signature_file.parse_errors,
            );
            if let Some(signature) = parsed {
                report.signature_file.parsed_ok = true;
                if let (Some(bytes), Some(manifest)) = (&manifest_bytes, &manifest) {
                    verify_signature_file(bytes, manifest, &signature, &mut report);
                }
            }
        }
        None => report.errors.push(format!("{} not found", signature_path)),
    }

    for err in report
        .manifest
        .parse_errors
        .iter()
        .chain(&report.signature_file.parse_errors)
    {
        report.errors.push(err.clone());
    }

    report.passed = report.errors.is_empty();
    Ok(report)
}

fn check_signature_block(
    archive: &mut ZipArchive<File>,
    config: &SigningConfig,
    report: &mut InspectionReport,
) -> Result<()> {
    let block_path = config.signature_block_path();
    match archive.by_name(&block_path) {
        Ok(file) => {
            report.signature_block.found = true;
            report.signature_block.size = file.size();
        }
        Err(ZipError::FileNotFound) => {
            report.errors.push(format!("{} not found", block_path));
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    if archive.len() > 0 {
        report.signature_block.first_entry = archive.by_index_raw(0)?.name() == block_path;
    }
    if !report.signature_block.first_entry {
        report
            .errors
            .push(format!("{} is not the first archive entry", block_path));
    }
    Ok(())
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<Option<Vec<u8>>> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            Ok(Some(data))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_text<F>(bytes: &[u8], parse: F, errors: &mut Vec<String>) -> Option<Manifest>
where
    F: FnOnce(&str) -> Result<Manifest>,
{
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            errors.push(format!("not valid UTF-8: {}", e));
            return None;
        }
    };
    match parse(text) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            errors.push(e.to_string());
            None
        }
    }
}

fn verify_entries(
    archive: &mut ZipArchive<File>,
    names: &[String],
    manifest: &Manifest,
    config: &SigningConfig,
    report: &mut InspectionReport,
) -> Result<()> {
    report.manifest.total_entries = manifest.len();
    let present: HashSet<&str> = names.iter().map(String::as_str).collect();

    for section in manifest {
        if !present.contains(section.name()) {
            report.manifest.missing_files.push(section.name().to_string());
            continue;
        }
        let data = read_entry(archive, section.name())?.unwrap_or_default();
        if digests_match(section.digests(), &digest(&data)) {
            report.manifest.verified_entries += 1;
        } else {
            report.manifest.mismatched_files.push(section.name().to_string());
        }
    }

    let listed: HashSet<&str> = manifest.iter().map(|s| s.name()).collect();
    report.manifest.unlisted_files = names
        .iter()
        .filter(|name| !is_directory(name) && !config.is_generated(name))
        .filter(|name| !listed.contains(name.as_str()))
        .cloned()
        .collect();

    for name in &report.manifest.missing_files {
        report.errors.push(format!("{}: listed in manifest but missing", name));
    }
    for name in &report.manifest.mismatched_files {
        report.errors.push(format!("{}: digest mismatch", name));
    }
    for name in &report.manifest.unlisted_files {
        report.errors.push(format!("{}: not covered by the manifest", name));
    }
    Ok(())
}

fn verify_signature_file(
    manifest_bytes: &[u8],
    manifest: &Manifest,
    signature: &Manifest,
    report: &mut InspectionReport,
) {
    let check = &mut report.signature_file;

    if signature.digest_manifests().is_empty() {
        report
            .errors
            .push("signature file has no Digest-Manifest header".to_string());
    } else {
        check.digest_manifest_ok = digests_match(signature.digest_manifests(), &digest(manifest_bytes));
        if !check.digest_manifest_ok {
            report
                .errors
                .push("Digest-Manifest does not match manifest.mf".to_string());
        }
    }

    if signature.is_empty() {
        report
            .warnings
            .push("signature file omits individual sections".to_string());
    }

    for section in signature {
        check.sections_checked += 1;
        let matches = manifest
            .find(section.name())
            .map(|entry| digests_match(section.digests(), section_signature(entry).digests()))
            .unwrap_or(false);
        if !matches {
            warn!("Signature section mismatch for {}", section.name());
            check.mismatched_sections.push(section.name().to_string());
            report
                .errors
                .push(format!("{}: signature file section mismatch", section.name()));
        }
    }
}

/// Every digest in `expected` is present and equal in `actual`
fn digests_match(expected: &Digests, actual: &Digests) -> bool {
    !expected.is_empty()
        && expected
            .iter()
            .all(|(algo, value)| actual.get(algo) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::DigestAlgorithm;

    #[test]
    fn test_digests_match() {
        let full = digest(b"data");
        let mut partial = Digests::new();
        partial.insert(DigestAlgorithm::Sha1, full[&DigestAlgorithm::Sha1].clone());

        assert!(digests_match(&full, &full));
        assert!(digests_match(&partial, &full));
        assert!(!digests_match(&full, &digest(b"other")));
        assert!(!digests_match(&Digests::new(), &full));
    }
}
