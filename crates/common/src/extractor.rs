//! Archive extractor
//!
//! Walks an input archive in manifest order, building `manifest.mf` and the
//! signature file as it goes, and assembles the signed archive once the
//! signing provider has produced a signature block.
//!
//! Output layout, in stored order:
//!
//! ```text
//! META-INF/<signature block>   first, so clients can verify while streaming
//! <original entries>           original stored order
//! META-INF/manifest.mf
//! META-INF/<signature file>
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::config::{SigningConfig, MANIFEST_PATH};
use crate::crypto::SigningProvider;
use crate::digest::digest;
use crate::manifest::{check_name, Manifest, Section};
use crate::ordering::{file_key, is_directory, sort_entries};
use crate::{Error, Result};

/// Signature file section for a manifest section: digests of its
/// serialized text
pub fn section_signature(section: &Section) -> Section {
    Section::new(section.name(), digest(section.to_string().as_bytes()))
}

/// Builds the signing artifacts for one archive
#[derive(Debug)]
pub struct JarExtractor {
    inpath: PathBuf,
    outpath: Option<PathBuf>,
    config: SigningConfig,
    sections: Vec<Section>,
    manifest: OnceCell<Manifest>,
    signatures: OnceCell<Manifest>,
}

impl JarExtractor {
    /// Open an archive and digest every file entry in manifest order
    pub fn open(path: impl AsRef<Path>, config: SigningConfig) -> Result<Self> {
        config.validate()?;
        let inpath = path.as_ref().to_path_buf();
        let mut archive = ZipArchive::new(File::open(&inpath)?)?;

        let mut names: Vec<String> = archive
            .file_names()
            .filter(|name| !is_directory(name))
            .filter(|name| {
                let generated = config.is_generated(name);
                if generated {
                    debug!("Ignoring existing signing artifact {}", name);
                }
                !generated
            })
            .map(String::from)
            .collect();
        sort_entries(&mut names);

        let mut sections = Vec::with_capacity(names.len());
        for name in names {
            check_name(&name)?;
            let mut file = archive.by_name(&name)?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            debug!("Digested {} ({} bytes, key {})", name, data.len(), file_key(&name));
            sections.push(Section::new(name, digest(&data)));
        }

        info!(
            "Read {} entries from {}",
            sections.len(),
            inpath.display()
        );

        Ok(Self {
            inpath,
            outpath: None,
            config,
            sections,
            manifest: OnceCell::new(),
            signatures: OnceCell::new(),
        })
    }

    /// Default destination for [`make_signed`](Self::make_signed)
    pub fn with_output(mut self, outpath: impl Into<PathBuf>) -> Self {
        self.outpath = Some(outpath.into());
        self
    }

    pub fn input_path(&self) -> &Path {
        &self.inpath
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Per-file sections in manifest order
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// The content manifest, built on first access
    pub fn manifest(&self) -> &Manifest {
        self.manifest
            .get_or_init(|| Manifest::new(self.sections.clone()))
    }

    /// The signature file, built on first access
    pub fn signatures(&self) -> &Manifest {
        self.signatures.get_or_init(|| {
            let sections = self.sections.iter().map(section_signature).collect();
            Manifest::signature(
                sections,
                digest(self.manifest().to_string().as_bytes()),
                self.config.omit_signature_sections,
            )
        })
    }

    /// Signature file header: the bytes the signing provider signs
    pub fn signature(&self) -> String {
        self.signatures().header_block()
    }

    /// Sign the signature file header with `signer` and write the signed
    /// archive. The provider is not called if the output path is unusable.
    pub fn sign_with<S: SigningProvider + ?Sized>(
        &self,
        signer: &S,
        outpath: Option<&Path>,
    ) -> Result<PathBuf> {
        let outpath = self.resolve_output(outpath)?;
        let block = signer.sign(self.signature().as_bytes())?;
        self.make_signed(&block, Some(&outpath))
    }

    /// Write the signed archive with `signature` as the signature block.
    ///
    /// Fails with [`Error::OutputConflict`] if no output path is given or
    /// configured, or if it already exists. The archive is assembled in a
    /// temporary file beside the target and published only when complete.
    pub fn make_signed(&self, signature: &[u8], outpath: Option<&Path>) -> Result<PathBuf> {
        let outpath = self.resolve_output(outpath)?;
        let dir = match outpath.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        self.write_signed(signature, tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;

        tmp.persist_noclobber(&outpath).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                conflict_exists(&outpath)
            } else {
                Error::Io(e.error)
            }
        })?;

        info!("Wrote signed archive {}", outpath.display());
        Ok(outpath)
    }

    fn resolve_output(&self, outpath: Option<&Path>) -> Result<PathBuf> {
        let outpath = outpath
            .map(Path::to_path_buf)
            .or_else(|| self.outpath.clone())
            .ok_or_else(|| Error::OutputConflict("No output file specified".to_string()))?;
        if outpath.exists() {
            return Err(conflict_exists(&outpath));
        }
        Ok(outpath)
    }

    fn file_options(&self) -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(self.config.compression.method())
    }

    fn write_signed<W: Write + Seek>(&self, signature: &[u8], writer: W) -> Result<()> {
        let mut zin = ZipArchive::new(File::open(&self.inpath)?)?;
        let mut zout = ZipWriter::new(writer);

        zout.start_file(self.config.signature_block_path(), self.file_options())?;
        zout.write_all(signature)?;

        for i in 0..zin.len() {
            let entry = zin.by_index_raw(i)?;
            if self.config.is_generated(entry.name()) {
                continue;
            }
            zout.raw_copy_file(entry)?;
        }

        zout.start_file(MANIFEST_PATH, self.file_options())?;
        zout.write_all(self.manifest().to_string().as_bytes())?;

        zout.start_file(self.config.signature_file_path(), self.file_options())?;
        zout.write_all(self.signatures().to_string().as_bytes())?;

        zout.finish()?;
        Ok(())
    }
}

fn conflict_exists(path: &Path) -> Error {
    Error::OutputConflict(format!("File already exists: {}", path.display()))
}
