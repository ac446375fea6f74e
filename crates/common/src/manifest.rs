//! Manifest and signature file entities
//!
//! Serialization here must stay byte-for-byte stable: the serialized
//! manifest is digested into the signature file, and the signature file
//! header is what the signing provider signs. See the JAR file
//! specification for the placement rules of newlines and continuations.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::digest::{DigestAlgorithm, Digests};
use crate::error::{Error, Result};

/// Maximum length of a physical manifest line, in bytes
pub const MAX_LINE_LENGTH: usize = 72;

/// Format version written into every header
pub const FORMAT_VERSION: &str = "1.0";

/// One manifest entry: a path and its digests
///
/// The algorithm set of a section is the key set of its digests, so the two
/// can never disagree. Only names accepted by [`check_name`] survive a
/// serialize and parse round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    name: String,
    digests: Digests,
}

impl Section {
    pub fn new(name: impl Into<String>, digests: Digests) -> Self {
        Self {
            name: name.into(),
            digests,
        }
    }

    /// Entry path
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn digests(&self) -> &Digests {
        &self.digests
    }

    /// Algorithms in serialization order
    pub fn algorithms(&self) -> impl Iterator<Item = DigestAlgorithm> + '_ {
        self.digests.keys().copied()
    }

    pub fn digest(&self, algorithm: DigestAlgorithm) -> Option<&[u8]> {
        self.digests.get(&algorithm).map(Vec::as_slice)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entry = String::new();
        write_wrapped(&mut entry, &format!("Name: {}", self.name));

        entry.push_str("Digest-Algorithms:");
        for algo in self.algorithms() {
            entry.push(' ');
            entry.push_str(algo.header_label());
        }
        entry.push('\n');

        for (algo, value) in &self.digests {
            entry.push_str(&format!(
                "{}-Digest: {}\n",
                algo.header_label(),
                STANDARD.encode(value)
            ));
        }

        f.write_str(&entry)
    }
}

/// Write `line` wrapped to `MAX_LINE_LENGTH` bytes per physical line.
///
/// Continuation lines start with a single space, which counts against the
/// limit. Splits never land inside a UTF-8 sequence. For names accepted by
/// [`check_name`] no physical line ends in whitespace, since the parser
/// strips trailing whitespace.
fn write_wrapped(out: &mut String, line: &str) {
    let mut rest = line;
    let mut budget = MAX_LINE_LENGTH;
    loop {
        let split = split_point(rest, budget);
        out.push_str(&rest[..split]);
        rest = &rest[split..];
        if rest.is_empty() {
            break;
        }
        out.push_str("\n ");
        budget = MAX_LINE_LENGTH - 1;
    }
    out.push('\n');
}

fn split_point(s: &str, budget: usize) -> usize {
    if s.len() <= budget {
        return s.len();
    }
    let mut limit = budget;
    while !s.is_char_boundary(limit) {
        limit -= 1;
    }
    // the whitespace run moves to the start of the next line
    let kept = s[..limit].trim_end().len();
    if kept == 0 {
        limit
    } else {
        kept
    }
}

/// Longest whitespace run a name may contain. A continuation line must end
/// in a non-whitespace character, so the run plus one character of up to
/// four bytes has to fit in a continuation line.
pub const MAX_WHITESPACE_RUN: usize = MAX_LINE_LENGTH - 1 - 4;

/// Check that `name` serializes to a `Name` header that parses back to the
/// same string.
///
/// The parser strips whitespace around header values and at line ends, so
/// a name may not start or end with whitespace, contain line breaks, or
/// hold a whitespace run longer than [`MAX_WHITESPACE_RUN`] bytes.
pub fn check_name(name: &str) -> Result<()> {
    let reject = |reason| {
        Err(Error::UnsupportedName {
            name: name.to_string(),
            reason,
        })
    };
    if name.is_empty() {
        return reject("empty name");
    }
    if name.contains(['\n', '\r']) {
        return reject("contains a line break");
    }
    if name.trim() != name {
        return reject("leading or trailing whitespace");
    }
    let mut run = 0;
    for c in name.chars() {
        if c.is_whitespace() {
            run += c.len_utf8();
            if run > MAX_WHITESPACE_RUN {
                return reject("whitespace run too long to wrap");
            }
        } else {
            run = 0;
        }
    }
    Ok(())
}

/// Which header label a document carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Manifest,
    Signature,
}

impl ManifestKind {
    pub fn label(&self) -> &'static str {
        match self {
            ManifestKind::Manifest => "Manifest",
            ManifestKind::Signature => "Signature",
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An ordered list of sections with a version header
///
/// A signature file is a `Manifest` of kind `Signature`: its header also
/// carries digests of the whole parent manifest, and its per-section body
/// may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    kind: ManifestKind,
    version: String,
    sections: Vec<Section>,
    digest_manifests: Digests,
    omit_individual_sections: bool,
}

impl Manifest {
    /// Plain content manifest
    pub fn new(sections: Vec<Section>) -> Self {
        Self {
            kind: ManifestKind::Manifest,
            version: FORMAT_VERSION.to_string(),
            sections,
            digest_manifests: Digests::new(),
            omit_individual_sections: false,
        }
    }

    /// Signature file over a manifest
    pub fn signature(
        sections: Vec<Section>,
        digest_manifests: Digests,
        omit_individual_sections: bool,
    ) -> Self {
        Self {
            kind: ManifestKind::Signature,
            version: FORMAT_VERSION.to_string(),
            sections,
            digest_manifests,
            omit_individual_sections,
        }
    }

    pub fn kind(&self) -> ManifestKind {
        self.kind
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Section> {
        self.sections.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// Look a section up by entry path
    pub fn find(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Digests of the serialized parent manifest (signature files only)
    pub fn digest_manifests(&self) -> &Digests {
        &self.digest_manifests
    }

    pub fn omit_individual_sections(&self) -> bool {
        self.omit_individual_sections
    }

    /// Version line, plus the digest-manifest lines for signature files.
    /// No trailing newline.
    pub fn header(&self) -> String {
        let mut lines = vec![format!("{}-Version: {}", self.kind.label(), self.version)];
        if self.kind == ManifestKind::Signature {
            for (algo, value) in &self.digest_manifests {
                lines.push(format!(
                    "{}-Digest-Manifest: {}",
                    algo.header_label(),
                    STANDARD.encode(value)
                ));
            }
        }
        lines.join("\n")
    }

    /// Header terminated by a newline: the exact bytes a signing provider
    /// signs for a signature file.
    pub fn header_block(&self) -> String {
        format!("{}\n", self.header())
    }

    /// Serialized sections separated by blank lines
    pub fn body(&self) -> String {
        self.sections
            .iter()
            .map(Section::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == ManifestKind::Signature && self.omit_individual_sections {
            return f.write_str(&self.header_block());
        }
        write!(f, "{}\n\n{}", self.header(), self.body())
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a Section;
    type IntoIter = std::slice::Iter<'a, Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.iter()
    }
}
