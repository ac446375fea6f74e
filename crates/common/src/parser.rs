//! Manifest / signature file parser
//!
//! A line-oriented state machine. Physical lines are stripped of trailing
//! whitespace and two blank lines are appended to the input, so the final
//! section is always flushed even when the buffer lacks the terminating
//! newlines the JAR format requires.
//!
//! Continuation lines are folded into the value of the header they follow
//! before that header is interpreted, so wrapped names and wrapped base64
//! values both decode as one logical value.

use std::collections::BTreeSet;
use std::mem;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::digest::{DigestAlgorithm, Digests};
use crate::manifest::{Manifest, ManifestKind, Section, MAX_LINE_LENGTH};
use crate::ordering::is_directory;
use crate::{Error, Result};

/// Format-agnostic result of parsing a manifest or signature file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedDocument {
    /// Kind and value of the last `*-Version` header seen
    pub version: Option<(ManifestKind, String)>,
    pub sections: Vec<Section>,
    pub digest_manifests: Digests,
}

impl ParsedDocument {
    /// Kind announced by the version header, if any
    pub fn kind(&self) -> Option<ManifestKind> {
        self.version.as_ref().map(|(kind, _)| *kind)
    }

    pub fn into_manifest(self) -> Manifest {
        Manifest::new(self.sections)
    }

    pub fn into_signature(self, omit_individual_sections: bool) -> Manifest {
        Manifest::signature(
            self.sections,
            self.digest_manifests,
            omit_individual_sections,
        )
    }
}

impl Manifest {
    /// Parse a `manifest.mf` buffer
    pub fn parse(text: &str) -> Result<Self> {
        parse(text).map(ParsedDocument::into_manifest)
    }

    /// Parse a signature file buffer
    pub fn parse_signature(text: &str, omit_individual_sections: bool) -> Result<Self> {
        parse(text).map(|doc| doc.into_signature(omit_individual_sections))
    }
}

/// Parse manifest text into sections and digest-manifest values
pub fn parse(text: &str) -> Result<ParsedDocument> {
    let mut parser = Parser::default();
    for (idx, raw) in text.lines().chain(["", ""]).enumerate() {
        parser.feed(idx + 1, raw)?;
    }
    debug!(
        sections = parser.doc.sections.len(),
        digest_manifests = parser.doc.digest_manifests.len(),
        "Parsed manifest"
    );
    Ok(parser.doc)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKey {
    Version(ManifestKind),
    Name,
    DigestAlgorithms,
    Digest(DigestAlgorithm),
    DigestManifest(DigestAlgorithm),
}

impl HeaderKey {
    fn classify(key: &str) -> Option<Self> {
        let key = key.to_ascii_lowercase();
        match key.as_str() {
            "manifest-version" => Some(HeaderKey::Version(ManifestKind::Manifest)),
            "signature-version" => Some(HeaderKey::Version(ManifestKind::Signature)),
            "name" => Some(HeaderKey::Name),
            "digest-algorithms" => Some(HeaderKey::DigestAlgorithms),
            _ => {
                if let Some(algo) = key.strip_suffix("-digest-manifest") {
                    algo.parse().ok().map(HeaderKey::DigestManifest)
                } else if let Some(algo) = key.strip_suffix("-digest") {
                    algo.parse().ok().map(HeaderKey::Digest)
                } else {
                    None
                }
            }
        }
    }
}

/// A header whose value may still grow through continuation lines
#[derive(Debug)]
struct PendingHeader {
    line: usize,
    key: HeaderKey,
    value: String,
}

#[derive(Debug, Default)]
struct PendingSection {
    name: Option<String>,
    directory: bool,
    algorithms: Option<(usize, Vec<DigestAlgorithm>)>,
    digests: Digests,
}

impl PendingSection {
    fn is_empty(&self) -> bool {
        !self.directory && self.name.is_none() && self.algorithms.is_none() && self.digests.is_empty()
    }
}

#[derive(Debug, Default)]
struct Parser {
    doc: ParsedDocument,
    header: Option<PendingHeader>,
    section: PendingSection,
}

impl Parser {
    fn feed(&mut self, lineno: usize, raw: &str) -> Result<()> {
        let line = raw.trim_end();

        if line.len() > MAX_LINE_LENGTH {
            return Err(Error::parse(
                lineno,
                format!("line too long ({} bytes)", line.len()),
            ));
        }

        if line.is_empty() {
            return self.end_section(lineno);
        }

        if let Some(rest) = line.strip_prefix(' ') {
            return match self.header.as_mut() {
                Some(header) => {
                    header.value.push_str(rest);
                    Ok(())
                }
                None => Err(Error::parse(
                    lineno,
                    "continued line without previous header",
                )),
            };
        }

        self.commit_header()?;

        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| Error::parse(lineno, format!("unrecognized line format: \"{}\"", line)))?;
        let key = HeaderKey::classify(key.trim_end()).ok_or_else(|| {
            Error::parse(lineno, format!("unrecognized header: \"{}\"", line))
        })?;

        self.header = Some(PendingHeader {
            line: lineno,
            key,
            value: value.trim_start().to_string(),
        });
        Ok(())
    }

    fn commit_header(&mut self) -> Result<()> {
        let Some(header) = self.header.take() else {
            return Ok(());
        };

        match header.key {
            HeaderKey::Version(kind) => {
                self.doc.version = Some((kind, header.value.trim().to_string()));
            }
            HeaderKey::DigestManifest(algo) => {
                let value = decode(header.line, &header.value)?;
                self.doc.digest_manifests.insert(algo, value);
            }
            HeaderKey::Name => {
                if is_directory(&header.value) {
                    debug!(name = %header.value, "Skipping directory entry");
                    self.section.directory = true;
                } else {
                    self.section.name = Some(header.value);
                }
            }
            HeaderKey::DigestAlgorithms => {
                let algorithms = header
                    .value
                    .split_whitespace()
                    .map(|name| {
                        name.parse::<DigestAlgorithm>().map_err(|_| {
                            Error::parse(
                                header.line,
                                format!("unsupported digest algorithm: {}", name),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.section.algorithms = Some((header.line, algorithms));
            }
            HeaderKey::Digest(algo) => {
                let value = decode(header.line, &header.value)?;
                self.section.digests.insert(algo, value);
            }
        }
        Ok(())
    }

    fn end_section(&mut self, lineno: usize) -> Result<()> {
        self.commit_header()?;

        let section = mem::take(&mut self.section);
        if section.is_empty() || section.directory {
            return Ok(());
        }

        let name = section
            .name
            .ok_or_else(|| Error::parse(lineno, "section without a Name header"))?;

        if let Some((line, algorithms)) = section.algorithms {
            let listed: BTreeSet<_> = algorithms.into_iter().collect();
            let present: BTreeSet<_> = section.digests.keys().copied().collect();
            if listed != present {
                return Err(Error::parse(
                    line,
                    format!("Digest-Algorithms of \"{}\" do not match its digests", name),
                ));
            }
        }

        self.doc.sections.push(Section::new(name, section.digests));
        Ok(())
    }
}

fn decode(line: usize, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value.trim())
        .map_err(|e| Error::parse(line, format!("invalid base64 value: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::digest;

    const MD5_ABC: &str = "kAFQmDzST7DWlj99KOF/cg==";
    const SHA1_ABC: &str = "qZk+NkcGgWq6PiVxeFDCbJzQ2J0=";

    fn entry(name: &str) -> String {
        format!(
            "Name: {}\nDigest-Algorithms: MD5 SHA1\nMD5-Digest: {}\nSHA1-Digest: {}\n",
            name, MD5_ABC, SHA1_ABC
        )
    }

    #[test]
    fn test_parse_manifest() {
        let text = format!("Manifest-Version: 1.0\n\n{}\n{}", entry("install.rdf"), entry("a/b.js"));
        let doc = parse(&text).unwrap();

        assert_eq!(doc.kind(), Some(ManifestKind::Manifest));
        assert_eq!(doc.version.as_ref().unwrap().1, "1.0");
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].name(), "install.rdf");
        assert_eq!(doc.sections[1].name(), "a/b.js");
        assert_eq!(doc.sections[0].digests(), &digest(b"abc"));
        assert!(doc.digest_manifests.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let sections = vec![
            Section::new("install.rdf", digest(b"<rdf/>")),
            Section::new("chrome/".to_string() + &"deep/".repeat(30) + "file.js", digest(b"js")),
            Section::new("icon.png", digest(b"\x89PNG")),
        ];
        let manifest = Manifest::new(sections.clone());
        let parsed = Manifest::parse(&manifest.to_string()).unwrap();
        assert_eq!(parsed.sections(), sections.as_slice());
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_round_trip_whitespace_run_at_wrap_point() {
        let name = "x".repeat(60) + &" ".repeat(20) + "y";
        let manifest = Manifest::new(vec![Section::new(name.clone(), digest(b"a"))]);
        let text = manifest.to_string();

        assert!(text.lines().all(|l| l.len() <= MAX_LINE_LENGTH));
        assert!(text.lines().all(|l| !l.ends_with(' ')));
        let parsed = Manifest::parse(&text).unwrap();
        assert_eq!(parsed.sections()[0].name(), name);
    }

    #[test]
    fn test_round_trip_longest_whitespace_runs() {
        use crate::manifest::{check_name, MAX_WHITESPACE_RUN};

        let run = " ".repeat(MAX_WHITESPACE_RUN);
        for prefix in [1, 40, 65, 66, 67, 100, 137, 138] {
            let name = "a".repeat(prefix) + &run + "é" + &run + "\u{20ac}";
            check_name(&name).unwrap();
            let manifest = Manifest::new(vec![Section::new(name.clone(), digest(b"a"))]);
            let parsed = Manifest::parse(&manifest.to_string()).unwrap();
            assert_eq!(parsed.sections()[0].name(), name, "prefix {}", prefix);
        }
    }

    #[test]
    fn test_signature_round_trip() {
        let sections = vec![Section::new("a.txt", digest(b"section text"))];
        let sig = Manifest::signature(sections.clone(), digest(b"manifest"), false);
        let doc = parse(&sig.to_string()).unwrap();

        assert_eq!(doc.kind(), Some(ManifestKind::Signature));
        assert_eq!(doc.sections, sections);
        assert_eq!(doc.digest_manifests, digest(b"manifest"));
        assert_eq!(doc.into_signature(false), sig);
    }

    #[test]
    fn test_omitted_signature_parses_header_only() {
        let sig = Manifest::signature(
            vec![Section::new("a.txt", digest(b"x"))],
            digest(b"manifest"),
            true,
        );
        let parsed = Manifest::parse_signature(&sig.to_string(), true).unwrap();
        assert!(parsed.is_empty());
        assert_eq!(parsed.digest_manifests(), sig.digest_manifests());
    }

    #[test]
    fn test_line_too_long() {
        let name = "x".repeat(MAX_LINE_LENGTH - "Name: ".len() + 1);
        let text = format!("Manifest-Version: 1.0\n\nName: {}\n", name);
        let err = parse(&text).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_line_at_limit_is_accepted() {
        let name = "x".repeat(MAX_LINE_LENGTH - "Name: ".len());
        let text = format!("Name: {}\nDigest-Algorithms: MD5\nMD5-Digest: {}\n", name, MD5_ABC);
        let doc = parse(&text).unwrap();
        assert_eq!(doc.sections[0].name(), name);
    }

    #[test]
    fn test_trailing_whitespace_is_not_counted() {
        let text = format!("Manifest-Version: 1.0{}\n", " ".repeat(80));
        assert!(parse(&text).is_ok());
    }

    #[test]
    fn test_continued_name() {
        let text = format!(
            "Name: chrome/content/very/long\n /path.js\nDigest-Algorithms: MD5\nMD5-Digest: {}\n",
            MD5_ABC
        );
        let doc = parse(&text).unwrap();
        assert_eq!(doc.sections[0].name(), "chrome/content/very/long/path.js");
    }

    #[test]
    fn test_continued_digest_value() {
        let text = format!(
            "Name: a\nDigest-Algorithms: SHA1\nSHA1-Digest: {}\n {}\n",
            &SHA1_ABC[..10],
            &SHA1_ABC[10..]
        );
        let doc = parse(&text).unwrap();
        assert_eq!(
            doc.sections[0].digest(DigestAlgorithm::Sha1).unwrap(),
            digest(b"abc")[&DigestAlgorithm::Sha1].as_slice()
        );
    }

    #[test]
    fn test_continuation_without_header() {
        let err = parse(" orphan\n").unwrap_err();
        assert_eq!(err.line(), Some(1));

        let err = parse("Manifest-Version: 1.0\n\n orphan\n").unwrap_err();
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_unrecognized_header() {
        let err = parse("Manifest-Version: 1.0\nCreated-By: 1.6 (Sun)\n").unwrap_err();
        assert_eq!(err.line(), Some(2));

        let err = parse("Manifest-Version: 1.0\n\nName: a\nSHA256-Digest: AAAA\n").unwrap_err();
        assert_eq!(err.line(), Some(4));

        let err = parse("no colon here\n").unwrap_err();
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let text = format!(
            "manifest-version : 1.0\n\nname:a.txt\ndigest-algorithms: md5 sha1\nmd5-digest :{}\nsha1-DIGEST: {}\n",
            MD5_ABC, SHA1_ABC
        );
        let doc = parse(&text).unwrap();
        assert_eq!(doc.sections[0].name(), "a.txt");
        assert_eq!(doc.sections[0].digests(), &digest(b"abc"));
    }

    #[test]
    fn test_directories_are_discarded() {
        let text = format!(
            "Manifest-Version: 1.0\n\n{}\n{}\n{}",
            entry("chrome/"),
            entry("a.txt"),
            entry("win\\dir\\")
        );
        let doc = parse(&text).unwrap();
        let names: Vec<_> = doc.sections.iter().map(Section::name).collect();
        assert_eq!(names, vec!["a.txt"]);
    }

    #[test]
    fn test_crlf_and_missing_final_newlines() {
        let text = format!(
            "Manifest-Version: 1.0\r\n\r\nName: a\r\nDigest-Algorithms: MD5\r\nMD5-Digest: {}",
            MD5_ABC
        );
        let doc = parse(&text).unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].name(), "a");
    }

    #[test]
    fn test_digest_manifest_header() {
        let text = format!(
            "Signature-Version: 1.0\nMD5-Digest-Manifest: {}\nSHA1-Digest-Manifest: {}\n",
            MD5_ABC, SHA1_ABC
        );
        let doc = parse(&text).unwrap();
        assert_eq!(doc.kind(), Some(ManifestKind::Signature));
        assert!(doc.sections.is_empty());
        assert_eq!(doc.digest_manifests, digest(b"abc"));
    }

    #[test]
    fn test_section_without_name() {
        let text = format!("Manifest-Version: 1.0\n\nDigest-Algorithms: MD5\nMD5-Digest: {}\n", MD5_ABC);
        let err = parse(&text).unwrap_err();
        assert_eq!(err.line(), Some(5));
    }

    #[test]
    fn test_algorithm_mismatch() {
        let text = format!("Name: a\nDigest-Algorithms: MD5 SHA1\nMD5-Digest: {}\n", MD5_ABC);
        let err = parse(&text).unwrap_err();
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_unsupported_algorithm_list() {
        let text = "Name: a\nDigest-Algorithms: MD5 SHA256\n";
        let err = parse(text).unwrap_err();
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_invalid_base64() {
        let err = parse("Name: a\nDigest-Algorithms: MD5\nMD5-Digest: not*base64\n").unwrap_err();
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_empty_input() {
        let doc = parse("").unwrap();
        assert!(doc.sections.is_empty());
        assert!(doc.version.is_none());
    }
}
