//! Manifest entry ordering
//!
//! Install metadata is digested first and license files last. The numeric
//! class values appear in logs and in comparisons against hand-authored
//! reference manifests, so they are fixed; class 3 is intentionally unused.

use std::fmt;

use serde::Serialize;

/// Ordering class of an archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum PriorityClass {
    /// `install.rdf`
    InstallManifest = 1,
    /// `chrome.manifest` and the add-on icons
    ChromeMetadata = 2,
    Content = 4,
    /// License texts
    License = 5,
}

const CHROME_METADATA: [&str; 3] = ["chrome.manifest", "icon.png", "icon64.png"];
const LICENSE_FILES: [&str; 6] = ["MPL", "GPL", "LGPL", "COPYING", "LICENSE", "license.txt"];

impl PriorityClass {
    /// Classify an entry by its full archive path (exact match)
    pub fn of(name: &str) -> Self {
        if name == "install.rdf" {
            PriorityClass::InstallManifest
        } else if CHROME_METADATA.contains(&name) {
            PriorityClass::ChromeMetadata
        } else if LICENSE_FILES.contains(&name) {
            PriorityClass::License
        } else {
            PriorityClass::Content
        }
    }

    pub fn value(self) -> u8 {
        self as u8
    }
}

/// Sort key for archive entries: class, then lower-cased directory, then
/// lower-cased base name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileKey {
    pub class: PriorityClass,
    pub directory: String,
    pub base_name: String,
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.class.value(), self.directory, self.base_name)
    }
}

/// Compute the sort key for an entry path
pub fn file_key(name: &str) -> FileKey {
    let lower = name.to_lowercase();
    let (directory, base_name) = split_path(&lower);
    FileKey {
        class: PriorityClass::of(name),
        directory: directory.to_string(),
        base_name: base_name.to_string(),
    }
}

/// Split at the last `/`, dropping the separators between the two halves
fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => {
            let head = path[..idx].trim_end_matches('/');
            let head = if head.is_empty() { &path[..=idx] } else { head };
            (head, &path[idx + 1..])
        }
        None => ("", path),
    }
}

/// Sort entry names into manifest order (stable)
pub fn sort_entries<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by_cached_key(|name| file_key(name.as_ref()));
}

/// Directory marker: an entry path ending in a path separator
pub fn is_directory(name: &str) -> bool {
    name.ends_with('/') || name.ends_with('\\')
}
