//! Per-program release manifest.
//!
//! This is what a scan hands to its consumer: which release file supplies
//! each architecture of each program, the documents and completion scripts
//! that travel with it, the packages it links against, and the USE flag
//! constraints that keep alternate builds mutually exclusive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a file comes from and what it is installed as.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileReference {
    /// Release asset name with version and tag replaced by placeholders.
    pub release_filename: String,
    /// Member path inside the release asset, for archived files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<String>,
    /// Filename to install under.
    pub installed_name: String,
}

impl FileReference {
    /// Whether the file has to be extracted from an archive.
    pub fn is_archived(&self) -> bool {
        self.archive_path.is_some()
    }
}

/// A manual page together with its section.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManualPage {
    /// Manual section, e.g. `1`.
    pub section: u8,
    /// Source and destination of the page.
    #[serde(flatten)]
    pub file: FileReference,
}

/// One installable program found in a release.
///
/// Maps are keyed by architecture keyword without the `~` prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Program name; the repository name for the default program.
    pub name: String,
    /// Binary supplying each keyword.
    pub binaries: BTreeMap<String, FileReference>,
    /// Documents shipped next to the binary.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub documents: BTreeMap<String, Vec<FileReference>>,
    /// Manual pages shipped next to the binary.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub manual_pages: BTreeMap<String, Vec<ManualPage>>,
    /// Completion scripts per keyword, then per shell.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub shell_completions: BTreeMap<String, BTreeMap<String, FileReference>>,
    /// Packages the binaries link against, in discovery order.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Program {
    /// Create an empty program.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Keywords this program has a binary for, sorted.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.binaries.keys().map(String::as_str)
    }

    /// Whether any binary has to be extracted from an archive.
    pub fn is_archived(&self) -> bool {
        self.binaries.values().any(FileReference::is_archived)
    }

    /// Add a dependency unless it is already listed.
    pub fn add_dependency(&mut self, package: &str) {
        if !self.dependencies.iter().any(|d| d == package) {
            self.dependencies.push(package.to_string());
        }
    }
}

/// Flags a build of one (program, keyword) pair must and must not have.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseFlags {
    /// Flags that must be enabled.
    pub must_have: Vec<String>,
    /// Flags that must be disabled.
    pub must_not_have: Vec<String>,
}

impl UseFlags {
    /// Whether neither set constrains anything.
    pub fn is_empty(&self) -> bool {
        self.must_have.is_empty() && self.must_not_have.is_empty()
    }
}

/// Everything a scan learned about one release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Repository name the dictionary was seeded with.
    pub repository: String,
    /// Programs by name.
    pub programs: BTreeMap<String, Program>,
    /// Alternate builds as `keyword:program`, sorted and de-duplicated.
    #[serde(default)]
    pub alternatives: Vec<String>,
    /// USE flag constraints by program, then keyword.
    #[serde(default)]
    pub use_flags: BTreeMap<String, BTreeMap<String, UseFlags>>,
}

impl Manifest {
    /// All keywords any program supplies, sorted and de-duplicated.
    pub fn keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = self
            .programs
            .values()
            .flat_map(|p| p.keywords().map(str::to_string))
            .collect();
        keywords.sort();
        keywords.dedup();
        keywords
    }

    /// Keywords with the unstable `~` prefix, space separated.
    pub fn masked_keywords(&self) -> String {
        self.keywords()
            .iter()
            .map(|k| format!("~{}", k.trim_start_matches('~')))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
