//! Scan configuration.
//!
//! Everything a scan needs to know about the release besides its files:
//! the names to look for, the platform being packaged for, and the tables
//! that can be extended per project. Loaded from TOML or built in code.
//!
//! ```toml
//! repository = "hugo"
//! versions = ["0.120.0"]
//! tags = ["v0.120.0"]
//!
//! [alternatives]
//! amd64 = ["extended"]
//!
//! [libraries]
//! "libfoo.so.1" = "dev-libs/foo"
//! ```

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::deps::DependencyTable;
use crate::dictionary::Dictionary;
use crate::useflags::Alternatives;

/// Errors raised while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Underlying I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The file is not valid configuration TOML.
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Repository name, also the default program name.
    pub repository: String,
    /// Version strings that appear in filenames.
    pub versions: Vec<String>,
    /// Tag strings that appear in filenames.
    pub tags: Vec<String>,
    /// Operating system being packaged for.
    pub target_os: String,
    /// Keyword assumed when a filename names no architecture.
    pub default_keyword: String,
    /// An archive that looks like a source tarball is skipped when a scope
    /// holds more files than this.
    pub source_archive_threshold: usize,
    /// How many levels of archives are opened.
    pub max_archive_depth: usize,
    /// Declared alternate programs per keyword.
    pub alternatives: BTreeMap<String, Vec<String>>,
    /// Extra library to package lookups.
    pub libraries: BTreeMap<String, String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            repository: String::new(),
            versions: Vec::new(),
            tags: Vec::new(),
            target_os: "linux".to_string(),
            default_keyword: "~amd64".to_string(),
            source_archive_threshold: 2,
            max_archive_depth: 1,
            alternatives: BTreeMap::new(),
            libraries: BTreeMap::new(),
        }
    }
}

impl ScanConfig {
    /// Defaults for `repository`.
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            ..Self::default()
        }
    }

    /// Add a version string, builder style.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.versions.push(version.into());
        self
    }

    /// Add a tag string, builder style.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Load a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid input.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Dictionary seeded with this release's names.
    pub fn dictionary(&self) -> Dictionary {
        Dictionary::for_release(&self.repository, &self.versions, &self.tags)
    }

    /// Built-in dependency table plus the configured libraries.
    pub fn dependency_table(&self) -> DependencyTable {
        let mut table = DependencyTable::standard();
        table.extend(self.libraries.clone());
        table
    }

    /// Alternates declared in the configuration.
    pub fn declared_alternatives(&self) -> Alternatives {
        let mut alternatives = Alternatives::new();
        for (keyword, programs) in &self.alternatives {
            for program in programs {
                alternatives.add(keyword, program);
            }
        }
        alternatives
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::new("hugo");
        assert_eq!(config.target_os, "linux");
        assert_eq!(config.default_keyword, "~amd64");
        assert_eq!(config.source_archive_threshold, 2);
        assert_eq!(config.max_archive_depth, 1);
        assert!(config.declared_alternatives().is_empty());
    }

    #[test]
    fn test_from_toml() {
        let config = ScanConfig::from_toml_str(
            r#"
repository = "hugo"
versions = ["0.120.0"]
tags = ["v0.120.0"]

[alternatives]
amd64 = ["extended"]
"~arm64" = ["extended"]

[libraries]
"libfoo.so.1" = "dev-libs/foo"
"#,
        )
        .unwrap();

        assert_eq!(config.repository, "hugo");
        assert_eq!(config.target_os, "linux");
        assert_eq!(
            config.declared_alternatives().to_pairs(),
            vec!["amd64:extended", "arm64:extended"]
        );
        assert_eq!(
            config.dependency_table().lookup("libfoo.so.1"),
            Some("dev-libs/foo")
        );
        assert_eq!(
            config.dependency_table().lookup("libc.so.6"),
            Some("sys-libs/glibc")
        );
        assert!(
            config
                .dictionary()
                .match_at("hugo_v0.120.0", 5, false)
                .is_some_and(|m| m.tag)
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relscan.toml");
        std::fs::write(&path, "repository = \"jan\"\ntarget_os = \"windows\"\n").unwrap();

        let config = ScanConfig::load(&path).unwrap();
        assert_eq!(config.repository, "jan");
        assert_eq!(config.target_os, "windows");

        assert!(matches!(
            ScanConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_invalid_toml() {
        let err = ScanConfig::from_toml_str("versions = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
