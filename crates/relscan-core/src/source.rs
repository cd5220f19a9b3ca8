//! Release asset sources.
//!
//! The engine never talks to a hosting service directly. It is handed an
//! [`AssetSource`] that can list a release's assets and stream the bytes of
//! one of them.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while listing or fetching assets.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Underlying I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The source has no asset with this name.
    #[error("Asset not found: {0}")]
    NotFound(String),
}

/// One file published in a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// Asset filename.
    pub name: String,
    /// Where the asset can be downloaded from.
    pub download_url: String,
}

impl ReleaseAsset {
    /// Create an asset record.
    pub fn new(name: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            download_url: download_url.into(),
        }
    }
}

/// Supplies the assets of one release.
pub trait AssetSource {
    /// List the release's assets.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be produced.
    fn assets(&self) -> Result<Vec<ReleaseAsset>, SourceError>;

    /// Stream the content of one asset.
    ///
    /// # Errors
    ///
    /// Returns an error if the asset is unknown or cannot be read.
    fn fetch(&self, asset: &ReleaseAsset) -> Result<Box<dyn Read + '_>, SourceError>;
}

/// Release assets stored as files in a local directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Serve the regular files directly inside `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory being served.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirectorySource {
    fn assets(&self) -> Result<Vec<ReleaseAsset>, SourceError> {
        let mut assets = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let url = format!("file://{}", entry.path().display());
            assets.push(ReleaseAsset::new(name, url));
        }
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(assets)
    }

    fn fetch(&self, asset: &ReleaseAsset) -> Result<Box<dyn Read + '_>, SourceError> {
        let path = self.root.join(&asset.name);
        if !path.is_file() {
            return Err(SourceError::NotFound(asset.name.clone()));
        }
        Ok(Box::new(File::open(path)?))
    }
}

/// Release assets held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset, builder style.
    pub fn with_file(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(name, content);
        self
    }

    /// Add or replace an asset.
    pub fn insert(&mut self, name: &str, content: impl Into<Vec<u8>>) {
        self.files.insert(name.to_string(), content.into());
    }
}

impl AssetSource for MemorySource {
    fn assets(&self) -> Result<Vec<ReleaseAsset>, SourceError> {
        Ok(self
            .files
            .keys()
            .map(|name| ReleaseAsset::new(name.clone(), format!("memory://{name}")))
            .collect())
    }

    fn fetch(&self, asset: &ReleaseAsset) -> Result<Box<dyn Read + '_>, SourceError> {
        let content = self
            .files
            .get(&asset.name)
            .ok_or_else(|| SourceError::NotFound(asset.name.clone()))?;
        Ok(Box::new(content.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_all(mut reader: Box<dyn Read + '_>) -> Vec<u8> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_directory_source_lists_sorted_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.tar.gz"), b"b").unwrap();
        fs::write(dir.path().join("a.zip"), b"a").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let source = DirectorySource::new(dir.path());
        let assets = source.assets().unwrap();
        let names: Vec<_> = assets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a.zip", "b.tar.gz"]);
        assert!(assets[0].download_url.starts_with("file://"));
        assert_eq!(read_all(source.fetch(&assets[1]).unwrap()), b"b");
    }

    #[test]
    fn test_directory_source_missing_asset() {
        let dir = TempDir::new().unwrap();
        let source = DirectorySource::new(dir.path());
        let missing = ReleaseAsset::new("nope", "file:///nope");
        assert!(matches!(source.fetch(&missing), Err(SourceError::NotFound(_))));
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new().with_file("tool", b"\x7fELF".to_vec());
        let assets = source.assets().unwrap();
        assert_eq!(assets, vec![ReleaseAsset::new("tool", "memory://tool")]);
        assert_eq!(read_all(source.fetch(&assets[0]).unwrap()), b"\x7fELF");
        assert!(source.fetch(&ReleaseAsset::new("x", "y")).is_err());
    }
}
