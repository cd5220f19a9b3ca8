//! Scan command

use std::path::Path;

use anyhow::{Context, Result, bail};
use relscan_core::{DirectorySource, ScanConfig};
use relscan_schema::Manifest;

/// Classify every file in `dir` as one release.
///
/// # Errors
///
/// Returns an error if `dir` is not a directory or the scan fails.
pub fn scan(dir: &Path, config: &ScanConfig) -> Result<Manifest> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    relscan_core::scan(&DirectorySource::new(dir), config)
        .with_context(|| format!("Failed to scan {}", dir.display()))
}

/// Print the manifest of `dir` as JSON.
///
/// # Errors
///
/// Returns an error if the scan fails or the manifest cannot be serialized.
pub fn run(dir: &Path, config: &ScanConfig) -> Result<()> {
    let manifest = scan(dir, config)?;
    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("tool");
        std::fs::write(&file, b"x").unwrap();
        let err = scan(&file, &ScanConfig::new("tool")).unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }

    #[test]
    fn test_nothing_found() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README.md"), b"docs").unwrap();
        let err = scan(dir.path(), &ScanConfig::new("tool")).unwrap_err();
        assert!(format!("{err:#}").contains("no binaries or archives found"));
    }
}
