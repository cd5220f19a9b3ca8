//! Archive member extraction.
//!
//! Handles zip, and tar optionally wrapped in gzip or bzip2. Debian and RPM
//! packages are recognised but never opened.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use relscan_schema::{ContainerKind, join_chain};
use thiserror::Error;
use zip::ZipArchive;

use crate::resource::LocalResource;

/// Errors raised while reading an archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Underlying I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The container chain does not name a format we can read.
    #[error("Unsupported container chain: {0}")]
    UnsupportedChain(String),

    /// The archive itself is malformed.
    #[error("Archive error: {0}")]
    Archive(String),
}

/// Supported container layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// Plain tar.
    Tar,
    /// Gzip-compressed tar.
    TarGz,
    /// Bzip2-compressed tar.
    TarBz2,
    /// Zip.
    Zip,
    /// Debian package, never opened.
    Deb,
    /// RPM package, never opened.
    Rpm,
}

impl ContainerFormat {
    /// Pick the format for a filename's container chain (outer to inner).
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::UnsupportedChain`] for any other combination.
    pub fn from_chain(chain: &[ContainerKind]) -> Result<Self, ArchiveError> {
        match chain {
            [ContainerKind::Tar] => Ok(Self::Tar),
            [ContainerKind::Tar, ContainerKind::Gz] => Ok(Self::TarGz),
            [ContainerKind::Tar, ContainerKind::Bz2] => Ok(Self::TarBz2),
            [ContainerKind::Zip] => Ok(Self::Zip),
            [ContainerKind::Deb] => Ok(Self::Deb),
            [ContainerKind::Rpm] => Ok(Self::Rpm),
            _ => Err(ArchiveError::UnsupportedChain(join_chain(chain))),
        }
    }

    /// Whether members of this format are extracted.
    pub fn is_extracted(self) -> bool {
        !matches!(self, Self::Deb | Self::Rpm)
    }
}

/// One regular file extracted from an archive.
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    /// Full path inside the archive.
    pub path: String,
    /// Directory part of `path`, including the trailing `/`.
    pub directory: String,
    /// Filename part of `path`.
    pub name: String,
    /// Owner read and execute bits are both set.
    pub is_executable: bool,
    /// Extracted content.
    pub resource: LocalResource,
}

impl ArchiveMember {
    fn new(path: String, is_executable: bool, resource: LocalResource) -> Self {
        let split = path.rfind('/').map_or(0, |i| i + 1);
        let (directory, name) = path.split_at(split);
        Self {
            directory: directory.to_string(),
            name: name.to_string(),
            path,
            is_executable,
            resource,
        }
    }
}

fn is_executable(mode: u32) -> bool {
    mode & 0o500 == 0o500
}

/// Extract every regular file of the archive at `path`.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or a member cannot be
/// read or materialized.
pub fn extract_members(format: ContainerFormat, path: &Path) -> Result<Vec<ArchiveMember>, ArchiveError> {
    match format {
        ContainerFormat::Deb | ContainerFormat::Rpm => Ok(Vec::new()),
        ContainerFormat::Tar => extract_tar(BufReader::new(File::open(path)?)),
        ContainerFormat::TarGz => {
            extract_tar(GzDecoder::new(BufReader::new(File::open(path)?)))
        }
        ContainerFormat::TarBz2 => {
            extract_tar(BzDecoder::new(BufReader::new(File::open(path)?)))
        }
        ContainerFormat::Zip => extract_zip(File::open(path)?),
    }
}

/// Extract a tar stream
fn extract_tar<R: Read>(reader: R) -> Result<Vec<ArchiveMember>, ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    let mut members = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;

        // Skip directories
        if entry.header().entry_type().is_dir() {
            continue;
        }

        let path = entry.path()?.to_string_lossy().into_owned();
        if path.ends_with('/') {
            continue;
        }
        let executable = entry.header().mode().is_ok_and(is_executable);
        let resource = LocalResource::from_reader(&path, &mut entry)?;
        members.push(ArchiveMember::new(path, executable, resource));
    }

    Ok(members)
}

/// Extract a zip archive
fn extract_zip(file: File) -> Result<Vec<ArchiveMember>, ArchiveError> {
    let mut archive = ZipArchive::new(file).map_err(|e| ArchiveError::Archive(e.to_string()))?;
    let mut members = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ArchiveError::Archive(e.to_string()))?;
        if file.is_dir() {
            continue;
        }
        let path = file.name().to_string();
        let executable = file.unix_mode().is_some_and(is_executable);
        let resource = LocalResource::from_reader(&path, &mut file)?;
        members.push(ArchiveMember::new(path, executable, resource));
    }

    Ok(members)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn materialize(bytes: &[u8]) -> LocalResource {
        LocalResource::from_reader("fixture", &mut &bytes[..]).unwrap()
    }

    const ENTRIES: &[fixtures::Entry<'static>] = &[
        ("hugo_0.1_linux-amd64/", b"", 0o755),
        ("hugo_0.1_linux-amd64/hugo", b"binary", 0o755),
        ("hugo_0.1_linux-amd64/README.md", b"readme", 0o644),
        ("LICENSE", b"license", 0o400),
    ];

    fn check(members: &[ArchiveMember]) {
        let paths: Vec<_> = members.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["hugo_0.1_linux-amd64/hugo", "hugo_0.1_linux-amd64/README.md", "LICENSE"]
        );
        assert_eq!(members[0].directory, "hugo_0.1_linux-amd64/");
        assert_eq!(members[0].name, "hugo");
        assert!(members[0].is_executable);
        assert!(!members[1].is_executable);
        assert!(!members[2].is_executable);
        assert_eq!(members[2].directory, "");
        assert_eq!(members[0].resource.read().unwrap(), b"binary");
    }

    #[test]
    fn test_format_from_chain() {
        use ContainerKind::{Bz2, Deb, Gz, Tar, Zip};
        assert_eq!(ContainerFormat::from_chain(&[Tar, Gz]).unwrap(), ContainerFormat::TarGz);
        assert_eq!(ContainerFormat::from_chain(&[Tar, Bz2]).unwrap(), ContainerFormat::TarBz2);
        assert_eq!(ContainerFormat::from_chain(&[Zip]).unwrap(), ContainerFormat::Zip);
        assert!(!ContainerFormat::from_chain(&[Deb]).unwrap().is_extracted());
        let err = ContainerFormat::from_chain(&[Gz, Tar]).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedChain(ref c) if c == "gz.tar"));
        assert!(ContainerFormat::from_chain(&[]).is_err());
    }

    #[test]
    fn test_extract_tar() {
        let file = materialize(&fixtures::tar(ENTRIES));
        check(&extract_members(ContainerFormat::Tar, file.path()).unwrap());
    }

    #[test]
    fn test_extract_tar_gz() {
        let file = materialize(&fixtures::tar_gz(ENTRIES));
        check(&extract_members(ContainerFormat::TarGz, file.path()).unwrap());
    }

    #[test]
    fn test_extract_tar_bz2() {
        let file = materialize(&fixtures::tar_bz2(ENTRIES));
        check(&extract_members(ContainerFormat::TarBz2, file.path()).unwrap());
    }

    #[test]
    fn test_extract_zip() {
        let file = materialize(&fixtures::zip(ENTRIES));
        check(&extract_members(ContainerFormat::Zip, file.path()).unwrap());
    }

    #[test]
    fn test_packages_are_not_opened() {
        let file = materialize(b"not really a deb");
        assert!(extract_members(ContainerFormat::Deb, file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_archive_is_an_error() {
        let file = materialize(b"garbage");
        assert!(extract_members(ContainerFormat::Zip, file.path()).is_err());
        assert!(extract_members(ContainerFormat::TarGz, file.path()).is_err());
    }
}
