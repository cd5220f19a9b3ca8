//! Shared library dependency resolution.
//!
//! Reads the `DT_NEEDED` entries of an ELF executable and maps each library
//! to the package that provides it.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;

use goblin::elf::Elf;
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading a binary's imports.
#[derive(Error, Debug)]
pub enum DependencyError {
    /// Underlying I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The file is not a readable ELF object.
    #[error("Failed to parse ELF: {0}")]
    Parse(String),
}

/// Library name to package lookups built into the resolver.
const STANDARD_LIBRARIES: &[(&str, &str)] = &[
    ("libpthread.so.0", "sys-libs/glibc"),
    ("libpthread.so", "sys-libs/glibc"),
    ("libc.so.6", "sys-libs/glibc"),
    ("libc.so", "sys-libs/glibc"),
    ("libdl.so.2", "sys-libs/glibc"),
    ("libdl.so", "sys-libs/glibc"),
    ("libm.so.6", "sys-libs/glibc"),
    ("libm.so", "sys-libs/glibc"),
    ("librt.so.1", "sys-libs/glibc"),
    ("librt.so", "sys-libs/glibc"),
    ("libresolv.so.2", "sys-libs/glibc"),
    ("libresolv.so", "sys-libs/glibc"),
    ("libz.so.1", "sys-libs/zlib"),
    ("libz.so", "sys-libs/zlib"),
    ("libthai.so.0", "dev-libs/libthai"),
    ("libthai.so", "dev-libs/libthai"),
    ("libstdc++.so.6.0.32", "sys-devel/gcc"),
    ("libstdc++.so.6.0", "sys-devel/gcc"),
    ("libstdc++.so.6", "sys-devel/gcc"),
    ("libstdc++.so", "sys-devel/gcc"),
    ("libgcc_s.so.1", "sys-devel/gcc"),
    ("libgcc_s.so", "sys-devel/gcc"),
    ("libgtk-3.so.0", "x11-libs/gtk+"),
    ("libgtk-3.so", "x11-libs/gtk+"),
    ("libGL.so.1.0", "media-libs/libglvnd"),
    ("libGL.so.1", "media-libs/libglvnd"),
    ("libGL.so", "media-libs/libglvnd"),
    ("libX11.so.6.4.0", "x11-libs/libX11"),
    ("libX11.so.6.4", "x11-libs/libX11"),
    ("libX11.so.6", "x11-libs/libX11"),
];

/// Dynamic loader spellings, all provided by glibc.
const LOADER_ARCHES: &[&str] = &[
    "aarch64",
    "armhf",
    "armv7",
    "i686",
    "powerpc",
    "powerpc64",
    "powerpc64le",
    "riscv64gc",
    "s390x",
    "x86-64",
    "x86_64",
];

/// Maps shared library names to the packages providing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyTable {
    libraries: BTreeMap<String, String>,
}

impl DependencyTable {
    /// A table with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table of common system libraries.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        for (library, package) in STANDARD_LIBRARIES {
            table.insert(*library, *package);
        }
        for arch in LOADER_ARCHES {
            for suffix in ["", ".1", ".2"] {
                table.insert(format!("ld-linux-{arch}.so{suffix}"), "sys-libs/glibc");
            }
        }
        table.insert("ld-linux-armhf.so.3", "sys-libs/glibc");
        table
    }

    /// Add or replace one entry.
    pub fn insert(&mut self, library: impl Into<String>, package: impl Into<String>) {
        self.libraries.insert(library.into(), package.into());
    }

    /// Layer more entries on top, replacing existing ones.
    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (library, package) in entries {
            self.insert(library, package);
        }
    }

    /// Package providing `library`.
    pub fn lookup(&self, library: &str) -> Option<&str> {
        self.libraries.get(library).map(String::as_str)
    }

    /// Number of known libraries.
    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    /// Whether the table knows no libraries.
    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Resolve the imports of the ELF file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not ELF.
    pub fn resolve(&self, path: &Path) -> Result<Resolution, DependencyError> {
        let bytes = std::fs::read(path)?;
        self.resolve_bytes(&bytes)
    }

    /// Resolve the imports of an in-memory ELF image.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::Parse`] if `bytes` is not ELF.
    pub fn resolve_bytes(&self, bytes: &[u8]) -> Result<Resolution, DependencyError> {
        let elf = Elf::parse(bytes).map_err(|e| DependencyError::Parse(e.to_string()))?;
        let libraries: BTreeSet<&str> = elf
            .libraries
            .iter()
            .copied()
            .filter(|l| !l.is_empty())
            .collect();

        let mut resolution = Resolution::default();
        for library in libraries {
            match self.lookup(library) {
                Some(package) => {
                    debug!("{library} => {package}");
                    if !resolution.packages.iter().any(|p| p == package) {
                        resolution.packages.push(package.to_string());
                    }
                }
                None => resolution.unresolved.push(library.to_string()),
            }
        }
        Ok(resolution)
    }
}

/// Outcome of resolving one binary's imports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Packages providing the imported libraries, de-duplicated.
    pub packages: Vec<String>,
    /// Imported libraries the table does not know.
    pub unresolved: Vec<String>,
}

impl Resolution {
    /// Whether every import was resolved.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}
