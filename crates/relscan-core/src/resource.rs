//! Locally materialized copies of release files.
//!
//! Every downloaded asset and every extracted archive member lives in its
//! own temporary file. A [`LocalResource`] is a shared handle to one of
//! them: cloning it acquires a reference, dropping it releases one, and the
//! file is deleted when the last handle goes away.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, warn};

#[derive(Debug)]
struct Materialized {
    path: PathBuf,
    label: String,
}

impl Drop for Materialized {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Released {} ({})", self.label, self.path.display()),
            // Cleanup failures never fail a scan.
            Err(e) => warn!("Error removing temp file {}: {e}", self.path.display()),
        }
    }
}

/// Reference-counted handle to a temporary file.
#[derive(Debug, Clone)]
pub struct LocalResource(Rc<Materialized>);

impl LocalResource {
    /// Copy `reader` into a fresh temporary file.
    ///
    /// `label` is only used in log messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created or written.
    pub fn from_reader(label: &str, reader: &mut dyn Read) -> io::Result<Self> {
        let mut file = tempfile::Builder::new().prefix("relscan-").tempfile()?;
        io::copy(reader, &mut file)?;
        let path = file.into_temp_path().keep()?;
        debug!("Got {label} => {}", path.display());
        Ok(Self(Rc::new(Materialized {
            path,
            label: label.to_string(),
        })))
    }

    /// Location of the local copy.
    pub fn path(&self) -> &Path {
        &self.0.path
    }

    /// Open the local copy for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(&self) -> io::Result<File> {
        File::open(&self.0.path)
    }

    /// Read the whole local copy into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.0.path)
    }

    /// Number of live handles to this file.
    pub fn handles(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}
