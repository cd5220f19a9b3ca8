//! Release filename decoding and file classification.
//!
//! Given the files published in a project's release, works out which of
//! them are installable binaries, for which architecture, and which
//! documents, manual pages and completion scripts go with them.
//!
//! The pipeline, leaf to root:
//!
//! 1. [`dictionary`]: literal tokens and their meanings, grouped for scanning.
//! 2. [`decode`]: split one filename into matched, unmatched and separator tokens.
//! 3. [`compile`]: fold the tokens into one [`compile::CompiledFileRecord`].
//! 4. [`classify`]: bucket every file, opening archives when needed.
//! 5. [`manifest`]: group binaries into programs and resolve their
//!    dependencies with [`deps`].
//! 6. [`useflags`]: constrain alternate builds of the same architecture.
//!
//! [`scan`] runs all of it against an [`AssetSource`].

pub mod archive;
pub mod classify;
pub mod compile;
pub mod config;
pub mod decode;
pub mod deps;
pub mod dictionary;
pub mod error;
pub mod manifest;
pub mod resource;
pub mod source;
pub mod useflags;

pub use classify::{ClassificationTree, Classifier, FileClass, ReleaseClassification};
pub use compile::{CompileError, CompiledFileRecord};
pub use config::{ConfigError, ScanConfig};
pub use deps::DependencyTable;
pub use dictionary::{Dictionary, Vocabulary};
pub use error::ScanError;
pub use source::{AssetSource, DirectorySource, MemorySource, ReleaseAsset};

use relscan_schema::Manifest;
use tracing::info;

/// Classify every asset of `source` and build the release manifest.
///
/// # Errors
///
/// Returns an error if the assets cannot be listed or fetched, an archive
/// cannot be read, nothing installable is found, or a binary has
/// unresolved dependencies.
pub fn scan(source: &dyn AssetSource, config: &ScanConfig) -> Result<Manifest, ScanError> {
    let assets = source.assets().map_err(ScanError::Listing)?;
    info!("Scanning {} assets of {}", assets.len(), config.repository);

    let dictionary = config.dictionary();
    let classification = Classifier::new(&dictionary, config, source).classify_release(assets)?;
    let manifest = manifest::assemble(&classification, config, &config.dependency_table())?;

    info!(
        "Found {} programs for {}",
        manifest.programs.len(),
        manifest.masked_keywords()
    );
    Ok(manifest)
}
