//! Run-level scan errors.

use std::io;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::deps::DependencyError;
use crate::source::SourceError;

/// Errors that abort a whole scan.
///
/// Files that merely cannot be classified are skipped and never show up
/// here.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The release's assets could not be listed.
    #[error("Failed to list release assets: {0}")]
    Listing(#[source] SourceError),

    /// An asset could not be downloaded.
    #[error("Failed to fetch {asset} from {url}: {source}")]
    Fetch {
        /// Asset name.
        asset: String,
        /// Where it was fetched from.
        url: String,
        /// Underlying failure.
        #[source]
        source: SourceError,
    },

    /// An archive could not be opened or read.
    #[error("Failed to read archive {asset} from {url}: {source}")]
    Archive {
        /// Asset name.
        asset: String,
        /// Where it was fetched from.
        url: String,
        /// Underlying failure.
        #[source]
        source: ArchiveError,
    },

    /// A candidate file could not be read while probing its format.
    #[error("Failed to probe {file}: {source}")]
    Probe {
        /// File name.
        file: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// Nothing installable was found.
    #[error("no binaries or archives found")]
    NothingFound,

    /// A binary's content was never materialized.
    #[error("No local copy of {0}")]
    MissingContent(String),

    /// A binary's imports could not be read.
    #[error("Failed to read dependencies of {binary}: {source}")]
    Dependency {
        /// Binary name.
        binary: String,
        /// Underlying failure.
        #[source]
        source: DependencyError,
    },

    /// A binary links against libraries with no known package.
    #[error("{binary} has unresolved dependencies: {}", libraries.join(", "))]
    UnresolvedDependencies {
        /// Binary name.
        binary: String,
        /// Library names missing from the dependency table.
        libraries: Vec<String>,
    },
}
