//! Filename token vocabulary.
//!
//! A release filename is decomposed into an ordered sequence of
//! [`DecodedToken`]s. Matched tokens carry the [`TokenMeaning`] of the
//! dictionary entry they hit; everything else is either a separator or an
//! unmatched run of free text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker substituted for a version string in templated filenames.
pub const VERSION_PLACEHOLDER: &str = "${VERSION}";

/// Marker substituted for a tag string in templated filenames.
pub const TAG_PLACEHOLDER: &str = "${TAG}";

/// Characters that split a filename into words.
pub const SEPARATORS: [char; 3] = ['-', '_', '.'];

/// Container or compression layer named by a filename extension.
///
/// Archive kinds (`tar`, `zip`, `deb`, `rpm`) hold several files. The
/// compression kinds (`gz`, `bz2`) only wrap a single stream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// POSIX tar archive.
    Tar,
    /// Gzip compression.
    Gz,
    /// Bzip2 compression.
    Bz2,
    /// Zip archive.
    Zip,
    /// Debian package.
    Deb,
    /// RPM package.
    Rpm,
}

impl ContainerKind {
    /// Convert to the extension spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tar => "tar",
            Self::Gz => "gz",
            Self::Bz2 => "bz2",
            Self::Zip => "zip",
            Self::Deb => "deb",
            Self::Rpm => "rpm",
        }
    }

    /// Whether this kind bundles multiple member files.
    pub fn is_archive(self) -> bool {
        matches!(self, Self::Tar | Self::Zip | Self::Deb | Self::Rpm)
    }
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a container spelling is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown container kind: {0}")]
pub struct ParseContainerError(pub String);

impl std::str::FromStr for ContainerKind {
    type Err = ParseContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tar" => Ok(Self::Tar),
            "gz" | "gzip" => Ok(Self::Gz),
            "bz2" | "bzip2" => Ok(Self::Bz2),
            "zip" => Ok(Self::Zip),
            "deb" => Ok(Self::Deb),
            "rpm" => Ok(Self::Rpm),
            _ => Err(ParseContainerError(s.to_string())),
        }
    }
}

/// Join a container chain the way it appears in a filename (`tar.gz`).
pub fn join_chain(chain: &[ContainerKind]) -> String {
    chain
        .iter()
        .copied()
        .map(ContainerKind::as_str)
        .collect::<Vec<_>>()
        .join(".")
}

/// One dictionary entry: a literal key and what it says about a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenMeaning {
    /// Literal text matched against the filename.
    pub key: String,
    /// Architecture keyword such as `~amd64`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    /// Operating system, e.g. `linux`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// Toolchain or libc flavour, e.g. `musl`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<String>,
    /// Container or compression layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerKind>,
    /// Key is one of the release's version strings.
    pub version: bool,
    /// Key is one of the release's tag strings.
    pub tag: bool,
    /// Key is the repository name.
    pub project_name: bool,
    /// Marks an `AppImage` bundle.
    pub app_image: bool,
    /// Marks documentation (readme, license, ...).
    pub document: bool,
    /// Marks an installer rather than a runnable program.
    pub installer: bool,
    /// Manual page section number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_page: Option<u8>,
    /// Shell the file is written for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    /// Marks a shell completion script.
    pub shell_completion: bool,
    /// Only valid in the trailing extension region; once matched, every
    /// later token must also be suffix-only.
    pub suffix_only: bool,
    /// Key matches regardless of ASCII case.
    pub case_insensitive: bool,
}

impl TokenMeaning {
    /// Create an entry with no attributes.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Set the architecture keyword.
    pub fn keyword(mut self, keyword: &str) -> Self {
        self.keyword = Some(keyword.to_string());
        self
    }

    /// Set the operating system.
    pub fn os(mut self, os: &str) -> Self {
        self.os = Some(os.to_string());
        self
    }

    /// Set the toolchain.
    pub fn toolchain(mut self, toolchain: &str) -> Self {
        self.toolchain = Some(toolchain.to_string());
        self
    }

    /// Set the container kind.
    pub fn container(mut self, kind: ContainerKind) -> Self {
        self.container = Some(kind);
        self
    }

    /// Set the manual page section.
    pub fn manual_page(mut self, section: u8) -> Self {
        self.manual_page = Some(section);
        self
    }

    /// Set the shell name.
    pub fn shell(mut self, shell: &str) -> Self {
        self.shell = Some(shell.to_string());
        self
    }

    /// Mark as an `AppImage` marker.
    pub fn app_image(mut self) -> Self {
        self.app_image = true;
        self
    }

    /// Mark as documentation.
    pub fn document(mut self) -> Self {
        self.document = true;
        self
    }

    /// Mark as an installer.
    pub fn installer(mut self) -> Self {
        self.installer = true;
        self
    }

    /// Mark as a shell completion indicator.
    pub fn shell_completion(mut self) -> Self {
        self.shell_completion = true;
        self
    }

    /// Mark as suffix-only.
    pub fn suffix_only(mut self) -> Self {
        self.suffix_only = true;
        self
    }

    /// Mark as case-insensitive.
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Whether this entry names the release itself (version, tag or
    /// project), so its text can stay in an installed filename.
    pub fn is_passthrough(&self) -> bool {
        self.version || self.tag || self.project_name
    }
}

/// What a decoded token turned out to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenKind {
    /// Text matched a dictionary entry.
    Matched(TokenMeaning),
    /// A single `-`, `_` or `.`.
    Separator,
    /// Free text with no dictionary meaning.
    Unmatched {
        /// The run was found after a suffix-only token.
        suffix_only: bool,
    },
}

/// One element of a decoded filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedToken {
    /// Exact substring consumed from the filename.
    pub captured: String,
    /// Classification of the substring.
    pub kind: TokenKind,
    /// Token came from a directory component of an archive member path.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub folder: bool,
}

impl DecodedToken {
    /// A token that matched `meaning`.
    pub fn matched(captured: &str, meaning: TokenMeaning) -> Self {
        Self {
            captured: captured.to_string(),
            kind: TokenKind::Matched(meaning),
            folder: false,
        }
    }

    /// A separator token.
    pub fn separator(captured: &str) -> Self {
        Self {
            captured: captured.to_string(),
            kind: TokenKind::Separator,
            folder: false,
        }
    }

    /// An unmatched run.
    pub fn unmatched(captured: &str, suffix_only: bool) -> Self {
        Self {
            captured: captured.to_string(),
            kind: TokenKind::Unmatched { suffix_only },
            folder: false,
        }
    }

    /// Dictionary meaning, if the token matched one.
    pub fn meaning(&self) -> Option<&TokenMeaning> {
        match &self.kind {
            TokenKind::Matched(meaning) => Some(meaning),
            _ => None,
        }
    }

    /// Whether this is a separator.
    pub fn is_separator(&self) -> bool {
        matches!(self.kind, TokenKind::Separator)
    }

    /// Whether this is an unmatched run.
    pub fn is_unmatched(&self) -> bool {
        matches!(self.kind, TokenKind::Unmatched { .. })
    }
}
