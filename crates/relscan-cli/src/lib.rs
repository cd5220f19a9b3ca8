//! relscan - find the installable binaries in a project release
//!
//! Command-line front end to [`relscan_core`]. `decode` explains how a
//! single filename is read; `scan` classifies a directory of downloaded
//! release files and prints the resulting manifest.

pub mod cmd;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use relscan_core::ScanConfig;

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(name = "relscan")]
#[command(author, version = env!("RELSCAN_VERSION"), about = "Find the installable binaries in a project release")]
pub struct Cli {
    /// Log per-file decisions (overridden by `RUST_LOG`)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Decode one filename and show how it would be classified
    Decode {
        /// Filename as published in the release
        filename: String,
        /// Treat the file as executable, as if read from an archive entry
        #[arg(short = 'x', long)]
        executable: bool,
        /// Release identity
        #[command(flatten)]
        release: ReleaseArgs,
    },
    /// Classify every file in a directory as one release
    Scan {
        /// Directory holding the release files
        dir: PathBuf,
        /// Operating system being packaged for
        #[arg(long)]
        target_os: Option<String>,
        /// Release identity
        #[command(flatten)]
        release: ReleaseArgs,
    },
}

/// Release identity shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct ReleaseArgs {
    /// Repository name, also the default program name
    #[arg(short, long)]
    pub repo: Option<String>,
    /// Version string that appears in filenames (repeatable)
    #[arg(long = "release-version", value_name = "VERSION")]
    pub versions: Vec<String>,
    /// Tag string that appears in filenames (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    /// TOML configuration file; flags given here take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl ReleaseArgs {
    /// Build the scan configuration: file first, then flags on top.
    ///
    /// `fallback_repo` is used when neither the file nor the flags name a
    /// repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded.
    pub fn to_config(&self, fallback_repo: &str) -> anyhow::Result<ScanConfig> {
        let mut config = match &self.config {
            Some(path) => ScanConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ScanConfig::default(),
        };

        if let Some(repo) = &self.repo {
            config.repository.clone_from(repo);
        }
        if config.repository.is_empty() {
            fallback_repo.clone_into(&mut config.repository);
        }
        config.versions.extend(self.versions.iter().cloned());
        config.tags.extend(self.tags.iter().cloned());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_decode() {
        let cli = Cli::parse_from([
            "relscan",
            "decode",
            "hugo_0.120.0_linux-amd64.tar.gz",
            "--repo",
            "hugo",
            "--release-version",
            "0.120.0",
            "--tag",
            "v0.120.0",
        ]);
        let Commands::Decode {
            filename, release, ..
        } = cli.command
        else {
            panic!("expected decode");
        };
        assert_eq!(filename, "hugo_0.120.0_linux-amd64.tar.gz");
        assert_eq!(release.repo.as_deref(), Some("hugo"));
        assert_eq!(release.versions, vec!["0.120.0"]);
        assert_eq!(release.tags, vec!["v0.120.0"]);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relscan.toml");
        std::fs::write(
            &path,
            "repository = \"from-file\"\nversions = [\"1.0\"]\ntarget_os = \"darwin\"\n",
        )
        .unwrap();

        let args = ReleaseArgs {
            repo: Some("from-flag".to_string()),
            versions: vec!["1.1".to_string()],
            tags: Vec::new(),
            config: Some(path),
        };
        let config = args.to_config("fallback").unwrap();
        assert_eq!(config.repository, "from-flag");
        assert_eq!(config.versions, vec!["1.0", "1.1"]);
        assert_eq!(config.target_os, "darwin");
    }

    #[test]
    fn test_fallback_repository() {
        let config = ReleaseArgs::default().to_config("tool").unwrap();
        assert_eq!(config.repository, "tool");
        assert_eq!(config.target_os, "linux");
    }

    #[test]
    fn test_missing_config_file() {
        let args = ReleaseArgs {
            config: Some(PathBuf::from("/nonexistent/relscan.toml")),
            ..ReleaseArgs::default()
        };
        assert!(args.to_config("tool").is_err());
    }
}
