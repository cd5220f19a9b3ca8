//! relscan - find the installable binaries in a project release

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use relscan_cli::cmd;
use relscan_cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Decode {
            filename,
            executable,
            release,
        } => {
            let config = release.to_config("")?;
            cmd::decode::run(&filename, executable, &config)
        }
        Commands::Scan {
            dir,
            target_os,
            release,
        } => {
            let fallback = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut config = release.to_config(&fallback)?;
            if let Some(os) = target_os {
                config.target_os = os;
            }
            cmd::scan::run(&dir, &config)
        }
    }
}
