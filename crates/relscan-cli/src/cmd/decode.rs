//! Decode command

use anyhow::{Context, Result};
use relscan_core::{FileClass, ScanConfig};
use relscan_core::classify::classify_record;
use relscan_core::compile::{RawFile, compile};
use relscan_core::decode::decode as decode_tokens;
use relscan_core::source::ReleaseAsset;
use relscan_schema::{ContainerKind, DecodedToken};
use serde::Serialize;
use tracing::debug;

/// How one filename was read.
#[derive(Debug, Serialize)]
pub struct DecodeReport {
    /// Filename as given.
    pub filename: String,
    /// Token sequence, in order.
    pub tokens: Vec<DecodedToken>,
    /// Attributes compiled from the tokens.
    pub record: RecordSummary,
    /// Bucket the file would land in on its own, `None` when skipped.
    pub class: Option<&'static str>,
}

/// Serializable view of a compiled record.
#[derive(Debug, Serialize)]
pub struct RecordSummary {
    /// Filename with version and tag placeholders.
    pub templated_filename: String,
    /// Name the file would be installed under.
    pub installed_name: String,
    /// Program the file belongs to.
    pub program_name: Option<String>,
    /// Architecture keyword.
    pub keyword: Option<String>,
    /// Operating system.
    pub os: Option<String>,
    /// Toolchain.
    pub toolchain: Option<String>,
    /// Container chain, outer to inner.
    pub containers: Vec<ContainerKind>,
    /// Free text no token explained.
    pub unmatched: Vec<String>,
    /// Manual page section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_page: Option<u8>,
    /// Shell the file is for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
}

/// Decode, compile and classify `filename` as a lone release asset.
///
/// # Errors
///
/// Returns an error if the tokens disagree on the keyword, OS or toolchain.
pub fn decode(filename: &str, executable: bool, config: &ScanConfig) -> Result<DecodeReport> {
    let dictionary = config.dictionary();
    let tokens = decode_tokens(&dictionary, filename);
    debug!("Decoded {filename} into {} tokens", tokens.len());

    let mut file = RawFile::from_asset(ReleaseAsset::new(filename, ""));
    file.is_executable = executable;
    let mut record = compile(&tokens, file, None)
        .with_context(|| format!("Failed to compile {filename}"))?;
    let class = classify_record(&mut record, 1, config).map(FileClass::as_str);

    Ok(DecodeReport {
        filename: filename.to_string(),
        tokens,
        record: RecordSummary {
            templated_filename: record.templated_filename,
            installed_name: record.installed_name,
            program_name: record.program_name,
            keyword: record.keyword,
            os: record.os,
            toolchain: record.toolchain,
            containers: record.containers,
            unmatched: record.unmatched,
            manual_page: record.manual_page,
            shell: record.shell,
        },
        class,
    })
}

/// Print the decode report for `filename` as JSON.
///
/// # Errors
///
/// Returns an error if decoding fails or the report cannot be serialized.
pub fn run(filename: &str, executable: bool, config: &ScanConfig) -> Result<()> {
    let report = decode(filename, executable, config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hugo() -> ScanConfig {
        ScanConfig::new("hugo")
            .with_version("0.120.0")
            .with_tag("v0.120.0")
    }

    #[test]
    fn test_decode_archive_name() {
        let report = decode("hugo_0.120.0_linux-amd64.tar.gz", false, &hugo()).unwrap();

        assert_eq!(report.class, Some("archive"));
        assert_eq!(report.record.keyword.as_deref(), Some("~amd64"));
        assert_eq!(report.record.os.as_deref(), Some("linux"));
        assert_eq!(
            report.record.containers,
            vec![ContainerKind::Tar, ContainerKind::Gz]
        );
        assert_eq!(
            report.record.templated_filename,
            "hugo_${VERSION}_linux-amd64.tar.gz"
        );
        assert!(report.record.unmatched.is_empty());
    }

    #[test]
    fn test_decode_other_os_is_skipped() {
        let report = decode("hugo_0.120.0_darwin-arm64.tar.gz", false, &hugo()).unwrap();
        assert_eq!(report.class, None);
        assert_eq!(report.record.os.as_deref(), Some("macosx"));
    }

    #[test]
    fn test_decode_executable_binary() {
        let report = decode("hugo-linux-amd64", true, &hugo()).unwrap();
        assert_eq!(report.class, Some("binary"));
        assert_eq!(report.record.installed_name, "hugo");
    }

    #[test]
    fn test_decode_conflict() {
        assert!(decode("tool-linux-amd64-arm64", false, &ScanConfig::new("tool")).is_err());
    }

    #[test]
    fn test_report_serializes() {
        let report = decode("hugo_0.120.0_linux-amd64.tar.gz", false, &hugo()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["class"], "archive");
        assert_eq!(json["record"]["containers"], serde_json::json!(["tar", "gz"]));
        assert!(json["tokens"].as_array().is_some_and(|t| !t.is_empty()));
        assert!(json["record"].get("manual_page").is_none());
    }
}
