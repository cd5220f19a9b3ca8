//! End-to-end tests for the `relscan` binary.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

/// A minimal statically linked x86-64 ELF header.
fn static_elf() -> Vec<u8> {
    let mut header = vec![0u8; 64];
    header[..4].copy_from_slice(b"\x7fELF");
    header[4] = 2;
    header[5] = 1;
    header[6] = 1;
    header[16..18].copy_from_slice(&2u16.to_le_bytes());
    header[18..20].copy_from_slice(&0x3eu16.to_le_bytes());
    header[20..24].copy_from_slice(&1u32.to_le_bytes());
    header[32..40].copy_from_slice(&64u64.to_le_bytes());
    header[52..54].copy_from_slice(&64u16.to_le_bytes());
    header[54..56].copy_from_slice(&56u16.to_le_bytes());
    header[58..60].copy_from_slice(&64u16.to_le_bytes());
    header
}

fn relscan(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_relscan"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run relscan")
}

fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

fn release_dir(files: &[(&str, &[u8])]) -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).expect("failed to write asset");
    }
    dir
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp path is not UTF-8")
}

#[test]
fn test_help_command() {
    let output = relscan(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("decode"));
    assert!(stdout.contains("scan"));
}

#[test]
fn test_version_command() {
    let output = relscan(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("relscan "));
}

#[test]
fn test_decode_prints_tokens_and_record() {
    let output = relscan(&[
        "decode",
        "hugo_0.120.0_linux-amd64.tar.gz",
        "--repo",
        "hugo",
        "--release-version",
        "0.120.0",
    ]);
    assert!(output.status.success());

    let report = json(&output);
    assert_eq!(report["filename"], "hugo_0.120.0_linux-amd64.tar.gz");
    assert_eq!(report["class"], "archive");
    assert_eq!(report["record"]["keyword"], "~amd64");
    assert_eq!(
        report["record"]["templated_filename"],
        "hugo_${VERSION}_linux-amd64.tar.gz"
    );
    assert_eq!(report["tokens"][0]["captured"], "hugo");
}

#[test]
fn test_decode_conflict_fails() {
    let output = relscan(&["decode", "tool_amd64_arm64", "--repo", "tool"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("conflicting keyword"));
}

#[test]
fn test_scan_directory() {
    let elf = static_elf();
    let dir = release_dir(&[
        ("tool-linux-amd64", elf.as_slice()),
        ("tool-linux-amd64.sha256", b"abc"),
    ]);

    let output = relscan(&["scan", path_arg(dir.path()), "--repo", "tool"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let manifest = json(&output);
    assert_eq!(manifest["repository"], "tool");
    assert_eq!(
        manifest["programs"]["tool"]["binaries"]["amd64"]["release_filename"],
        "tool-linux-amd64"
    );
}

#[test]
fn test_scan_with_config_file() {
    let elf = static_elf();
    let dir = release_dir(&[("tool-linux-amd64", elf.as_slice())]);
    let config_dir = TempDir::new().expect("failed to create temp dir");
    let config = config_dir.path().join("relscan.toml");
    std::fs::write(&config, "repository = \"tool\"\n").expect("failed to write config");

    let output = relscan(&[
        "scan",
        path_arg(dir.path()),
        "--config",
        path_arg(&config),
    ]);
    assert!(output.status.success());
    assert_eq!(json(&output)["repository"], "tool");
}

#[test]
fn test_scan_other_target_os_finds_nothing() {
    let elf = static_elf();
    let dir = release_dir(&[("tool-linux-amd64", elf.as_slice())]);

    let output = relscan(&[
        "scan",
        path_arg(dir.path()),
        "--repo",
        "tool",
        "--target-os",
        "windows",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no binaries or archives found"));
}
