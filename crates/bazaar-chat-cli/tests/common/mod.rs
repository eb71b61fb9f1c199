//! Test utilities

#![allow(dead_code)]

use std::path::Path;
use tokio::process::Command;

pub fn bzc_binary() -> &'static str {
    env!("CARGO_BIN_EXE_bzc")
}

pub fn bzc(data_dir: &Path) -> Command {
    let mut cmd = Command::new(bzc_binary());
    cmd.env_remove("BZC_DATA_DIR")
        .env("BZC_LOG", "warn")
        .arg("--json")
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

/// Run a bzc command and return its JSON response, panicking on failure.
pub async fn run_bzc(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let output = bzc(data_dir)
        .args(args)
        .output()
        .await
        .expect("Failed to run bzc");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        output.status.success(),
        "bzc {:?} failed: stdout={} stderr={}",
        args,
        stdout,
        stderr
    );

    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("Failed to parse bzc output: {}\nOutput: {}", e, stdout))
}

/// Run a bzc command expected to fail and return its JSON error.
pub async fn run_bzc_err(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let output = bzc(data_dir)
        .args(args)
        .output()
        .await
        .expect("Failed to run bzc");
    assert!(!output.status.success(), "bzc {:?} unexpectedly succeeded", args);

    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr
        .lines()
        .rev()
        .find(|l| l.starts_with('{'))
        .unwrap_or_else(|| panic!("no JSON error in stderr: {}", stderr));
    serde_json::from_str(line).unwrap()
}
