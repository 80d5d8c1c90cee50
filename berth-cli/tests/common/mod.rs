//! Shared helpers for CLI integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

const BERTH_VARS: [&str; 10] = [
    "BERTH_PROJECT",
    "BERTH_SCAN_MIN",
    "BERTH_SCAN_MAX",
    "BERTH_STORAGE_BACKEND",
    "BERTH_STORAGE_SCOPE",
    "BERTH_FORCE_FALLBACK",
    "BERTH_DETECTION_TIMEOUT_MS",
    "BERTH_DISABLED_DETECTORS",
    "BERTH_EXPIRE_AFTER_DAYS",
    "BERTH_DATA_DIR",
];

/// Project configuration written into every test's working directory.
/// Slow detectors are off so tests do not wait on docker or netstat.
const PROJECT_CONFIG: &str = "\
project: demo
scan:
  min: 3000
  max: 3999
  bind_sample: 20
  detection_timeout_ms: 1000
  disabled_detectors: [container_runtime, legacy_listing]
";

/// An isolated working directory plus data directory.
pub struct TestEnv {
    temp_dir: TempDir,
    /// Where commands run; holds `berth.yaml`.
    pub work_dir: PathBuf,
    /// Passed as `--data-dir`.
    pub data_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let work_dir = temp_dir.path().join("work");
        let data_dir = temp_dir.path().join("berth-data");
        std::fs::create_dir_all(&work_dir).expect("Failed to create work dir");
        std::fs::write(work_dir.join("berth.yaml"), PROJECT_CONFIG)
            .expect("Failed to write berth.yaml");

        Self {
            temp_dir,
            work_dir,
            data_dir,
        }
    }

    /// The binary with a clean environment and the working directory set,
    /// but no `--data-dir`.
    pub fn command_bare(&self) -> Command {
        let mut cmd = Command::cargo_bin("berth").expect("Failed to find berth binary");
        for var in BERTH_VARS {
            cmd.env_remove(var);
        }
        cmd.current_dir(&self.work_dir);
        cmd
    }

    /// [`Self::command_bare`] plus `--data-dir`.
    pub fn command(&self) -> Command {
        let mut cmd = self.command_bare();
        cmd.arg("--data-dir").arg(&self.data_dir);
        cmd
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Run `args` and parse stdout as JSON, asserting success.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.command().args(args).output().expect("Failed to run berth");
        assert!(
            output.status.success(),
            "berth {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
    }

    /// Port of `service` in `allocate --format json` or `status --format json`
    /// output.
    pub fn port_in(value: &serde_json::Value, service: &str) -> Option<u64> {
        value
            .get("services")
            .and_then(|s| s.get(service))
            .or_else(|| value.get(service))
            .and_then(|entry| entry.get("port"))
            .and_then(serde_json::Value::as_u64)
    }
}
