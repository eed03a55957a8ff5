//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file or directory.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Isolated test environment.
///
/// Each test gets its own temporary directory for ad-hoc recipes and variant files.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Write a file relative to the temp directory and return its path.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }
}

/// A `pkgmatrix <subcommand>` command isolated from the caller's environment.
///
/// The global variant config variable is cleared and the target platform
/// pinned so results do not depend on the host.
pub fn pkgmatrix_cmd(subcommand: &str) -> Command {
  let mut cmd: Command = cargo_bin_cmd!("pkgmatrix");
  cmd.env_remove("PKGMATRIX_VARIANT_CONFIG");
  cmd.env_remove("RUST_LOG");
  cmd.arg(subcommand).arg("--target-platform").arg("linux-64");
  cmd
}

/// Parse captured stdout as JSON.
pub fn stdout_json(output: &std::process::Output) -> serde_json::Value {
  serde_json::from_slice(&output.stdout)
    .unwrap_or_else(|e| panic!("stdout is not JSON ({}): {}", e, String::from_utf8_lossy(&output.stdout)))
}
