//! Test helpers for behavioral specifications.
//!
//! Provides a small DSL for driving the pj CLI against a throwaway
//! config and data directory.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

// Aggressive timeouts for fast tests.
const PJ_TIMEOUT_EXIT_MS: &str = "2000";
const PJ_TIMEOUT_START_MS: &str = "5000";
const PJ_TIMEOUT_STATUS_MS: &str = "500";
const PJ_POLL_MS: &str = "10";

/// Returns the path to a binary, checking llvm-cov target directory first.
/// Falls back to resolving relative to the test binary itself when
/// CARGO_MANIFEST_DIR is stale.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

fn pj_binary() -> PathBuf {
    binary_path("pj")
}

pub fn pjd_binary() -> PathBuf {
    binary_path("pjd")
}

/// Create a CLI builder for pj commands
pub fn cli() -> CliBuilder {
    CliBuilder::new()
}

/// High-level CLI builder for fluent test assertions
pub struct CliBuilder {
    args: Vec<String>,
    dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl CliBuilder {
    fn new() -> Self {
        Self {
            args: Vec::new(),
            dir: None,
            envs: vec![
                (
                    "PJ_DAEMON_BINARY".into(),
                    pjd_binary().to_string_lossy().into(),
                ),
                ("PJ_TIMEOUT_EXIT_MS".into(), PJ_TIMEOUT_EXIT_MS.into()),
                ("PJ_TIMEOUT_START_MS".into(), PJ_TIMEOUT_START_MS.into()),
                ("PJ_TIMEOUT_STATUS_MS".into(), PJ_TIMEOUT_STATUS_MS.into()),
                ("PJ_POLL_MS".into(), PJ_POLL_MS.into()),
            ],
        }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Set working directory
    pub fn pwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.dir = Some(path.into());
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<Path>) -> Self {
        self.envs.push((
            key.to_string(),
            value.as_ref().to_string_lossy().to_string(),
        ));
        self
    }

    /// Build the command without running it
    pub fn command(self) -> Command {
        let mut cmd = Command::new(pj_binary());
        cmd.args(&self.args);

        if let Some(dir) = self.dir {
            cmd.current_dir(dir);
        }

        // A PJ_CONFIG from the parent shell would point tests at a real master
        cmd.env_remove("PJ_CONFIG");

        for (key, value) in self.envs {
            cmd.env(key, value);
        }

        cmd
    }

    /// Run and expect success (exit code 0)
    pub fn passes(self) -> RunAssert {
        let output = self.command().output().expect("command should run");
        assert!(
            output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    /// Run and expect failure (non-zero exit code)
    pub fn fails(self) -> RunAssert {
        let output = self.command().output().expect("command should run");
        assert!(
            !output.status.success(),
            "expected command to fail, but it passed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }
}

/// Result of a CLI run for chaining assertions
pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    /// Assert stdout equals expected exactly (with diff on failure).
    /// **Prefer this for format specs** - catches format regressions.
    pub fn stdout_eq(self, expected: &str) -> Self {
        let stdout = self.stdout();
        similar_asserts::assert_eq!(stdout, expected);
        self
    }

    /// Assert stderr equals expected exactly (with diff on failure).
    pub fn stderr_eq(self, expected: &str) -> Self {
        let stderr = self.stderr();
        similar_asserts::assert_eq!(stderr, expected);
        self
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout does not contain '{}'\nstdout: {}",
            expected,
            stdout
        );
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr does not contain '{}'\nstderr: {}",
            expected,
            stderr
        );
        self
    }

    /// Parse stdout as JSON (for `-o json` specs)
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout()).expect("stdout should be JSON")
    }
}

// =============================================================================
// Project
// =============================================================================

/// Temporary directory holding a `pj.toml` and the data directory it names.
pub struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// A project whose config has one `orders` job on the given queue URL.
    pub fn with_queue_url(url: &str) -> Self {
        let project = Self::empty();
        project.config(&format!(
            r#"
[process]
name = "specs"
data_dir = "{}"

[queue]
kind = "redis"
params = {{ url = "{url}" }}

[[jobs]]
topic = "orders"
consumer = {{ kind = "log" }}
"#,
            project.data_dir().display()
        ));
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.path().join("data")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.data_dir().join("master.pid")
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("pj.toml")
    }

    pub fn config(&self, content: &str) {
        std::fs::write(self.config_path(), content).unwrap();
    }

    /// Write a file under the data directory (parents created automatically)
    pub fn data_file(&self, name: &str, content: &str) {
        let full_path = self.data_dir().join(name);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full_path, content).unwrap();
    }

    /// Run pj in this project's directory; `pj.toml` is picked up by default
    pub fn pj(&self) -> CliBuilder {
        cli().pwd(self.path())
    }

    /// Read the master log (for debugging test failures)
    pub fn master_log(&self) -> String {
        std::fs::read_to_string(self.data_dir().join("logs/pj.log"))
            .unwrap_or_else(|_| "(no master log)".to_string())
    }
}

/// A live process named in the pid file, standing in for a running master.
/// Declare it after the [`Project`] so it is cleaned up first.
pub struct FakeMaster {
    child: std::process::Child,
    pid_file: PathBuf,
}

impl FakeMaster {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl Drop for FakeMaster {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.pid_file);
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Project {
    pub fn fake_master(&self) -> FakeMaster {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        self.data_file("master.pid", &child.id().to_string());
        FakeMaster {
            child,
            pid_file: self.pid_file(),
        }
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        // Always try to stop a master (no-op if not running)
        let mut cmd = self.pj().args(&["stop"]).command();
        cmd.stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        let _ = cmd.status();
    }
}
