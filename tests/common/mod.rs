#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A private storage directory plus a `blocker` command wired to it.
///
/// The directory is removed when the guard is dropped.
pub struct TestStoreGuard {
    dir: TempDir,
}

impl TestStoreGuard {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create test storage directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.dir.path().join("blocking")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("blocker.toml")
    }

    /// Writes a filesystem-backed configuration and returns its path.
    pub fn write_config(&self, block_interval: u64) -> PathBuf {
        let path = self.config_path();
        std::fs::write(
            &path,
            format!(
                "block_interval = {block_interval}\n\n[storage]\ndriver = \"filesystem\"\nstorage_dir = \"{}\"\n",
                self.storage_dir().display().to_string().replace('\\', "\\\\")
            ),
        )
        .expect("Failed to write test configuration");
        path
    }

    /// `blocker` pointed at this guard's storage directory, isolated from the
    /// caller's environment.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("blocker").expect("blocker binary is built");
        for (key, _) in std::env::vars() {
            if key.starts_with("BLOCKER_") {
                cmd.env_remove(&key);
            }
        }
        cmd.env("BLOCKER_STORAGE__STORAGE_DIR", self.storage_dir())
            .env_remove("RUST_LOG");
        cmd
    }
}
