// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! One JSON file per resource under a storage directory.
//!
//! Writers for a resource serialize on an advisory lock held on a sibling
//! `.lock` guard file. While holding the guard, a writer re-reads the record,
//! compares it with what the caller observed, and publishes the replacement by
//! writing a staging file and renaming it over the record. Readers never take
//! the guard: the rename guarantees they see either the old or the new record.
//!
//! Guard files are left in place after a release. Unlinking a file another
//! process may be about to lock would let two writers hold "the" guard at once.

use crate::block::Block;
use crate::error::{BlockingError, Result};
use crate::storage::{Storage, ensure_candidate_matches};
use log::{debug, trace, warn};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

const BACKEND: &str = "filesystem";
const RECORD_EXTENSION: &str = "block";
const GUARD_EXTENSION: &str = "lock";
/// Substring used for temporary staging artifacts while publishing a record.
const STAGING_SEGMENT: &str = ".staging-";
const MAX_SLUG_LEN: usize = 48;
const GUARD_ATTEMPTS: u32 = 20;
const GUARD_RETRY_DELAY: Duration = Duration::from_millis(5);

#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    root: PathBuf,
    prefix: String,
}

impl FilesystemStorage {
    pub fn new<P: Into<PathBuf>>(root: P, prefix: &str) -> Self {
        let prefix = sanitize_segment(prefix).unwrap_or_else(|| "block".to_string());
        Self {
            root: root.into(),
            prefix,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the record file for `resource_id`.
    pub fn record_path(&self, resource_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.{RECORD_EXTENSION}", self.file_stem(resource_id)))
    }

    fn guard_path(&self, resource_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.{GUARD_EXTENSION}", self.file_stem(resource_id)))
    }

    /// `<prefix>-<slug>-<digest>`: readable, yet unique for ids that slug alike.
    fn file_stem(&self, resource_id: &str) -> String {
        let digest = Sha256::digest(resource_id.as_bytes());
        let short = hex::encode(&digest[..8]);
        match sanitize_segment(resource_id) {
            Some(slug) => {
                let slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
                let slug = slug.trim_end_matches('-');
                format!("{}-{slug}-{short}", self.prefix)
            }
            None => format!("{}-{short}", self.prefix),
        }
    }

    fn read_record(&self, resource_id: &str) -> Result<Option<Block>> {
        let path = self.record_path(resource_id);
        let payload = match fs::read(&path) {
            Ok(payload) => payload,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(BlockingError::storage(
                    BACKEND,
                    resource_id,
                    format!("Failed to read {}: {err}", path.display()),
                ));
            }
        };

        let block: Block = serde_json::from_slice(&payload).map_err(|err| {
            BlockingError::storage(
                BACKEND,
                resource_id,
                format!("Corrupt block record {}: {err}", path.display()),
            )
        })?;

        if block.resource_id() != resource_id {
            return Err(BlockingError::storage(
                BACKEND,
                resource_id,
                format!(
                    "Record {} belongs to '{}'",
                    path.display(),
                    block.resource_id()
                ),
            ));
        }

        Ok(Some(block))
    }

    fn write_record(&self, resource_id: &str, block: &Block) -> Result<()> {
        let path = self.record_path(resource_id);
        let staging = append_suffix(&path, &format!("{STAGING_SEGMENT}{}", Uuid::new_v4()));

        let result = write_staging(&staging, block).and_then(|()| fs::rename(&staging, &path));
        if let Err(err) = result {
            cleanup_artifact(&staging);
            return Err(BlockingError::storage(
                BACKEND,
                resource_id,
                format!("Failed to write {}: {err}", path.display()),
            ));
        }
        Ok(())
    }

    fn open_guard(&self, resource_id: &str) -> Result<(File, PathBuf)> {
        fs::create_dir_all(&self.root).map_err(|err| {
            BlockingError::storage(
                BACKEND,
                resource_id,
                format!(
                    "Failed to ensure storage directory {} exists: {err}",
                    self.root.display()
                ),
            )
        })?;

        let path = self.guard_path(resource_id);
        let file = prepare_guard_file(&path).map_err(|err| {
            BlockingError::storage(
                BACKEND,
                resource_id,
                format!("Failed to open guard file {}: {err}", path.display()),
            )
        })?;
        Ok((file, path))
    }

    /// Takes the per-resource writer guard, or `None` if another writer keeps it busy.
    fn acquire_guard(&self, resource_id: &str) -> Result<Option<RecordGuard>> {
        let (file, path) = self.open_guard(resource_id)?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            match file.try_lock() {
                Ok(()) => return Ok(Some(RecordGuard { file, path })),
                Err(TryLockError::WouldBlock) => {
                    if attempts >= GUARD_ATTEMPTS {
                        debug!(
                            "Guard {} still busy after {attempts} attempt(s)",
                            path.display()
                        );
                        return Ok(None);
                    }
                    thread::sleep(GUARD_RETRY_DELAY);
                }
                Err(TryLockError::Error(err)) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(TryLockError::Error(err)) => {
                    return Err(BlockingError::storage(
                        BACKEND,
                        resource_id,
                        format!("Failed to lock guard file {}: {err}", path.display()),
                    ));
                }
            }
        }
    }

    /// Waits for the per-resource writer guard. Holders only re-read and rename,
    /// so the wait is short.
    fn wait_for_guard(&self, resource_id: &str) -> Result<RecordGuard> {
        let (file, path) = self.open_guard(resource_id)?;

        loop {
            match file.lock() {
                Ok(()) => return Ok(RecordGuard { file, path }),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    return Err(BlockingError::storage(
                        BACKEND,
                        resource_id,
                        format!("Failed to lock guard file {}: {err}", path.display()),
                    ));
                }
            }
        }
    }
}

impl Storage for FilesystemStorage {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn read(&self, resource_id: &str) -> Result<Option<Block>> {
        self.read_record(resource_id)
    }

    fn try_acquire(
        &self,
        resource_id: &str,
        candidate: &Block,
        previous: Option<&Block>,
    ) -> Result<bool> {
        ensure_candidate_matches(resource_id, candidate)?;

        let Some(_guard) = self.acquire_guard(resource_id)? else {
            return Ok(false);
        };

        let current = self.read_record(resource_id)?;
        if current.as_ref() != previous {
            trace!("Filesystem compare-and-swap lost for {resource_id}");
            return Ok(false);
        }

        self.write_record(resource_id, candidate)?;
        Ok(true)
    }

    fn delete(&self, resource_id: &str, expected_owner: &str) -> Result<bool> {
        if self.read_record(resource_id)?.is_none() {
            return Ok(false);
        }

        // Contention must not read as "not yours", so wait for the guard.
        let _guard = self.wait_for_guard(resource_id)?;

        match self.read_record(resource_id)? {
            Some(block) if block.is_owned_by(expected_owner) => {
                let path = self.record_path(resource_id);
                match fs::remove_file(&path) {
                    Ok(()) => Ok(true),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
                    Err(err) => Err(BlockingError::storage(
                        BACKEND,
                        resource_id,
                        format!("Failed to remove {}: {err}", path.display()),
                    )),
                }
            }
            _ => Ok(false),
        }
    }
}

/// Advisory lock on a guard file, released on drop.
#[derive(Debug)]
struct RecordGuard {
    file: File,
    path: PathBuf,
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            warn!("Failed to unlock {}: {err}", self.path.display());
        }
    }
}

fn prepare_guard_file(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);

    // Applies only when the file is created; guards made by other users keep their mode.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path)
}

fn write_staging(path: &Path, block: &Block) -> io::Result<()> {
    let payload =
        serde_json::to_vec_pretty(block).map_err(|err| io::Error::other(err.to_string()))?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(&payload)?;
    file.sync_all()?;
    Ok(())
}

fn cleanup_artifact(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        match err.kind() {
            io::ErrorKind::NotFound => {}
            _ => warn!(
                "Failed to remove staging artifact {}: {err}",
                path.display()
            ),
        }
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    file_name.push(suffix);
    path.with_file_name(file_name)
}

/// Normalise an arbitrary string into a filesystem-safe slug fragment.
fn sanitize_segment(value: &str) -> Option<String> {
    let mut output = String::with_capacity(value.len());
    let mut last_dash = false;

    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            output.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            output.push('-');
            last_dash = true;
        }
    }

    let trimmed = output.trim_matches('-');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::contract;
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn satisfies_storage_contract() {
        let temp = TempDir::new().unwrap();
        contract::run_all(&FilesystemStorage::new(temp.path(), "block"));
    }

    #[test]
    fn sanitize_segment_normalises_input() {
        assert_eq!(
            sanitize_segment(" Order #42/Edit "),
            Some("order-42-edit".to_string())
        );
        assert_eq!(sanitize_segment("***"), None);
    }

    #[test]
    fn record_names_use_prefix_and_digest() {
        let storage = FilesystemStorage::new("/var/cache/blocking", "Block");
        let path = storage.record_path("Order 42");
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        assert!(path.starts_with("/var/cache/blocking"));
        assert!(name.starts_with("block-order-42-"));
        assert!(name.ends_with(".block"));
        assert_eq!(name.len(), "block-order-42-".len() + 16 + ".block".len());
    }

    #[test]
    fn similar_ids_do_not_collide() {
        let storage = FilesystemStorage::new("/tmp/blocks", "block");
        assert_ne!(storage.record_path("a/b"), storage.record_path("a-b"));
        assert_ne!(storage.record_path("***"), storage.record_path("???"));
    }

    #[test]
    fn long_ids_produce_bounded_names() {
        let storage = FilesystemStorage::new("/tmp/blocks", "block");
        let id = "x".repeat(4096);
        let name = storage.record_path(&id);
        assert!(name.file_name().unwrap().len() < 100);
    }

    #[test]
    fn read_without_directory_is_none() {
        let temp = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp.path().join("missing"), "block");
        assert_eq!(storage.read("anything").unwrap(), None);
    }

    #[test]
    fn corrupt_record_is_a_storage_error() {
        let temp = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp.path(), "block");
        fs::write(storage.record_path("doc"), b"{not json").unwrap();

        let err = storage.read("doc").unwrap_err();
        assert!(matches!(err, BlockingError::Storage { backend: "filesystem", .. }));
    }

    #[test]
    fn publishing_leaves_no_staging_files() {
        let temp = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp.path(), "block");
        let block = Block::new("doc", "alice", Utc::now()).unwrap();
        assert!(storage.try_acquire("doc", &block, None).unwrap());

        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert!(names.iter().all(|name| !name.contains(STAGING_SEGMENT)));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn busy_guard_reports_lost_race() {
        let temp = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp.path(), "block");
        let held = storage.acquire_guard("doc").unwrap().unwrap();

        let block = Block::new("doc", "alice", Utc::now()).unwrap();
        assert!(!storage.try_acquire("doc", &block, None).unwrap());

        drop(held);
        assert!(storage.try_acquire("doc", &block, None).unwrap());
    }

    #[test]
    fn owner_release_waits_out_a_busy_guard() {
        let temp = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp.path(), "block");
        let block = Block::new("doc", "alice", Utc::now()).unwrap();
        assert!(storage.try_acquire("doc", &block, None).unwrap());

        let other = FilesystemStorage::new(temp.path(), "block");
        let held = other.acquire_guard("doc").unwrap().unwrap();
        let holder = std::thread::spawn(move || {
            // Longer than the bounded poll used by try_acquire.
            std::thread::sleep(GUARD_RETRY_DELAY * (GUARD_ATTEMPTS * 2));
            drop(held);
        });

        assert!(storage.delete("doc", "alice").unwrap());
        assert_eq!(storage.read("doc").unwrap(), None);
        holder.join().unwrap();
    }

    #[test]
    fn delete_under_contention_still_refuses_other_owners() {
        let temp = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp.path(), "block");
        let block = Block::new("doc", "alice", Utc::now()).unwrap();
        assert!(storage.try_acquire("doc", &block, None).unwrap());

        let held = storage.acquire_guard("doc").unwrap().unwrap();
        let holder = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            drop(held);
        });

        assert!(!storage.delete("doc", "bob").unwrap());
        assert_eq!(storage.read("doc").unwrap(), Some(block));
        holder.join().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn existing_guard_permissions_are_left_alone() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp.path(), "block");
        let guard = storage.guard_path("doc");
        fs::write(&guard, b"").unwrap();
        fs::set_permissions(&guard, fs::Permissions::from_mode(0o644)).unwrap();

        let block = Block::new("doc", "alice", Utc::now()).unwrap();
        assert!(storage.try_acquire("doc", &block, None).unwrap());

        let mode = fs::metadata(&guard).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn new_guards_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp.path(), "block");
        let block = Block::new("doc", "alice", Utc::now()).unwrap();
        assert!(storage.try_acquire("doc", &block, None).unwrap());

        let mode = fs::metadata(storage.guard_path("doc"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn independent_instances_share_records() {
        let temp = TempDir::new().unwrap();
        let first = FilesystemStorage::new(temp.path(), "block");
        let second = FilesystemStorage::new(temp.path(), "block");

        let block = Block::new("doc", "alice", Utc::now()).unwrap();
        assert!(first.try_acquire("doc", &block, None).unwrap());
        assert_eq!(second.read("doc").unwrap(), Some(block.clone()));
        assert!(!second.try_acquire("doc", &block, None).unwrap());
    }

    #[test]
    fn concurrent_creates_across_instances_have_single_winner() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        let winners = Arc::new(AtomicUsize::new(0));
        let now = Utc::now();

        let handles: Vec<_> = (0..8)
            .map(|idx| {
                let root = root.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    let storage = FilesystemStorage::new(root, "block");
                    let block = Block::new("shared", format!("worker-{idx}"), now).unwrap();
                    if storage.try_acquire("shared", &block, None).unwrap() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
