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

//! Persistence of block records.
//!
//! Storage is the single source of truth for blocks. Every backend offers the
//! same three operations; `try_acquire` is the only one that must be atomic
//! across callers and is expressed as a compare-and-swap against the record
//! the caller last observed.

pub mod filesystem;
pub mod key_value;
pub mod memory;

pub use filesystem::FilesystemStorage;
pub use key_value::{KeyValueStorage, KeyValueStore, RedisStore};
pub use memory::InMemoryStorage;

use crate::block::Block;
use crate::error::{BlockingError, Result};

pub trait Storage: Send + Sync {
    /// Short backend label used in logs and errors.
    fn backend(&self) -> &'static str;

    /// Returns the stored block, or `None` if there is no record.
    fn read(&self, resource_id: &str) -> Result<Option<Block>>;

    /// Replaces the record for `resource_id` with `candidate` if, and only if,
    /// the stored record still equals `previous` (`None` meaning "absent").
    ///
    /// `Ok(false)` means the caller lost the race; I/O failures are errors.
    fn try_acquire(
        &self,
        resource_id: &str,
        candidate: &Block,
        previous: Option<&Block>,
    ) -> Result<bool>;

    /// Removes the record only if it is owned by `expected_owner`.
    fn delete(&self, resource_id: &str, expected_owner: &str) -> Result<bool>;
}

/// Rejects candidates that would be stored under a different key.
pub(crate) fn ensure_candidate_matches(resource_id: &str, candidate: &Block) -> Result<()> {
    if candidate.resource_id() != resource_id {
        return Err(BlockingError::InvalidBlock(format!(
            "candidate for '{}' cannot be stored under '{resource_id}'",
            candidate.resource_id()
        )));
    }
    Ok(())
}
