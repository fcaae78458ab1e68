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

use crate::error::{BlockingError, Result};
use crate::manager::BlockManager;

pub struct ReleaseCommand<'a> {
    manager: &'a BlockManager,
}

impl<'a> ReleaseCommand<'a> {
    pub fn new(manager: &'a BlockManager) -> Result<Self> {
        Ok(Self { manager })
    }

    /// Releases the block; with `quiet`, a block that is not ours is not an error.
    pub fn execute(&self, resource_id: &str, quiet: bool) -> Result<()> {
        if self.manager.release(resource_id)? {
            if !quiet {
                println!("Released block on '{resource_id}'");
            }
            return Ok(());
        }

        if quiet {
            return Ok(());
        }
        Err(BlockingError::NotHeld {
            resource_id: resource_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::manager_for;
    use crate::storage::{InMemoryStorage, Storage};
    use std::sync::Arc;

    #[test]
    fn test_release_reports_foreign_block() {
        let storage = Arc::new(InMemoryStorage::new());
        let alice = manager_for("alice", storage.clone());
        let bob = manager_for("bob", storage.clone());
        alice.acquire("doc").unwrap();

        let err = ReleaseCommand::new(&bob)
            .unwrap()
            .execute("doc", false)
            .unwrap_err();
        assert!(matches!(err, BlockingError::NotHeld { .. }));
        assert!(
            ReleaseCommand::new(&bob)
                .unwrap()
                .execute("doc", true)
                .is_ok()
        );

        ReleaseCommand::new(&alice)
            .unwrap()
            .execute("doc", false)
            .unwrap();
        assert!(storage.read("doc").unwrap().is_none());
    }
}
