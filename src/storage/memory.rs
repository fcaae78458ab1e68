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

use crate::block::Block;
use crate::error::{BlockingError, Result};
use crate::storage::{Storage, ensure_candidate_matches};
use log::trace;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

const BACKEND: &str = "in_memory";

/// Process-local storage; one mutex serializes every operation on the map.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    blocks: Mutex<HashMap<String, Block>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock("*")?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self, resource_id: &str) -> Result<MutexGuard<'_, HashMap<String, Block>>> {
        self.blocks
            .lock()
            .map_err(|_| BlockingError::storage(BACKEND, resource_id, "block map lock poisoned"))
    }
}

impl Storage for InMemoryStorage {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn read(&self, resource_id: &str) -> Result<Option<Block>> {
        Ok(self.lock(resource_id)?.get(resource_id).cloned())
    }

    fn try_acquire(
        &self,
        resource_id: &str,
        candidate: &Block,
        previous: Option<&Block>,
    ) -> Result<bool> {
        ensure_candidate_matches(resource_id, candidate)?;

        let mut blocks = self.lock(resource_id)?;
        if blocks.get(resource_id) != previous {
            trace!("In-memory compare-and-swap lost for {resource_id}");
            return Ok(false);
        }

        blocks.insert(resource_id.to_string(), candidate.clone());
        Ok(true)
    }

    fn delete(&self, resource_id: &str, expected_owner: &str) -> Result<bool> {
        let mut blocks = self.lock(resource_id)?;
        match blocks.get(resource_id) {
            Some(block) if block.is_owned_by(expected_owner) => {
                blocks.remove(resource_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
