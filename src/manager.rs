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
use crate::owner::OwnerFactory;
use crate::storage::Storage;
use crate::validator::ExpiredValidator;
use log::{debug, info};
use std::sync::Arc;

/// Compare-and-swap attempts made by `acquire` before reporting a conflict.
pub const DEFAULT_ACQUIRE_ATTEMPTS: u32 = 3;

/// Coordinates owner resolution, storage and expiry into block operations.
///
/// Every call evaluates the stored record afresh; the manager keeps no state
/// about blocks between calls. Acquisition never waits for a holder to let go:
/// it either takes the block, reports that another owner holds it, or reports
/// that it kept losing compare-and-swap races.
pub struct BlockManager {
    owner_factory: Arc<dyn OwnerFactory>,
    storage: Arc<dyn Storage>,
    validator: ExpiredValidator,
    max_attempts: u32,
}

impl BlockManager {
    pub fn new(
        owner_factory: Arc<dyn OwnerFactory>,
        storage: Arc<dyn Storage>,
        validator: ExpiredValidator,
    ) -> Self {
        Self {
            owner_factory,
            storage,
            validator,
            max_attempts: DEFAULT_ACQUIRE_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn validator(&self) -> &ExpiredValidator {
        &self.validator
    }

    /// Takes or renews the block for `resource_id` on behalf of the current owner.
    ///
    /// Fails with [`BlockingError::BlockHeld`] when another owner holds an
    /// active block, and with [`BlockingError::AcquireConflict`] when every
    /// compare-and-swap attempt lost a race.
    pub fn acquire(&self, resource_id: &str) -> Result<Block> {
        match self.acquire_inner(resource_id)? {
            AcquireDisposition::Acquired(block) => Ok(block),
            AcquireDisposition::Held(existing) => Err(BlockingError::BlockHeld {
                resource_id: resource_id.to_string(),
                held_since: existing.updated_at(),
            }),
        }
    }

    /// Like [`acquire`](Self::acquire), but a block held by another owner yields `None`.
    pub fn try_acquire(&self, resource_id: &str) -> Result<Option<Block>> {
        match self.acquire_inner(resource_id)? {
            AcquireDisposition::Acquired(block) => Ok(Some(block)),
            AcquireDisposition::Held(_) => Ok(None),
        }
    }

    /// Refreshes a block the current owner already holds; never creates one.
    pub fn renew(&self, resource_id: &str) -> Result<Block> {
        ensure_resource_id(resource_id)?;
        let owner = self.owner_factory.current_owner()?;

        for attempt in 1..=self.max_attempts {
            let existing = match self.storage.read(resource_id)? {
                Some(block) if block.is_owned_by(&owner) => block,
                _ => {
                    return Err(BlockingError::NotHeld {
                        resource_id: resource_id.to_string(),
                    });
                }
            };

            let candidate = existing.renewed(self.validator.now());
            if self
                .storage
                .try_acquire(resource_id, &candidate, Some(&existing))?
            {
                debug!("Renewed block {resource_id}");
                return Ok(candidate);
            }
            debug!("Renewal of {resource_id} lost a race (attempt {attempt})");
        }

        Err(BlockingError::AcquireConflict {
            resource_id: resource_id.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Deletes the block if the current owner holds it.
    ///
    /// `false` means the caller does not own the record: it never held it, or
    /// the block expired and was reclaimed by someone else.
    pub fn release(&self, resource_id: &str) -> Result<bool> {
        ensure_resource_id(resource_id)?;
        let owner = self.owner_factory.current_owner()?;
        let released = self.storage.delete(resource_id, &owner)?;
        if released {
            info!("Released block {resource_id}");
        } else {
            debug!("Release of {resource_id} ignored: not held by the current owner");
        }
        Ok(released)
    }

    /// Whether an active block exists for `resource_id`, whoever owns it.
    pub fn is_blocked(&self, resource_id: &str) -> Result<bool> {
        Ok(self.current_block(resource_id)?.is_some())
    }

    /// The active block for `resource_id`; expired records read as `None`.
    pub fn current_block(&self, resource_id: &str) -> Result<Option<Block>> {
        ensure_resource_id(resource_id)?;
        Ok(self
            .storage
            .read(resource_id)?
            .filter(|block| !self.validator.is_expired(block)))
    }

    /// The stored record for `resource_id`, expired or not.
    pub fn inspect(&self, resource_id: &str) -> Result<Option<Block>> {
        ensure_resource_id(resource_id)?;
        self.storage.read(resource_id)
    }

    fn acquire_inner(&self, resource_id: &str) -> Result<AcquireDisposition> {
        ensure_resource_id(resource_id)?;
        let owner = self.owner_factory.current_owner()?;

        for attempt in 1..=self.max_attempts {
            let existing = self.storage.read(resource_id)?;
            let now = self.validator.now();

            let candidate = match &existing {
                // Re-entrant acquisition is a renewal, even after expiry.
                Some(block) if block.is_owned_by(&owner) => block.renewed(now),
                Some(block) if !self.validator.is_expired_at(block, now) => {
                    debug!("Block {resource_id} is held by another owner");
                    return Ok(AcquireDisposition::Held(block.clone()));
                }
                Some(block) => {
                    debug!("Reclaiming expired block {resource_id}");
                    block.reassigned(owner.as_str(), now)?
                }
                None => Block::new(resource_id, owner.as_str(), now)?,
            };

            if self
                .storage
                .try_acquire(resource_id, &candidate, existing.as_ref())?
            {
                debug!(
                    "Acquired block {resource_id} via {} (attempt {attempt})",
                    self.storage.backend()
                );
                return Ok(AcquireDisposition::Acquired(candidate));
            }
            debug!("Acquisition of {resource_id} lost a race (attempt {attempt})");
        }

        Err(BlockingError::AcquireConflict {
            resource_id: resource_id.to_string(),
            attempts: self.max_attempts,
        })
    }
}

#[derive(Debug)]
enum AcquireDisposition {
    Acquired(Block),
    Held(Block),
}

fn ensure_resource_id(resource_id: &str) -> Result<()> {
    if resource_id.is_empty() {
        return Err(BlockingError::InvalidBlock(
            "resource id must not be empty".to_string(),
        ));
    }
    Ok(())
}
