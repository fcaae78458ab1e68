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
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lease record claiming a resource for an owner.
///
/// Blocks are immutable once built; renewals and ownership changes produce new
/// instances so that what is written to storage is exactly what is read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BlockRecord")]
pub struct Block {
    resource_id: String,
    owner: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Block {
    /// Creates a fresh block whose creation and update timestamps are `now`.
    pub fn new(
        resource_id: impl Into<String>,
        owner: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        Self::with_timestamps(resource_id, owner, now, now)
    }

    pub fn with_timestamps(
        resource_id: impl Into<String>,
        owner: impl Into<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self> {
        let resource_id = resource_id.into();
        let owner = owner.into();

        if resource_id.is_empty() {
            return Err(BlockingError::InvalidBlock(
                "resource id must not be empty".to_string(),
            ));
        }
        if owner.is_empty() {
            return Err(BlockingError::InvalidBlock(format!(
                "owner of '{resource_id}' must not be empty"
            )));
        }

        Ok(Self {
            resource_id,
            owner,
            created_at,
            updated_at,
        })
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner == owner
    }

    /// Same owner, same creation time, `updated_at` moved to `now`.
    pub fn renewed(&self, now: DateTime<Utc>) -> Self {
        Self {
            resource_id: self.resource_id.clone(),
            owner: self.owner.clone(),
            created_at: self.created_at,
            updated_at: now,
        }
    }

    /// Hands the resource to `owner`, resetting both timestamps.
    pub fn reassigned(&self, owner: impl Into<String>, now: DateTime<Utc>) -> Result<Self> {
        Self::new(self.resource_id.clone(), owner, now)
    }
}

#[derive(Deserialize)]
struct BlockRecord {
    resource_id: String,
    owner: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BlockRecord> for Block {
    type Error = BlockingError;

    fn try_from(record: BlockRecord) -> Result<Self> {
        Block::with_timestamps(
            record.resource_id,
            record.owner,
            record.created_at,
            record.updated_at,
        )
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (owner {}, updated {})",
            self.resource_id,
            self.owner,
            self.updated_at.to_rfc3339()
        )
    }
}
