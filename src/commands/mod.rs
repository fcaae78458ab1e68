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

pub mod acquire;
pub mod release;
pub mod renew;
pub mod status;

use crate::block::Block;
use crate::validator::ExpiredValidator;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// JSON shape shared by every command that reports a block.
#[derive(Debug, Serialize)]
pub(crate) struct BlockOutput {
    pub resource_id: String,
    pub blocked: bool,
    pub owner: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub expires_at: Option<String>,
}

impl BlockOutput {
    pub(crate) fn from_block(block: &Block, validator: &ExpiredValidator) -> Self {
        Self {
            resource_id: block.resource_id().to_string(),
            blocked: !validator.is_expired(block),
            owner: Some(block.owner().to_string()),
            created_at: Some(timestamp(block.created_at())),
            updated_at: Some(timestamp(block.updated_at())),
            expires_at: validator.expires_at(block).map(timestamp),
        }
    }

    pub(crate) fn unblocked(resource_id: &str) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            blocked: false,
            owner: None,
            created_at: None,
            updated_at: None,
            expires_at: None,
        }
    }
}

pub(crate) fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
pub(crate) fn manager_for(
    owner: &str,
    storage: std::sync::Arc<dyn crate::storage::Storage>,
) -> crate::manager::BlockManager {
    use crate::clock::SystemClock;
    use crate::owner::ValueOwnerFactory;
    use std::sync::Arc;

    crate::manager::BlockManager::new(
        Arc::new(ValueOwnerFactory::new(owner).unwrap()),
        storage,
        ExpiredValidator::new(30, Arc::new(SystemClock)),
    )
}
