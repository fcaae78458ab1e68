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

mod context;
mod exit_codes;
mod format;
#[cfg(test)]
mod tests;

pub use context::ErrorContext;
pub use exit_codes::get_exit_code;
pub use format::{format_error_chain, format_error_with_color};

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockingError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unable to resolve block owner: {0}")]
    OwnerResolution(String),

    #[error("Storage backend '{backend}' failed for '{resource_id}': {details}")]
    Storage {
        backend: &'static str,
        resource_id: String,
        details: String,
    },

    #[error("Resource '{resource_id}' is blocked by another owner")]
    BlockHeld {
        resource_id: String,
        held_since: DateTime<Utc>,
    },

    #[error("Could not acquire block for '{resource_id}' after {attempts} contended attempt(s)")]
    AcquireConflict { resource_id: String, attempts: u32 },

    #[error("Resource '{resource_id}' is not blocked by the current owner")]
    NotHeld { resource_id: String },

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BlockingError {
    pub(crate) fn storage(
        backend: &'static str,
        resource_id: &str,
        details: impl Into<String>,
    ) -> Self {
        BlockingError::Storage {
            backend,
            resource_id: resource_id.to_string(),
            details: details.into(),
        }
    }

    /// Contention outcomes that callers are expected to handle as "try later".
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            BlockingError::BlockHeld { .. } | BlockingError::AcquireConflict { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BlockingError>;
