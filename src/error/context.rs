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

use crate::error::BlockingError;
use std::fmt;

pub struct ErrorContext<'a> {
    pub error: &'a BlockingError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl<'a> ErrorContext<'a> {
    pub fn new(error: &'a BlockingError) -> Self {
        let (suggestion, details) = match error {
            BlockingError::Configuration(_) => {
                let suggestion = Some(
                    "Check the configuration file and BLOCKER_* environment variables. Storage \
                     drivers: filesystem, predis, in_memory, custom. Owner drivers: \
                     symfony_session, symfony_token, value, custom."
                        .to_string(),
                );
                (suggestion, None)
            }
            BlockingError::OwnerResolution(msg) => {
                let suggestion = Some(
                    "Make sure an owner identity is available, e.g. pass --owner or set \
                     BLOCKER_OWNER_FACTORY__VALUE."
                        .to_string(),
                );
                let details = Some(format!("Owner lookup failed: {msg}"));
                (suggestion, details)
            }
            BlockingError::Storage {
                backend,
                resource_id,
                details,
            } => {
                let suggestion = match *backend {
                    "filesystem" => Some(
                        "Verify that the storage directory exists and is writable.".to_string(),
                    ),
                    "key_value" => Some(
                        "Verify that the key-value server is reachable and try again.".to_string(),
                    ),
                    _ => None,
                };
                let details = Some(format!(
                    "The {backend} backend reported an error for '{resource_id}': {details}"
                ));
                (suggestion, details)
            }
            BlockingError::BlockHeld { held_since, .. } => {
                let suggestion = Some(
                    "Another owner holds this resource. Try again once the block expires or is \
                     released."
                        .to_string(),
                );
                let details = Some(format!("Last renewed at {}", held_since.to_rfc3339()));
                (suggestion, details)
            }
            BlockingError::AcquireConflict { attempts, .. } => {
                let suggestion =
                    Some("Other callers are racing for this resource. Retry now.".to_string());
                let details = Some(format!("Lost the compare-and-swap race {attempts} time(s)."));
                (suggestion, details)
            }
            BlockingError::NotHeld { .. } => {
                let suggestion = Some(
                    "The block may have expired and been reclaimed. Acquire it again before \
                     renewing."
                        .to_string(),
                );
                (suggestion, None)
            }
            BlockingError::InvalidBlock(_) => {
                let suggestion =
                    Some("Resource ids and owner ids must not be empty.".to_string());
                (suggestion, None)
            }
            BlockingError::Json(_) => (None, None),
        };

        Self {
            error,
            suggestion,
            details,
        }
    }
}

impl fmt::Display for ErrorContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\n\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}
