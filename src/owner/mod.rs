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

//! Owner resolution.
//!
//! An owner factory answers "who is asking" for the current call. Factories
//! never cache the answer: a long-lived worker may serve different sessions or
//! tokens from one process, so every call consults the underlying source again.

pub mod session;
pub mod token;

pub use session::{SessionOwnerFactory, SessionSource};
pub use token::{TokenOwnerFactory, TokenSource};

use crate::error::{BlockingError, Result};

pub trait OwnerFactory: Send + Sync {
    /// Returns the opaque owner id for the current execution context.
    fn current_owner(&self) -> Result<String>;
}

/// Custom resolvers can be plain closures.
impl<F> OwnerFactory for F
where
    F: Fn() -> Result<String> + Send + Sync,
{
    fn current_owner(&self) -> Result<String> {
        self()
    }
}

/// Owner factory returning a fixed, configured owner id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueOwnerFactory {
    value: String,
}

impl ValueOwnerFactory {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(BlockingError::Configuration(
                "The value owner_factory driver needs a non-empty owner value.".to_string(),
            ));
        }
        Ok(Self { value })
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl OwnerFactory for ValueOwnerFactory {
    fn current_owner(&self) -> Result<String> {
        Ok(self.value.clone())
    }
}

/// Normalises a raw identity, rejecting absent or blank values.
pub(crate) fn require_identity(raw: Option<String>, missing: &str) -> Result<String> {
    match raw {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(BlockingError::OwnerResolution(missing.to_string())),
    }
}
