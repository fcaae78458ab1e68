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

use crate::error::Result;
use crate::owner::{OwnerFactory, require_identity};
use log::trace;
use std::sync::Arc;

/// Access to the authenticated caller's token, provided by the hosting application.
pub trait TokenSource: Send + Sync {
    /// Identifier carried by the current bearer/auth token, if any.
    fn token_identifier(&self) -> Option<String>;
}

/// Uses the current auth token's identifier as the block owner.
#[derive(Clone)]
pub struct TokenOwnerFactory {
    source: Arc<dyn TokenSource>,
}

impl TokenOwnerFactory {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self { source }
    }
}

impl OwnerFactory for TokenOwnerFactory {
    fn current_owner(&self) -> Result<String> {
        let owner = require_identity(
            self.source.token_identifier(),
            "no authentication token is available to identify the block owner",
        )?;
        trace!("Resolved block owner from token");
        Ok(owner)
    }
}
