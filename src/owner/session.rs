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

/// Access to the caller's session, provided by the hosting application.
pub trait SessionSource: Send + Sync {
    /// Stable identifier of the active session, or `None` when there is none.
    fn session_id(&self) -> Option<String>;
}

/// Uses the active session id as the block owner.
#[derive(Clone)]
pub struct SessionOwnerFactory {
    source: Arc<dyn SessionSource>,
}

impl SessionOwnerFactory {
    pub fn new(source: Arc<dyn SessionSource>) -> Self {
        Self { source }
    }
}

impl OwnerFactory for SessionOwnerFactory {
    fn current_owner(&self) -> Result<String> {
        let owner = require_identity(
            self.source.session_id(),
            "no active session is available to identify the block owner",
        )?;
        trace!("Resolved block owner from session");
        Ok(owner)
    }
}
