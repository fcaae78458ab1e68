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

use crate::commands::BlockOutput;
use crate::error::Result;
use crate::manager::BlockManager;

pub struct AcquireCommand<'a> {
    manager: &'a BlockManager,
}

impl<'a> AcquireCommand<'a> {
    pub fn new(manager: &'a BlockManager) -> Result<Self> {
        Ok(Self { manager })
    }

    pub fn execute(&self, resource_id: &str, json: bool) -> Result<()> {
        let block = self.manager.acquire(resource_id)?;
        let output = BlockOutput::from_block(&block, self.manager.validator());

        if json {
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Acquired block on '{}' until {}",
                output.resource_id,
                output.expires_at.as_deref().unwrap_or("further notice")
            );
        }
        Ok(())
    }
}
