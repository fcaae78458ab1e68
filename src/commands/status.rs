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
use crate::commands::{BlockOutput, timestamp};
use crate::error::Result;
use crate::manager::BlockManager;
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};

pub struct StatusCommand<'a> {
    manager: &'a BlockManager,
}

impl<'a> StatusCommand<'a> {
    pub fn new(manager: &'a BlockManager) -> Result<Self> {
        Ok(Self { manager })
    }

    pub fn execute(&self, resource_ids: &[String], json: bool) -> Result<()> {
        let records = resource_ids
            .iter()
            .map(|id| -> Result<(&str, Option<Block>)> {
                Ok((id.as_str(), self.manager.inspect(id)?))
            })
            .collect::<Result<Vec<_>>>()?;

        if json {
            let outputs: Vec<BlockOutput> = records
                .iter()
                .map(|(id, record)| self.output(id, record.as_ref()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&outputs)?);
        } else {
            println!("{}", self.render_table(&records));
        }
        Ok(())
    }

    fn output(&self, resource_id: &str, record: Option<&Block>) -> BlockOutput {
        match record {
            Some(block) => BlockOutput::from_block(block, self.manager.validator()),
            None => BlockOutput::unblocked(resource_id),
        }
    }

    fn render_table(&self, records: &[(&str, Option<Block>)]) -> Table {
        let validator = self.manager.validator();
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Resource", "Status", "Owner", "Updated", "Expires"]);

        for (resource_id, record) in records {
            let row = match record {
                Some(block) => {
                    // Lazy expiry leaves the record until someone reclaims it.
                    let status = if validator.is_expired(block) {
                        Cell::new("expired").fg(Color::Yellow)
                    } else {
                        Cell::new("blocked").fg(Color::Red)
                    };
                    vec![
                        Cell::new(resource_id),
                        status,
                        Cell::new(block.owner()),
                        Cell::new(timestamp(block.updated_at())),
                        Cell::new(validator.expires_at(block).map(timestamp).unwrap_or_default()),
                    ]
                }
                None => vec![
                    Cell::new(resource_id),
                    Cell::new("free").fg(Color::Green),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("-"),
                ],
            };
            table.add_row(row);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::manager_for;
    use crate::error::BlockingError;
    use crate::storage::{InMemoryStorage, Storage};
    use chrono::{TimeDelta, Utc};
    use std::sync::Arc;

    #[test]
    fn test_table_lists_each_state() {
        let storage = Arc::new(InMemoryStorage::new());
        let manager = manager_for("alice", storage.clone());
        manager.acquire("held").unwrap();
        let stale = Block::new("stale", "bob", Utc::now() - TimeDelta::seconds(600)).unwrap();
        storage.try_acquire("stale", &stale, None).unwrap();

        let command = StatusCommand::new(&manager).unwrap();
        let records = vec![
            ("held", storage.read("held").unwrap()),
            ("stale", storage.read("stale").unwrap()),
            ("free", None),
        ];
        let rendered = command.render_table(&records).to_string();

        assert!(rendered.contains("blocked"));
        assert!(rendered.contains("expired"));
        assert!(rendered.contains("free"));
        assert!(rendered.contains("alice"));
    }

    #[test]
    fn test_execute_reads_storage() {
        let manager = manager_for("alice", Arc::new(InMemoryStorage::new()));
        let command = StatusCommand::new(&manager).unwrap();
        assert!(
            command
                .execute(&["a".to_string(), "b".to_string()], true)
                .is_ok()
        );
    }

    #[test]
    fn test_empty_resource_id_is_rejected() {
        let manager = manager_for("alice", Arc::new(InMemoryStorage::new()));
        let command = StatusCommand::new(&manager).unwrap();
        assert!(matches!(
            command.execute(&["doc".to_string(), String::new()], false),
            Err(BlockingError::InvalidBlock(_))
        ));
    }
}
