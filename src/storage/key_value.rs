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

//! Block storage on a remote key-value store such as Redis.
//!
//! Each resource maps to one key, `<prefix>:<resource_id>`, holding the JSON
//! encoded block. Atomicity comes from the store: the compare-and-swap and the
//! conditional delete each run as a single server-side script.

use crate::block::Block;
use crate::error::{BlockingError, Result};
use crate::storage::{Storage, ensure_candidate_matches};
use log::trace;
use redis::Commands;
use std::sync::Arc;

const BACKEND: &str = "key_value";

/// Raw string operations a key-value store must provide atomically.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Sets `key` to `value` only if the key does not exist.
    fn set_if_absent(&self, key: &str, value: &str) -> Result<bool>;

    /// Sets `key` to `value` only if its current value equals `expected`.
    fn compare_and_set(&self, key: &str, expected: &str, value: &str) -> Result<bool>;

    /// Deletes `key` only if its current value equals `expected`.
    fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        (**self).set_if_absent(key, value)
    }

    fn compare_and_set(&self, key: &str, expected: &str, value: &str) -> Result<bool> {
        (**self).compare_and_set(key, expected, value)
    }

    fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        (**self).compare_and_delete(key, expected)
    }
}

const COMPARE_AND_SET_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  redis.call('SET', KEYS[1], ARGV[2])
  return 1
end
return 0
"#;

const COMPARE_AND_DELETE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Redis-backed [`KeyValueStore`], opening a connection per operation.
pub struct RedisStore {
    client: redis::Client,
    compare_and_set: redis::Script,
    compare_and_delete: redis::Script,
}

impl RedisStore {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            compare_and_set: redis::Script::new(COMPARE_AND_SET_SCRIPT),
            compare_and_delete: redis::Script::new(COMPARE_AND_DELETE_SCRIPT),
        }
    }

    /// Opens a client for a `redis://`, `rediss://` or `unix://` URL.
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|err| {
            BlockingError::Configuration(format!("Invalid redis connection '{url}': {err}"))
        })?;
        Ok(Self::new(client))
    }

    fn connection(&self, key: &str) -> Result<redis::Connection> {
        self.client
            .get_connection()
            .map_err(|err| redis_error(key, err))
    }
}

impl KeyValueStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection(key)?;
        connection
            .get::<_, Option<String>>(key)
            .map_err(|err| redis_error(key, err))
    }

    fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let mut connection = self.connection(key)?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query(&mut connection)
            .map_err(|err| redis_error(key, err))?;
        Ok(reply.is_some())
    }

    fn compare_and_set(&self, key: &str, expected: &str, value: &str) -> Result<bool> {
        let mut connection = self.connection(key)?;
        let swapped: i64 = self
            .compare_and_set
            .key(key)
            .arg(expected)
            .arg(value)
            .invoke(&mut connection)
            .map_err(|err| redis_error(key, err))?;
        Ok(swapped == 1)
    }

    fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let mut connection = self.connection(key)?;
        let removed: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke(&mut connection)
            .map_err(|err| redis_error(key, err))?;
        Ok(removed == 1)
    }
}

fn redis_error(key: &str, err: redis::RedisError) -> BlockingError {
    BlockingError::storage(BACKEND, key, err.to_string())
}

/// [`Storage`] implementation over any [`KeyValueStore`].
pub struct KeyValueStorage<S> {
    store: S,
    prefix: String,
}

impl<S: KeyValueStore> KeyValueStorage<S> {
    pub fn new(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, resource_id: &str) -> String {
        format!("{}:{resource_id}", self.prefix)
    }

    fn fetch(&self, resource_id: &str) -> Result<Option<(String, Block)>> {
        let Some(raw) = self.store.get(&self.key(resource_id))? else {
            return Ok(None);
        };
        let block: Block = serde_json::from_str(&raw).map_err(|err| {
            BlockingError::storage(
                BACKEND,
                resource_id,
                format!("Corrupt block record under {}: {err}", self.key(resource_id)),
            )
        })?;

        if block.resource_id() != resource_id {
            return Err(BlockingError::storage(
                BACKEND,
                resource_id,
                format!(
                    "Record under {} belongs to '{}'",
                    self.key(resource_id),
                    block.resource_id()
                ),
            ));
        }

        Ok(Some((raw, block)))
    }
}

impl<S: KeyValueStore> Storage for KeyValueStorage<S> {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn read(&self, resource_id: &str) -> Result<Option<Block>> {
        Ok(self.fetch(resource_id)?.map(|(_, block)| block))
    }

    fn try_acquire(
        &self,
        resource_id: &str,
        candidate: &Block,
        previous: Option<&Block>,
    ) -> Result<bool> {
        ensure_candidate_matches(resource_id, candidate)?;

        let current = self.fetch(resource_id)?;
        if current.as_ref().map(|(_, block)| block) != previous {
            trace!("Key-value compare-and-swap lost for {resource_id} before swap");
            return Ok(false);
        }

        // Compare against the exact bytes observed so the store decides the race.
        let key = self.key(resource_id);
        let encoded = serde_json::to_string(candidate).map_err(|err| {
            BlockingError::storage(BACKEND, resource_id, format!("Failed to encode block: {err}"))
        })?;
        let swapped = match &current {
            None => self.store.set_if_absent(&key, &encoded)?,
            Some((raw, _)) => self.store.compare_and_set(&key, raw, &encoded)?,
        };
        if !swapped {
            trace!("Key-value compare-and-swap lost for {resource_id}");
        }
        Ok(swapped)
    }

    fn delete(&self, resource_id: &str, expected_owner: &str) -> Result<bool> {
        let key = self.key(resource_id);
        loop {
            let Some((raw, block)) = self.fetch(resource_id)? else {
                return Ok(false);
            };
            if !block.is_owned_by(expected_owner) {
                return Ok(false);
            }
            if self.store.compare_and_delete(&key, &raw)? {
                return Ok(true);
            }
            // The value changed after the read; the next read decides again.
            trace!("Key-value delete of {resource_id} raced a write, re-reading");
        }
    }
}
