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

//! Wiring of a validated [`BlockingConfig`] into a [`BlockManager`].
//!
//! Configuration refers to collaborators by name; the [`ServiceRegistry`]
//! holds the named instances the host application provides. Resolution
//! happens once, when the manager is built.

use crate::clock::{Clock, SystemClock};
use crate::config::{BlockingConfig, OwnerFactoryDriver, StorageDriver};
use crate::error::{BlockingError, Result};
use crate::manager::BlockManager;
use crate::owner::{
    OwnerFactory, SessionOwnerFactory, SessionSource, TokenOwnerFactory, TokenSource,
    ValueOwnerFactory,
};
use crate::storage::{
    FilesystemStorage, InMemoryStorage, KeyValueStorage, KeyValueStore, Storage,
};
use crate::validator::ExpiredValidator;
use std::collections::HashMap;
use std::sync::Arc;

/// Name under which [`ServiceRegistry::new`] registers the system clock.
pub const SYSTEM_CLOCK: &str = "system";

#[derive(Clone)]
pub struct ServiceRegistry {
    clocks: HashMap<String, Arc<dyn Clock>>,
    storages: HashMap<String, Arc<dyn Storage>>,
    owner_factories: HashMap<String, Arc<dyn OwnerFactory>>,
    key_value_stores: HashMap<String, Arc<dyn KeyValueStore>>,
    session_source: Option<Arc<dyn SessionSource>>,
    token_source: Option<Arc<dyn TokenSource>>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::empty().with_clock(SYSTEM_CLOCK, Arc::new(SystemClock))
    }

    /// A registry without any services, not even the system clock.
    pub fn empty() -> Self {
        Self {
            clocks: HashMap::new(),
            storages: HashMap::new(),
            owner_factories: HashMap::new(),
            key_value_stores: HashMap::new(),
            session_source: None,
            token_source: None,
        }
    }

    pub fn with_clock(mut self, name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        self.clocks.insert(name.into(), clock);
        self
    }

    pub fn with_storage(mut self, name: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        self.storages.insert(name.into(), storage);
        self
    }

    pub fn with_owner_factory(
        mut self,
        name: impl Into<String>,
        factory: Arc<dyn OwnerFactory>,
    ) -> Self {
        self.owner_factories.insert(name.into(), factory);
        self
    }

    pub fn with_key_value_store(
        mut self,
        alias: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        self.key_value_stores.insert(alias.into(), store);
        self
    }

    pub fn with_session_source(mut self, source: Arc<dyn SessionSource>) -> Self {
        self.session_source = Some(source);
        self
    }

    pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    pub fn clock(&self, name: &str) -> Result<Arc<dyn Clock>> {
        lookup(&self.clocks, "clock", name)
    }

    pub fn storage(&self, name: &str) -> Result<Arc<dyn Storage>> {
        lookup(&self.storages, "storage", name)
    }

    pub fn owner_factory(&self, name: &str) -> Result<Arc<dyn OwnerFactory>> {
        lookup(&self.owner_factories, "owner factory", name)
    }

    pub fn key_value_store(&self, alias: &str) -> Result<Arc<dyn KeyValueStore>> {
        lookup(&self.key_value_stores, "key-value store", alias)
    }
}

fn lookup<T: ?Sized>(
    services: &HashMap<String, Arc<T>>,
    kind: &str,
    name: &str,
) -> Result<Arc<T>> {
    services.get(name).cloned().ok_or_else(|| {
        BlockingError::Configuration(format!("No {kind} service is registered as '{name}'."))
    })
}

fn required<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| BlockingError::Configuration(message.to_string()))
}

pub fn build_storage(
    config: &BlockingConfig,
    registry: &ServiceRegistry,
) -> Result<Arc<dyn Storage>> {
    let storage = &config.storage;
    let built: Arc<dyn Storage> = match storage.driver {
        StorageDriver::Filesystem => Arc::new(FilesystemStorage::new(
            storage.storage_dir.clone(),
            &storage.prefix,
        )),
        StorageDriver::Predis => {
            let alias = required(
                storage.predis.as_deref(),
                "A predis alias has to be set for the predis storage driver.",
            )?;
            let store = registry.key_value_store(alias)?;
            Arc::new(KeyValueStorage::new(store, storage.prefix.as_str()))
        }
        StorageDriver::InMemory => Arc::new(InMemoryStorage::new()),
        StorageDriver::Custom => registry.storage(required(
            storage.service.as_deref(),
            "You need to specify your own storage service when using the \"custom\" storage driver.",
        )?)?,
    };

    log::debug!("Using {} block storage", built.backend());
    Ok(built)
}

pub fn build_owner_factory(
    config: &BlockingConfig,
    registry: &ServiceRegistry,
) -> Result<Arc<dyn OwnerFactory>> {
    let owner = &config.owner_factory;
    match owner.driver {
        OwnerFactoryDriver::SymfonySession => {
            let source = registry.session_source.clone().ok_or_else(|| {
                BlockingError::Configuration(
                    "The symfony_session owner factory driver needs a registered session source."
                        .to_string(),
                )
            })?;
            Ok(Arc::new(SessionOwnerFactory::new(source)))
        }
        OwnerFactoryDriver::SymfonyToken => {
            let source = registry.token_source.clone().ok_or_else(|| {
                BlockingError::Configuration(
                    "The symfony_token owner factory driver needs a registered token source."
                        .to_string(),
                )
            })?;
            Ok(Arc::new(TokenOwnerFactory::new(source)))
        }
        OwnerFactoryDriver::Value => {
            let value = required(
                owner.value.as_deref(),
                "An owner value has to be set for the value owner factory driver.",
            )?;
            Ok(Arc::new(ValueOwnerFactory::new(value)?))
        }
        OwnerFactoryDriver::Custom => registry.owner_factory(required(
            owner.service.as_deref(),
            "You need to specify your own owner factory service when using the \"custom\" owner factory driver.",
        )?),
    }
}

impl BlockManager {
    /// Validates `config` and resolves every collaborator it names.
    pub fn from_config(config: &BlockingConfig, registry: &ServiceRegistry) -> Result<Self> {
        config.validate()?;

        let clock = registry.clock(required(
            config.clock.as_deref(),
            "Clock service is required.",
        )?)?;
        let validator = ExpiredValidator::new(config.block_interval, clock);
        let storage = build_storage(config, registry)?;
        let owner_factory = build_owner_factory(config, registry)?;

        Ok(BlockManager::new(owner_factory, storage, validator)
            .with_max_attempts(config.acquire_attempts))
    }
}
