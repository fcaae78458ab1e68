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

use crate::error::{BlockingError, Result};
use crate::validator::DEFAULT_BLOCK_INTERVAL_SECS;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_PREFIX: &str = "BLOCKER";
pub const DEFAULT_PREFIX: &str = "block";
pub const DEFAULT_ACQUIRE_ATTEMPTS: u32 = crate::manager::DEFAULT_ACQUIRE_ATTEMPTS;
const STORAGE_DIR_NAME: &str = "blocking";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StorageDriver {
    #[default]
    Filesystem,
    Predis,
    InMemory,
    Custom,
}

impl StorageDriver {
    pub const NAMES: [&'static str; 4] = ["filesystem", "predis", "in_memory", "custom"];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageDriver::Filesystem => "filesystem",
            StorageDriver::Predis => "predis",
            StorageDriver::InMemory => "in_memory",
            StorageDriver::Custom => "custom",
        }
    }
}

impl FromStr for StorageDriver {
    type Err = BlockingError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "filesystem" => Ok(StorageDriver::Filesystem),
            "predis" | "redis" => Ok(StorageDriver::Predis),
            "in_memory" => Ok(StorageDriver::InMemory),
            "custom" => Ok(StorageDriver::Custom),
            _ => Err(BlockingError::Configuration(format!(
                "The storage driver {value} is not supported. Please choose one of [{}]",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl TryFrom<String> for StorageDriver {
    type Error = BlockingError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<StorageDriver> for String {
    fn from(driver: StorageDriver) -> Self {
        driver.as_str().to_string()
    }
}

impl fmt::Display for StorageDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OwnerFactoryDriver {
    #[default]
    SymfonySession,
    SymfonyToken,
    Value,
    Custom,
}

impl OwnerFactoryDriver {
    pub const NAMES: [&'static str; 4] = ["symfony_session", "symfony_token", "value", "custom"];

    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerFactoryDriver::SymfonySession => "symfony_session",
            OwnerFactoryDriver::SymfonyToken => "symfony_token",
            OwnerFactoryDriver::Value => "value",
            OwnerFactoryDriver::Custom => "custom",
        }
    }
}

impl FromStr for OwnerFactoryDriver {
    type Err = BlockingError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "symfony_session" | "session" => Ok(OwnerFactoryDriver::SymfonySession),
            "symfony_token" | "token" => Ok(OwnerFactoryDriver::SymfonyToken),
            "value" => Ok(OwnerFactoryDriver::Value),
            "custom" => Ok(OwnerFactoryDriver::Custom),
            _ => Err(BlockingError::Configuration(format!(
                "The owner factory driver {value} is not supported. Please choose one of [{}]",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl TryFrom<String> for OwnerFactoryDriver {
    type Error = BlockingError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<OwnerFactoryDriver> for String {
    fn from(driver: OwnerFactoryDriver) -> Self {
        driver.as_str().to_string()
    }
}

impl fmt::Display for OwnerFactoryDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingConfig {
    #[serde(default = "default_block_interval")]
    pub block_interval: u64,

    /// Name of the registered clock service.
    #[serde(default)]
    pub clock: Option<String>,

    #[serde(default = "default_acquire_attempts")]
    pub acquire_attempts: u32,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub owner_factory: OwnerFactoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub driver: StorageDriver,

    #[serde(default)]
    pub service: Option<String>,

    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Alias of the key-value client to use with the `predis` driver.
    #[serde(default)]
    pub predis: Option<String>,

    #[serde(default = "default_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnerFactoryConfig {
    #[serde(default)]
    pub driver: OwnerFactoryDriver,

    #[serde(default)]
    pub service: Option<String>,

    #[serde(default)]
    pub value: Option<String>,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            block_interval: DEFAULT_BLOCK_INTERVAL_SECS,
            clock: None,
            acquire_attempts: DEFAULT_ACQUIRE_ATTEMPTS,
            storage: StorageConfig::default(),
            owner_factory: OwnerFactoryConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: StorageDriver::default(),
            service: None,
            storage_dir: default_storage_dir(),
            predis: None,
            prefix: default_prefix(),
        }
    }
}

fn default_block_interval() -> u64 {
    DEFAULT_BLOCK_INTERVAL_SECS
}

fn default_acquire_attempts() -> u32 {
    DEFAULT_ACQUIRE_ATTEMPTS
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_storage_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(STORAGE_DIR_NAME)
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|value| value.trim().is_empty())
}

impl BlockingConfig {
    /// Checks the cross-field rules that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.block_interval == 0 {
            return Err(configuration(
                "The block interval must be a positive number of seconds.",
            ));
        }
        if is_blank(self.clock.as_deref()) {
            return Err(configuration("Clock service is required."));
        }
        if self.acquire_attempts == 0 {
            return Err(configuration("The acquire attempts must be at least 1."));
        }

        self.storage.validate()?;
        self.owner_factory.validate()
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.prefix.trim().is_empty() {
            return Err(configuration("The storage prefix must not be empty."));
        }

        match self.driver {
            StorageDriver::Filesystem if self.storage_dir.as_os_str().is_empty() => Err(
                configuration("A storage directory has to be set for the filesystem storage driver."),
            ),
            StorageDriver::Predis if is_blank(self.predis.as_deref()) => Err(configuration(
                "A predis alias has to be set for the predis storage driver.",
            )),
            StorageDriver::Custom if is_blank(self.service.as_deref()) => Err(configuration(
                "You need to specify your own storage service when using the \"custom\" storage driver.",
            )),
            _ => Ok(()),
        }
    }
}

impl OwnerFactoryConfig {
    fn validate(&self) -> Result<()> {
        match self.driver {
            OwnerFactoryDriver::Custom if is_blank(self.service.as_deref()) => Err(configuration(
                "You need to specify your own owner factory service when using the \"custom\" owner factory driver.",
            )),
            OwnerFactoryDriver::Value if is_blank(self.value.as_deref()) => Err(configuration(
                "An owner value has to be set for the value owner factory driver.",
            )),
            _ => Ok(()),
        }
    }
}

fn configuration(message: &str) -> BlockingError {
    BlockingError::Configuration(message.to_string())
}

/// Loads configuration from `defaults`, an optional TOML file and `BLOCKER_*`
/// environment variables, later sources winning, then validates it.
///
/// Nested keys use a double underscore in the environment, e.g.
/// `BLOCKER_STORAGE__DRIVER=in_memory`.
pub fn load_config(path: Option<&Path>, defaults: &[(&str, &str)]) -> Result<BlockingConfig> {
    load_config_with(path, defaults, &[])
}

/// Like [`load_config`], with `overrides` taking precedence over every source.
pub fn load_config_with(
    path: Option<&Path>,
    defaults: &[(&str, &str)],
    overrides: &[(&str, &str)],
) -> Result<BlockingConfig> {
    let mut builder = Config::builder();
    for (key, value) in defaults {
        builder = builder
            .set_default(*key, *value)
            .map_err(|e| BlockingError::Configuration(e.to_string()))?;
    }
    for (key, value) in overrides {
        builder = builder
            .set_override(*key, *value)
            .map_err(|e| BlockingError::Configuration(e.to_string()))?;
    }

    if let Some(path) = path {
        log::debug!("Loading configuration from {}", path.display());
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config: BlockingConfig = builder
        .build()
        .and_then(|settings| settings.try_deserialize())
        .map_err(|e| BlockingError::Configuration(format!("Failed to load configuration: {e}")))?;

    config.validate()?;
    log::debug!(
        "Configured {} storage with {} owners, interval {}s",
        config.storage.driver,
        config.owner_factory.driver,
        config.block_interval
    );
    Ok(config)
}
