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

use blocker::commands::acquire::AcquireCommand;
use blocker::commands::release::ReleaseCommand;
use blocker::commands::renew::RenewCommand;
use blocker::commands::status::StatusCommand;
use blocker::config::{BlockingConfig, StorageDriver, load_config_with};
use blocker::error::{Result, format_error_chain, format_error_with_color, get_exit_code};
use blocker::logging;
use blocker::manager::BlockManager;
use blocker::services::{SYSTEM_CLOCK, ServiceRegistry};
use blocker::storage::RedisStore;
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

/// A command-line process has no session or token, so the owner is a value.
const CLI_DEFAULTS: &[(&str, &str)] = &[("clock", SYSTEM_CLOCK), ("owner_factory.driver", "value")];

const REDIS_SCHEMES: &[&str] = &["redis://", "rediss://", "unix://", "redis+unix://"];

#[derive(Parser)]
#[command(name = "blocker")]
#[command(author, version, about = "Lease-based resource blocking", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE", env = "BLOCKER_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Owner id used by the value owner driver (defaults to the login name)
    #[arg(long, global = true, value_name = "OWNER")]
    owner: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take or renew the block on a resource
    #[command(visible_alias = "a")]
    Acquire {
        resource: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Refresh a block you already hold
    Renew {
        resource: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Release a block you hold
    #[command(visible_alias = "r")]
    Release {
        resource: String,

        /// Succeed silently when the block is not yours
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show who blocks the given resources
    #[command(visible_alias = "s")]
    Status {
        #[arg(required = true)]
        resources: Vec<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// Registers a Redis client when the predis alias is itself a connection URL.
fn registry_for(config: &BlockingConfig) -> Result<ServiceRegistry> {
    let registry = ServiceRegistry::new();
    match (&config.storage.driver, config.storage.predis.as_deref()) {
        (StorageDriver::Predis, Some(alias))
            if REDIS_SCHEMES.iter().any(|scheme| alias.starts_with(scheme)) =>
        {
            let store = RedisStore::open(alias)?;
            Ok(registry.with_key_value_store(alias, Arc::new(store)))
        }
        _ => Ok(registry),
    }
}

fn login_name() -> Option<String> {
    ["USER", "USERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok())
        .filter(|name| !name.trim().is_empty())
}

fn run(cli: Cli) -> Result<()> {
    let login = login_name();
    let mut defaults = CLI_DEFAULTS.to_vec();
    if let Some(login) = login.as_deref() {
        defaults.push(("owner_factory.value", login));
    }

    let mut overrides = Vec::new();
    if let Some(owner) = cli.owner.as_deref() {
        overrides.push(("owner_factory.value", owner));
    }

    let config = load_config_with(cli.config.as_deref(), &defaults, &overrides)?;
    let registry = registry_for(&config)?;
    let manager = BlockManager::from_config(&config, &registry)?;

    match cli.command {
        Commands::Acquire { resource, json } => {
            let command = AcquireCommand::new(&manager)?;
            command.execute(&resource, json)
        }
        Commands::Renew { resource, json } => {
            let command = RenewCommand::new(&manager)?;
            command.execute(&resource, json)
        }
        Commands::Release { resource, quiet } => {
            let command = ReleaseCommand::new(&manager)?;
            command.execute(&resource, quiet)
        }
        Commands::Status { resources, json } => {
            let command = StatusCommand::new(&manager)?;
            command.execute(&resources, json)
        }
    }
}

fn main() {
    let cli = Cli::parse();

    logging::setup_logger(cli.verbose);

    if let Err(e) = run(cli) {
        let message = if std::io::stderr().is_terminal() {
            format_error_with_color(&e, true)
        } else {
            format_error_chain(&e)
        };
        eprintln!("{message}");
        std::process::exit(get_exit_code(&e));
    }
}
