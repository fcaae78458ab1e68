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

//! Lease-based resource blocking.
//!
//! A [`Block`] gives one owner exclusive use of a named resource until it
//! expires. [`BlockManager`] resolves the current owner, reads the stored
//! record and claims it through a compare-and-swap on the configured
//! [`Storage`] backend. Expiry is evaluated lazily on every call; nothing
//! sweeps stale records in the background.

pub mod block;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod owner;
pub mod services;
pub mod storage;
pub mod validator;

pub use block::Block;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BlockingConfig, load_config};
pub use error::{BlockingError, Result};
pub use manager::BlockManager;
pub use owner::OwnerFactory;
pub use services::ServiceRegistry;
pub use storage::Storage;
pub use validator::ExpiredValidator;
