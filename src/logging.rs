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

//! Logger bootstrap for the `blocker` binary.
//!
//! The library only emits through the `log` facade; embedding applications
//! install whatever logger they already use.

/// Default filter for a `-v` count: 0 = warn, 1 = info, 2 = debug, 3+ = trace.
pub fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "blocker=warn",
        1 => "blocker=info",
        2 => "blocker=debug",
        _ => "blocker=trace",
    }
}

/// Installs `env_logger` on stderr. `RUST_LOG` takes precedence over `verbose`.
pub fn setup_logger(verbose: u8) {
    let env = env_logger::Env::default().default_filter_or(default_filter(verbose));

    // A host that already installed a logger keeps it.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .try_init();
}
