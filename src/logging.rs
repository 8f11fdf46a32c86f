// Copyright (c) 2025 ADBC Drivers Contributors
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

//! Logging setup for cursors and streaming readers.
//!
//! Installs a `tracing-subscriber` registry writing to a file or stderr.
//!
//! ## Configuration priority
//!
//! 1. `athena.log_level` / `athena.log_file` options (highest)
//! 2. `RUST_LOG` environment variable
//! 3. Default: `warn`
//!
//! ```bash
//! RUST_LOG=athena_results=debug ./my_app
//! ```

use std::sync::OnceLock;
use tracing_subscriber::{
    fmt::{self, time::SystemTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_TARGET: &str = "athena_results";

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Logging settings, usually filled in by `ClientConfig::set_option`.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// "off", "error", "warn", "info", "debug" or "trace" (any case).
    pub level: Option<String>,
    /// Append logs to this file. Stderr when unset.
    pub file: Option<String>,
}

impl LogConfig {
    fn filter(&self) -> Option<EnvFilter> {
        match self.level {
            Some(ref level) if level.eq_ignore_ascii_case("off") => None,
            Some(ref level) => Some(EnvFilter::new(format!(
                "{}={}",
                LOG_TARGET,
                level.to_lowercase()
            ))),
            None => Some(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(format!("{}=warn", LOG_TARGET))),
            ),
        }
    }
}

/// Install the global subscriber.
///
/// Only the first call in a process has any effect.
pub fn init_logging(config: &LogConfig) {
    LOGGING_INITIALIZED.get_or_init(|| {
        let Some(filter) = config.filter() else {
            return;
        };

        match config.file {
            Some(ref path) => {
                let file = match std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                {
                    Ok(f) => f,
                    Err(e) => {
                        eprintln!("athena-results: failed to open log file {}: {}", path, e);
                        return;
                    }
                };

                tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        fmt::layer()
                            .with_writer(file)
                            .with_target(false)
                            .with_ansi(false)
                            .with_timer(SystemTime),
                    )
                    .try_init()
                    .ok();
            }
            None => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        fmt::layer()
                            .with_writer(std::io::stderr)
                            .with_target(false)
                            .with_timer(SystemTime),
                    )
                    .try_init()
                    .ok();
            }
        }
    });
}
