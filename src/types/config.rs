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

//! Configuration for result cursors, streaming reads and the HTTP clients.
//!
//! ## Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `athena.fetch_size` | 1000 | Rows requested per page (max 1000) |
//! | `athena.api_call_timeout_ms` | 60000 | Deadline for one page request |
//! | `athena.stream.target_buffer_bytes` | 33554432 | Bytes buffered ahead of the reader |
//! | `athena.stream.max_outstanding_requests` | 1000 | Cap on requested-but-undelivered chunks |
//! | `athena.http.connect_timeout_ms` | 30000 | HTTP connect timeout |
//! | `athena.http.read_timeout_ms` | 60000 | Idle time allowed between HTTP reads |
//! | `athena.http.max_retries` | 5 | Retries for transient HTTP failures |
//! | `athena.log_level` | unset | `off`, `error`, `warn`, `info`, `debug`, `trace` |
//! | `athena.log_file` | unset | Log to this file instead of stderr |

use crate::client::HttpClientConfig;
use crate::error::{Error, Result};
use crate::logging::LogConfig;
use crate::types::results::MAX_FETCH_SIZE;
use std::time::Duration;

/// Default target for bytes buffered ahead of a streaming reader (32 MiB).
pub const DEFAULT_TARGET_BUFFER_SIZE: usize = 1 << 25;

/// Configuration for a result cursor.
#[derive(Debug, Clone)]
pub struct CursorConfig {
    /// Rows requested per page.
    pub fetch_size: u32,
    /// Deadline for a single page request.
    pub api_call_timeout: Duration,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            fetch_size: MAX_FETCH_SIZE,
            api_call_timeout: Duration::from_secs(60),
        }
    }
}

/// Flow-control tuning for the streaming bridge.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Objects smaller than this are requested eagerly; larger ones are
    /// windowed so that roughly this many bytes are buffered.
    pub target_buffer_size: usize,
    /// Number of chunks requested at a time.
    pub request_batch: u64,
    /// Outstanding chunk requests never reach this value.
    pub max_outstanding_requests: i64,
    /// Weight of the newest sample in the mean chunk size.
    pub chunk_size_weight: f32,
    /// Mean chunk size assumed before any chunk arrives.
    pub initial_chunk_size_estimate: f32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            target_buffer_size: DEFAULT_TARGET_BUFFER_SIZE,
            request_batch: 10,
            max_outstanding_requests: 1000,
            chunk_size_weight: 0.2,
            initial_chunk_size_estimate: 8192.0,
        }
    }
}

/// All client-side settings, assembled from string options.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub cursor: CursorConfig,
    pub stream: StreamConfig,
    pub http: HttpClientConfig,
    pub log: LogConfig,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a single `athena.*` option.
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "athena.fetch_size" => {
                let v = parse_int_option(key, value)?;
                self.cursor.fetch_size = validate_fetch_size(v)?;
            }
            "athena.api_call_timeout_ms" => {
                self.cursor.api_call_timeout = parse_millis_option(key, value)?;
            }
            "athena.stream.target_buffer_bytes" => {
                let v = parse_int_option(key, value)?;
                self.stream.target_buffer_size = usize::try_from(v)
                    .map_err(|_| invalid_option(key, value))?;
            }
            "athena.stream.max_outstanding_requests" => {
                let v = parse_int_option(key, value)?;
                if v <= self.stream.request_batch as i64 {
                    return Err(invalid_option(key, value));
                }
                self.stream.max_outstanding_requests = v;
            }
            "athena.http.connect_timeout_ms" => {
                self.http.connect_timeout = parse_millis_option(key, value)?;
            }
            "athena.http.read_timeout_ms" => {
                self.http.read_timeout = parse_millis_option(key, value)?;
            }
            "athena.http.max_retries" => {
                let v = parse_int_option(key, value)?;
                self.http.max_retries = u32::try_from(v).map_err(|_| invalid_option(key, value))?;
            }
            "athena.log_level" => {
                self.log.level = Some(value.to_string());
            }
            "athena.log_file" => {
                self.log.file = Some(value.to_string());
            }
            _ => {
                return Err(Error::Configuration(format!("Unknown option '{}'", key)));
            }
        }
        Ok(())
    }

    /// Apply several options, stopping at the first invalid one.
    pub fn with_options<'a>(
        mut self,
        options: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self> {
        for (key, value) in options {
            self.set_option(key, value)?;
        }
        Ok(self)
    }
}

/// Check a requested fetch size against the service limit.
pub(crate) fn validate_fetch_size(fetch_size: i64) -> Result<u32> {
    if fetch_size > MAX_FETCH_SIZE as i64 {
        Err(Error::Configuration(format!(
            "Fetch size too large (got {}, max is {})",
            fetch_size, MAX_FETCH_SIZE
        )))
    } else if fetch_size < 1 {
        Err(Error::Configuration(format!(
            "Fetch size must be positive (got {})",
            fetch_size
        )))
    } else {
        Ok(fetch_size as u32)
    }
}

fn invalid_option(key: &str, value: &str) -> Error {
    Error::Configuration(format!("Invalid value '{}' for option '{}'", value, key))
}

fn parse_int_option(key: &str, value: &str) -> Result<i64> {
    value.trim().parse().map_err(|_| invalid_option(key, value))
}

fn parse_millis_option(key: &str, value: &str) -> Result<Duration> {
    let v = parse_int_option(key, value)?;
    u64::try_from(v)
        .map(Duration::from_millis)
        .map_err(|_| invalid_option(key, value))
}
