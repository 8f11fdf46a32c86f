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

//! Synchronous access to the results of an asynchronous analytic query
//! service.
//!
//! ## Overview
//!
//! - [`ResultSet`] / [`ResultCursor`]: forward-only cursor over the pages
//!   of a finished query, fetched lazily through `GetQueryResults`
//! - [`StreamingBridge`] / [`BridgeReader`]: blocking `std::io::Read` over
//!   a push-based object download with adaptive backpressure
//!
//! Both drive async clients from synchronous callers by blocking on a
//! `tokio` runtime handle. Call them from ordinary threads, never from
//! inside the runtime's worker threads.
//!
//! ## Example
//!
//! ```ignore
//! use athena_results::client::{BearerToken, HttpClient, HttpQueryResultsClient};
//! use athena_results::{ClientConfig, PageFetcher, ResultCursor, ResultSet};
//! use std::sync::Arc;
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! let config = ClientConfig::new().with_options([("athena.fetch_size", "500")])?;
//! athena_results::logging::init_logging(&config.log);
//!
//! let http = Arc::new(HttpClient::new(config.http.clone(), Arc::new(BearerToken::new("token")))?);
//! let client = Arc::new(HttpQueryResultsClient::new(http, "https://athena.eu-west-1.amazonaws.com/"));
//! let fetcher = PageFetcher::new(client, "query-execution-id", runtime.handle().clone());
//!
//! let mut rows = ResultSet::new(ResultCursor::new(fetcher, config.cursor.clone()));
//! while rows.next()? {
//!     let id: i64 = rows.get(1)?;
//!     let name: Option<String> = rows.get_by_label("name")?;
//! }
//! ```

pub mod client;
pub mod error;
pub mod logging;
pub mod result;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use result::{
    FetchDirection, FromCell, PageFetcher, Position, ResultCursor, ResultMetadata, ResultSet,
};
pub use stream::{open_object, BridgeReader, PreparedStream, StreamingBridge};
pub use types::{ClientConfig, CursorConfig, StreamConfig};
