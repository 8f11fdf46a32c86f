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

//! Clients for the remote query service and the object store.
//!
//! This module provides:
//! - `QueryResultsClient` trait: fetches one page of query results
//! - `ObjectStoreClient` trait: starts a push-based object retrieval
//! - `HttpClient`: pooled HTTP transport with retry logic
//! - `HttpQueryResultsClient` / `HttpObjectStore`: HTTP implementations

pub mod auth;
pub mod http;
pub mod object_store;
pub mod query_results;

use crate::error::Result;
use crate::stream::ChunkSubscriber;
use crate::types::results::{GetQueryResultsRequest, QueryResultsPage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use auth::{AuthProvider, BearerToken};
pub use http::{HttpClient, HttpClientConfig};
pub use object_store::HttpObjectStore;
pub use query_results::HttpQueryResultsClient;

/// Remote paging API of the query service.
///
/// Implementations are shared by many cursors and must not hold per-cursor
/// state.
#[async_trait]
pub trait QueryResultsClient: Send + Sync + std::fmt::Debug {
    /// Fetch the page identified by `request.next_token` (first page when
    /// absent), containing at most `request.max_results` rows.
    async fn get_query_results(&self, request: &GetQueryResultsRequest)
        -> Result<QueryResultsPage>;
}

/// Where to fetch an object from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectLocation {
    /// Presigned or otherwise directly fetchable URL.
    pub url: String,
    /// Extra headers to send with the request.
    pub headers: HashMap<String, String>,
}

impl ObjectLocation {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Response metadata delivered before the first chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectResponse {
    /// Declared length of the object, when the store reports one.
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
}

/// Push-based object retrieval.
///
/// `get_object` returns immediately. All outcomes, including failures to
/// start, are reported through the subscriber's callbacks.
pub trait ObjectStoreClient: Send + Sync + std::fmt::Debug {
    fn get_object(&self, location: &ObjectLocation, subscriber: Arc<dyn ChunkSubscriber>);
}
