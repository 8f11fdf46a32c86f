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

//! PageFetcher issues `GetQueryResults` calls and waits for them with a
//! deadline.
//!
//! Requests are spawned on the runtime as soon as they are made; `wait`
//! blocks the calling thread until the page arrives, the deadline passes,
//! or the caller's interrupt token fires. Abandoned requests are aborted.

use crate::client::QueryResultsClient;
use crate::error::{Error, Result};
use crate::stream::bridge::interrupted;
use crate::types::config::validate_fetch_size;
use crate::types::results::{GetQueryResultsRequest, QueryResultsPage};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle as RuntimeHandle;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub struct PageFetcher {
    client: Arc<dyn QueryResultsClient>,
    query_execution_id: String,
    runtime_handle: RuntimeHandle,
}

impl std::fmt::Debug for PageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFetcher")
            .field("client", &self.client)
            .field("query_execution_id", &self.query_execution_id)
            .finish()
    }
}

impl PageFetcher {
    pub fn new(
        client: Arc<dyn QueryResultsClient>,
        query_execution_id: impl Into<String>,
        runtime_handle: RuntimeHandle,
    ) -> Self {
        Self {
            client,
            query_execution_id: query_execution_id.into(),
            runtime_handle,
        }
    }

    pub fn query_execution_id(&self) -> &str {
        &self.query_execution_id
    }

    /// Start fetching the page after `next_token` (the first page when
    /// `None`).
    pub fn request_page(&self, next_token: Option<&str>, max_results: u32) -> Result<PageRequest> {
        validate_fetch_size(i64::from(max_results))?;

        let request = GetQueryResultsRequest {
            query_execution_id: self.query_execution_id.clone(),
            next_token: next_token.map(str::to_string),
            max_results,
        };
        debug!(
            "Requesting page of query {} (token={:?}, max_results={})",
            self.query_execution_id, request.next_token, max_results
        );

        let client = Arc::clone(&self.client);
        let task = self
            .runtime_handle
            .spawn(async move { client.get_query_results(&request).await });

        Ok(PageRequest {
            task,
            query_execution_id: self.query_execution_id.clone(),
            runtime_handle: self.runtime_handle.clone(),
        })
    }

    /// Request a page and wait for it.
    pub fn fetch_page(
        &self,
        next_token: Option<&str>,
        max_results: u32,
        timeout: Duration,
        interrupt: Option<&CancellationToken>,
    ) -> Result<QueryResultsPage> {
        self.request_page(next_token, max_results)?
            .wait(timeout, interrupt)
    }
}

enum Outcome {
    Done(std::result::Result<Result<QueryResultsPage>, JoinError>),
    TimedOut,
    Interrupted,
}

/// An in-flight page request. Dropping it aborts the request.
#[derive(Debug)]
pub struct PageRequest {
    task: JoinHandle<Result<QueryResultsPage>>,
    query_execution_id: String,
    runtime_handle: RuntimeHandle,
}

impl PageRequest {
    /// Block until the page arrives, `timeout` elapses, or `interrupt` is
    /// cancelled. Must not be called from a runtime worker thread.
    pub fn wait(
        mut self,
        timeout: Duration,
        interrupt: Option<&CancellationToken>,
    ) -> Result<QueryResultsPage> {
        let interrupt = interrupt.cloned();
        let task = &mut self.task;
        let outcome = self.runtime_handle.block_on(async move {
            tokio::select! {
                biased;
                _ = interrupted(interrupt) => Outcome::Interrupted,
                result = tokio::time::timeout(timeout, task) => match result {
                    Ok(joined) => Outcome::Done(joined),
                    Err(_) => Outcome::TimedOut,
                },
            }
        });

        match outcome {
            Outcome::Done(Ok(Ok(page))) => Ok(page),
            Outcome::Done(Ok(Err(e))) => {
                error!(
                    "Page request for query {} failed: {}",
                    self.query_execution_id, e
                );
                Err(Error::query_failed(e, Some(self.wrapper())))
            }
            Outcome::Done(Err(join_error)) => {
                error!(
                    "Page request task for query {} did not complete: {}",
                    self.query_execution_id, join_error
                );
                Err(Error::query_failed(join_error, Some(self.wrapper())))
            }
            Outcome::TimedOut => {
                warn!(
                    "Page request for query {} timed out after {:?}",
                    self.query_execution_id, timeout
                );
                Err(Error::Timeout {
                    operation: format!("a page of query {}", self.query_execution_id),
                    timeout,
                })
            }
            Outcome::Interrupted => {
                debug!(
                    "Interrupted waiting for page of query {}",
                    self.query_execution_id
                );
                Err(Error::Interrupted(format!(
                    "waiting for a page of query {}",
                    self.query_execution_id
                )))
            }
        }
    }

    fn wrapper(&self) -> Error {
        Error::Service(format!(
            "Page request for query {} failed",
            self.query_execution_id
        ))
    }
}

impl Drop for PageRequest {
    fn drop(&mut self) {
        self.task.abort();
    }
}
