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

//! Pooled HTTP transport shared by the query-results and object-store clients.
//!
//! Transient failures (429, 502, 503, 504, connect/timeout errors) are retried
//! with exponential backoff. Everything else surfaces immediately.

use crate::client::auth::AuthProvider;
use crate::error::{Error, Result};
use reqwest::{Client, Request, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub connect_timeout: Duration,
    /// Longest idle gap between reads of a response. Not a total deadline:
    /// streamed bodies may stay open while the reader applies backpressure.
    pub read_timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub retry_delay: Duration,
    pub max_connections_per_host: usize,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            max_retries: 5,
            retry_delay: Duration::from_millis(1500),
            max_connections_per_host: 100,
            user_agent: format!("athena-results/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client with connection pooling, retry and bearer authentication.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    auth_provider: Arc<dyn AuthProvider>,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig, auth_provider: Arc<dyn AuthProvider>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .pool_max_idle_per_host(config.max_connections_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::Service(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            auth_provider,
        })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// The underlying reqwest client, for building requests.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn auth_header(&self) -> Result<String> {
        self.auth_provider.get_auth_header()
    }

    /// Execute an authenticated request, retrying transient failures.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        self.execute_impl(request, true).await
    }

    /// Execute a request that carries its own credentials (presigned URLs).
    pub async fn execute_without_auth(&self, request: Request) -> Result<Response> {
        self.execute_impl(request, false).await
    }

    async fn execute_impl(&self, request: Request, with_auth: bool) -> Result<Response> {
        let mut attempts = 0;
        let mut last_error: Option<String> = None;

        let method = request.method().clone();
        let url = request.url().clone();
        let headers = request.headers().clone();
        let body_bytes = request
            .body()
            .and_then(|b| b.as_bytes())
            .map(|b| b.to_vec());

        loop {
            attempts += 1;

            let mut req_builder = self
                .client
                .request(method.clone(), url.clone())
                .headers(headers.clone());

            if with_auth {
                req_builder = req_builder.header("Authorization", self.auth_header()?);
            }

            if let Some(ref body) = body_bytes {
                req_builder = req_builder.body(body.clone());
            }

            let request = req_builder
                .build()
                .map_err(|e| Error::Service(format!("Failed to build request: {}", e)))?;

            debug!(
                "Executing {} {} (attempt {}/{})",
                method,
                url,
                attempts,
                self.config.max_retries + 1
            );

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    if Self::is_retryable_status(status) && attempts <= self.config.max_retries {
                        last_error = Some(format!("HTTP {}", status.as_u16()));
                        warn!(
                            "Request failed with {} (attempt {}/{}), retrying...",
                            status,
                            attempts,
                            self.config.max_retries + 1
                        );
                        self.wait_for_retry(attempts).await;
                        continue;
                    }

                    let error_body = response.text().await.unwrap_or_default();
                    return Err(Error::Http {
                        status: status.as_u16(),
                        body: error_body,
                    });
                }
                Err(e) => {
                    if Self::is_retryable_error(&e) && attempts <= self.config.max_retries {
                        last_error = Some(e.to_string());
                        warn!(
                            "Request failed with error (attempt {}/{}): {}, retrying...",
                            attempts,
                            self.config.max_retries + 1,
                            e
                        );
                        self.wait_for_retry(attempts).await;
                        continue;
                    }

                    return Err(Error::Service(format!(
                        "HTTP request failed after {} attempts: {}",
                        attempts,
                        last_error.unwrap_or_else(|| e.to_string())
                    )));
                }
            }
        }
    }

    fn is_retryable_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                | StatusCode::BAD_GATEWAY
        )
    }

    fn is_retryable_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect()
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        self.config.retry_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    async fn wait_for_retry(&self, attempt: u32) {
        let delay = self.retry_delay(attempt);
        debug!("Waiting {:?} before retry", delay);
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::auth::BearerToken;

    fn test_client() -> HttpClient {
        HttpClient::new(
            HttpClientConfig::default(),
            Arc::new(BearerToken::new("test-token")),
        )
        .unwrap()
    }

    #[test]
    fn test_http_client_config_default() {
        let config = HttpClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 5);
        assert!(config.user_agent.starts_with("athena-results/"));
    }

    #[test]
    fn test_is_retryable_status() {
        for status in [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
            StatusCode::BAD_GATEWAY,
        ] {
            assert!(HttpClient::is_retryable_status(status), "{}", status);
        }
        assert!(!HttpClient::is_retryable_status(StatusCode::OK));
        assert!(!HttpClient::is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!HttpClient::is_retryable_status(
            StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[tokio::test]
    async fn test_retry_delay_doubles() {
        let client = test_client();
        assert_eq!(client.retry_delay(1), Duration::from_millis(1500));
        assert_eq!(client.retry_delay(2), Duration::from_millis(3000));
        assert_eq!(client.retry_delay(3), Duration::from_millis(6000));
    }

    #[tokio::test]
    async fn test_auth_header() {
        let client = test_client();
        assert_eq!(client.auth_header().unwrap(), "Bearer test-token");
    }
}
