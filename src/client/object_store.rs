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

//! Object retrieval over presigned HTTP GET.
//!
//! Each retrieval runs as a spawned task that pulls body chunks from the
//! response and pushes them to the subscriber, one per unit of demand.
//! Demand is counted with a semaphore; cancellation goes through a
//! `CancellationToken` and drops the connection.

use crate::client::{HttpClient, ObjectLocation, ObjectResponse, ObjectStoreClient};
use crate::error::{BoxError, Error, Result};
use crate::stream::{ChunkSubscriber, Subscription};
use reqwest::{Method, Response};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// `ObjectStoreClient` backed by the shared HTTP transport.
#[derive(Debug)]
pub struct HttpObjectStore {
    http_client: Arc<HttpClient>,
    runtime_handle: RuntimeHandle,
}

impl HttpObjectStore {
    pub fn new(http_client: Arc<HttpClient>, runtime_handle: RuntimeHandle) -> Self {
        Self {
            http_client,
            runtime_handle,
        }
    }

    async fn open(http_client: &HttpClient, location: &ObjectLocation) -> Result<Response> {
        let mut request_builder = http_client.inner().request(Method::GET, &location.url);
        for (key, value) in &location.headers {
            request_builder = request_builder.header(key, value);
        }
        let request = request_builder
            .build()
            .map_err(|e| Error::Service(format!("Failed to build download request: {}", e)))?;

        // Presigned URLs carry their own credentials.
        http_client.execute_without_auth(request).await
    }
}

impl ObjectStoreClient for HttpObjectStore {
    fn get_object(&self, location: &ObjectLocation, subscriber: Arc<dyn ChunkSubscriber>) {
        let http_client = Arc::clone(&self.http_client);
        let location = location.clone();
        let subscription = Arc::new(HttpSubscription::new());

        self.runtime_handle.spawn(async move {
            let start = Instant::now();
            let response = tokio::select! {
                _ = subscription.cancel_token.cancelled() => return,
                response = Self::open(&http_client, &location) => response,
            };
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    warn!("Failed to open object {}: {}", location.url, e);
                    subscriber.on_error(Box::new(e));
                    return;
                }
            };

            subscriber.on_response(ObjectResponse {
                content_length: response.content_length(),
                content_type: response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
            });
            subscriber.on_subscribe(subscription.clone());

            match pump(response, &subscription, subscriber.as_ref()).await {
                Ok(Some(bytes)) => {
                    debug!(
                        "Downloaded {} bytes from {} in {:.2}s",
                        bytes,
                        location.url,
                        start.elapsed().as_secs_f64()
                    );
                    subscriber.on_complete();
                }
                Ok(None) => debug!("Download of {} cancelled", location.url),
                Err(e) => {
                    warn!("Download of {} failed: {}", location.url, e);
                    subscriber.on_error(e);
                }
            }
        });
    }
}

/// Deliver body chunks while there is demand. Returns the byte count on
/// completion, `None` when cancelled.
async fn pump(
    mut response: Response,
    subscription: &HttpSubscription,
    subscriber: &dyn ChunkSubscriber,
) -> std::result::Result<Option<u64>, BoxError> {
    let mut total = 0u64;
    loop {
        if !subscription.unbounded.load(Ordering::Acquire) {
            tokio::select! {
                _ = subscription.cancel_token.cancelled() => return Ok(None),
                permit = subscription.demand.acquire() => match permit {
                    Ok(permit) => permit.forget(),
                    Err(_) => return Ok(None),
                },
            }
        }

        let chunk = tokio::select! {
            _ = subscription.cancel_token.cancelled() => return Ok(None),
            chunk = response.chunk() => chunk?,
        };
        match chunk {
            Some(chunk) => {
                total += chunk.len() as u64;
                subscriber.on_next(chunk);
            }
            None => return Ok(Some(total)),
        }
    }
}

#[derive(Debug)]
struct HttpSubscription {
    demand: Semaphore,
    unbounded: AtomicBool,
    cancel_token: CancellationToken,
}

impl HttpSubscription {
    fn new() -> Self {
        Self {
            demand: Semaphore::new(0),
            unbounded: AtomicBool::new(false),
            cancel_token: CancellationToken::new(),
        }
    }
}

impl Subscription for HttpSubscription {
    fn request(&self, n: u64) {
        if n == 0 || self.unbounded.load(Ordering::Acquire) {
            return;
        }
        let available = Semaphore::MAX_PERMITS - self.demand.available_permits();
        if n >= available as u64 {
            self.unbounded.store(true, Ordering::Release);
            // Wake a pump waiting on demand.
            self.demand.add_permits(1);
        } else {
            self.demand.add_permits(n as usize);
        }
    }

    fn cancel(&self) {
        self.cancel_token.cancel();
        self.demand.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{BearerToken, HttpClientConfig};
    use crate::stream::open_object;
    use crate::types::config::StreamConfig;
    use std::io::Read;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // =========================================================================
    // Local HTTP server
    // =========================================================================

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    /// Answer a single GET with `status` and `body`, written in 64 KiB pieces.
    async fn serve_once(
        listener: TcpListener,
        status: &'static str,
        body: Vec<u8>,
    ) -> std::io::Result<()> {
        let (mut socket, _) = listener.accept().await?;

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let head = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\n\r\n",
            status,
            body.len()
        );
        socket.write_all(head.as_bytes()).await?;
        for piece in body.chunks(64 * 1024) {
            socket.write_all(piece).await?;
        }
        socket.flush().await
    }

    /// Start a server on a random port; returns the object URL and the
    /// server task.
    fn start_server(
        rt: &tokio::runtime::Runtime,
        status: &'static str,
        body: Vec<u8>,
    ) -> (String, tokio::task::JoinHandle<std::io::Result<()>>) {
        let listener = rt.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
        let url = format!("http://{}/results/Q-1234.csv", listener.local_addr().unwrap());
        (url, rt.spawn(serve_once(listener, status, body)))
    }

    fn object_store(rt: &tokio::runtime::Runtime, read_timeout: Duration) -> HttpObjectStore {
        let config = HttpClientConfig {
            read_timeout,
            max_retries: 0,
            ..HttpClientConfig::default()
        };
        let http_client = HttpClient::new(config, Arc::new(BearerToken::new("unused"))).unwrap();
        HttpObjectStore::new(Arc::new(http_client), rt.handle().clone())
    }

    fn windowed() -> StreamConfig {
        StreamConfig {
            target_buffer_size: 256 * 1024,
            ..StreamConfig::default()
        }
    }

    // =========================================================================
    // Streaming over HTTP
    // =========================================================================

    #[test]
    fn test_paused_reader_outlives_read_timeout() {
        let rt = runtime();
        let body = payload(4 * 1024 * 1024);
        let (url, server) = start_server(&rt, "200 OK", body.clone());
        let store = object_store(&rt, Duration::from_millis(300));

        let mut reader = open_object(
            &store,
            &ObjectLocation::new(url),
            windowed(),
            rt.handle().clone(),
        )
            .wait()
            .unwrap();
        assert_eq!(reader.response().content_length, Some(body.len() as u64));

        let mut out = vec![0u8; 64 * 1024];
        reader.read_exact(&mut out).unwrap();

        // Backpressure holds the body open far longer than the read timeout.
        std::thread::sleep(Duration::from_secs(1));

        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out.len(), body.len());
        assert!(out == body);
        rt.block_on(server).unwrap().unwrap();
    }

    #[test]
    fn test_error_status_fails_prepare() {
        let rt = runtime();
        let (url, _server) = start_server(&rt, "404 Not Found", b"NoSuchKey".to_vec());
        let store = object_store(&rt, Duration::from_secs(5));

        let err = open_object(
            &store,
            &ObjectLocation::new(url),
            windowed(),
            rt.handle().clone(),
        )
            .wait()
            .unwrap_err();
        assert!(matches!(err, Error::Stream(_)));
        assert!(err.to_string().contains("HTTP 404"), "{}", err);
    }

    #[test]
    fn test_close_drops_connection() {
        let rt = runtime();
        let (url, server) = start_server(&rt, "200 OK", payload(64 * 1024 * 1024));
        let store = object_store(&rt, Duration::from_secs(5));

        let mut reader = open_object(
            &store,
            &ObjectLocation::new(url),
            windowed(),
            rt.handle().clone(),
        )
            .wait()
            .unwrap();
        let mut buf = [0u8; 1024];
        reader.read_exact(&mut buf).unwrap();
        reader.close();

        // The server can no longer write once the pump drops the response.
        let served = rt
            .block_on(async { tokio::time::timeout(Duration::from_secs(10), server).await })
            .unwrap()
            .unwrap();
        assert!(served.is_err());
    }

    #[test]
    fn test_bounded_request_adds_permits() {
        let subscription = HttpSubscription::new();
        subscription.request(10);
        assert_eq!(subscription.demand.available_permits(), 10);
        assert!(!subscription.unbounded.load(Ordering::Acquire));
    }

    #[test]
    fn test_unbounded_request_switches_mode() {
        let subscription = HttpSubscription::new();
        subscription.request(u64::MAX);
        assert!(subscription.unbounded.load(Ordering::Acquire));
        // Further requests are no-ops and never overflow the semaphore.
        subscription.request(u64::MAX);
        subscription.request(10);
        assert_eq!(subscription.demand.available_permits(), 1);
    }

    #[test]
    fn test_cancel_closes_demand() {
        let subscription = HttpSubscription::new();
        subscription.cancel();
        assert!(subscription.cancel_token.is_cancelled());
        assert!(subscription.demand.is_closed());
    }
}
