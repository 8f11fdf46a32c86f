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

//! StreamingBridge: push-based producer in, blocking `std::io::Read` out.
//!
//! The producer side (`ChunkSubscriber` callbacks) never blocks: chunks go
//! into an unbounded queue and the flow controller decides how much more
//! to request. The consumer side blocks the calling thread on the queue via
//! the runtime handle, the same way the synchronous reader adapters in this
//! crate drive their async internals.
//!
//! Lifecycle:
//! 1. `StreamingBridge::new` returns the bridge and a `PreparedStream`.
//! 2. The bridge is handed to a producer, which calls `on_response` and
//!    then `on_subscribe`.
//! 3. The `PreparedStream` resolves to a `BridgeReader` on `on_response`,
//!    or to the stream error if `on_error` comes first.
//! 4. The reader is consumed until `read` returns 0, or closed early.

use crate::client::{ObjectLocation, ObjectResponse, ObjectStoreClient};
use crate::error::{BoxError, Error, Result};
use crate::stream::chunk_queue::{ChunkQueue, ChunkReceiver, QueueItem};
use crate::stream::flow_control::{FlowController, FlowSnapshot};
use crate::stream::{ChunkSubscriber, Subscription};
use crate::types::config::StreamConfig;
use bytes::{Buf, Bytes};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::task::{Context, Poll};
use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type PrepareResult = std::result::Result<ObjectResponse, Error>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared state between the producer callbacks and the reader.
pub struct StreamingBridge {
    // Flow control
    flow: FlowController,
    queue: ChunkQueue,
    subscription: Mutex<Option<Arc<dyn Subscription>>>,
    released: AtomicBool,
    complete: AtomicBool,

    // Handoff to the reader
    response: OnceLock<ObjectResponse>,
    prepare_tx: Mutex<Option<oneshot::Sender<PrepareResult>>>,
    receiver: Mutex<Option<ChunkReceiver>>,

    // First producer error; fails every later read
    error: OnceLock<Arc<BoxError>>,
    failed: CancellationToken,
}

impl std::fmt::Debug for StreamingBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingBridge")
            .field("flow", &self.flow.snapshot())
            .field("released", &self.released.load(Ordering::Relaxed))
            .field("complete", &self.complete.load(Ordering::Relaxed))
            .field("failed", &self.error.get().is_some())
            .finish()
    }
}

impl StreamingBridge {
    /// Create a bridge and the pending stream that resolves once the
    /// producer has responded.
    ///
    /// `runtime_handle` is used to block the reading thread. Readers must
    /// not be used from inside that runtime's worker threads.
    pub fn new(config: StreamConfig, runtime_handle: RuntimeHandle) -> (Arc<Self>, PreparedStream) {
        let (queue, receiver) = ChunkQueue::new();
        let (prepare_tx, prepare_rx) = oneshot::channel();

        let bridge = Arc::new(Self {
            flow: FlowController::new(config),
            queue,
            subscription: Mutex::new(None),
            released: AtomicBool::new(false),
            complete: AtomicBool::new(false),
            response: OnceLock::new(),
            prepare_tx: Mutex::new(Some(prepare_tx)),
            receiver: Mutex::new(Some(receiver)),
            error: OnceLock::new(),
            failed: CancellationToken::new(),
        });

        let prepared = PreparedStream {
            bridge: Arc::clone(&bridge),
            prepare_rx: Some(prepare_rx),
            runtime_handle,
        };

        (bridge, prepared)
    }

    pub fn stats(&self) -> FlowSnapshot {
        self.flow.snapshot()
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn error(&self) -> Option<Arc<BoxError>> {
        self.error.get().cloned()
    }

    fn request(&self, n: u64) {
        if self.released.load(Ordering::Acquire) {
            return;
        }
        // Never call into the producer with the lock held: it may deliver
        // chunks synchronously from inside `request`.
        let subscription = lock(&self.subscription).clone();
        if let Some(subscription) = subscription {
            subscription.request(n);
        }
    }

    /// Cancel the upstream subscription. Only the first call has an effect.
    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let subscription = lock(&self.subscription).take();
        if let Some(subscription) = subscription {
            debug!("Cancelling upstream subscription");
            subscription.cancel();
        }
    }

    fn stream_error(&self) -> Option<Error> {
        self.error.get().map(|e| Error::Stream(Arc::clone(e)))
    }

    /// The recorded error for a read woken by `failed`, which is only
    /// cancelled after the error is set.
    fn read_error(&self) -> io::Error {
        self.stream_error().unwrap_or(Error::Closed("stream")).into()
    }
}

impl ChunkSubscriber for StreamingBridge {
    fn on_response(&self, response: ObjectResponse) {
        debug!(
            "Object response: content_length={:?}, content_type={:?}",
            response.content_length, response.content_type
        );
        let _ = self.response.set(response.clone());
        if let Some(tx) = lock(&self.prepare_tx).take() {
            let _ = tx.send(Ok(response));
        }
    }

    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        let accepted = {
            let mut slot = lock(&self.subscription);
            let accepted = !self.released.load(Ordering::Acquire);
            if accepted {
                *slot = Some(Arc::clone(&subscription));
            }
            accepted
        };
        if !accepted {
            debug!("Subscription arrived after release, cancelling");
            subscription.cancel();
            return;
        }

        let declared_len = self.response.get().and_then(|r| r.content_length);
        let initial = self.flow.on_subscribe(declared_len);
        subscription.request(initial);
    }

    fn on_next(&self, chunk: Bytes) {
        let len = chunk.len();
        self.queue.push(chunk);
        if let Some(n) = self.flow.on_chunk(len) {
            self.request(n);
        }
    }

    fn on_complete(&self) {
        debug!("Object stream complete");
        self.complete.store(true, Ordering::Release);
        self.queue.finish();
    }

    fn on_error(&self, error: BoxError) {
        let error = Arc::new(error);
        if self.error.set(Arc::clone(&error)).is_err() {
            debug!("Ignoring secondary stream error: {}", error);
            return;
        }
        warn!("Object stream failed: {}", error);
        self.failed.cancel();
        if let Some(tx) = lock(&self.prepare_tx).take() {
            let _ = tx.send(Err(Error::Stream(error)));
        }
        self.release();
    }
}

/// Pending stream that resolves to a reader once the producer responds.
///
/// Await it, or call [`PreparedStream::wait`] from a synchronous context.
/// Dropping it before it resolves cancels the upstream subscription.
#[must_use = "dropping a PreparedStream cancels the object retrieval"]
pub struct PreparedStream {
    bridge: Arc<StreamingBridge>,
    prepare_rx: Option<oneshot::Receiver<PrepareResult>>,
    runtime_handle: RuntimeHandle,
}

impl std::fmt::Debug for PreparedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedStream")
            .field("bridge", &self.bridge)
            .field("resolved", &self.prepare_rx.is_none())
            .finish()
    }
}

impl PreparedStream {
    pub fn bridge(&self) -> &Arc<StreamingBridge> {
        &self.bridge
    }

    /// Block the calling thread until the reader is available.
    pub fn wait(self) -> Result<BridgeReader> {
        let handle = self.runtime_handle.clone();
        handle.block_on(self)
    }

    fn make_reader(&self, response: ObjectResponse) -> Result<BridgeReader> {
        let receiver = lock(&self.bridge.receiver)
            .take()
            .ok_or(Error::Closed("stream"))?;
        Ok(BridgeReader {
            bridge: Arc::clone(&self.bridge),
            receiver,
            head: Bytes::new(),
            finished: false,
            closed: false,
            response,
            runtime_handle: self.runtime_handle.clone(),
            interrupt: None,
        })
    }
}

impl Future for PreparedStream {
    type Output = Result<BridgeReader>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(rx) = self.prepare_rx.as_mut() else {
            return Poll::Ready(Err(Error::Closed("stream")));
        };
        let outcome = match Pin::new(rx).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(outcome) => outcome,
        };
        self.prepare_rx = None;

        Poll::Ready(match outcome {
            Ok(Ok(response)) => self.make_reader(response),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(self.bridge.stream_error().unwrap_or(Error::Closed("stream"))),
        })
    }
}

impl Drop for PreparedStream {
    fn drop(&mut self) {
        if self.prepare_rx.is_some() {
            debug!("Prepared stream dropped before resolving");
            self.bridge.release();
        }
    }
}

/// Blocking reader over the chunks delivered to a `StreamingBridge`.
///
/// Not safe to use from inside an async context on the bridge's runtime.
pub struct BridgeReader {
    bridge: Arc<StreamingBridge>,
    receiver: ChunkReceiver,
    /// Unread remainder of the current chunk.
    head: Bytes,
    finished: bool,
    closed: bool,
    response: ObjectResponse,
    runtime_handle: RuntimeHandle,
    interrupt: Option<CancellationToken>,
}

impl std::fmt::Debug for BridgeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeReader")
            .field("bridge", &self.bridge)
            .field("head_remaining", &self.head.len())
            .field("finished", &self.finished)
            .field("closed", &self.closed)
            .finish()
    }
}

impl BridgeReader {
    /// Make blocked reads fail once `token` is cancelled. The `io::Error`
    /// wraps an [`Error::Interrupted`]; the token stays cancelled.
    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = Some(token);
        self
    }

    pub fn response(&self) -> &ObjectResponse {
        &self.response
    }

    pub fn stats(&self) -> FlowSnapshot {
        self.bridge.stats()
    }

    /// Read a single byte; `None` at end of stream.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match io::Read::read(self, &mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Bytes readable without blocking from the current chunk.
    pub fn available(&self) -> io::Result<usize> {
        if let Some(err) = self.bridge.stream_error() {
            return Err(err.into());
        }
        if self.closed {
            return Ok(0);
        }
        Ok(self.head.len())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop reading. Idempotent and non-blocking.
    ///
    /// If the producer has not completed, queued chunks are discarded and
    /// the upstream subscription is cancelled.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.head = Bytes::new();
        if !self.bridge.is_complete() && !self.finished {
            let discarded = self.receiver.close_and_drain();
            debug!("Closing unfinished stream, discarded {} bytes", discarded);
            self.bridge.release();
        }
        self.finished = true;
    }

    /// Make sure `head` holds unread bytes. Returns false at end of stream.
    fn ensure_chunk(&mut self) -> io::Result<bool> {
        loop {
            if let Some(err) = self.bridge.stream_error() {
                return Err(err.into());
            }
            if !self.head.is_empty() {
                return Ok(true);
            }
            if self.finished {
                return Ok(false);
            }

            let item = match self.receiver.try_take() {
                Some(item) => item,
                None => self.wait_for_item()?,
            };

            match item {
                QueueItem::Chunk(chunk) => {
                    if let Some(n) = self.bridge.flow.on_consumed(chunk.len()) {
                        self.bridge.request(n);
                    }
                    self.head = chunk;
                }
                QueueItem::End => {
                    debug!("Reached end of stream");
                    self.finished = true;
                }
            }
        }
    }

    fn wait_for_item(&mut self) -> io::Result<QueueItem> {
        let bridge = &self.bridge;
        let receiver = &mut self.receiver;
        let interrupt = self.interrupt.clone();

        self.runtime_handle.block_on(async move {
            tokio::select! {
                biased;
                _ = bridge.failed.cancelled() => Err(bridge.read_error()),
                _ = interrupted(interrupt) => Err(Error::Interrupted("waiting for stream data".to_string()).into()),
                item = receiver.take() => Ok(item),
            }
        })
    }
}

/// Resolves once `token` is cancelled; never when there is no token.
pub(crate) async fn interrupted(token: Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

impl io::Read for BridgeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Ok(0);
        }
        if buf.is_empty() {
            if let Some(err) = self.bridge.stream_error() {
                return Err(err.into());
            }
            return Ok(0);
        }
        if !self.ensure_chunk()? {
            return Ok(0);
        }

        let n = buf.len().min(self.head.len());
        buf[..n].copy_from_slice(&self.head[..n]);
        self.head.advance(n);
        Ok(n)
    }
}

impl Drop for BridgeReader {
    fn drop(&mut self) {
        self.close();
    }
}

/// Start retrieving an object and return the pending reader.
pub fn open_object(
    client: &dyn ObjectStoreClient,
    location: &ObjectLocation,
    config: StreamConfig,
    runtime_handle: RuntimeHandle,
) -> PreparedStream {
    let (bridge, prepared) = StreamingBridge::new(config, runtime_handle);
    debug!("Opening object stream for {}", location.url);
    client.get_object(location, bridge);
    prepared
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::atomic::AtomicU64;

    #[derive(Debug, Default)]
    struct RecordingSubscription {
        requested: AtomicU64,
        cancels: AtomicU64,
    }

    impl Subscription for RecordingSubscription {
        fn request(&self, n: u64) {
            let _ = self
                .requested
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| Some(r.saturating_add(n)));
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    fn subscribe(
        bridge: &Arc<StreamingBridge>,
        content_length: Option<u64>,
    ) -> Arc<RecordingSubscription> {
        let subscription = Arc::new(RecordingSubscription::default());
        bridge.on_response(ObjectResponse {
            content_length,
            content_type: None,
        });
        bridge.on_subscribe(subscription.clone());
        subscription
    }

    #[test]
    fn test_reads_chunks_in_order() {
        let rt = runtime();
        let (bridge, prepared) = StreamingBridge::new(StreamConfig::default(), rt.handle().clone());
        let subscription = subscribe(&bridge, Some(7));
        assert_eq!(subscription.requested.load(Ordering::SeqCst), u64::MAX);

        bridge.on_next(Bytes::from_static(b"abc"));
        bridge.on_next(Bytes::new());
        bridge.on_next(Bytes::from_static(b"defg"));
        bridge.on_complete();

        let mut reader = prepared.wait().unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcdefg");
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
        assert_eq!(reader.read_byte().unwrap(), None);
    }

    #[test]
    fn test_available_reports_head_chunk() {
        let rt = runtime();
        let (bridge, prepared) = StreamingBridge::new(StreamConfig::default(), rt.handle().clone());
        subscribe(&bridge, None);
        bridge.on_next(Bytes::from_static(b"hello"));

        let mut reader = prepared.wait().unwrap();
        assert_eq!(reader.available().unwrap(), 0);
        assert_eq!(reader.read_byte().unwrap(), Some(b'h'));
        assert_eq!(reader.available().unwrap(), 4);
    }

    #[test]
    fn test_error_fails_every_read() {
        let rt = runtime();
        let (bridge, prepared) = StreamingBridge::new(StreamConfig::default(), rt.handle().clone());
        let subscription = subscribe(&bridge, None);
        let mut reader = prepared.wait().unwrap();

        bridge.on_next(Bytes::from_static(b"data"));
        bridge.on_error("connection reset".into());
        bridge.on_error("second".into());

        for _ in 0..3 {
            let err = reader.read(&mut [0u8; 8]).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::Other);
            assert!(err.to_string().contains("connection reset"));
        }
        assert!(reader.available().is_err());
        assert_eq!(subscription.cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_wakes_blocked_read() {
        let rt = runtime();
        let (bridge, prepared) = StreamingBridge::new(StreamConfig::default(), rt.handle().clone());
        subscribe(&bridge, None);
        let mut reader = prepared.wait().unwrap();

        let producer = {
            let bridge = Arc::clone(&bridge);
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(50));
                bridge.on_error("connection reset".into());
            })
        };

        let err = reader.read(&mut [0u8; 8]).unwrap_err();
        producer.join().unwrap();

        assert_eq!(err.kind(), io::ErrorKind::Other);
        let inner = err.get_ref().and_then(|e| e.downcast_ref::<Error>()).unwrap();
        assert!(matches!(inner, Error::Stream(_)));
        assert_eq!(inner.to_string(), "Stream error: connection reset");
    }

    #[test]
    fn test_error_before_response_fails_prepare() {
        let rt = runtime();
        let (bridge, prepared) = StreamingBridge::new(StreamConfig::default(), rt.handle().clone());
        bridge.on_error("no such key".into());

        let err = prepared.wait().unwrap_err();
        assert!(matches!(err, Error::Stream(_)));
        assert!(err.to_string().contains("no such key"));
    }

    #[test]
    fn test_close_cancels_once_and_reads_eof() {
        let rt = runtime();
        let (bridge, prepared) = StreamingBridge::new(StreamConfig::default(), rt.handle().clone());
        let subscription = subscribe(&bridge, None);
        bridge.on_next(Bytes::from_static(b"unread"));

        let mut reader = prepared.wait().unwrap();
        reader.close();
        reader.close();
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
        drop(reader);
        assert_eq!(subscription.cancels.load(Ordering::SeqCst), 1);

        // Late producer callbacks are harmless.
        bridge.on_next(Bytes::from_static(b"late"));
        bridge.on_complete();
    }

    #[test]
    fn test_close_after_complete_does_not_cancel() {
        let rt = runtime();
        let (bridge, prepared) = StreamingBridge::new(StreamConfig::default(), rt.handle().clone());
        let subscription = subscribe(&bridge, Some(2));
        bridge.on_next(Bytes::from_static(b"ok"));
        bridge.on_complete();

        let reader = prepared.wait().unwrap();
        drop(reader);
        assert_eq!(subscription.cancels.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dropped_prepared_stream_cancels_late_subscription() {
        let rt = runtime();
        let (bridge, prepared) = StreamingBridge::new(StreamConfig::default(), rt.handle().clone());
        drop(prepared);

        let subscription = Arc::new(RecordingSubscription::default());
        bridge.on_subscribe(subscription.clone());
        assert_eq!(subscription.cancels.load(Ordering::SeqCst), 1);
        assert_eq!(subscription.requested.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_interrupt_fails_blocked_read() {
        let rt = runtime();
        let (bridge, prepared) = StreamingBridge::new(StreamConfig::default(), rt.handle().clone());
        subscribe(&bridge, None);

        let token = CancellationToken::new();
        let mut reader = prepared.wait().unwrap().with_interrupt(token.clone());
        token.cancel();

        let err = reader.read(&mut [0u8; 4]).unwrap_err();
        let inner = err.get_ref().and_then(|e| e.downcast_ref::<Error>()).unwrap();
        assert!(inner.is_interrupted());
        assert!(token.is_cancelled());
    }
}
