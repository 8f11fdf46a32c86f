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

//! Blocking reads over push-based, flow-controlled byte producers.
//!
//! A producer (usually an [`ObjectStoreClient`](crate::client::ObjectStoreClient))
//! pushes chunks into a [`StreamingBridge`] through the [`ChunkSubscriber`]
//! callbacks, only as many as the bridge has asked for through the
//! producer's [`Subscription`]. The consumer pulls bytes from a
//! [`BridgeReader`], which implements `std::io::Read`.
//!
//! ```text
//! producer ──on_next──▶ ChunkQueue ──take──▶ BridgeReader::read
//!     ▲                     │                      │
//!     └──── request(n) ◀── FlowController ◀────────┘
//! ```

pub mod bridge;
pub mod chunk_queue;
pub mod flow_control;

use crate::client::ObjectResponse;
use crate::error::BoxError;
use bytes::Bytes;
use std::sync::Arc;

pub use bridge::{open_object, BridgeReader, PreparedStream, StreamingBridge};
pub use chunk_queue::{ChunkQueue, ChunkReceiver, QueueItem};
pub use flow_control::{FlowController, FlowSnapshot};

/// Demand channel from the consumer back to the producer.
pub trait Subscription: Send + Sync {
    /// Allow `n` more chunks. `u64::MAX` means unbounded demand.
    fn request(&self, n: u64);

    /// Stop producing. Chunks already in flight may still arrive.
    fn cancel(&self);
}

/// Callbacks a producer drives. They may arrive on any thread, but never
/// concurrently for the same stream.
pub trait ChunkSubscriber: Send + Sync {
    fn on_response(&self, response: ObjectResponse);

    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);

    fn on_next(&self, chunk: Bytes);

    fn on_complete(&self);

    fn on_error(&self, error: BoxError);
}
