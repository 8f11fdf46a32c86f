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

//! Adaptive demand for the streaming bridge.
//!
//! The controller tracks chunks requested but not yet delivered, bytes
//! delivered but not yet consumed, and a running mean of the chunk size.
//! After every arrival and every consumption it decides whether to ask the
//! producer for another batch: only while the bytes already buffered plus
//! the bytes expected from outstanding requests stay under the target.
//!
//! Every method returns the number of chunks to request, if any; the caller
//! forwards it to the producer's subscription.

use crate::types::config::StreamConfig;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use tracing::trace;

/// Outstanding count used once demand is unbounded. Always above the
/// request cap, so no further batches are issued.
const UNBOUNDED_OUTSTANDING: i64 = i32::MAX as i64;

/// Point-in-time view of the flow counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSnapshot {
    pub outstanding_requests: i64,
    pub buffered_bytes: i64,
    pub mean_chunk_size: f32,
}

#[derive(Debug)]
pub struct FlowController {
    config: StreamConfig,
    outstanding: AtomicI64,
    /// Estimate only; may be briefly stale or negative under concurrency.
    buffered: AtomicI64,
    mean_bits: AtomicU32,
    unbounded: AtomicBool,
}

impl FlowController {
    pub fn new(config: StreamConfig) -> Self {
        let mean_bits = AtomicU32::new(config.initial_chunk_size_estimate.to_bits());
        Self {
            config,
            outstanding: AtomicI64::new(0),
            buffered: AtomicI64::new(0),
            mean_bits,
            unbounded: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Initial demand once the producer is ready.
    ///
    /// Objects known to fit in the target buffer are requested in full.
    /// Larger or unknown-length objects start with one batch.
    pub fn on_subscribe(&self, declared_len: Option<u64>) -> u64 {
        match declared_len {
            Some(len) if len < self.config.target_buffer_size as u64 => {
                self.unbounded.store(true, Ordering::Release);
                self.outstanding
                    .store(UNBOUNDED_OUTSTANDING, Ordering::SeqCst);
                trace!("Object of {} bytes fits the buffer, requesting all", len);
                u64::MAX
            }
            _ => {
                let batch = self.config.request_batch;
                self.outstanding.store(batch as i64, Ordering::SeqCst);
                trace!(
                    "Object length {:?} at or above target, requesting {} chunks",
                    declared_len,
                    batch
                );
                batch
            }
        }
    }

    /// Account for a delivered chunk. Empty chunks count against demand but
    /// leave the mean untouched.
    pub fn on_chunk(&self, len: usize) -> Option<u64> {
        if len > 0 {
            self.update_mean(len);
        }
        if !self.unbounded.load(Ordering::Acquire) {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
        self.buffered.fetch_add(len as i64, Ordering::SeqCst);
        self.maybe_request_more()
    }

    /// Account for a chunk handed to the reader.
    pub fn on_consumed(&self, len: usize) -> Option<u64> {
        self.buffered.fetch_sub(len as i64, Ordering::SeqCst);
        self.maybe_request_more()
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            outstanding_requests: self.outstanding.load(Ordering::SeqCst),
            buffered_bytes: self.buffered.load(Ordering::SeqCst),
            mean_chunk_size: self.mean_chunk_size(),
        }
    }

    pub fn mean_chunk_size(&self) -> f32 {
        f32::from_bits(self.mean_bits.load(Ordering::Acquire))
    }

    fn update_mean(&self, len: usize) {
        let weight = self.config.chunk_size_weight;
        let _ = self
            .mean_bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let mean = f32::from_bits(bits);
                Some((weight * len as f32 + (1.0 - weight) * mean).to_bits())
            });
    }

    fn maybe_request_more(&self) -> Option<u64> {
        if self.unbounded.load(Ordering::Acquire) {
            return None;
        }

        let target = self.config.target_buffer_size as f64;
        let buffered = self.buffered.load(Ordering::SeqCst);
        if buffered as f64 >= target {
            return None;
        }

        let batch = self.config.request_batch as i64;
        let mean = self.mean_chunk_size() as f64;
        let max = self.config.max_outstanding_requests;

        self.outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |outstanding| {
                let requested = outstanding + batch;
                if requested >= max {
                    return None;
                }
                // With nothing in flight and nothing buffered a batch is
                // always granted, however large the chunks are.
                let fits = (requested as f64 * mean + buffered as f64) < target;
                let idle = outstanding <= 0 && buffered <= 0;
                (fits || idle).then_some(requested)
            })
            .ok()
            .map(|previous| {
                trace!(
                    "Requesting {} more chunks (outstanding {}, buffered {})",
                    batch,
                    previous + batch,
                    buffered
                );
                batch as u64
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> StreamConfig {
        StreamConfig {
            target_buffer_size: 1000,
            initial_chunk_size_estimate: 10.0,
            ..StreamConfig::default()
        }
    }

    #[test]
    fn test_small_object_requests_everything() {
        let flow = FlowController::new(StreamConfig::default());
        assert_eq!(flow.on_subscribe(Some(1024)), u64::MAX);
        assert_eq!(flow.on_chunk(1024), None);
        assert_eq!(flow.on_consumed(1024), None);
    }

    #[test]
    fn test_large_or_unknown_object_starts_windowed() {
        let flow = FlowController::new(StreamConfig::default());
        assert_eq!(flow.on_subscribe(Some(1 << 25)), 10);
        assert_eq!(flow.snapshot().outstanding_requests, 10);

        let flow = FlowController::new(StreamConfig::default());
        assert_eq!(flow.on_subscribe(None), 10);
    }

    #[test]
    fn test_mean_is_weighted_average() {
        let flow = FlowController::new(StreamConfig::default());
        flow.on_subscribe(None);
        flow.on_chunk(1192);
        // 0.2 * 1192 + 0.8 * 8192
        assert!((flow.mean_chunk_size() - 6792.0).abs() < 0.01);

        flow.on_chunk(0);
        assert!((flow.mean_chunk_size() - 6792.0).abs() < 0.01);
    }

    #[test]
    fn test_requests_more_while_under_target() {
        let flow = FlowController::new(small_config());
        assert_eq!(flow.on_subscribe(None), 10);

        // 10 outstanding -> 9, buffered 10; (9 + 10) * 10 + 10 < 1000
        assert_eq!(flow.on_chunk(10), Some(10));
        assert_eq!(flow.snapshot().outstanding_requests, 19);
        assert_eq!(flow.snapshot().buffered_bytes, 10);
    }

    #[test]
    fn test_stops_requesting_when_buffer_full() {
        let flow = FlowController::new(small_config());
        flow.on_subscribe(None);

        assert_eq!(flow.on_chunk(1000), None);
        assert_eq!(flow.snapshot().buffered_bytes, 1000);

        // Mean is now 208: 19 expected chunks would overshoot the target.
        assert_eq!(flow.on_consumed(1000), None);
        for _ in 0..8 {
            assert_eq!(flow.on_chunk(0), None);
        }
        // Last outstanding chunk delivered with nothing buffered: the idle
        // producer gets a batch.
        assert_eq!(flow.on_chunk(0), Some(10));
        assert_eq!(flow.snapshot().outstanding_requests, 10);
    }

    #[test]
    fn test_no_batch_while_buffer_near_target() {
        let flow = FlowController::new(StreamConfig {
            target_buffer_size: 1000,
            initial_chunk_size_estimate: 200.0,
            ..StreamConfig::default()
        });
        flow.on_subscribe(None);

        assert_eq!(flow.on_chunk(900), None);
        for _ in 0..9 {
            assert_eq!(flow.on_chunk(0), None);
        }
        let snapshot = flow.snapshot();
        assert_eq!(snapshot.outstanding_requests, 0);
        assert_eq!(snapshot.buffered_bytes, 900);

        // Draining the buffer restores demand.
        assert_eq!(flow.on_consumed(900), Some(10));
        assert_eq!(flow.snapshot().outstanding_requests, 10);
    }

    #[test]
    fn test_oversized_chunks_still_get_demand_once_drained() {
        let flow = FlowController::new(small_config());
        flow.on_subscribe(None);

        for _ in 0..10 {
            assert_eq!(flow.on_chunk(5000), None);
        }
        for _ in 0..9 {
            assert_eq!(flow.on_consumed(5000), None);
        }
        assert_eq!(flow.on_consumed(5000), Some(10));
    }

    #[test]
    fn test_outstanding_never_reaches_cap() {
        let config = StreamConfig {
            target_buffer_size: usize::MAX / 2,
            initial_chunk_size_estimate: 1.0,
            ..StreamConfig::default()
        };
        let flow = FlowController::new(config);
        flow.on_subscribe(None);

        for _ in 0..500 {
            flow.on_consumed(0);
            assert!(flow.snapshot().outstanding_requests < 1000);
        }
        assert_eq!(flow.snapshot().outstanding_requests, 990);
    }
}
