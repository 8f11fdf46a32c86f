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

//! Unbounded FIFO handoff between the producer callbacks and the reader.
//!
//! The queue itself never limits growth; the flow controller keeps it
//! bounded by limiting demand.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Chunk(Bytes),
    /// End of stream. Offered at most once.
    End,
}

/// Producer side.
#[derive(Debug)]
pub struct ChunkQueue {
    tx: mpsc::UnboundedSender<QueueItem>,
    end_offered: AtomicBool,
}

/// Consumer side. Owned by a single reader.
#[derive(Debug)]
pub struct ChunkReceiver {
    rx: mpsc::UnboundedReceiver<QueueItem>,
}

impl ChunkQueue {
    pub fn new() -> (ChunkQueue, ChunkReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ChunkQueue {
                tx,
                end_offered: AtomicBool::new(false),
            },
            ChunkReceiver { rx },
        )
    }

    /// Enqueue a data chunk. Empty chunks are dropped.
    ///
    /// Returns false when nothing was enqueued.
    pub fn push(&self, chunk: Bytes) -> bool {
        if chunk.is_empty() || self.end_offered.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send(QueueItem::Chunk(chunk)).is_ok()
    }

    /// Enqueue the end marker unless it was already offered.
    pub fn finish(&self) -> bool {
        if self.end_offered.swap(true, Ordering::AcqRel) {
            return false;
        }
        // A closed receiver already behaves as end of stream.
        let _ = self.tx.send(QueueItem::End);
        true
    }

    pub fn is_finished(&self) -> bool {
        self.end_offered.load(Ordering::Acquire)
    }
}

impl ChunkReceiver {
    /// Wait for the next item. A queue whose producer side is gone reads
    /// as ended.
    pub async fn take(&mut self) -> QueueItem {
        self.rx.recv().await.unwrap_or(QueueItem::End)
    }

    /// Next item if one is already queued.
    pub fn try_take(&mut self) -> Option<QueueItem> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => Some(QueueItem::End),
        }
    }

    /// Refuse further items and discard everything queued.
    ///
    /// Returns the number of data bytes discarded.
    pub fn close_and_drain(&mut self) -> usize {
        self.rx.close();
        let mut discarded = 0;
        while let Ok(item) = self.rx.try_recv() {
            if let QueueItem::Chunk(chunk) = item {
                discarded += chunk.len();
            }
        }
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order_and_single_end() {
        let (queue, mut rx) = ChunkQueue::new();
        assert!(queue.push(Bytes::from_static(b"ab")));
        assert!(!queue.push(Bytes::new()));
        assert!(queue.push(Bytes::from_static(b"c")));
        assert!(queue.finish());
        assert!(!queue.finish());
        assert!(!queue.push(Bytes::from_static(b"late")));

        assert_eq!(rx.take().await, QueueItem::Chunk(Bytes::from_static(b"ab")));
        assert_eq!(rx.take().await, QueueItem::Chunk(Bytes::from_static(b"c")));
        assert_eq!(rx.take().await, QueueItem::End);
        assert_eq!(rx.try_take(), None);
    }

    #[tokio::test]
    async fn test_dropped_producer_reads_as_end() {
        let (queue, mut rx) = ChunkQueue::new();
        drop(queue);
        assert_eq!(rx.take().await, QueueItem::End);
    }

    #[test]
    fn test_close_and_drain() {
        let (queue, mut rx) = ChunkQueue::new();
        queue.push(Bytes::from_static(b"1234"));
        queue.push(Bytes::from_static(b"56"));

        assert_eq!(rx.close_and_drain(), 6);
        assert!(!queue.push(Bytes::from_static(b"7")));
        assert_eq!(rx.try_take(), Some(QueueItem::End));
    }
}
