//! Bounded FIFO between the generators and the analyzer.
//!
//! Thin wrapper over `tokio::sync::mpsc`: sending awaits while the queue is
//! full, and the receiving side polls with a timeout so it can notice a stop
//! request without an error path for "nothing arrived yet".

use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::models::Reading;

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Largest accepted capacity. Well below tokio's semaphore limit.
pub const MAX_CAPACITY: usize = 1_000_000;

/// Outcome of a timed receive.
#[derive(Debug)]
pub enum Recv {
    Reading(Reading),
    /// Nothing arrived within the timeout
    Empty,
    /// Every sender is gone and the queue is drained
    Closed,
}

#[derive(Debug, thiserror::Error)]
#[error("Reading channel closed")]
pub struct ChannelClosed(pub Reading);

/// Producer handle. Cheap to clone, one per generator.
#[derive(Debug, Clone)]
pub struct ReadingSender {
    inner: mpsc::Sender<Reading>,
}

/// The single consumer handle.
#[derive(Debug)]
pub struct ReadingReceiver {
    inner: mpsc::Receiver<Reading>,
}

/// Create a bounded channel holding at most `capacity` readings.
///
/// # Panics
///
/// Panics if `capacity` is zero or exceeds tokio's permit limit; configured
/// capacities are validated against [`MAX_CAPACITY`] beforehand.
#[must_use]
pub fn bounded(capacity: usize) -> (ReadingSender, ReadingReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (ReadingSender { inner: tx }, ReadingReceiver { inner: rx })
}

impl ReadingSender {
    /// Enqueue a reading, waiting for free space when the queue is full.
    ///
    /// # Errors
    ///
    /// Returns the reading back if the receiver has been dropped.
    pub async fn send(&self, reading: Reading) -> Result<(), ChannelClosed> {
        self.inner
            .send(reading)
            .await
            .map_err(|e| ChannelClosed(e.0))
    }

    /// Number of readings currently queued.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.max_capacity() - self.inner.capacity()
    }

    /// A handle for observing queue depth that does not keep the channel open.
    #[must_use]
    pub fn gauge(&self) -> QueueGauge {
        QueueGauge {
            inner: self.inner.downgrade(),
            capacity: self.inner.max_capacity(),
        }
    }
}

/// Point-in-time queue occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    pub queued: usize,
    pub capacity: usize,
}

/// Weak view of the channel for diagnostics.
#[derive(Debug, Clone)]
pub struct QueueGauge {
    inner: mpsc::WeakSender<Reading>,
    capacity: usize,
}

impl QueueGauge {
    /// Current depth. Reports zero once every sender has been dropped.
    #[must_use]
    pub fn depth(&self) -> QueueDepth {
        let queued = self
            .inner
            .upgrade()
            .map_or(0, |tx| tx.max_capacity() - tx.capacity());
        QueueDepth {
            queued,
            capacity: self.capacity,
        }
    }
}

impl ReadingReceiver {
    /// Wait up to `timeout` for the next reading.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Recv {
        match tokio::time::timeout(timeout, self.inner.recv()).await {
            Ok(Some(reading)) => Recv::Reading(reading),
            Ok(None) => Recv::Closed,
            Err(_) => Recv::Empty,
        }
    }

    /// Number of readings currently queued.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.len()
    }
}
