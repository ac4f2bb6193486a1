//! Ingestion pipeline: generators → bounded channel → analyzer.
//!
//! [`Pipeline`] is the composition root. It owns the channel, spawns one task
//! per generator plus the analyzer task, and stops them in order.

pub mod analyzer;
pub mod channel;
pub mod generator;

pub use analyzer::{Analyzer, Thresholds, classify};
pub use channel::{
    ChannelClosed, QueueDepth, QueueGauge, ReadingReceiver, ReadingSender, Recv, bounded,
};
pub use generator::{GenerationError, GeneratorProfile, ReadingGenerator};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::AppResult;

/// A spawned loop and the flag that asks it to stop.
struct Task {
    running: Arc<AtomicBool>,
    handle: JoinHandle<u64>,
}

impl Task {
    fn spawn<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>) -> Fut,
        Fut: Future<Output = u64> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(f(running.clone()));
        Self { running, handle }
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Totals reported by [`Pipeline::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub readings_sent: u64,
    pub readings_processed: u64,
}

impl ShutdownReport {
    /// Readings that were queued but never processed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.readings_sent.saturating_sub(self.readings_processed)
    }
}

pub struct Pipeline {
    generators: Vec<(String, Task)>,
    analyzer: Task,
    gauge: QueueGauge,
}

impl Pipeline {
    /// Build one generator per configured device and start everything.
    ///
    /// # Errors
    ///
    /// Returns an error if a generator cannot be initialized; nothing is
    /// spawned in that case.
    pub fn start(config: &Config, analyzer: Analyzer) -> AppResult<Self> {
        let generators = config
            .devices
            .iter()
            .map(ReadingGenerator::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::spawn(
            generators,
            analyzer,
            config.channel_capacity,
            config.time_unit,
        ))
    }

    /// Start the given generators and analyzer around a fresh channel.
    ///
    /// The analyzer is spawned first so it is already waiting when the first
    /// reading arrives. Dequeue polls use one `time_unit` as timeout.
    #[must_use]
    pub fn spawn(
        generators: Vec<ReadingGenerator>,
        analyzer: Analyzer,
        capacity: usize,
        time_unit: Duration,
    ) -> Self {
        let (tx, rx) = bounded(capacity);
        let gauge = tx.gauge();

        let analyzer = Task::spawn(move |running| analyzer.run(rx, running, time_unit));

        let generators = generators
            .into_iter()
            .map(|generator| {
                let device_id = generator.device_id().to_string();
                let tx = tx.clone();
                let task = Task::spawn(move |running| generator.run(tx, running, time_unit));
                (device_id, task)
            })
            .collect::<Vec<_>>();

        tracing::info!(
            devices = generators.len(),
            capacity,
            time_unit_ms = u64::try_from(time_unit.as_millis()).unwrap_or(u64::MAX),
            "Pipeline started"
        );

        Self {
            generators,
            analyzer,
            gauge,
        }
    }

    /// Queue depth observer for diagnostics.
    #[must_use]
    pub fn queue_gauge(&self) -> QueueGauge {
        self.gauge.clone()
    }

    /// Stop generators first, then the analyzer, and wait for all of them.
    ///
    /// A generator blocked on a full channel finishes that send before it
    /// exits. The analyzer drains until its queue stays empty for one poll;
    /// anything still queued after that is dropped.
    pub async fn shutdown(self) -> ShutdownReport {
        tracing::info!("Stopping devices...");
        for (_, task) in &self.generators {
            task.stop();
        }

        let mut readings_sent = 0;
        for (device_id, task) in self.generators {
            match task.handle.await {
                Ok(sent) => readings_sent += sent,
                Err(e) => {
                    tracing::error!(device_id = %device_id, error = %e, "Device task failed");
                }
            }
        }

        tracing::info!("Stopping analyzer...");
        self.analyzer.stop();
        let readings_processed = match self.analyzer.handle.await {
            Ok(processed) => processed,
            Err(e) => {
                tracing::error!(error = %e, "Analyzer task failed");
                0
            }
        };

        let report = ShutdownReport {
            readings_sent,
            readings_processed,
        };
        tracing::info!(
            sent = report.readings_sent,
            processed = report.readings_processed,
            dropped = report.dropped(),
            "Pipeline stopped"
        );
        report
    }
}
