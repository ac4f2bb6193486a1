//! Threshold analyzer: the single consumer of the reading channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::models::{ClassifiedReading, NO_ALERT, Reading, Severity};
use crate::pipeline::channel::{ReadingReceiver, Recv};
use crate::services::alerts::AlertSink;
use crate::services::store::Store;

/// Log a progress line every this many processed readings.
const PROGRESS_EVERY: u64 = 10;

/// Alarm boundaries. Every comparison is strict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub temperature_warning: f64,
    pub temperature_critical: f64,
    pub vibration_warning: f64,
    pub vibration_critical: f64,
    /// Voltage alarms fire below these values
    pub voltage_warning_low: f64,
    pub voltage_critical_low: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature_warning: 70.0,
            temperature_critical: 85.0,
            vibration_warning: 7.0,
            vibration_critical: 10.0,
            voltage_warning_low: 190.0,
            voltage_critical_low: 180.0,
        }
    }
}

/// Classify a reading.
///
/// Checks run temperature, vibration, voltage. The status is the most severe
/// level any check reached, and every triggered reason is kept, joined with
/// `", "` in check order. A reading that triggers nothing is `Good`/`"None"`.
#[must_use]
pub fn classify(reading: &Reading, thresholds: &Thresholds) -> (Severity, String) {
    let checks = [
        if reading.temperature > thresholds.temperature_critical {
            Some((Severity::Critical, "High Temperature"))
        } else if reading.temperature > thresholds.temperature_warning {
            Some((Severity::Warning, "High Temperature Warning"))
        } else {
            None
        },
        if reading.vibration > thresholds.vibration_critical {
            Some((Severity::Critical, "High Vibration"))
        } else if reading.vibration > thresholds.vibration_warning {
            Some((Severity::Warning, "High Vibration Warning"))
        } else {
            None
        },
        if reading.voltage < thresholds.voltage_critical_low {
            Some((Severity::Critical, "Low Voltage"))
        } else if reading.voltage < thresholds.voltage_warning_low {
            Some((Severity::Warning, "Low Voltage Warning"))
        } else {
            None
        },
    ];

    let mut status = Severity::Good;
    let mut reasons = Vec::with_capacity(checks.len());
    for (severity, reason) in checks.into_iter().flatten() {
        status = status.max(severity);
        reasons.push(reason);
    }

    let alert_type = if reasons.is_empty() {
        NO_ALERT.to_string()
    } else {
        reasons.join(", ")
    };
    (status, alert_type)
}

pub struct Analyzer {
    store: Store,
    alerts: AlertSink,
    thresholds: Thresholds,
    processed: u64,
}

impl Analyzer {
    #[must_use]
    pub fn new(store: Store, alerts: AlertSink) -> Self {
        Self::with_thresholds(store, alerts, Thresholds::default())
    }

    #[must_use]
    pub fn with_thresholds(store: Store, alerts: AlertSink, thresholds: Thresholds) -> Self {
        Self {
            store,
            alerts,
            thresholds,
            processed: 0,
        }
    }

    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Classify one reading and apply its side effects, in order: store the
    /// reading, update the device health row, forward alerts.
    ///
    /// Failures are logged and never abort processing. If the reading could
    /// not be stored, the health row is left alone so its counters keep
    /// matching the stored readings.
    pub async fn process(&mut self, reading: Reading) -> ClassifiedReading {
        let (status, alert_type) = classify(&reading, &self.thresholds);
        let classified = ClassifiedReading {
            reading,
            status,
            alert_type,
        };
        let device_id = classified.reading.device_id.as_str();

        match self.store.append_reading(&classified).await {
            Ok(()) => {
                let error_increment = u32::from(status == Severity::Critical);
                if let Err(e) = self
                    .store
                    .upsert_device_health(
                        device_id,
                        &classified.reading.device_name,
                        status,
                        1,
                        error_increment,
                    )
                    .await
                {
                    tracing::error!(device_id, error = %e, "Failed to update device health");
                }
            }
            Err(e) => {
                tracing::error!(
                    device_id,
                    sequence_number = classified.reading.sequence_number,
                    error = %e,
                    "Failed to store reading, skipping health update"
                );
            }
        }

        if status.is_alert()
            && let Err(e) = self.alerts.record(&classified).await
        {
            tracing::error!(device_id, error = %e, "Failed to record alert");
        }

        self.processed += 1;
        if self.processed % PROGRESS_EVERY == 0 {
            tracing::info!(processed = self.processed, "Total packets processed");
        }

        classified
    }

    /// Consume the channel until stopped.
    ///
    /// While `running` is set, empty polls just loop. Once it is cleared the
    /// analyzer keeps draining until a poll comes back empty (or every sender
    /// is gone), then returns the number of readings it processed.
    pub async fn run(
        mut self,
        mut rx: ReadingReceiver,
        running: Arc<AtomicBool>,
        poll: Duration,
    ) -> u64 {
        tracing::info!("Analyzer started and waiting for data");

        loop {
            let stopping = !running.load(Ordering::Acquire);
            match rx.recv_timeout(poll).await {
                Recv::Reading(reading) => {
                    self.process(reading).await;
                }
                Recv::Empty if stopping => break,
                Recv::Empty => {}
                Recv::Closed => {
                    tracing::debug!("All producers gone");
                    break;
                }
            }
        }

        tracing::info!(
            processed = self.processed,
            left_in_queue = rx.queued(),
            "Analyzer stopped"
        );
        self.processed
    }
}
