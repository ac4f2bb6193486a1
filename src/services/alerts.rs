//! Alert sink: severity-specific append-only logs plus a notification hook
//! for critical events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::config::ConfigError;
use crate::models::{ClassifiedReading, Reading, Severity};

pub const WARNING_LOG_FILE: &str = "alerts.log";
pub const CRITICAL_LOG_FILE: &str = "critical_alerts.log";

const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("Failed to write alert log {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Notification failed: {0}")]
    Notify(String),
}

/// Payload handed to the [`Notifier`] for every critical event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalNotification {
    pub reading: Reading,
    pub reason: String,
    pub raised_at: DateTime<Utc>,
}

impl CriticalNotification {
    #[must_use]
    pub fn subject(&self) -> String {
        format!(
            "CRITICAL ALERT - {} ({}): {}",
            self.reading.device_id, self.reading.device_name, self.reason
        )
    }

    /// Plain-text message body, in the shape of an operator e-mail.
    #[must_use]
    pub fn render(&self) -> String {
        let r = &self.reading;
        format!(
            "CRITICAL ALERT - Immediate Attention Required\n\
             \n\
             Device: {} ({})\n\
             Alert Type: {}\n\
             Time: {}\n\
             \n\
             Sensor Readings:\n\
             - Temperature: {:?}°C\n\
             - Vibration: {:?}\n\
             - Voltage: {:?}V\n\
             - Sequence: {}\n\
             \n\
             Action Required: Please inspect the device immediately!\n",
            r.device_id,
            r.device_name,
            self.reason,
            self.raised_at.format(LOG_TIME_FORMAT),
            r.temperature,
            r.vibration,
            r.voltage,
            r.sequence_number,
        )
    }
}

/// Fire-and-forget delivery of critical notifications.
///
/// Called synchronously from the analyzer; an error is logged by the sink and
/// goes no further.
pub trait Notifier: Send + Sync {
    /// # Errors
    ///
    /// Returns `AlertError::Notify` if delivery failed.
    fn notify(&self, notification: &CriticalNotification) -> Result<(), AlertError>;
}

/// Default notifier: emits the rendered message as a log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &CriticalNotification) -> Result<(), AlertError> {
        tracing::warn!(
            subject = %notification.subject(),
            body = %notification.render(),
            "Simulated e-mail alert"
        );
        Ok(())
    }
}

/// Format one alert log line:
/// `[YYYY-MM-DD HH:MM:SS] device_id - reason: Temp=X°C, Vib=Y, Volt=ZV`.
///
/// Metrics always carry a fractional part (`75.0`, `88.12`).
#[must_use]
pub fn format_alert_line(classified: &ClassifiedReading, at: DateTime<Utc>) -> String {
    let r = &classified.reading;
    format!(
        "[{}] {} - {}: Temp={:?}°C, Vib={:?}, Volt={:?}V",
        at.format(LOG_TIME_FORMAT),
        r.device_id,
        classified.alert_type,
        r.temperature,
        r.vibration,
        r.voltage,
    )
}

#[derive(Clone)]
pub struct AlertSink {
    warning_log: PathBuf,
    critical_log: PathBuf,
    notifier: Arc<dyn Notifier>,
}

impl AlertSink {
    /// Prepare the log directory and make sure both log files can be opened.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Unwritable` if the directory or a log file
    /// cannot be created.
    pub async fn open(
        dir: impl Into<PathBuf>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| ConfigError::Unwritable {
                path: dir.clone(),
                source,
            })?;

        let sink = Self {
            warning_log: dir.join(WARNING_LOG_FILE),
            critical_log: dir.join(CRITICAL_LOG_FILE),
            notifier,
        };

        for path in [&sink.warning_log, &sink.critical_log] {
            open_append(path)
                .await
                .map_err(|source| ConfigError::Unwritable {
                    path: path.clone(),
                    source,
                })?;
        }

        tracing::debug!(dir = %dir.display(), "Alert logs ready");
        Ok(sink)
    }

    #[must_use]
    pub fn log_path(&self, severity: Severity) -> Option<&Path> {
        match severity {
            Severity::Good => None,
            Severity::Warning => Some(&self.warning_log),
            Severity::Critical => Some(&self.critical_log),
        }
    }

    /// Record a warning or critical event. `Good` readings are ignored.
    ///
    /// Critical events are also passed to the notifier, even when the log
    /// write failed; a notifier failure is only logged.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Write` if the log line could not be appended.
    pub async fn record(&self, classified: &ClassifiedReading) -> Result<(), AlertError> {
        let Some(path) = self.log_path(classified.status) else {
            return Ok(());
        };

        let now = Utc::now();
        let line = format_alert_line(classified, now);
        let device_id = classified.reading.device_id.as_str();

        match classified.status {
            Severity::Critical => {
                tracing::error!(device_id, alert = %classified.alert_type, "CRITICAL: {line}");
            }
            _ => tracing::warn!(device_id, alert = %classified.alert_type, "WARNING: {line}"),
        }

        let written = append_line(path, &line).await;

        if classified.status == Severity::Critical {
            let notification = CriticalNotification {
                reading: classified.reading.clone(),
                reason: classified.alert_type.clone(),
                raised_at: now,
            };
            if let Err(e) = self.notifier.notify(&notification) {
                tracing::error!(device_id, error = %e, "Critical notification failed");
            }
        }

        written
    }
}

async fn open_append(path: &Path) -> std::io::Result<tokio::fs::File> {
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
}

async fn append_line(path: &Path, line: &str) -> Result<(), AlertError> {
    let write = async {
        let mut file = open_append(path).await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await
    };

    write.await.map_err(|source| AlertError::Write {
        path: path.to_path_buf(),
        source,
    })
}
