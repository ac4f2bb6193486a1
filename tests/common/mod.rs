#![allow(dead_code)]

use chrono::Utc;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use sensor_fleet::models::Reading;
use sensor_fleet::services::alerts::{AlertError, AlertSink, CriticalNotification, Notifier};
use sensor_fleet::services::store::Store;

/// Notifier that keeps every notification it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    pub received: Mutex<Vec<CriticalNotification>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &CriticalNotification) -> Result<(), AlertError> {
        self.received.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Notifier that always fails.
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notification: &CriticalNotification) -> Result<(), AlertError> {
        Err(AlertError::Notify("smtp unreachable".to_string()))
    }
}

pub async fn temp_store(dir: &TempDir) -> Store {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("sensor_data.db").display());
    Store::connect(&url).await.expect("store should open")
}

pub async fn temp_sink(dir: &TempDir, notifier: Arc<dyn Notifier>) -> AlertSink {
    AlertSink::open(dir.path().join("logs"), notifier)
        .await
        .expect("alert sink should open")
}

pub fn reading(
    device_id: &str,
    sequence_number: u64,
    temperature: f64,
    vibration: f64,
    voltage: f64,
) -> Reading {
    Reading {
        device_id: device_id.to_string(),
        device_name: format!("{device_id} name"),
        sequence_number,
        timestamp: Utc::now(),
        temperature,
        vibration,
        voltage,
    }
}

/// A reading well inside every threshold.
pub fn normal(device_id: &str, sequence_number: u64) -> Reading {
    reading(device_id, sequence_number, 30.0, 1.0, 220.0)
}
