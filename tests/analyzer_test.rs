//! Tests for threshold classification and the analyzer's side effects.
//!
//! Run with: cargo test --test analyzer_test

mod common;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use std::sync::Arc;
use tempfile::TempDir;

use common::{RecordingNotifier, normal, reading, temp_sink, temp_store};
use sensor_fleet::entity::sensor_readings;
use sensor_fleet::models::Severity;
use sensor_fleet::pipeline::{Analyzer, Thresholds, classify};

fn classify_values(temperature: f64, vibration: f64, voltage: f64) -> (Severity, String) {
    classify(
        &reading("DEV001", 1, temperature, vibration, voltage),
        &Thresholds::default(),
    )
}

#[test]
fn high_temperature_is_critical() {
    assert_eq!(
        classify_values(90.0, 1.0, 220.0),
        (Severity::Critical, "High Temperature".to_string())
    );
}

#[test]
fn warnings_concatenate_in_check_order() {
    assert_eq!(
        classify_values(75.0, 8.0, 220.0),
        (
            Severity::Warning,
            "High Temperature Warning, High Vibration Warning".to_string()
        )
    );
}

#[test]
fn low_voltage_is_critical() {
    assert_eq!(
        classify_values(50.0, 1.0, 175.0),
        (Severity::Critical, "Low Voltage".to_string())
    );
}

#[test]
fn normal_reading_is_good() {
    assert_eq!(
        classify_values(30.0, 1.0, 220.0),
        (Severity::Good, "None".to_string())
    );
}

#[test]
fn later_warning_never_downgrades_critical() {
    assert_eq!(
        classify_values(90.0, 8.0, 185.0),
        (
            Severity::Critical,
            "High Temperature, High Vibration Warning, Low Voltage Warning".to_string()
        )
    );
}

#[test]
fn simultaneous_criticals_keep_every_reason() {
    assert_eq!(
        classify_values(90.0, 12.0, 170.0),
        (
            Severity::Critical,
            "High Temperature, High Vibration, Low Voltage".to_string()
        )
    );
}

#[test]
fn boundaries_are_strict() {
    // Exactly on a boundary does not trigger it
    assert_eq!(classify_values(85.0, 10.0, 180.0).0, Severity::Warning);
    assert_eq!(classify_values(70.0, 7.0, 190.0).0, Severity::Good);
}

#[test]
fn status_matches_threshold_definition() {
    let t = Thresholds::default();
    let temperatures = [20.0, 70.0, 70.5, 85.0, 85.5, 120.0];
    let vibrations = [0.1, 7.0, 7.5, 10.0, 10.5, 20.0];
    let voltages = [150.0, 179.5, 180.0, 189.5, 190.0, 230.0];

    for &temperature in &temperatures {
        for &vibration in &vibrations {
            for &voltage in &voltages {
                let critical = temperature > t.temperature_critical
                    || vibration > t.vibration_critical
                    || voltage < t.voltage_critical_low;
                let warning = temperature > t.temperature_warning
                    || vibration > t.vibration_warning
                    || voltage < t.voltage_warning_low;
                let expected = if critical {
                    Severity::Critical
                } else if warning {
                    Severity::Warning
                } else {
                    Severity::Good
                };

                let (status, alert_type) = classify_values(temperature, vibration, voltage);
                assert_eq!(status, expected, "T={temperature} V={vibration} U={voltage}");
                assert_eq!(alert_type == "None", status == Severity::Good);
            }
        }
    }
}

#[tokio::test]
async fn device_health_tracks_packets_and_errors() {
    let dir = TempDir::new().unwrap();
    let store = temp_store(&dir).await;
    let sink = temp_sink(&dir, Arc::new(RecordingNotifier::default())).await;
    let mut analyzer = Analyzer::new(store.clone(), sink);

    for seq in 1..=25 {
        let r = if matches!(seq, 4 | 11 | 20) {
            reading("DEV001", seq, 90.0, 1.0, 220.0)
        } else {
            normal("DEV001", seq)
        };
        analyzer.process(r).await;
    }

    let health = store.device_health_for("DEV001").await.unwrap().unwrap();
    assert_eq!(health.packets_received, 25);
    assert_eq!(health.error_count, 3);
    assert_eq!(health.status, "Good");
    assert_eq!(health.device_name, "DEV001 name");
    assert_eq!(analyzer.processed(), 25);

    let stored = sensor_readings::Entity::find()
        .filter(sensor_readings::Column::DeviceId.eq("DEV001"))
        .count(store.connection())
        .await
        .unwrap();
    assert_eq!(stored, 25);
}

#[tokio::test]
async fn health_status_follows_latest_reading() {
    let dir = TempDir::new().unwrap();
    let store = temp_store(&dir).await;
    let sink = temp_sink(&dir, Arc::new(RecordingNotifier::default())).await;
    let mut analyzer = Analyzer::new(store.clone(), sink);

    analyzer.process(reading("DEV002", 1, 90.0, 1.0, 220.0)).await;
    let health = store.device_health_for("DEV002").await.unwrap().unwrap();
    assert_eq!(health.status, "Critical");

    analyzer.process(reading("DEV002", 2, 75.0, 1.0, 220.0)).await;
    let health = store.device_health_for("DEV002").await.unwrap().unwrap();
    assert_eq!(health.status, "Warning");
    assert_eq!(health.packets_received, 2);
    assert_eq!(health.error_count, 1);
}

#[tokio::test]
async fn alerts_are_forwarded_only_for_warning_and_critical() {
    let dir = TempDir::new().unwrap();
    let store = temp_store(&dir).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let sink = temp_sink(&dir, notifier.clone()).await;
    let warning_log = sink.log_path(Severity::Warning).unwrap().to_path_buf();
    let critical_log = sink.log_path(Severity::Critical).unwrap().to_path_buf();
    let mut analyzer = Analyzer::new(store, sink);

    analyzer.process(normal("DEV001", 1)).await;
    analyzer.process(reading("DEV001", 2, 75.0, 1.0, 220.0)).await;
    analyzer.process(reading("DEV001", 3, 50.0, 1.0, 175.0)).await;

    let warnings = std::fs::read_to_string(warning_log).unwrap();
    let criticals = std::fs::read_to_string(critical_log).unwrap();
    assert_eq!(warnings.lines().count(), 1);
    assert!(
        warnings.contains("DEV001 - High Temperature Warning: Temp=75.0°C, Vib=1.0, Volt=220.0V")
    );
    assert_eq!(criticals.lines().count(), 1);
    assert!(criticals.contains("DEV001 - Low Voltage: Temp=50.0°C, Vib=1.0, Volt=175.0V"));
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn store_failure_skips_health_but_keeps_processing() {
    let dir = TempDir::new().unwrap();
    let store = temp_store(&dir).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let sink = temp_sink(&dir, notifier.clone()).await;
    let mut analyzer = Analyzer::new(store.clone(), sink);

    analyzer.process(normal("DEV001", 1)).await;

    store
        .connection()
        .execute_unprepared("DROP TABLE sensor_readings")
        .await
        .unwrap();

    let classified = analyzer.process(reading("DEV001", 2, 90.0, 1.0, 220.0)).await;
    assert_eq!(classified.status, Severity::Critical);
    assert_eq!(analyzer.processed(), 2);

    // Health still reflects only the reading that was stored
    let health = store.device_health_for("DEV001").await.unwrap().unwrap();
    assert_eq!(health.packets_received, 1);
    assert_eq!(health.error_count, 0);

    // The alert still went out
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn alert_failure_does_not_block_persistence() {
    let dir = TempDir::new().unwrap();
    let store = temp_store(&dir).await;
    let sink = temp_sink(&dir, Arc::new(RecordingNotifier::default())).await;
    let mut analyzer = Analyzer::new(store.clone(), sink);

    std::fs::remove_dir_all(dir.path().join("logs")).unwrap();

    analyzer.process(reading("DEV003", 1, 75.0, 1.0, 220.0)).await;
    analyzer.process(normal("DEV003", 2)).await;

    let health = store.device_health_for("DEV003").await.unwrap().unwrap();
    assert_eq!(health.packets_received, 2);
    assert_eq!(store.aggregate_counts().await.unwrap().warning, 1);
}
