//! Durable state: the append-only reading table and the per-device health rows.
//!
//! A single `Store` is opened at startup and cloned into whoever needs it.
//! Writes go through an internal mutex so that two analyzers accidentally
//! sharing a store still apply their health increments one at a time; every
//! write is a single statement, so a crash never leaves half an update behind.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, ConnectOptions, ConnectionTrait, Database,
    DatabaseBackend, DatabaseConnection, EntityTrait, FromQueryResult, QueryFilter, QueryOrder,
    QuerySelect, Set, Statement,
};
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::entity::{device_health, sensor_readings};
use crate::error::{AppError, AppResult};
use crate::models::{ClassifiedReading, Reading, Severity, format_timestamp};

const UPSERT_DEVICE_HEALTH_SQL: &str = r"
    INSERT INTO device_health
        (device_id, device_name, status, packets_received, error_count, last_active, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (device_id) DO UPDATE SET
        status = excluded.status,
        packets_received = device_health.packets_received + excluded.packets_received,
        error_count = device_health.error_count + excluded.error_count,
        last_active = excluded.last_active,
        updated_at = excluded.updated_at
";

const LATEST_PER_DEVICE_SQL: &str = r"
    SELECT * FROM sensor_readings
    WHERE id IN (SELECT MAX(id) FROM sensor_readings GROUP BY device_id)
    ORDER BY device_id ASC
";

const AGGREGATE_COUNTS_SQL: &str = r"
    SELECT
        COUNT(*) AS total,
        COALESCE(SUM(CASE WHEN status = 'Warning' THEN 1 ELSE 0 END), 0) AS warning,
        COALESCE(SUM(CASE WHEN status = 'Critical' THEN 1 ELSE 0 END), 0) AS critical
    FROM sensor_readings
";

const DAILY_SUMMARY_SQL: &str = r"
    SELECT
        COUNT(*) AS total,
        COALESCE(SUM(CASE WHEN status = 'Critical' THEN 1 ELSE 0 END), 0) AS critical,
        COALESCE(SUM(CASE WHEN status = 'Warning' THEN 1 ELSE 0 END), 0) AS warning,
        AVG(temperature) AS avg_temperature
    FROM sensor_readings
    WHERE substr(timestamp, 1, 10) = ?
";

const FLEET_STATS_SQL: &str = r"
    SELECT
        COUNT(*) AS total_readings,
        COUNT(DISTINCT device_id) AS active_devices,
        COALESCE(SUM(CASE WHEN status != 'Good' THEN 1 ELSE 0 END), 0) AS alerts
    FROM sensor_readings
";

/// Totals over every stored reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct AggregateCounts {
    pub total: i64,
    pub warning: i64,
    pub critical: i64,
}

/// Per-day aggregate used by the daily report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total: i64,
    pub critical: i64,
    pub warning: i64,
    /// `None` when no reading was taken that day
    pub avg_temperature: Option<f64>,
}

#[derive(Debug, FromQueryResult)]
struct DailySummaryRow {
    total: i64,
    critical: i64,
    warning: i64,
    avg_temperature: Option<f64>,
}

/// Whole-fleet overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct FleetStats {
    pub total_readings: i64,
    pub active_devices: i64,
    /// Readings classified Warning or Critical
    pub alerts: i64,
}

/// A persisted reading, as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredReading {
    pub id: i32,
    #[serde(flatten)]
    pub classified: ClassifiedReading,
    pub processed_at: String,
}

impl TryFrom<sensor_readings::Model> for StoredReading {
    type Error = AppError;

    fn try_from(m: sensor_readings::Model) -> Result<Self, Self::Error> {
        let timestamp = DateTime::parse_from_rfc3339(&m.timestamp)
            .map_err(|e| {
                AppError::Internal(format!("Stored reading {} has bad timestamp: {e}", m.id))
            })?
            .with_timezone(&Utc);
        let status: Severity = m
            .status
            .parse()
            .map_err(|e| AppError::Internal(format!("Stored reading {}: {e}", m.id)))?;
        let sequence_number = u64::try_from(m.sequence_number).map_err(|_| {
            AppError::Internal(format!("Stored reading {} has negative sequence number", m.id))
        })?;

        Ok(Self {
            id: m.id,
            classified: ClassifiedReading {
                reading: Reading {
                    device_id: m.device_id,
                    device_name: m.device_name,
                    sequence_number,
                    timestamp,
                    temperature: m.temperature,
                    vibration: m.vibration,
                    voltage: m.voltage,
                },
                status,
                alert_type: m.alert_type,
            },
            processed_at: m.processed_at,
        })
    }
}

#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
    write_lock: Arc<Mutex<()>>,
}

impl Store {
    /// Open the database and bring the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails.
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let mut options = ConnectOptions::new(database_url.to_owned());
        options.sqlx_logging(false);

        let db = Database::connect(options).await?;
        migration::Migrator::up(&db, None).await?;
        tracing::debug!(url = %database_url, "Store schema is up to date");

        Ok(Self::from_connection(db))
    }

    /// Wrap an already-migrated connection.
    #[must_use]
    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self {
            db,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Close the underlying pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool fails to shut down cleanly.
    pub async fn close(self) -> AppResult<()> {
        self.db.close().await?;
        Ok(())
    }

    /// Append one classified reading. `processed_at` is assigned here.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails; nothing is written in that case.
    pub async fn append_reading(&self, classified: &ClassifiedReading) -> AppResult<()> {
        let reading = &classified.reading;
        let sequence_number = i64::try_from(reading.sequence_number).map_err(|_| {
            AppError::Internal(format!(
                "Sequence number {} out of range",
                reading.sequence_number
            ))
        })?;

        let model = sensor_readings::ActiveModel {
            id: NotSet,
            device_id: Set(reading.device_id.clone()),
            device_name: Set(reading.device_name.clone()),
            sequence_number: Set(sequence_number),
            timestamp: Set(format_timestamp(&reading.timestamp)),
            temperature: Set(reading.temperature),
            vibration: Set(reading.vibration),
            voltage: Set(reading.voltage),
            status: Set(classified.status.as_str().to_string()),
            alert_type: Set(classified.alert_type.clone()),
            processed_at: Set(format_timestamp(&Utc::now())),
        };

        let _guard = self.write_lock.lock().await;
        sensor_readings::Entity::insert(model).exec(&self.db).await?;
        Ok(())
    }

    /// Create or update the health row of a device in one statement.
    ///
    /// A new row starts at the given increments; an existing row has them
    /// added, and its status and `last_active` overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails; the row is left untouched.
    pub async fn upsert_device_health(
        &self,
        device_id: &str,
        device_name: &str,
        status: Severity,
        packets_increment: u32,
        error_increment: u32,
    ) -> AppResult<()> {
        let now = format_timestamp(&Utc::now());

        let statement = Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            UPSERT_DEVICE_HEALTH_SQL,
            vec![
                device_id.into(),
                device_name.into(),
                status.as_str().into(),
                i64::from(packets_increment).into(),
                i64::from(error_increment).into(),
                now.clone().into(),
                now.into(),
            ],
        );

        let _guard = self.write_lock.lock().await;
        self.db.execute(statement).await?;
        Ok(())
    }

    /// The most recently stored reading of every device, ordered by device id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn latest_per_device(&self) -> AppResult<Vec<StoredReading>> {
        sensor_readings::Entity::find()
            .from_raw_sql(Statement::from_string(
                DatabaseBackend::Sqlite,
                LATEST_PER_DEVICE_SQL,
            ))
            .all(&self.db)
            .await?
            .into_iter()
            .map(StoredReading::try_from)
            .collect()
    }

    /// Total, warning and critical reading counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn aggregate_counts(&self) -> AppResult<AggregateCounts> {
        let row = self
            .db
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                AGGREGATE_COUNTS_SQL,
            ))
            .await?
            .ok_or_else(|| AppError::Internal("Aggregate query returned no row".to_string()))?;

        Ok(AggregateCounts::from_query_result(&row, "")?)
    }

    /// Count, critical count, warning count and mean temperature for one
    /// calendar day (UTC).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn daily_summary(&self, date: NaiveDate) -> AppResult<DailySummary> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                DAILY_SUMMARY_SQL,
                vec![date.format("%Y-%m-%d").to_string().into()],
            ))
            .await?
            .ok_or_else(|| AppError::Internal("Daily summary query returned no row".to_string()))?;

        let row = DailySummaryRow::from_query_result(&row, "")?;
        Ok(DailySummary {
            date,
            total: row.total,
            critical: row.critical,
            warning: row.warning,
            avg_temperature: row.avg_temperature,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn fleet_stats(&self) -> AppResult<FleetStats> {
        let row = self
            .db
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                FLEET_STATS_SQL,
            ))
            .await?
            .ok_or_else(|| AppError::Internal("Fleet stats query returned no row".to_string()))?;

        Ok(FleetStats::from_query_result(&row, "")?)
    }

    /// All health rows, ordered by device id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn device_health(&self) -> AppResult<Vec<device_health::Model>> {
        Ok(device_health::Entity::find()
            .order_by_asc(device_health::Column::DeviceId)
            .all(&self.db)
            .await?)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn device_health_for(
        &self,
        device_id: &str,
    ) -> AppResult<Option<device_health::Model>> {
        Ok(device_health::Entity::find_by_id(device_id.to_owned())
            .one(&self.db)
            .await?)
    }

    /// Newest-first readings of one device.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn readings_for_device(
        &self,
        device_id: &str,
        limit: u64,
    ) -> AppResult<Vec<StoredReading>> {
        sensor_readings::Entity::find()
            .filter(sensor_readings::Column::DeviceId.eq(device_id))
            .order_by_desc(sensor_readings::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(StoredReading::try_from)
            .collect()
    }
}
