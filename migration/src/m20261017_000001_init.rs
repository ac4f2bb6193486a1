use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ========== SENSOR READINGS (append-only) ==========
        manager
            .create_table(
                Table::create()
                    .table(SensorReadings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SensorReadings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SensorReadings::DeviceId).text().not_null())
                    .col(ColumnDef::new(SensorReadings::DeviceName).text().not_null())
                    .col(
                        ColumnDef::new(SensorReadings::SequenceNumber)
                            .big_integer()
                            .not_null(),
                    )
                    // RFC 3339 UTC text so that lexical order is time order
                    .col(ColumnDef::new(SensorReadings::Timestamp).text().not_null())
                    .col(ColumnDef::new(SensorReadings::Temperature).double().not_null())
                    .col(ColumnDef::new(SensorReadings::Vibration).double().not_null())
                    .col(ColumnDef::new(SensorReadings::Voltage).double().not_null())
                    .col(
                        ColumnDef::new(SensorReadings::Status)
                            .text()
                            .not_null()
                            .default("Good"),
                    )
                    .col(
                        ColumnDef::new(SensorReadings::AlertType)
                            .text()
                            .not_null()
                            .default("None"),
                    )
                    .col(ColumnDef::new(SensorReadings::ProcessedAt).text().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sensor_readings_device_id")
                    .table(SensorReadings::Table)
                    .if_not_exists()
                    .col(SensorReadings::DeviceId)
                    .col(SensorReadings::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sensor_readings_timestamp")
                    .table(SensorReadings::Table)
                    .if_not_exists()
                    .col(SensorReadings::Timestamp)
                    .to_owned(),
            )
            .await?;

        // ========== DEVICE HEALTH (one row per device) ==========
        manager
            .create_table(
                Table::create()
                    .table(DeviceHealth::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceHealth::DeviceId)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeviceHealth::DeviceName).text().not_null())
                    .col(
                        ColumnDef::new(DeviceHealth::Status)
                            .text()
                            .not_null()
                            .default("Good"),
                    )
                    .col(
                        ColumnDef::new(DeviceHealth::PacketsReceived)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DeviceHealth::ErrorCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(DeviceHealth::LastActive).text().not_null())
                    .col(ColumnDef::new(DeviceHealth::UpdatedAt).text().not_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceHealth::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(SensorReadings::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum SensorReadings {
    Table,
    Id,
    DeviceId,
    DeviceName,
    SequenceNumber,
    Timestamp,
    Temperature,
    Vibration,
    Voltage,
    Status,
    AlertType,
    ProcessedAt,
}

#[derive(DeriveIden)]
pub enum DeviceHealth {
    Table,
    DeviceId,
    DeviceName,
    Status,
    PacketsReceived,
    ErrorCount,
    LastActive,
    UpdatedAt,
}
