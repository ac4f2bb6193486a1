//! Schema management CLI for the sensor store, e.g.
//! `DATABASE_URL=sqlite://sensor_data.db?mode=rwc cargo run -p migration -- status`.

use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    cli::run_cli(migration::Migrator).await;
}
