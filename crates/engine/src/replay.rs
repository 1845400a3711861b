use std::time::Duration;

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tokio::sync::broadcast;
use tracing::{info, warn};

use common::{Result, SensorReading};

use crate::store::parse_time;

/// Historical sensor replay for offline runs.
///
/// Reads recorded readings from the `sensor_readings` table in timestamp
/// order and publishes them on the same broadcast channel the live stream
/// would, one reading per cadence interval. The rest of the engine cannot
/// tell replay from live.
pub struct ReplayFeed {
    pool: SqlitePool,
    cadence: Duration,
    reading_tx: broadcast::Sender<SensorReading>,
}

impl ReplayFeed {
    pub fn new(
        pool: SqlitePool,
        cadence: Duration,
        reading_tx: broadcast::Sender<SensorReading>,
    ) -> Self {
        Self {
            pool,
            cadence,
            reading_tx,
        }
    }

    /// Replay every recorded reading, then return. Call inside `tokio::spawn`.
    pub async fn run(self) -> Result<()> {
        let readings = self.load_all().await?;
        info!(count = readings.len(), cadence = ?self.cadence, "Starting sensor replay");

        for reading in readings {
            let _ = self.reading_tx.send(reading);
            tokio::time::sleep(self.cadence).await;
        }

        info!("Sensor replay finished");
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<SensorReading>> {
        let rows = sqlx::query(
            "SELECT timestamp, lux, temperature_c, humidity_pct, current_a, power_w
             FROM sensor_readings ORDER BY timestamp ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut readings = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.get("timestamp");
            let timestamp = match parse_time(&raw) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!(error = %e, "Skipping reading with unparseable timestamp");
                    continue;
                }
            };
            readings.push(SensorReading {
                lux: row.get("lux"),
                temperature_c: row.get("temperature_c"),
                humidity_pct: row.get("humidity_pct"),
                current_a: row.get("current_a"),
                power_w: row.get("power_w"),
                timestamp,
            });
        }
        Ok(readings)
    }
}
