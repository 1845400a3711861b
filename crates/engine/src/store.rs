use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::info;

use common::{CloseReason, ClosedTrade, Error, Mood, Result, SensorReading, Side};

/// Persistence seam for the ledger and the feed. Writes are best effort from
/// the caller's point of view; a failed write is logged, never fatal.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn record_closed_trade(&self, trade: &ClosedTrade) -> Result<()>;
    async fn recent_closed_trades(&self, limit: i64) -> Result<Vec<ClosedTrade>>;
    async fn record_reading(&self, reading: &SensorReading) -> Result<()>;
}

/// SQLite-backed store. Owns the schema; tables are created on init so a
/// fresh database file works without a separate migration step.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn init(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS closed_trades (
                id          TEXT PRIMARY KEY,
                symbol      TEXT NOT NULL,
                side        TEXT NOT NULL,
                entry_price REAL NOT NULL,
                exit_price  REAL NOT NULL,
                shares      INTEGER NOT NULL,
                entry_time  TEXT NOT NULL,
                exit_time   TEXT NOT NULL,
                reason      TEXT NOT NULL,
                mood        TEXT NOT NULL,
                pnl         REAL NOT NULL,
                pnl_pct     REAL NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sensor_readings (
                timestamp     TEXT NOT NULL,
                lux           REAL NOT NULL,
                temperature_c REAL NOT NULL,
                humidity_pct  REAL NOT NULL,
                current_a     REAL NOT NULL,
                power_w       REAL NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        info!("SQLite store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TradeStore for SqliteStore {
    async fn record_closed_trade(&self, trade: &ClosedTrade) -> Result<()> {
        sqlx::query(
            "INSERT INTO closed_trades
             (id, symbol, side, entry_price, exit_price, shares,
              entry_time, exit_time, reason, mood, pnl, pnl_pct)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&trade.id)
        .bind(&trade.symbol)
        .bind(trade.side.to_string())
        .bind(trade.entry_price)
        .bind(trade.exit_price)
        .bind(trade.shares as i64)
        .bind(trade.entry_time.to_rfc3339())
        .bind(trade.exit_time.to_rfc3339())
        .bind(trade.reason.to_string())
        .bind(trade.mood.label())
        .bind(trade.pnl)
        .bind(trade.pnl_pct)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_closed_trades(&self, limit: i64) -> Result<Vec<ClosedTrade>> {
        let rows = sqlx::query(
            "SELECT id, symbol, side, entry_price, exit_price, shares,
                    entry_time, exit_time, reason, mood, pnl, pnl_pct
             FROM closed_trades ORDER BY exit_time DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_trade).collect()
    }

    async fn record_reading(&self, reading: &SensorReading) -> Result<()> {
        sqlx::query(
            "INSERT INTO sensor_readings
             (timestamp, lux, temperature_c, humidity_pct, current_a, power_w)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(reading.timestamp.to_rfc3339())
        .bind(reading.lux)
        .bind(reading.temperature_c)
        .bind(reading.humidity_pct)
        .bind(reading.current_a)
        .bind(reading.power_w)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_trade(row: sqlx::sqlite::SqliteRow) -> Result<ClosedTrade> {
    let side: String = row.get("side");
    let reason: String = row.get("reason");
    let mood: String = row.get("mood");
    let shares: i64 = row.get("shares");
    Ok(ClosedTrade {
        id: row.get("id"),
        symbol: row.get("symbol"),
        side: side.parse::<Side>().map_err(Error::Persistence)?,
        entry_price: row.get("entry_price"),
        exit_price: row.get("exit_price"),
        shares: shares as u32,
        entry_time: parse_time(&row.get::<String, _>("entry_time"))?,
        exit_time: parse_time(&row.get::<String, _>("exit_time"))?,
        reason: reason.parse::<CloseReason>().map_err(Error::Persistence)?,
        mood: Mood::from_label(&mood).unwrap_or(Mood::Unknown),
        pnl: row.get("pnl"),
        pnl_pct: row.get("pnl_pct"),
    })
}

pub(crate) fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Persistence(format!("bad timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Position;

    async fn store() -> SqliteStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteStore::init(pool).await.unwrap()
    }

    fn trade(id: &str, reason: CloseReason) -> ClosedTrade {
        let position = Position {
            id: id.to_string(),
            symbol: "MSFT".to_string(),
            side: Side::Long,
            entry_price: 100.0,
            shares: 10,
            tp_price: 106.4,
            sl_price: 96.8,
            entry_time: Utc::now(),
            max_hold_minutes: 20,
            mood: Mood::BrightDry,
        };
        ClosedTrade::from_position(position, 106.4, Utc::now(), reason)
    }

    #[tokio::test]
    async fn closed_trade_round_trips() {
        let store = store().await;
        let trade = trade("t1", CloseReason::TakeProfit);
        store.record_closed_trade(&trade).await.unwrap();

        let rows = store.recent_closed_trades(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.id, "t1");
        assert_eq!(row.side, Side::Long);
        assert_eq!(row.reason, CloseReason::TakeProfit);
        assert_eq!(row.mood, Mood::BrightDry);
        assert_eq!(row.shares, 10);
        assert!((row.pnl - 64.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn recent_trades_respect_the_limit() {
        let store = store().await;
        for i in 0..5 {
            store
                .record_closed_trade(&trade(&format!("t{i}"), CloseReason::Timeout))
                .await
                .unwrap();
        }
        let rows = store.recent_closed_trades(3).await.unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn readings_are_recorded() {
        let store = store().await;
        let reading = SensorReading {
            lux: 30_000.0,
            temperature_c: 25.0,
            humidity_pct: 40.0,
            current_a: 0.2,
            power_w: 2.5,
            timestamp: Utc::now(),
        };
        store.record_reading(&reading).await.unwrap();

        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM sensor_readings")
            .fetch_one(store.pool())
            .await
            .unwrap()
            .get("n");
        assert_eq!(count, 1);
    }
}
