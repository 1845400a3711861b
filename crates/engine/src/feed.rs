use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tracing::{info, warn};
use url::Url;

use common::{Result, SensorReading};

/// WebSocket stream of readings from the solar sensor rig.
///
/// Connects to the rig's push endpoint, parses each message into a
/// `SensorReading`, and publishes it on a broadcast channel. Reconnects
/// automatically with exponential backoff; a feed outage stalls the mood,
/// never the engine.
pub struct SensorStream {
    url: String,
    reading_tx: broadcast::Sender<SensorReading>,
}

impl SensorStream {
    pub fn new(url: impl Into<String>, reading_tx: broadcast::Sender<SensorReading>) -> Self {
        Self {
            url: url.into(),
            reading_tx,
        }
    }

    /// Run the stream loop forever, reconnecting on failure.
    /// Call this inside a `tokio::spawn`.
    pub async fn run(self) {
        let mut backoff = Duration::from_secs(1);
        const MAX_BACKOFF: Duration = Duration::from_secs(60);

        loop {
            info!(url = %self.url, "Connecting to sensor feed");
            match self.connect_once().await {
                Ok(()) => {
                    info!(url = %self.url, "Sensor feed closed cleanly");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    backoff = Duration::from_secs(1);
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, backoff = ?backoff, "Sensor feed error, reconnecting");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn connect_once(&self) -> Result<()> {
        let url = Url::parse(&self.url).map_err(|e| common::Error::WebSocket(e.to_string()))?;

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| common::Error::WebSocket(e.to_string()))?;

        let (_, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| common::Error::WebSocket(e.to_string()))?;

            if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                match parse_reading(&text) {
                    Ok(reading) => {
                        // Ignore send errors (no active receivers)
                        let _ = self.reading_tx.send(reading);
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to parse sensor payload");
                    }
                }
            }
        }

        Ok(())
    }
}

// ─── Sensor payload parsing ──────────────────────────────────────────────────

/// The rig pushes flat JSON objects; absent fields read as zero.
#[derive(Deserialize)]
struct SensorPayload {
    #[serde(default)]
    lux: f64,
    #[serde(default)]
    temperature: f64,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    current: f64,
    #[serde(default)]
    power: f64,
    /// Milliseconds since the epoch, rig-side clock.
    #[serde(rename = "timeStamp", default)]
    time_stamp_ms: Option<i64>,
}

fn parse_reading(text: &str) -> Result<SensorReading> {
    let payload: SensorPayload = serde_json::from_str(text)?;

    let timestamp: DateTime<Utc> = payload
        .time_stamp_ms
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);

    Ok(SensorReading {
        lux: payload.lux,
        temperature_c: payload.temperature,
        humidity_pct: payload.humidity,
        current_a: payload.current,
        power_w: payload.power,
        timestamp,
    })
}
