use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use common::{LedgerEvent, Mood, SensorReading};
use strategy::{determine_mood, should_skip_day, MoodThresholds, Watchlist};

use crate::clock;
use crate::ledger::PositionLedger;
use crate::store::TradeStore;

/// The polling trade loop: one tick per interval, every decision inside it.
///
/// The trader owns the ledger outright, so a tick can never overlap with
/// another tick's mutations. Sensor readings arrive between ticks on a
/// broadcast channel; the latest one wins.
pub struct Trader {
    ledger: PositionLedger,
    store: Arc<dyn TradeStore>,
    thresholds: MoodThresholds,
    watchlist: Arc<Watchlist>,
    poll_interval: Duration,
    force_close_on_shutdown: bool,
    reading_rx: broadcast::Receiver<SensorReading>,
    shutdown_rx: watch::Receiver<bool>,
    event_tx: broadcast::Sender<LedgerEvent>,
    last_reading: Option<SensorReading>,
    last_mood: Option<Mood>,
    market_was_open: Option<bool>,
}

impl Trader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: PositionLedger,
        store: Arc<dyn TradeStore>,
        thresholds: MoodThresholds,
        watchlist: Arc<Watchlist>,
        poll_interval: Duration,
        force_close_on_shutdown: bool,
        reading_rx: broadcast::Receiver<SensorReading>,
        shutdown_rx: watch::Receiver<bool>,
        event_tx: broadcast::Sender<LedgerEvent>,
    ) -> Self {
        Self {
            ledger,
            store,
            thresholds,
            watchlist,
            poll_interval,
            force_close_on_shutdown,
            reading_rx,
            shutdown_rx,
            event_tx,
            last_reading: None,
            last_mood: None,
            market_was_open: None,
        }
    }

    /// Run until shutdown is signalled. Call inside `tokio::spawn`.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        info!(interval = ?self.poll_interval, "Trader loop started");

        loop {
            tokio::select! {
                reading = self.reading_rx.recv() => {
                    match reading {
                        Ok(reading) => self.on_reading(reading).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Sensor channel lagged; dropping stale readings");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            // Feed gone; keep ticking so open positions still close.
                            debug!("Sensor channel closed");
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.tick(Utc::now()).await;
                }
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Trader loop stopping");
        if self.force_close_on_shutdown {
            self.ledger.force_close_all().await;
        }
    }

    async fn on_reading(&mut self, reading: SensorReading) {
        let mood = determine_mood(&self.thresholds, &reading);
        if self.last_mood != Some(mood) {
            info!(mood = %mood, lux = reading.lux, temp = reading.temperature_c,
                  humidity = reading.humidity_pct, "Mood changed");
            let _ = self.event_tx.send(LedgerEvent::MoodChanged { mood });
            self.last_mood = Some(mood);
        }
        if let Err(e) = self.store.record_reading(&reading).await {
            warn!(error = %e, "Failed to persist sensor reading");
        }
        self.last_reading = Some(reading);
    }

    /// One decision pass. Open positions are monitored unconditionally;
    /// entries are gated on skip-day, market hours, and a tradable mood.
    /// A failing step is logged and the loop carries on.
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        self.ledger.update_open_trades_at(now).await;

        let Some(reading) = self.last_reading.clone() else {
            debug!("No sensor reading yet; entries suppressed");
            return;
        };

        if should_skip_day(&reading) {
            debug!(lux = reading.lux, humidity = reading.humidity_pct,
                   temp = reading.temperature_c, "Skip-day conditions; entries suppressed");
            return;
        }

        let market_open = clock::is_market_open(now);
        if self.market_was_open != Some(market_open) {
            info!(open = market_open, "Market status changed");
            let _ = self.event_tx.send(LedgerEvent::MarketStatus { open: market_open });
            self.market_was_open = Some(market_open);
        }
        if !market_open {
            return;
        }

        let mood = determine_mood(&self.thresholds, &reading);
        if !self.watchlist.is_tradable(mood) {
            debug!(mood = %mood, "Mood has no tradable symbols; entries suppressed");
            return;
        }

        let symbols: Vec<String> = self.watchlist.symbols_for(mood).to_vec();
        for symbol in symbols {
            match self.ledger.evaluate_trade_entry(&symbol, mood, &reading).await {
                Ok(outcome) if outcome.executed() => {
                    info!(symbol = %symbol, mood = %mood, "Entry executed");
                }
                Ok(_) => {}
                Err(e) => {
                    // One bad symbol never kills the tick.
                    warn!(symbol = %symbol, error = %e, "Entry evaluation failed");
                }
            }
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerConfig;
    use chrono::TimeZone;
    use paper::PaperBroker;
    use strategy::{SignalConfig, SignalEvaluator, WatchlistFile};

    use async_trait::async_trait;
    use common::{Bar, ClosedTrade, Result};

    struct NullStore;

    #[async_trait]
    impl TradeStore for NullStore {
        async fn record_closed_trade(&self, _trade: &ClosedTrade) -> Result<()> {
            Ok(())
        }
        async fn recent_closed_trades(&self, _limit: i64) -> Result<Vec<ClosedTrade>> {
            Ok(vec![])
        }
        async fn record_reading(&self, _reading: &SensorReading) -> Result<()> {
            Ok(())
        }
    }

    fn thresholds() -> MoodThresholds {
        MoodThresholds {
            bright_lux: 20_000.0,
            hot_temp: 15.0,
            dry_humidity: 50.0,
        }
    }

    fn watchlist() -> Arc<Watchlist> {
        let file: WatchlistFile = toml::from_str(
            r#"
            [[mood]]
            label = "Hot & Dry"
            symbols = ["SPWR"]
            volatility_factor = 0.1
            "#,
        )
        .unwrap();
        Arc::new(Watchlist::from_file(file).unwrap())
    }

    fn trader(broker: Arc<PaperBroker>) -> Trader {
        let (event_tx, _) = broadcast::channel(64);
        let store: Arc<dyn TradeStore> = Arc::new(NullStore);
        let ledger = PositionLedger::new(
            broker.clone(),
            store.clone(),
            SignalEvaluator::new(broker, SignalConfig::default()),
            watchlist(),
            LedgerConfig { account_balance: 100_000.0, max_open_per_symbol: 1 },
            event_tx.clone(),
        );
        let (reading_tx, reading_rx) = broadcast::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(reading_tx);
        Trader::new(
            ledger,
            store,
            thresholds(),
            watchlist(),
            Duration::from_secs(60),
            false,
            reading_rx,
            shutdown_rx,
            event_tx,
        )
    }

    /// Bright, hot, dry → Hot & Dry, the one tradable mood in the fixture.
    fn hot_dry_reading() -> SensorReading {
        SensorReading {
            lux: 30_000.0,
            temperature_c: 25.0,
            humidity_pct: 40.0,
            current_a: 0.2,
            power_w: 2.5,
            timestamp: Utc::now(),
        }
    }

    fn breakout_bars() -> Vec<Bar> {
        let bar = |high: f64, low: f64, volume: f64| Bar {
            open: low,
            high,
            low,
            close: high,
            volume,
        };
        vec![bar(101.0, 99.0, 150.0), bar(102.0, 100.0, 110.0), bar(101.5, 100.5, 300.0)]
    }

    /// A Tuesday at 10:00 New York (15:00 UTC in January, EST).
    fn open_market_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 6, 15, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn tick_opens_a_trade_under_a_tradable_mood() {
        let broker = Arc::new(PaperBroker::new(1_000_000.0));
        broker.set_bars("SPWR", breakout_bars()).await;
        broker.set_quote("SPWR", 102.3, 102.5).await;

        let mut trader = trader(broker);
        trader.last_reading = Some(hot_dry_reading());

        trader.tick(open_market_instant()).await;

        assert_eq!(trader.ledger().open_positions().len(), 1);
    }

    #[tokio::test]
    async fn entries_are_suppressed_when_the_market_is_closed() {
        let broker = Arc::new(PaperBroker::new(1_000_000.0));
        broker.set_bars("SPWR", breakout_bars()).await;
        broker.set_quote("SPWR", 102.3, 102.5).await;

        let mut trader = trader(broker);
        trader.last_reading = Some(hot_dry_reading());

        // Saturday.
        let weekend = Utc.with_ymd_and_hms(2026, 1, 3, 15, 0, 0).unwrap();
        trader.tick(weekend).await;

        assert!(trader.ledger().open_positions().is_empty());
    }

    #[tokio::test]
    async fn skip_day_conditions_suppress_entries() {
        let broker = Arc::new(PaperBroker::new(1_000_000.0));
        broker.set_bars("SPWR", breakout_bars()).await;
        broker.set_quote("SPWR", 102.3, 102.5).await;

        let mut trader = trader(broker);
        // Very dark, saturated, and cold: the stand-down triple.
        trader.last_reading = Some(SensorReading {
            lux: 150.0,
            temperature_c: 5.0,
            humidity_pct: 90.0,
            current_a: 0.0,
            power_w: 0.0,
            timestamp: Utc::now(),
        });

        trader.tick(open_market_instant()).await;

        assert!(trader.ledger().open_positions().is_empty());
    }

    #[tokio::test]
    async fn untradable_mood_suppresses_entries() {
        let broker = Arc::new(PaperBroker::new(1_000_000.0));
        broker.set_bars("SPWR", breakout_bars()).await;
        broker.set_quote("SPWR", 102.3, 102.5).await;

        let mut trader = trader(broker);
        // Dark, hot, wet → Hot & Humid, which this watchlist does not map.
        trader.last_reading = Some(SensorReading {
            lux: 100.0,
            temperature_c: 30.0,
            humidity_pct: 90.0,
            current_a: 0.2,
            power_w: 2.5,
            timestamp: Utc::now(),
        });

        trader.tick(open_market_instant()).await;

        assert!(trader.ledger().open_positions().is_empty());
    }

    #[tokio::test]
    async fn open_positions_are_monitored_even_when_entries_are_gated() {
        let broker = Arc::new(PaperBroker::new(1_000_000.0));
        broker.set_quote("SPWR", 107.0, 107.2).await;

        let mut trader = trader(broker);
        // Position already open; skip-day reading in force.
        trader.ledger.open.push(common::Position {
            id: "p1".to_string(),
            symbol: "SPWR".to_string(),
            side: common::Side::Long,
            entry_price: 100.0,
            shares: 10,
            tp_price: 106.4,
            sl_price: 96.8,
            entry_time: Utc::now(),
            max_hold_minutes: 20,
            mood: Mood::HotDry,
        });
        trader.last_reading = Some(SensorReading {
            lux: 150.0,
            temperature_c: 5.0,
            humidity_pct: 90.0,
            current_a: 0.0,
            power_w: 0.0,
            timestamp: Utc::now(),
        });

        trader.tick(open_market_instant()).await;

        // The take-profit still fired despite the entry gate.
        assert!(trader.ledger().open_positions().is_empty());
        assert_eq!(trader.ledger().closed_trades().len(), 1);
    }

    #[tokio::test]
    async fn no_reading_means_no_entries() {
        let broker = Arc::new(PaperBroker::new(1_000_000.0));
        broker.set_bars("SPWR", breakout_bars()).await;
        broker.set_quote("SPWR", 102.3, 102.5).await;

        let mut trader = trader(broker);
        trader.tick(open_market_instant()).await;

        assert!(trader.ledger().open_positions().is_empty());
    }
}
