use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, LedgerEvent, SensorReading, TradingMode};
use engine::{AlpacaClient, LedgerConfig, PositionLedger, ReplayFeed, SensorStream, SqliteStore, Trader, TradeStore};
use paper::PaperBroker;
use strategy::{MoodThresholds, SignalConfig, SignalEvaluator, Watchlist};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };
    info!(mode = %cfg.trading_mode, "SolarTrader starting");

    // ── Database ──────────────────────────────────────────────────────────────
    let db = SqlitePool::connect(&cfg.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to database: {e}"));
    let store: Arc<dyn TradeStore> = Arc::new(
        SqliteStore::init(db.clone())
            .await
            .unwrap_or_else(|e| panic!("Failed to initialize store: {e}")),
    );
    info!("Database ready");

    // ── Watchlist (mood → symbols) ────────────────────────────────────────────
    let watchlist = match Watchlist::load(&cfg.watchlist_path) {
        Ok(wl) => Arc::new(wl),
        Err(e) => {
            eprintln!("Watchlist error: {e}");
            std::process::exit(1);
        }
    };

    // ── Broker (injected based on TRADING_MODE) ───────────────────────────────
    let broker: Arc<dyn common::Broker> = match cfg.trading_mode {
        TradingMode::Live => {
            info!("Live mode — routing orders to Alpaca");
            Arc::new(AlpacaClient::new(&cfg.alpaca_api_key, &cfg.alpaca_secret_key))
        }
        TradingMode::Paper => {
            info!(balance = cfg.account_balance, "Paper mode — using local simulator");
            Arc::new(PaperBroker::new(cfg.account_balance))
        }
    };

    match broker.account_info().await {
        Ok(account) => {
            info!(cash = account.cash, equity = account.equity,
                  buying_power = account.buying_power, "Account snapshot");
        }
        Err(e) => warn!(error = %e, "Could not fetch account info"),
    }
    match broker.current_positions().await {
        Ok(positions) if !positions.is_empty() => {
            warn!(count = positions.len(), "Broker reports pre-existing open positions");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Could not fetch broker positions"),
    }

    // ── Channels ──────────────────────────────────────────────────────────────
    let (reading_tx, reading_rx) = broadcast::channel::<SensorReading>(256);
    let (event_tx, mut event_rx) = broadcast::channel::<LedgerEvent>(256);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Sensor feed ───────────────────────────────────────────────────────────
    if cfg.replay_mode {
        let replay = ReplayFeed::new(
            db.clone(),
            Duration::from_secs(cfg.poll_interval_secs),
            reading_tx.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = replay.run().await {
                warn!(error = %e, "Sensor replay failed");
            }
        });
    } else if let Some(url) = cfg.sensor_feed_url.clone() {
        tokio::spawn(SensorStream::new(url, reading_tx.clone()).run());
    } else {
        warn!("No SENSOR_FEED_URL and replay off; no readings will arrive, entries stay suppressed");
    }

    // ── Ledger + trader ───────────────────────────────────────────────────────
    let signal_config = SignalConfig {
        random_fallback: cfg.random_entry_fallback,
        ..SignalConfig::default()
    };
    let ledger = PositionLedger::new(
        broker.clone(),
        store.clone(),
        SignalEvaluator::new(broker, signal_config),
        watchlist.clone(),
        LedgerConfig {
            account_balance: cfg.account_balance,
            max_open_per_symbol: cfg.max_open_positions_per_symbol,
        },
        event_tx.clone(),
    );
    let trader = Trader::new(
        ledger,
        store,
        MoodThresholds::from_config(&cfg),
        watchlist,
        Duration::from_secs(cfg.poll_interval_secs),
        cfg.force_close_on_shutdown,
        reading_rx,
        shutdown_rx,
        event_tx,
    );

    // ── Status reporter ───────────────────────────────────────────────────────
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(LedgerEvent::MoodChanged { mood }) => {
                    info!(mood = %mood, "Mood update");
                }
                Ok(LedgerEvent::MarketStatus { open }) => {
                    info!(open, "Market status");
                }
                Ok(LedgerEvent::TradeOpened { position }) => {
                    info!(symbol = %position.symbol, side = %position.side,
                          shares = position.shares, entry = position.entry_price, "Opened");
                }
                Ok(LedgerEvent::TradeClosed { trade }) => {
                    info!(symbol = %trade.symbol, pnl = trade.pnl,
                          reason = %trade.reason, "Closed");
                }
                Ok(LedgerEvent::EntrySkipped { symbol, reason }) => {
                    info!(symbol = %symbol, %reason, "Skipped");
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let trader_handle = tokio::spawn(trader.run());

    // ── Shutdown ──────────────────────────────────────────────────────────────
    info!("All subsystems started. Waiting for shutdown signal.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = trader_handle.await;
    info!("SolarTrader stopped");
}
