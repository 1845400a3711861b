use crate::{Error, Result, TradingMode};

/// All configuration loaded from environment variables at startup.
/// Missing or malformed required variables produce `Error::Config`, which the
/// binary treats as fatal.
#[derive(Debug, Clone)]
pub struct Config {
    // Brokerage (required only in live mode)
    pub alpaca_api_key: String,
    pub alpaca_secret_key: String,

    // Mood thresholds (supplied here once; call sites never carry literals)
    pub bright_lux_threshold: f64,
    pub hot_temp_threshold: f64,
    pub dry_humidity_threshold: f64,

    // Trading
    pub trading_mode: TradingMode,
    pub account_balance: f64,
    pub poll_interval_secs: u64,
    pub max_open_positions_per_symbol: usize,
    /// Opt-in 50% coin-flip entry when no breakout is found. Never implicit.
    pub random_entry_fallback: bool,
    /// Operator policy: flatten everything on shutdown.
    pub force_close_on_shutdown: bool,

    // Sensor feed
    pub sensor_feed_url: Option<String>,
    pub replay_mode: bool,

    // Persistence
    pub database_url: String,

    // Watchlist (mood → symbols) file path
    pub watchlist_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let trading_mode = match required_env("TRADING_MODE")?.to_lowercase().as_str() {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper' or 'live', got: '{other}'"
                )))
            }
        };

        // Broker credentials only matter when real orders leave the process.
        let (alpaca_api_key, alpaca_secret_key) = match trading_mode {
            TradingMode::Live => (
                required_env("ALPACA_API_KEY")?,
                required_env("ALPACA_SECRET_KEY")?,
            ),
            TradingMode::Paper => (
                optional_env("ALPACA_API_KEY").unwrap_or_default(),
                optional_env("ALPACA_SECRET_KEY").unwrap_or_default(),
            ),
        };

        Ok(Config {
            alpaca_api_key,
            alpaca_secret_key,
            bright_lux_threshold: parse_or("BRIGHT_LUX_THRESHOLD", 20_000.0)?,
            hot_temp_threshold: parse_or("HOT_TEMP_THRESHOLD", 15.0)?,
            dry_humidity_threshold: parse_or("DRY_HUMIDITY_THRESHOLD", 50.0)?,
            trading_mode,
            account_balance: parse_or("ACCOUNT_BALANCE", 100_000.0)?,
            poll_interval_secs: parse_or("POLL_INTERVAL_SECS", 60u64)?,
            max_open_positions_per_symbol: parse_or("MAX_OPEN_POSITIONS_PER_SYMBOL", 1usize)?,
            random_entry_fallback: parse_or("RANDOM_ENTRY_FALLBACK", false)?,
            force_close_on_shutdown: parse_or("FORCE_CLOSE_ON_SHUTDOWN", false)?,
            sensor_feed_url: optional_env("SENSOR_FEED_URL"),
            replay_mode: parse_or("REPLAY_MODE", false)?,
            database_url: optional_env("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://solartrader.db?mode=rwc".to_string()),
            watchlist_path: optional_env("WATCHLIST_PATH")
                .unwrap_or_else(|| "config/watchlist.toml".to_string()),
        })
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        Error::Config(format!(
            "required environment variable '{key}' is not set. Check your .env file."
        ))
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("'{key}' has unparseable value '{raw}'"))),
        Err(_) => Ok(default),
    }
}
