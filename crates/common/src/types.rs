use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reading from the solar sensor rig, produced on a fixed cadence by the
/// feed collaborator (live WebSocket or historical replay). Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    /// Ambient light in lux. Never negative.
    pub lux: f64,
    pub temperature_c: f64,
    /// Relative humidity, 0–100.
    pub humidity_pct: f64,
    pub current_a: f64,
    pub power_w: f64,
    pub timestamp: DateTime<Utc>,
}

/// Discrete weather-derived sentiment bucket. Derived deterministically from
/// a `SensorReading`; selects the candidate symbols for the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    BrightDry,
    ColdBright,
    HotDry,
    HotHumid,
    DarkWet,
    DryCloudy,
    BrightWet,
    ColdWet,
    /// Fallback for sensor combinations outside the mood table.
    Unknown,
}

impl Mood {
    /// The canonical label used in logs and the watchlist file.
    pub fn label(&self) -> &'static str {
        match self {
            Mood::BrightDry => "Bright & Dry",
            Mood::ColdBright => "Cold & Bright",
            Mood::HotDry => "Hot & Dry",
            Mood::HotHumid => "Hot & Humid",
            Mood::DarkWet => "Dark & Wet",
            Mood::DryCloudy => "Dry & Cloudy",
            Mood::BrightWet => "Bright & Wet",
            Mood::ColdWet => "Cold & Wet",
            Mood::Unknown => "Unknown",
        }
    }

    pub fn from_label(label: &str) -> Option<Mood> {
        match label {
            "Bright & Dry" => Some(Mood::BrightDry),
            "Cold & Bright" => Some(Mood::ColdBright),
            "Hot & Dry" => Some(Mood::HotDry),
            "Hot & Humid" => Some(Mood::HotHumid),
            "Dark & Wet" => Some(Mood::DarkWet),
            "Dry & Cloudy" => Some(Mood::DryCloudy),
            "Bright & Wet" => Some(Mood::BrightWet),
            "Cold & Wet" => Some(Mood::ColdWet),
            _ => None,
        }
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short. Multiplies into P&L.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    /// The side that flattens a position opened on this side.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// The broker order verb for entering on this side.
    pub fn order_verb(&self) -> &'static str {
        match self {
            Side::Long => "buy",
            Side::Short => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(Side::Long),
            "short" => Ok(Side::Short),
            other => Err(format!("unknown side '{other}'")),
        }
    }
}

/// Take-profit / stop-loss percentages derived from lux. Computed fresh per
/// decision and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Percent gain at which a position is closed. 4–8.
    pub take_profit_pct: f64,
    /// Percent loss at which a position is closed. 2–4.
    pub stop_loss_pct: f64,
}

/// Latest bid/ask from the broker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub bid_price: f64,
    pub ask_price: f64,
}

/// One historical price bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Account snapshot from the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub cash: f64,
    pub equity: f64,
    pub buying_power: f64,
}

/// A position as the broker reports it (used for reconciliation and the
/// force-close sweep against live state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub qty: f64,
    pub side: Side,
    pub avg_entry_price: f64,
}

/// An open position owned by the ledger. Created by `open_trade` after broker
/// confirmation; leaves the open set exactly once, via `close_trade`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub shares: u32,
    pub tp_price: f64,
    pub sl_price: f64,
    pub entry_time: DateTime<Utc>,
    pub max_hold_minutes: i64,
    pub mood: Mood,
}

impl Position {
    /// Minutes the position has been open as of `now`.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.entry_time).num_minutes()
    }
}

/// Why a position was closed. Exactly one reason per close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    Timeout,
    Forced,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::TakeProfit => write!(f, "take-profit"),
            CloseReason::StopLoss => write!(f, "stop-loss"),
            CloseReason::Timeout => write!(f, "timeout"),
            CloseReason::Forced => write!(f, "forced"),
        }
    }
}

impl std::str::FromStr for CloseReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "take-profit" => Ok(CloseReason::TakeProfit),
            "stop-loss" => Ok(CloseReason::StopLoss),
            "timeout" => Ok(CloseReason::Timeout),
            "forced" => Ok(CloseReason::Forced),
            other => Err(format!("unknown close reason '{other}'")),
        }
    }
}

/// Immutable record of a completed round trip, appended to the closed history
/// and persisted by the trade store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub shares: u32,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub reason: CloseReason,
    pub mood: Mood,
    pub pnl: f64,
    pub pnl_pct: f64,
}

impl ClosedTrade {
    pub fn from_position(
        position: Position,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: CloseReason,
    ) -> Self {
        let pnl =
            (exit_price - position.entry_price) * position.shares as f64 * position.side.sign();
        let pnl_pct = if position.entry_price != 0.0 {
            (exit_price - position.entry_price) / position.entry_price
                * 100.0
                * position.side.sign()
        } else {
            0.0
        };
        Self {
            id: position.id,
            symbol: position.symbol,
            side: position.side,
            entry_price: position.entry_price,
            exit_price,
            shares: position.shares,
            entry_time: position.entry_time,
            exit_time,
            reason,
            mood: position.mood,
            pnl,
            pnl_pct,
        }
    }
}

/// Why an entry evaluation did not open a trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// No breakout or volume confirmation.
    NoSignal,
    /// The per-symbol open-position cap is already reached.
    SymbolCapReached,
    /// Computed share count came out below one tradable share.
    PositionSizeTooSmall,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoSignal => write!(f, "no breakout or low volume"),
            SkipReason::SymbolCapReached => write!(f, "open-position cap reached for symbol"),
            SkipReason::PositionSizeTooSmall => write!(f, "position size too small"),
        }
    }
}

/// Outcome of `evaluate_trade_entry`. Skips are side-effect free.
#[derive(Debug, Clone)]
pub enum EntryOutcome {
    Executed { position_id: String },
    Skipped { reason: SkipReason },
}

impl EntryOutcome {
    pub fn executed(&self) -> bool {
        matches!(self, EntryOutcome::Executed { .. })
    }
}

/// Events published for the display collaborator (status reporter, ticker).
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    MoodChanged { mood: Mood },
    MarketStatus { open: bool },
    TradeOpened { position: Position },
    TradeClosed { trade: ClosedTrade },
    EntrySkipped { symbol: String, reason: SkipReason },
}

/// Whether orders go to the real paper brokerage or the local simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}
