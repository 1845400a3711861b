use async_trait::async_trait;

use crate::{AccountInfo, Bar, BrokerPosition, Quote, Result, Side};

/// Abstraction over the brokerage connection.
///
/// `AlpacaClient` implements this against the paper-trading REST API;
/// `PaperBroker` implements it in memory for simulation and tests.
///
/// Only the `PositionLedger` in `crates/engine` submits orders. Every call may
/// fail; callers catch at this boundary and positions stay in their last
/// confirmed state.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Submit a market order and return the broker's order id. An `Err` here
    /// means nothing was recorded broker-side that the ledger should track.
    async fn place_order(&self, symbol: &str, qty: u32, side: Side) -> Result<String>;

    /// Latest bid/ask for a symbol.
    async fn last_quote(&self, symbol: &str) -> Result<Quote>;

    /// The most recent `n` price bars, oldest first.
    async fn previous_bars(&self, symbol: &str, n: usize) -> Result<Vec<Bar>>;

    /// Realized volatility estimate: (max − min) / mean over recent closes.
    async fn volatility(&self, symbol: &str) -> Result<f64>;

    /// Account snapshot.
    async fn account_info(&self) -> Result<AccountInfo>;

    /// Positions as the broker currently reports them.
    async fn current_positions(&self) -> Result<Vec<BrokerPosition>>;
}
