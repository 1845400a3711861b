use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    AccountInfo, Bar, Broker, BrokerPosition, Error, Quote, Result, Side,
};

/// Simulated brokerage for paper mode and tests.
///
/// Quotes and bars are seeded by the caller; fills happen at the quoted side
/// (buys lift the ask, sells hit the bid). No real orders ever leave the
/// process.
pub struct PaperBroker {
    cash: Arc<RwLock<f64>>,
    /// Net broker-side position per symbol (signed shares).
    positions: Arc<RwLock<HashMap<String, f64>>>,
    quotes: Arc<RwLock<HashMap<String, Quote>>>,
    bars: Arc<RwLock<HashMap<String, Vec<Bar>>>>,
    /// When set, every order is rejected. Lets tests exercise broker failure.
    reject_orders: Arc<RwLock<bool>>,
}

impl PaperBroker {
    pub fn new(initial_cash: f64) -> Self {
        info!(cash = initial_cash, "PaperBroker initialized");
        Self {
            cash: Arc::new(RwLock::new(initial_cash)),
            positions: Arc::new(RwLock::new(HashMap::new())),
            quotes: Arc::new(RwLock::new(HashMap::new())),
            bars: Arc::new(RwLock::new(HashMap::new())),
            reject_orders: Arc::new(RwLock::new(false)),
        }
    }

    /// Seed or update the quote for a symbol.
    pub async fn set_quote(&self, symbol: &str, bid_price: f64, ask_price: f64) {
        self.quotes
            .write()
            .await
            .insert(symbol.to_string(), Quote { bid_price, ask_price });
    }

    /// Seed the bar history for a symbol, oldest first.
    pub async fn set_bars(&self, symbol: &str, bars: Vec<Bar>) {
        self.bars.write().await.insert(symbol.to_string(), bars);
    }

    /// Make all subsequent orders fail, as a rejecting brokerage would.
    pub async fn set_reject_orders(&self, reject: bool) {
        *self.reject_orders.write().await = reject;
    }

    /// Net signed share count the broker holds for a symbol.
    pub async fn net_position(&self, symbol: &str) -> f64 {
        self.positions.read().await.get(symbol).copied().unwrap_or(0.0)
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn place_order(&self, symbol: &str, qty: u32, side: Side) -> Result<String> {
        if *self.reject_orders.read().await {
            return Err(Error::OrderExecution(format!(
                "paper broker rejected {side} {qty} {symbol}"
            )));
        }

        let quote = self.last_quote(symbol).await?;
        // Buys lift the ask, sells hit the bid.
        let (fill_price, signed_qty) = match side {
            Side::Long => (quote.ask_price, qty as f64),
            Side::Short => (quote.bid_price, -(qty as f64)),
        };

        {
            let mut positions = self.positions.write().await;
            *positions.entry(symbol.to_string()).or_insert(0.0) += signed_qty;
        }
        {
            let mut cash = self.cash.write().await;
            *cash -= fill_price * signed_qty;
        }

        let order_id = uuid::Uuid::new_v4().to_string();
        debug!(symbol, %side, qty, fill = fill_price, order_id = %order_id, "Paper fill simulated");
        Ok(order_id)
    }

    async fn last_quote(&self, symbol: &str) -> Result<Quote> {
        self.quotes
            .read()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::MarketData(format!("no quote seeded for {symbol}")))
    }

    async fn previous_bars(&self, symbol: &str, n: usize) -> Result<Vec<Bar>> {
        let bars = self.bars.read().await;
        let history = bars
            .get(symbol)
            .ok_or_else(|| Error::MarketData(format!("no bars seeded for {symbol}")))?;
        let start = history.len().saturating_sub(n);
        Ok(history[start..].to_vec())
    }

    async fn volatility(&self, symbol: &str) -> Result<f64> {
        let bars = self.previous_bars(symbol, 5).await?;
        if bars.is_empty() {
            return Err(Error::MarketData(format!("no bars for volatility of {symbol}")));
        }
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let mean = closes.iter().sum::<f64>() / closes.len() as f64;
        let high = closes.iter().cloned().fold(f64::MIN, f64::max);
        let low = closes.iter().cloned().fold(f64::MAX, f64::min);
        if mean == 0.0 {
            return Err(Error::MarketData(format!("zero mean close for {symbol}")));
        }
        Ok((high - low) / mean)
    }

    async fn account_info(&self) -> Result<AccountInfo> {
        let cash = *self.cash.read().await;
        // Equity marks open positions at the latest mid.
        let mut equity = cash;
        let positions = self.positions.read().await;
        let quotes = self.quotes.read().await;
        for (symbol, qty) in positions.iter() {
            if let Some(q) = quotes.get(symbol) {
                equity += qty * (q.bid_price + q.ask_price) / 2.0;
            }
        }
        Ok(AccountInfo { cash, equity, buying_power: cash })
    }

    async fn current_positions(&self) -> Result<Vec<BrokerPosition>> {
        let positions = self.positions.read().await;
        Ok(positions
            .iter()
            .filter(|(_, qty)| **qty != 0.0)
            .map(|(symbol, qty)| BrokerPosition {
                symbol: symbol.clone(),
                qty: qty.abs(),
                side: if *qty >= 0.0 { Side::Long } else { Side::Short },
                avg_entry_price: 0.0, // not tracked by the simulator
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(close: f64, volume: f64) -> Bar {
        Bar { open: close, high: close, low: close, close, volume }
    }

    #[tokio::test]
    async fn buy_fills_at_ask_and_updates_position() {
        let broker = PaperBroker::new(10_000.0);
        broker.set_quote("MSFT", 99.0, 100.0).await;

        broker.place_order("MSFT", 10, Side::Long).await.unwrap();

        assert_eq!(broker.net_position("MSFT").await, 10.0);
        let account = broker.account_info().await.unwrap();
        assert!((account.cash - 9_000.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn sell_fills_at_bid_and_flattens() {
        let broker = PaperBroker::new(10_000.0);
        broker.set_quote("MSFT", 99.0, 100.0).await;

        broker.place_order("MSFT", 10, Side::Long).await.unwrap();
        broker.place_order("MSFT", 10, Side::Short).await.unwrap();

        assert_eq!(broker.net_position("MSFT").await, 0.0);
        assert!(broker.current_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn order_without_quote_is_market_data_error() {
        let broker = PaperBroker::new(10_000.0);
        let err = broker.place_order("NOPE", 1, Side::Long).await.unwrap_err();
        assert!(matches!(err, Error::MarketData(_)));
    }

    #[tokio::test]
    async fn rejected_order_leaves_no_position() {
        let broker = PaperBroker::new(10_000.0);
        broker.set_quote("MSFT", 99.0, 100.0).await;
        broker.set_reject_orders(true).await;

        let err = broker.place_order("MSFT", 10, Side::Long).await.unwrap_err();
        assert!(matches!(err, Error::OrderExecution(_)));
        assert_eq!(broker.net_position("MSFT").await, 0.0);
    }

    #[tokio::test]
    async fn volatility_is_range_over_mean() {
        let broker = PaperBroker::new(10_000.0);
        broker
            .set_bars("MSFT", vec![bar(95.0, 1.0), bar(100.0, 1.0), bar(105.0, 1.0)])
            .await;

        let vol = broker.volatility("MSFT").await.unwrap();
        assert!((vol - 10.0 / 100.0).abs() < 1e-9);
    }
}
