use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{AccountInfo, Bar, Broker, BrokerPosition, Error, Quote, Result, Side};

const TRADING_URL: &str = "https://paper-api.alpaca.markets";
const DATA_URL: &str = "https://data.alpaca.markets";

/// REST client for Alpaca's paper-trading brokerage. Used for order
/// placement, quotes, bars, and account queries.
pub struct AlpacaClient {
    api_key: String,
    secret: String,
    http: Client,
}

impl AlpacaClient {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    async fn get(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.secret)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    async fn post_json<T: Serialize>(&self, url: &str, payload: &T) -> Result<String> {
        let resp = self
            .http
            .post(url)
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.secret)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl Broker for AlpacaClient {
    async fn place_order(&self, symbol: &str, qty: u32, side: Side) -> Result<String> {
        let payload = OrderRequest {
            symbol,
            qty: qty.to_string(),
            side: side.order_verb(),
            order_type: "market",
            time_in_force: "day",
        };

        debug!(symbol, %side, qty, "Submitting order to Alpaca");
        let body = self
            .post_json(&format!("{TRADING_URL}/v2/orders"), &payload)
            .await
            .map_err(|e| Error::OrderExecution(e.to_string()))?;

        let resp: OrderResponse = serde_json::from_str(&body)?;
        Ok(resp.id)
    }

    async fn last_quote(&self, symbol: &str) -> Result<Quote> {
        let body = self
            .get(&format!("{DATA_URL}/v2/stocks/{symbol}/quotes/latest"))
            .await
            .map_err(|e| Error::MarketData(e.to_string()))?;

        let resp: LatestQuoteResponse = serde_json::from_str(&body)?;
        Ok(Quote {
            bid_price: resp.quote.bid_price,
            ask_price: resp.quote.ask_price,
        })
    }

    async fn previous_bars(&self, symbol: &str, n: usize) -> Result<Vec<Bar>> {
        let body = self
            .get(&format!(
                "{DATA_URL}/v2/stocks/{symbol}/bars?timeframe=5Min&limit={n}"
            ))
            .await
            .map_err(|e| Error::MarketData(e.to_string()))?;

        let resp: BarsResponse = serde_json::from_str(&body)?;
        Ok(resp
            .bars
            .unwrap_or_default()
            .into_iter()
            .map(|b| Bar {
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
                volume: b.volume,
            })
            .collect())
    }

    async fn volatility(&self, symbol: &str) -> Result<f64> {
        // Range over mean of the last five closes.
        let bars = self.previous_bars(symbol, 5).await?;
        if bars.is_empty() {
            return Err(Error::MarketData(format!("no bars for volatility of {symbol}")));
        }
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let mean = closes.iter().sum::<f64>() / closes.len() as f64;
        if mean == 0.0 {
            return Err(Error::MarketData(format!("zero mean close for {symbol}")));
        }
        let high = closes.iter().cloned().fold(f64::MIN, f64::max);
        let low = closes.iter().cloned().fold(f64::MAX, f64::min);
        Ok((high - low) / mean)
    }

    async fn account_info(&self) -> Result<AccountInfo> {
        let body = self.get(&format!("{TRADING_URL}/v2/account")).await?;
        let resp: AccountResponse = serde_json::from_str(&body)?;
        Ok(AccountInfo {
            cash: parse_money(&resp.cash)?,
            equity: parse_money(&resp.equity)?,
            buying_power: parse_money(&resp.buying_power)?,
        })
    }

    async fn current_positions(&self) -> Result<Vec<BrokerPosition>> {
        let body = self.get(&format!("{TRADING_URL}/v2/positions")).await?;
        let resp: Vec<PositionResponse> = serde_json::from_str(&body)?;

        let mut positions = Vec::with_capacity(resp.len());
        for p in resp {
            positions.push(BrokerPosition {
                symbol: p.symbol,
                qty: parse_money(&p.qty)?.abs(),
                side: if p.side == "short" { Side::Short } else { Side::Long },
                avg_entry_price: parse_money(&p.avg_entry_price)?,
            });
        }
        Ok(positions)
    }
}

// Alpaca serializes money and quantities as strings.
fn parse_money(raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|e| Error::Http(format!("unparseable numeric field '{raw}': {e}")))
}

// ─── Alpaca wire types ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct OrderRequest<'a> {
    symbol: &'a str,
    qty: String,
    side: &'a str,
    #[serde(rename = "type")]
    order_type: &'a str,
    time_in_force: &'a str,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
}

#[derive(Deserialize)]
struct LatestQuoteResponse {
    quote: QuoteData,
}

#[derive(Deserialize)]
struct QuoteData {
    #[serde(rename = "bp")]
    bid_price: f64,
    #[serde(rename = "ap")]
    ask_price: f64,
}

#[derive(Deserialize)]
struct BarsResponse {
    bars: Option<Vec<BarData>>,
}

#[derive(Deserialize)]
struct BarData {
    #[serde(rename = "o")]
    open: f64,
    #[serde(rename = "h")]
    high: f64,
    #[serde(rename = "l")]
    low: f64,
    #[serde(rename = "c")]
    close: f64,
    #[serde(rename = "v")]
    volume: f64,
}

#[derive(Deserialize)]
struct AccountResponse {
    cash: String,
    equity: String,
    buying_power: String,
}

#[derive(Deserialize)]
struct PositionResponse {
    symbol: String,
    qty: String,
    side: String,
    avg_entry_price: String,
}
