use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use common::{Broker, Side};

/// Tunables for the breakout entry heuristic.
#[derive(Debug, Clone)]
pub struct SignalConfig {
    /// How many recent bars to consult.
    pub lookback_bars: usize,
    /// Ask within 0.5% of the recent high (or bid within 0.5% of the recent
    /// low) counts as a breakout.
    pub breakout_tolerance: f64,
    /// Latest bar volume must exceed this multiple of the lookback average.
    pub volume_ratio: f64,
    /// Opt-in policy: when no breakout fires, enter anyway on a fair coin
    /// flip. Off by default and never enabled implicitly.
    pub random_fallback: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            lookback_bars: 5,
            breakout_tolerance: 0.005,
            volume_ratio: 1.1,
            random_fallback: false,
        }
    }
}

/// Produces directional entry signals from recent bars and a live quote.
///
/// Market-data failures are caught here and reported as "no signal"; they
/// never propagate to the ledger.
pub struct SignalEvaluator {
    broker: Arc<dyn Broker>,
    config: SignalConfig,
}

impl SignalEvaluator {
    pub fn new(broker: Arc<dyn Broker>, config: SignalConfig) -> Self {
        Self { broker, config }
    }

    /// Evaluate the entry heuristic for one symbol.
    ///
    /// Long when the ask presses the recent high on above-average volume;
    /// short when the bid presses the recent low on above-average volume;
    /// otherwise none (unless the random fallback is explicitly enabled).
    pub async fn entry_signal(&self, symbol: &str) -> Option<Side> {
        let bars = match self.broker.previous_bars(symbol, self.config.lookback_bars).await {
            Ok(bars) if !bars.is_empty() => bars,
            Ok(_) => {
                debug!(symbol, "No bars available; no signal");
                return None;
            }
            Err(e) => {
                warn!(symbol, error = %e, "Bar fetch failed; treating as no signal");
                return None;
            }
        };

        let quote = match self.broker.last_quote(symbol).await {
            Ok(q) => q,
            Err(e) => {
                warn!(symbol, error = %e, "Quote fetch failed; treating as no signal");
                return None;
            }
        };

        let prev_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let prev_low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let avg_volume = bars.iter().map(|b| b.volume).sum::<f64>() / bars.len() as f64;
        let current_volume = bars.last().map(|b| b.volume).unwrap_or(0.0);

        debug!(
            symbol,
            ask = quote.ask_price,
            bid = quote.bid_price,
            prev_high,
            prev_low,
            avg_volume,
            current_volume,
            "Evaluating breakout"
        );

        let volume_confirms = current_volume > self.config.volume_ratio * avg_volume;

        if quote.ask_price > prev_high * (1.0 - self.config.breakout_tolerance) && volume_confirms {
            return Some(Side::Long);
        }
        if quote.bid_price < prev_low * (1.0 + self.config.breakout_tolerance) && volume_confirms {
            return Some(Side::Short);
        }

        if self.config.random_fallback {
            // Explicit 50% coin-flip entry, long or short with equal odds.
            let mut rng = rand::thread_rng();
            if rng.gen_bool(0.5) {
                let side = if rng.gen_bool(0.5) { Side::Long } else { Side::Short };
                debug!(symbol, %side, "Random fallback entry");
                return Some(side);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{AccountInfo, Bar, BrokerPosition, Error, Quote, Result};

    /// Broker double with fixed bars/quote; order methods are unreachable here.
    struct FixtureBroker {
        bars: Vec<Bar>,
        quote: Quote,
        fail_market_data: bool,
    }

    #[async_trait]
    impl Broker for FixtureBroker {
        async fn place_order(&self, _symbol: &str, _qty: u32, _side: Side) -> Result<String> {
            unreachable!("signal evaluation never places orders")
        }

        async fn last_quote(&self, _symbol: &str) -> Result<Quote> {
            if self.fail_market_data {
                return Err(Error::MarketData("feed down".into()));
            }
            Ok(self.quote)
        }

        async fn previous_bars(&self, _symbol: &str, _n: usize) -> Result<Vec<Bar>> {
            if self.fail_market_data {
                return Err(Error::MarketData("feed down".into()));
            }
            Ok(self.bars.clone())
        }

        async fn volatility(&self, _symbol: &str) -> Result<f64> {
            Ok(0.1)
        }

        async fn account_info(&self) -> Result<AccountInfo> {
            unreachable!()
        }

        async fn current_positions(&self) -> Result<Vec<BrokerPosition>> {
            Ok(vec![])
        }
    }

    fn bar(high: f64, low: f64, volume: f64) -> Bar {
        Bar { open: low, high, low, close: high, volume }
    }

    fn evaluator(bars: Vec<Bar>, quote: Quote) -> SignalEvaluator {
        SignalEvaluator::new(
            Arc::new(FixtureBroker { bars, quote, fail_market_data: false }),
            SignalConfig::default(),
        )
    }

    #[tokio::test]
    async fn breakout_above_high_with_volume_goes_long() {
        // prev high 102; ask 102.5 > 102 * 0.995; last volume 250 > 1.1 * avg(~170)
        let bars = vec![bar(101.0, 99.0, 150.0), bar(102.0, 100.0, 110.0), bar(101.5, 100.5, 250.0)];
        let quote = Quote { bid_price: 102.3, ask_price: 102.5 };
        assert_eq!(evaluator(bars, quote).entry_signal("MSFT").await, Some(Side::Long));
    }

    #[tokio::test]
    async fn breakdown_below_low_with_volume_goes_short() {
        let bars = vec![bar(101.0, 99.0, 150.0), bar(100.5, 98.5, 110.0), bar(100.0, 98.6, 250.0)];
        let quote = Quote { bid_price: 98.0, ask_price: 98.2 };
        assert_eq!(evaluator(bars, quote).entry_signal("MSFT").await, Some(Side::Short));
    }

    #[tokio::test]
    async fn breakout_without_volume_is_no_signal() {
        // Price presses the high but the latest bar volume is below average.
        let bars = vec![bar(101.0, 99.0, 300.0), bar(102.0, 100.0, 300.0), bar(101.5, 100.5, 100.0)];
        let quote = Quote { bid_price: 102.3, ask_price: 102.5 };
        assert_eq!(evaluator(bars, quote).entry_signal("MSFT").await, None);
    }

    #[tokio::test]
    async fn quiet_tape_is_no_signal() {
        let bars = vec![bar(101.0, 99.0, 150.0), bar(102.0, 100.0, 150.0), bar(101.5, 100.5, 400.0)];
        // Mid-range quote, away from both extremes.
        let quote = Quote { bid_price: 100.6, ask_price: 100.7 };
        assert_eq!(evaluator(bars, quote).entry_signal("MSFT").await, None);
    }

    #[tokio::test]
    async fn market_data_failure_is_no_signal_not_error() {
        let broker = Arc::new(FixtureBroker {
            bars: vec![],
            quote: Quote { bid_price: 0.0, ask_price: 0.0 },
            fail_market_data: true,
        });
        let evaluator = SignalEvaluator::new(broker, SignalConfig::default());
        assert_eq!(evaluator.entry_signal("MSFT").await, None);
    }

    #[tokio::test]
    async fn random_fallback_stays_off_by_default() {
        let config = SignalConfig::default();
        assert!(!config.random_fallback);

        // With a quiet tape and the fallback off, repeated evaluations never enter.
        let bars = vec![bar(101.0, 99.0, 150.0), bar(102.0, 100.0, 150.0), bar(101.5, 100.5, 400.0)];
        let quote = Quote { bid_price: 100.6, ask_price: 100.7 };
        let evaluator = evaluator(bars, quote);
        for _ in 0..20 {
            assert_eq!(evaluator.entry_signal("MSFT").await, None);
        }
    }
}
