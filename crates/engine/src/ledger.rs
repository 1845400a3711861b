use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use common::{
    Broker, CloseReason, ClosedTrade, EntryOutcome, Error, LedgerEvent, Mood, Position, Result,
    SensorReading, Side, SkipReason,
};
use strategy::{SignalEvaluator, Watchlist};

use crate::store::TradeStore;

/// Ledger-level knobs, supplied from configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Balance the sizing formula works from.
    pub account_balance: f64,
    /// How many positions may be open on one symbol at once.
    pub max_open_per_symbol: usize,
}

/// The stateful core: owns the open-position set, orchestrates entries, and
/// monitors exits. A position transitions Open → Closed exactly once, with
/// exactly one reason.
///
/// The ledger is exclusively owned by the trader loop and mutated only within
/// a single tick; it is non-reentrant by design. No state is recorded until
/// the broker has acknowledged the corresponding order.
pub struct PositionLedger {
    broker: Arc<dyn Broker>,
    store: Arc<dyn TradeStore>,
    evaluator: SignalEvaluator,
    watchlist: Arc<Watchlist>,
    config: LedgerConfig,
    event_tx: broadcast::Sender<LedgerEvent>,
    pub(crate) open: Vec<Position>,
    closed: Vec<ClosedTrade>,
}

impl PositionLedger {
    pub fn new(
        broker: Arc<dyn Broker>,
        store: Arc<dyn TradeStore>,
        evaluator: SignalEvaluator,
        watchlist: Arc<Watchlist>,
        config: LedgerConfig,
        event_tx: broadcast::Sender<LedgerEvent>,
    ) -> Self {
        Self {
            broker,
            store,
            evaluator,
            watchlist,
            config,
            event_tx,
            open: Vec::new(),
            closed: Vec::new(),
        }
    }

    pub fn open_positions(&self) -> &[Position] {
        &self.open
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed
    }

    /// Evaluate an entry for one symbol under the current mood and reading.
    ///
    /// A skip has no side effects. Market-data failure is a skip, not an
    /// error; a broker rejection surfaces as `Err` and nothing enters the
    /// ledger.
    pub async fn evaluate_trade_entry(
        &mut self,
        symbol: &str,
        mood: Mood,
        reading: &SensorReading,
    ) -> Result<EntryOutcome> {
        let open_on_symbol = self.open.iter().filter(|p| p.symbol == symbol).count();
        if open_on_symbol >= self.config.max_open_per_symbol {
            return Ok(self.skip(symbol, SkipReason::SymbolCapReached));
        }

        let Some(side) = self.evaluator.entry_signal(symbol).await else {
            return Ok(self.skip(symbol, SkipReason::NoSignal));
        };

        let quote = match self.broker.last_quote(symbol).await {
            Ok(q) => q,
            Err(e) => {
                debug!(symbol, error = %e, "Quote unavailable at entry; skipping");
                return Ok(self.skip(symbol, SkipReason::NoSignal));
            }
        };
        // Enter at the price we would actually pay: ask for longs, bid for shorts.
        let entry_price = match side {
            Side::Long => quote.ask_price,
            Side::Short => quote.bid_price,
        };

        let profile = risk::risk_profile(reading.lux);
        let max_hold_minutes = risk::max_hold_minutes(reading.humidity_pct);

        // Realized volatility when the broker can supply it; otherwise the
        // mood's configured factor, so sizing never assumes a calm tape.
        let volatility = match self.broker.volatility(symbol).await {
            Ok(v) => v.clamp(0.0, 1.0),
            Err(e) => {
                debug!(symbol, error = %e, "Volatility unavailable; using mood factor");
                self.watchlist.volatility_factor(mood)
            }
        };

        let mut shares = risk::position_size(
            reading.temperature_c,
            self.config.account_balance,
            entry_price,
            profile.stop_loss_pct,
            volatility,
        )?;

        // Never size past the account itself.
        if shares as f64 * entry_price > self.config.account_balance {
            shares = (self.config.account_balance / entry_price).floor() as u32;
            if shares < 1 {
                return Ok(self.skip(symbol, SkipReason::PositionSizeTooSmall));
            }
        }

        let (tp_price, sl_price) =
            risk::tp_and_sl(entry_price, side, profile.take_profit_pct, profile.stop_loss_pct);

        let position = Position {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            entry_price,
            shares,
            tp_price,
            sl_price,
            entry_time: Utc::now(),
            max_hold_minutes,
            mood,
        };
        let position_id = position.id.clone();

        self.open_trade(position).await?;
        Ok(EntryOutcome::Executed { position_id })
    }

    /// Submit the entry order; the position joins the open set only on
    /// broker confirmation. A failed order never enters the ledger.
    pub async fn open_trade(&mut self, position: Position) -> Result<()> {
        let order_id = self
            .broker
            .place_order(&position.symbol, position.shares, position.side)
            .await?;

        info!(
            symbol = %position.symbol,
            side = %position.side,
            shares = position.shares,
            entry = position.entry_price,
            tp = position.tp_price,
            sl = position.sl_price,
            max_hold_min = position.max_hold_minutes,
            order_id = %order_id,
            "Trade opened"
        );
        let _ = self.event_tx.send(LedgerEvent::TradeOpened { position: position.clone() });
        self.open.push(position);
        Ok(())
    }

    /// Monitor every open position once, closing those that hit an exit
    /// condition. Runs every tick, market open or not.
    pub async fn update_open_trades(&mut self) {
        self.update_open_trades_at(Utc::now()).await;
    }

    /// Clock-injectable form of `update_open_trades`.
    pub async fn update_open_trades_at(&mut self, now: DateTime<Utc>) {
        // Decide first over a snapshot, then close, so one pass mutates the
        // open set exactly once per position.
        let mut decisions: Vec<(String, f64, CloseReason)> = Vec::new();

        for position in &self.open {
            let quote = match self.broker.last_quote(&position.symbol).await {
                Ok(q) => q,
                Err(e) => {
                    // Position stays in its prior confirmed state; retried next tick.
                    warn!(symbol = %position.symbol, error = %e, "Quote fetch failed; position untouched");
                    continue;
                }
            };
            // Conservative fill assumption: exits cross the spread.
            let exit_price = match position.side {
                Side::Long => quote.bid_price,
                Side::Short => quote.ask_price,
            };

            if let Some(reason) = exit_reason(position, exit_price, now) {
                decisions.push((position.id.clone(), exit_price, reason));
            }
        }

        for (id, exit_price, reason) in decisions {
            if let Err(e) = self.close_trade(&id, exit_price, reason).await {
                warn!(position_id = %id, error = %e, "Close failed; position remains open");
            }
        }
    }

    /// Flatten one position and record the round trip.
    ///
    /// The opposite-side order goes out first; only on confirmation does the
    /// position leave the open set. Persistence is best effort and never
    /// rolls back the state transition.
    pub async fn close_trade(
        &mut self,
        position_id: &str,
        exit_price: f64,
        reason: CloseReason,
    ) -> Result<ClosedTrade> {
        let idx = self
            .open
            .iter()
            .position(|p| p.id == position_id)
            .ok_or_else(|| Error::Other(format!("no open position with id {position_id}")))?;

        {
            let position = &self.open[idx];
            self.broker
                .place_order(&position.symbol, position.shares, position.side.opposite())
                .await?;
        }

        let position = self.open.remove(idx);
        let trade = ClosedTrade::from_position(position, exit_price, Utc::now(), reason);

        info!(
            symbol = %trade.symbol,
            side = %trade.side,
            exit = trade.exit_price,
            pnl = trade.pnl,
            pnl_pct = trade.pnl_pct,
            reason = %trade.reason,
            "Trade closed"
        );

        if let Err(e) = self.store.record_closed_trade(&trade).await {
            // Logged and dropped: the trade is closed whether or not the row landed.
            warn!(symbol = %trade.symbol, error = %e, "Failed to persist closed trade");
        }

        let _ = self.event_tx.send(LedgerEvent::TradeClosed { trade: trade.clone() });
        self.closed.push(trade.clone());
        Ok(trade)
    }

    /// Close every open position with reason `Forced`. Used at shutdown or
    /// market close; one failing position does not stop the sweep.
    pub async fn force_close_all(&mut self) {
        let ids: Vec<String> = self.open.iter().map(|p| p.id.clone()).collect();
        info!(count = ids.len(), "Force-closing all open positions");

        for id in ids {
            let Some(position) = self.open.iter().find(|p| p.id == id) else {
                continue;
            };
            let exit_price = match self.broker.last_quote(&position.symbol).await {
                Ok(q) => match position.side {
                    Side::Long => q.bid_price,
                    Side::Short => q.ask_price,
                },
                Err(e) => {
                    warn!(symbol = %position.symbol, error = %e, "No quote for forced close; position stays open");
                    continue;
                }
            };
            if let Err(e) = self.close_trade(&id, exit_price, CloseReason::Forced).await {
                warn!(position_id = %id, error = %e, "Forced close failed; position stays open");
            }
        }
    }

    fn skip(&self, symbol: &str, reason: SkipReason) -> EntryOutcome {
        debug!(symbol, %reason, "Entry skipped");
        let _ = self.event_tx.send(LedgerEvent::EntrySkipped {
            symbol: symbol.to_string(),
            reason: reason.clone(),
        });
        EntryOutcome::Skipped { reason }
    }
}

/// First matching exit condition wins: take-profit, then stop-loss, then
/// timeout. A position never closes for two reasons.
fn exit_reason(position: &Position, exit_price: f64, now: DateTime<Utc>) -> Option<CloseReason> {
    let tp_hit = match position.side {
        Side::Long => exit_price >= position.tp_price,
        Side::Short => exit_price <= position.tp_price,
    };
    if tp_hit {
        return Some(CloseReason::TakeProfit);
    }

    let sl_hit = match position.side {
        Side::Long => exit_price <= position.sl_price,
        Side::Short => exit_price >= position.sl_price,
    };
    if sl_hit {
        return Some(CloseReason::StopLoss);
    }

    if position.elapsed_minutes(now) > position.max_hold_minutes {
        return Some(CloseReason::Timeout);
    }

    None
}
