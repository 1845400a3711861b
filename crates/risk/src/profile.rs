use common::{Error, Result, RiskProfile, Side};

/// Lux normalization domain. A reading at or above the max is a maximally
/// bright day and maps to the most aggressive profile.
pub const LUX_MIN: f64 = 0.0;
pub const LUX_MAX: f64 = 50_000.0;

/// Humidity normalization domain (relative humidity percent).
pub const HUMIDITY_MIN: f64 = 0.0;
pub const HUMIDITY_MAX: f64 = 100.0;

/// Temperature normalization domain in °C.
pub const TEMP_MIN: f64 = 0.0;
pub const TEMP_MAX: f64 = 40.0;

/// Fraction of the account balance risked per trade on the hottest day.
pub const MAX_RISK_FRACTION: f64 = 0.03;

/// Normalize `value` into [0, 1] over [min, max], clamped at both ends.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Lux → take-profit / stop-loss percentages.
///
/// The brighter the day, the wider the tolerated swing: TP runs 4–8%,
/// SL runs 2–4%, both linear in normalized lux.
pub fn risk_profile(lux: f64) -> RiskProfile {
    let lux_norm = normalize(lux, LUX_MIN, LUX_MAX);
    RiskProfile {
        take_profit_pct: 4.0 + 4.0 * lux_norm,
        stop_loss_pct: 2.0 + 2.0 * lux_norm,
    }
}

/// Humidity → maximum holding duration. Stickier air, stickier position:
/// 5 minutes on a bone-dry day up to 45 at full saturation.
pub fn max_hold_minutes(humidity_pct: f64) -> i64 {
    let humid_norm = normalize(humidity_pct, HUMIDITY_MIN, HUMIDITY_MAX);
    (5.0 + 40.0 * humid_norm).floor() as i64
}

/// Temperature → share count.
///
/// The risk budget is `account_balance * 3% * normalized temperature`; the
/// per-share risk is the distance to the stop. `volatility_factor` in [0, 1]
/// shrinks the size on choppy symbols (values outside the range are clamped).
/// Never returns fewer than one share.
pub fn position_size(
    temp_c: f64,
    account_balance: f64,
    entry_price: f64,
    stop_loss_pct: f64,
    volatility_factor: f64,
) -> Result<u32> {
    if entry_price <= 0.0 {
        return Err(Error::InvalidRiskInput(format!(
            "entry price must be positive, got {entry_price}"
        )));
    }
    if stop_loss_pct <= 0.0 {
        return Err(Error::InvalidRiskInput(format!(
            "stop-loss percentage must be positive, got {stop_loss_pct}"
        )));
    }

    let temp_norm = normalize(temp_c, TEMP_MIN, TEMP_MAX);
    let volatility = volatility_factor.clamp(0.0, 1.0);

    let max_risk_per_trade = account_balance * MAX_RISK_FRACTION * temp_norm;
    let per_share_risk = entry_price * (stop_loss_pct / 100.0);
    let raw_shares = max_risk_per_trade / per_share_risk;
    let adjusted = (raw_shares * (1.0 - volatility)).floor();

    Ok(adjusted.max(1.0) as u32)
}

/// Absolute take-profit and stop-loss prices for an entry at `price`.
/// For longs TP sits above and SL below the entry; for shorts the signs invert.
pub fn tp_and_sl(price: f64, side: Side, take_profit_pct: f64, stop_loss_pct: f64) -> (f64, f64) {
    match side {
        Side::Long => (
            price * (1.0 + take_profit_pct / 100.0),
            price * (1.0 - stop_loss_pct / 100.0),
        ),
        Side::Short => (
            price * (1.0 - take_profit_pct / 100.0),
            price * (1.0 + stop_loss_pct / 100.0),
        ),
    }
}
