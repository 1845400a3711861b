use common::Side;
use proptest::prelude::*;
use risk::{max_hold_minutes, position_size, risk_profile, tp_and_sl};

proptest! {
    /// TP stays in [4, 8] and SL in [2, 4] over the whole lux domain.
    #[test]
    fn risk_profile_is_bounded(lux in 0.0f64..=50_000.0f64) {
        let profile = risk_profile(lux);
        prop_assert!((4.0..=8.0).contains(&profile.take_profit_pct));
        prop_assert!((2.0..=4.0).contains(&profile.stop_loss_pct));
    }

    /// Brighter readings never tighten the profile.
    #[test]
    fn risk_profile_is_monotone(lux_a in 0.0f64..=50_000.0f64, lux_b in 0.0f64..=50_000.0f64) {
        let (lo, hi) = if lux_a <= lux_b { (lux_a, lux_b) } else { (lux_b, lux_a) };
        let dim = risk_profile(lo);
        let bright = risk_profile(hi);
        prop_assert!(bright.take_profit_pct >= dim.take_profit_pct);
        prop_assert!(bright.stop_loss_pct >= dim.stop_loss_pct);
    }

    /// Hold duration stays in [5, 45] minutes and never shrinks as humidity rises.
    #[test]
    fn max_hold_is_bounded_and_monotone(h_a in 0.0f64..=100.0f64, h_b in 0.0f64..=100.0f64) {
        let (lo, hi) = if h_a <= h_b { (h_a, h_b) } else { (h_b, h_a) };
        let dry = max_hold_minutes(lo);
        let humid = max_hold_minutes(hi);
        prop_assert!((5..=45).contains(&dry));
        prop_assert!((5..=45).contains(&humid));
        prop_assert!(humid >= dry);
    }

    /// Sizing never returns fewer than one share on valid inputs, and never
    /// panics anywhere in the domain.
    #[test]
    fn position_size_at_least_one_share(
        temp in -20.0f64..=60.0f64,
        balance in 0.0f64..=1_000_000.0f64,
        entry in 0.01f64..=10_000.0f64,
        sl in 0.01f64..=4.0f64,
        vol in -1.0f64..=2.0f64,
    ) {
        let shares = position_size(temp, balance, entry, sl, vol).unwrap();
        prop_assert!(shares >= 1);
    }

    /// Longs are bracketed TP > entry > SL; shorts invert to SL > entry > TP.
    #[test]
    fn tp_sl_brackets_entry(
        price in 0.01f64..=10_000.0f64,
        tp_pct in 4.0f64..=8.0f64,
        sl_pct in 2.0f64..=4.0f64,
    ) {
        let (tp, sl) = tp_and_sl(price, Side::Long, tp_pct, sl_pct);
        prop_assert!(tp > price && price > sl);

        let (tp, sl) = tp_and_sl(price, Side::Short, tp_pct, sl_pct);
        prop_assert!(sl > price && price > tp);
    }
}
