pub mod profile;

pub use profile::{
    max_hold_minutes, normalize, position_size, risk_profile, tp_and_sl, HUMIDITY_MAX,
    HUMIDITY_MIN, LUX_MAX, LUX_MIN, MAX_RISK_FRACTION, TEMP_MAX, TEMP_MIN,
};
