use common::{Config, Mood, SensorReading};

/// Extreme darkness/cold guard: below this lux...
pub const SKIP_MAX_LUX: f64 = 200.0;
/// ...above this humidity...
pub const SKIP_MIN_HUMIDITY: f64 = 80.0;
/// ...and below this temperature, trading is suppressed for the day.
pub const SKIP_MAX_TEMP: f64 = 7.0;

/// The classification thresholds, supplied by configuration. Each threshold
/// exists exactly once; no call site carries its own literal.
#[derive(Debug, Clone, Copy)]
pub struct MoodThresholds {
    /// Lux above which the day counts as bright.
    pub bright_lux: f64,
    /// Temperature (°C) above which the day counts as hot.
    pub hot_temp: f64,
    /// Humidity (%) below which the day counts as dry.
    pub dry_humidity: f64,
}

impl MoodThresholds {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            bright_lux: cfg.bright_lux_threshold,
            hot_temp: cfg.hot_temp_threshold,
            dry_humidity: cfg.dry_humidity_threshold,
        }
    }
}

/// The fixed mood table: (bright, hot, dry) → Mood, first match wins.
/// `None` in the hot slot means the entry matches either temperature.
///
/// Order matters and mirrors the original classification cascade; the
/// bright/hot/wet combination has no entry and falls through to `Unknown`.
const MOOD_TABLE: &[(bool, Option<bool>, bool, Mood)] = &[
    (true, Some(true), true, Mood::HotDry),
    (true, Some(false), true, Mood::ColdBright),
    (false, Some(false), false, Mood::ColdWet),
    (false, Some(true), false, Mood::HotHumid),
    (true, Some(false), false, Mood::BrightWet),
    (false, None, true, Mood::DryCloudy),
    (true, None, true, Mood::BrightDry),
    (false, None, false, Mood::DarkWet),
];

/// Classify a reading into a mood. Total: every input yields exactly one
/// mood, with `Mood::Unknown` as the documented fallback.
pub fn determine_mood(thresholds: &MoodThresholds, reading: &SensorReading) -> Mood {
    let bright = reading.lux > thresholds.bright_lux;
    let hot = reading.temperature_c > thresholds.hot_temp;
    let dry = reading.humidity_pct < thresholds.dry_humidity;

    MOOD_TABLE
        .iter()
        .find(|(b, h, d, _)| *b == bright && h.map_or(true, |h| h == hot) && *d == dry)
        .map(|(_, _, _, mood)| *mood)
        .unwrap_or(Mood::Unknown)
}

/// True when the day is too dark, humid and cold to trade at all,
/// regardless of mood.
pub fn should_skip_day(reading: &SensorReading) -> bool {
    reading.lux < SKIP_MAX_LUX
        && reading.humidity_pct > SKIP_MIN_HUMIDITY
        && reading.temperature_c < SKIP_MAX_TEMP
}
