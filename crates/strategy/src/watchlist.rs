use std::collections::HashMap;

use serde::Deserialize;
use tracing::info;

use common::{Error, Mood, Result};

/// Volatility factor applied when a mood has no explicit entry.
pub const DEFAULT_VOLATILITY_FACTOR: f64 = 0.4;

/// The mood → equities mapping, loaded from TOML.
///
/// Example `config/watchlist.toml`:
/// ```toml
/// [[mood]]
/// label = "Bright & Dry"
/// symbols = ["MSFT", "GOOG"]
/// volatility_factor = 0.2
///
/// [[mood]]
/// label = "Cold & Wet"
/// symbols = []
/// volatility_factor = 0.6
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct WatchlistFile {
    #[serde(rename = "mood")]
    pub moods: Vec<MoodEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoodEntry {
    /// Canonical mood label, e.g. "Bright & Dry".
    pub label: String,
    /// Candidate symbols for this mood. Empty means the mood never trades.
    pub symbols: Vec<String>,
    /// Expected choppiness of this mood's names, in [0, 1].
    #[serde(default)]
    pub volatility_factor: Option<f64>,
}

/// Parsed, keyed form of the watchlist file.
#[derive(Debug, Clone)]
pub struct Watchlist {
    symbols: HashMap<Mood, Vec<String>>,
    volatility: HashMap<Mood, f64>,
}

impl Watchlist {
    /// Load and validate from a TOML file. Unknown mood labels are a
    /// configuration error, not a silent skip.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read watchlist at '{path}': {e}"))
        })?;
        let file: WatchlistFile = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse watchlist at '{path}': {e}"))
        })?;
        Self::from_file(file)
    }

    pub fn from_file(file: WatchlistFile) -> Result<Self> {
        let mut symbols = HashMap::new();
        let mut volatility = HashMap::new();

        for entry in file.moods {
            let mood = Mood::from_label(&entry.label).ok_or_else(|| {
                Error::Config(format!("unknown mood label '{}' in watchlist", entry.label))
            })?;
            info!(mood = %mood, symbols = ?entry.symbols, "Registered watchlist mood");
            symbols.insert(mood, entry.symbols);
            if let Some(factor) = entry.volatility_factor {
                volatility.insert(mood, factor.clamp(0.0, 1.0));
            }
        }

        Ok(Self { symbols, volatility })
    }

    /// Candidate symbols for a mood. `Unknown` and unmapped moods yield
    /// nothing, which suppresses entries for the tick.
    pub fn symbols_for(&self, mood: Mood) -> &[String] {
        self.symbols.get(&mood).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Per-mood volatility factor, used when the broker's realized
    /// volatility is unavailable.
    pub fn volatility_factor(&self, mood: Mood) -> f64 {
        self.volatility
            .get(&mood)
            .copied()
            .unwrap_or(DEFAULT_VOLATILITY_FACTOR)
    }

    /// Whether any symbol trades under this mood.
    pub fn is_tradable(&self, mood: Mood) -> bool {
        !self.symbols_for(mood).is_empty()
    }
}
