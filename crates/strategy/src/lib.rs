pub mod mood;
pub mod signal;
pub mod watchlist;

pub use mood::{determine_mood, should_skip_day, MoodThresholds};
pub use signal::{SignalConfig, SignalEvaluator};
pub use watchlist::{Watchlist, WatchlistFile};
