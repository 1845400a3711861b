pub mod alpaca;
pub mod clock;
pub mod feed;
pub mod ledger;
pub mod lifecycle;
pub mod replay;
pub mod store;

pub use alpaca::AlpacaClient;
pub use feed::SensorStream;
pub use ledger::{LedgerConfig, PositionLedger};
pub use lifecycle::Trader;
pub use replay::ReplayFeed;
pub use store::{SqliteStore, TradeStore};
