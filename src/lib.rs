pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod pricing;
pub mod source;
pub mod store;

pub use config::Config;
pub use domain::{Address, Amount, ChainEvent, Decimal, EventKind, EventMeta, Timestamp};
pub use engine::PointsManager;
pub use error::IndexerError;
pub use handlers::{BlockClock, BlockReport, BlockTick, Indexer, ReplaySummary};
pub use pricing::{AssetRegistry, CoinGeckoFeed, MockPriceFeed, PriceOracle, PriceOracleConfig};
pub use source::{EventSource, JsonlEventSource, SourceError, VecEventSource};
pub use store::{init_db, MemoryStore, Repository, SqliteStore, StoreError};
