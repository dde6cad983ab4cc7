use anyhow::Context;
use restaking_indexer::{
    config::Config, AssetRegistry, BlockClock, CoinGeckoFeed, EventSource, Indexer,
    JsonlEventSource, PointsManager, PriceOracle, PriceOracleConfig, Repository, SqliteStore,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;

    let repo = match config.database_path.as_deref() {
        Some(path) => {
            let store = SqliteStore::open(path)
                .await
                .with_context(|| format!("Failed to initialize database at {}", path))?;
            Repository::new(Arc::new(store))
        }
        None => {
            tracing::info!("DATABASE_PATH not set, using in-memory store");
            Repository::in_memory()
        }
    };

    let feed = CoinGeckoFeed::new(config.price_api_url.clone(), config.price_max_retries);
    let oracle = PriceOracle::new(
        Arc::new(feed),
        Arc::new(AssetRegistry::with_defaults(&config.native_price_id)),
        PriceOracleConfig {
            cache_ttl_ms: config.price_cache_ttl_ms,
            batch_size: config.price_batch_size,
        },
    );
    let indexer = Indexer::new(repo, Arc::new(oracle), PointsManager::new(config.points_network));

    let events = JsonlEventSource::new(&config.events_path)
        .events()
        .await
        .context("Failed to load events")?;

    let mut clock = BlockClock::new(config.hourly_block_interval, config.average_block_time_secs);
    let summary = indexer
        .replay(&events, &mut clock)
        .await
        .context("Replay failed")?;

    tracing::info!(
        events = summary.events,
        ticks = summary.ticks,
        hourly_awards = summary.hourly_awards,
        hourly_points = %summary.hourly_points,
        "Replay complete"
    );
    Ok(())
}
