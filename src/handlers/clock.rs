//! Block-driven hourly clock.

use tracing::info;

use super::Indexer;
use crate::domain::{Amount, ChainEvent, Timestamp};
use crate::engine::points::HOURLY_PROGRAMS;
use crate::engine::{participation, AwardContext, SweepStats};
use crate::error::IndexerError;

/// Fires on every block number that is a multiple of `interval`.
#[derive(Debug, Clone)]
pub struct BlockClock {
    interval: u64,
    average_block_time: u64,
    last_block: Option<u64>,
}

/// A clock firing, carrying the block it fired on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTick {
    pub block_number: u64,
    pub timestamp: Timestamp,
    pub hash: Option<String>,
}

impl BlockClock {
    pub fn new(interval: u64, average_block_time: u64) -> Self {
        Self {
            interval: interval.max(1),
            average_block_time,
            last_block: None,
        }
    }

    /// Advance to `block_number` and return the boundary blocks passed on the way, oldest first.
    ///
    /// Boundaries without an event of their own are stamped `block * average_block_time`.
    /// `timestamp` is used only when `block_number` is itself a boundary. The first call
    /// fires for `block_number` alone, and only if it is a boundary.
    pub fn observe(&mut self, block_number: u64, timestamp: Option<Timestamp>) -> Vec<BlockTick> {
        let first = match self.last_block {
            Some(last) if block_number <= last => return Vec::new(),
            Some(last) => (last / self.interval + 1).checked_mul(self.interval),
            None => block_number.div_ceil(self.interval).checked_mul(self.interval),
        };
        self.last_block = Some(block_number);

        let Some(first) = first else {
            return Vec::new();
        };
        (first..=block_number)
            .step_by(self.interval as usize)
            .map(|boundary| BlockTick {
                block_number: boundary,
                timestamp: match timestamp {
                    Some(ts) if boundary == block_number => ts,
                    _ => Timestamp::new(boundary.saturating_mul(self.average_block_time)),
                },
                hash: None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockReport {
    pub prices_refreshed: usize,
    pub awarded: usize,
    pub deactivated: usize,
    pub points: Amount,
}

impl BlockReport {
    fn absorb(&mut self, stats: SweepStats) {
        self.awarded += stats.awarded;
        self.deactivated += stats.deactivated;
        self.points = self.points.saturating_add(stats.points);
    }
}

impl Indexer {
    /// Refresh registered prices, then sweep every hourly program.
    pub async fn on_block(&self, tick: &BlockTick) -> Result<BlockReport, IndexerError> {
        let mut report = BlockReport {
            prices_refreshed: self
                .oracle
                .refresh_registered(&self.repo, tick.block_number, tick.timestamp)
                .await?,
            ..BlockReport::default()
        };

        let ctx = AwardContext {
            block_number: tick.block_number,
            timestamp: tick.timestamp,
            tx_hash: format!(
                "hourly-{}",
                tick.hash.as_deref().unwrap_or(&tick.block_number.to_string())
            ),
        };
        for program in HOURLY_PROGRAMS {
            let stats =
                participation::sweep(&self.repo, &self.points, &self.oracle, program, &ctx).await?;
            report.absorb(stats);
        }

        info!(
            block = tick.block_number,
            prices = report.prices_refreshed,
            awarded = report.awarded,
            deactivated = report.deactivated,
            points = %report.points,
            "Hourly tick"
        );
        Ok(report)
    }
}

/// Totals for one replay run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub ticks: usize,
    pub hourly_awards: usize,
    pub hourly_points: Amount,
}

impl Indexer {
    /// Apply `events` in order. Every boundary the clock passes fires before the event that reached it.
    pub async fn replay(
        &self,
        events: &[ChainEvent],
        clock: &mut BlockClock,
    ) -> Result<ReplaySummary, IndexerError> {
        let mut summary = ReplaySummary::default();
        for event in events {
            let meta = &event.meta;
            for mut tick in clock.observe(meta.block_number, Some(meta.timestamp)) {
                if tick.block_number == meta.block_number {
                    tick.hash = Some(meta.block_hash.clone());
                }
                let report = self.on_block(&tick).await?;
                summary.ticks += 1;
                summary.hourly_awards += report.awarded;
                summary.hourly_points = summary.hourly_points.saturating_add(report.points);
            }
            self.handle(event).await?;
            summary.events += 1;
        }
        Ok(summary)
    }
}
