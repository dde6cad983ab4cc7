//! Reward ledger rows and reward vault state.

use serde::{Deserialize, Serialize};

use super::{Address, Amount, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardKind {
    Pool,
    DelegatorClaim,
    OperatorCommission,
    Inflation,
}

/// Rewards paid into a pool, out to an operator, or claimed from inflation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDistribution {
    pub id: String,
    pub kind: RewardKind,
    pub operator: Option<Address>,
    /// Non-operator claimant of an inflation reward.
    pub recipient: Option<Address>,
    pub asset: Address,
    pub amount: Amount,
    pub commission: Option<Amount>,
    pub block_number: u64,
    pub timestamp: Timestamp,
    pub tx_hash: String,
}

/// Rewards claimed by a delegator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestakingRewardClaim {
    pub id: String,
    pub kind: RewardKind,
    pub delegator: Address,
    pub operator: Option<Address>,
    pub asset: Address,
    pub amount: Amount,
    pub block_number: u64,
    pub timestamp: Timestamp,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardVault {
    pub id: Address,
    pub apy_bps: u64,
    pub deposit_cap: Amount,
    pub incentive_cap: Amount,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RewardVault {
    pub fn new(asset: Address, now: Timestamp) -> Self {
        Self {
            id: asset,
            apy_bps: 0,
            deposit_cap: Amount::ZERO,
            incentive_cap: Amount::ZERO,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Running totals for a reward vault, keyed by the same asset address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardVaultState {
    pub id: Address,
    pub total_deposits: Amount,
    pub rewards_distributed: Amount,
    pub updated_at: Timestamp,
}

impl RewardVaultState {
    pub fn new(asset: Address, now: Timestamp) -> Self {
        Self {
            id: asset,
            total_deposits: Amount::ZERO,
            rewards_distributed: Amount::ZERO,
            updated_at: now,
        }
    }
}
