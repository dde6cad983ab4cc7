//! Reward vaults and their distribution/claim ledger.

use super::Indexer;
use crate::domain::{
    keys, Address, Amount, EventMeta, RestakingRewardClaim, RewardDistribution, RewardKind,
    RewardVault, RewardVaultState, Timestamp,
};
use crate::engine::points::RESTAKER_VAULT;
use crate::engine::{ledger, to_points_value};
use crate::error::IndexerError;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy)]
pub(super) struct VaultConfig<'a> {
    pub asset: &'a Address,
    pub apy_bps: u64,
    pub deposit_cap: Amount,
    pub incentive_cap: Amount,
}

/// Who claimed from the inflation pool.
#[derive(Debug, Clone, Copy)]
pub(super) enum InflationClaimant<'a> {
    Operator(&'a Address),
    /// Service customers are tracked as delegators.
    Customer(&'a Address),
    Developer(&'a Address),
}

impl Indexer {
    /// Reward vault and its running state for `asset`, both created on first sight.
    async fn ensure_reward_vault(
        &self,
        asset: &Address,
        now: Timestamp,
    ) -> Result<(RewardVault, RewardVaultState), StoreError> {
        let vault = self
            .repo
            .get::<RewardVault>(asset.as_str())
            .await?
            .unwrap_or_else(|| RewardVault::new(asset.clone(), now));
        let state = self
            .repo
            .get::<RewardVaultState>(asset.as_str())
            .await?
            .unwrap_or_else(|| RewardVaultState::new(asset.clone(), now));
        Ok((vault, state))
    }

    /// Ledger row for this event with no operator, recipient or commission set.
    fn distribution(meta: &EventMeta, kind: RewardKind, asset: &Address, amount: Amount) -> RewardDistribution {
        RewardDistribution {
            id: keys::reward_distribution(&meta.event_id()),
            kind,
            operator: None,
            recipient: None,
            asset: asset.clone(),
            amount,
            commission: None,
            block_number: meta.block_number,
            timestamp: meta.timestamp,
            tx_hash: meta.tx_hash().to_string(),
        }
    }

    pub(super) async fn on_reward_vault_configured(
        &self,
        meta: &EventMeta,
        config: VaultConfig<'_>,
        activate: bool,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let (mut vault, state) = self.ensure_reward_vault(config.asset, now).await?;
        vault.apy_bps = config.apy_bps;
        vault.deposit_cap = config.deposit_cap;
        vault.incentive_cap = config.incentive_cap;
        if activate {
            vault.active = true;
        }
        vault.updated_at = now;
        self.repo.set(&vault).await?;
        self.repo.set(&state).await?;
        Ok(())
    }

    pub(super) async fn on_reward_vault_deactivated(&self, meta: &EventMeta, asset: &Address) -> Result<(), IndexerError> {
        let (mut vault, state) = self.ensure_reward_vault(asset, meta.timestamp).await?;
        vault.active = false;
        vault.updated_at = meta.timestamp;
        self.repo.set(&vault).await?;
        self.repo.set(&state).await?;
        Ok(())
    }

    pub(super) async fn on_stake_recorded(
        &self,
        meta: &EventMeta,
        asset: &Address,
        delegator: &Address,
        amount: Amount,
    ) -> Result<(), IndexerError> {
        let (vault, mut state) = self.ensure_reward_vault(asset, meta.timestamp).await?;
        state.total_deposits = state.total_deposits.saturating_add(amount);
        state.updated_at = meta.timestamp;
        self.repo.set(&vault).await?;
        self.repo.set(&state).await?;

        self.award(meta, delegator.as_str(), RESTAKER_VAULT, to_points_value(amount), "reward vault stake")
            .await
    }

    pub(super) async fn on_unstake_recorded(
        &self,
        meta: &EventMeta,
        asset: &Address,
        amount: Amount,
    ) -> Result<(), IndexerError> {
        let (vault, mut state) = self.ensure_reward_vault(asset, meta.timestamp).await?;
        state.total_deposits = state.total_deposits.saturating_sub(amount);
        state.updated_at = meta.timestamp;
        self.repo.set(&vault).await?;
        self.repo.set(&state).await?;
        Ok(())
    }

    pub(super) async fn on_rewards_distributed(
        &self,
        meta: &EventMeta,
        asset: &Address,
        operator: &Address,
        pool_reward: Amount,
        commission: Amount,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let (vault, mut state) = self.ensure_reward_vault(asset, now).await?;
        state.rewards_distributed = state.rewards_distributed.saturating_add(pool_reward);
        state.updated_at = now;
        self.repo.set(&vault).await?;
        self.repo.set(&state).await?;

        let op = ledger::ensure_operator(&self.repo, operator, now).await?;
        self.repo.set(&op).await?;
        self.repo
            .set(&RewardDistribution {
                operator: Some(operator.clone()),
                commission: Some(commission),
                ..Self::distribution(meta, RewardKind::Pool, asset, pool_reward)
            })
            .await?;
        Ok(())
    }

    pub(super) async fn on_delegator_rewards_claimed(
        &self,
        meta: &EventMeta,
        asset: &Address,
        delegator: &Address,
        operator: &Address,
        amount: Amount,
    ) -> Result<(), IndexerError> {
        let record = ledger::ensure_delegator(&self.repo, delegator, meta.timestamp).await?;
        self.repo.set(&record).await?;
        self.repo
            .set(&RestakingRewardClaim {
                id: keys::reward_claim(&meta.event_id()),
                kind: RewardKind::DelegatorClaim,
                delegator: delegator.clone(),
                operator: Some(operator.clone()),
                asset: asset.clone(),
                amount,
                block_number: meta.block_number,
                timestamp: meta.timestamp,
                tx_hash: meta.tx_hash().to_string(),
            })
            .await?;
        Ok(())
    }

    pub(super) async fn on_operator_commission_claimed(
        &self,
        meta: &EventMeta,
        asset: &Address,
        operator: &Address,
        amount: Amount,
    ) -> Result<(), IndexerError> {
        let op = ledger::ensure_operator(&self.repo, operator, meta.timestamp).await?;
        self.repo.set(&op).await?;
        self.repo
            .set(&RewardDistribution {
                operator: Some(operator.clone()),
                ..Self::distribution(meta, RewardKind::OperatorCommission, asset, amount)
            })
            .await?;
        Ok(())
    }

    /// Inflation pool payout in the native asset.
    pub(super) async fn on_inflation_claimed(
        &self,
        meta: &EventMeta,
        claimant: InflationClaimant<'_>,
        amount: Amount,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let base = Self::distribution(meta, RewardKind::Inflation, &Address::zero(), amount);
        let row = match claimant {
            InflationClaimant::Operator(operator) => {
                let op = ledger::ensure_operator(&self.repo, operator, now).await?;
                self.repo.set(&op).await?;
                RewardDistribution {
                    operator: Some(operator.clone()),
                    ..base
                }
            }
            InflationClaimant::Customer(customer) => {
                let record = ledger::ensure_delegator(&self.repo, customer, now).await?;
                self.repo.set(&record).await?;
                RewardDistribution {
                    recipient: Some(customer.clone()),
                    ..base
                }
            }
            InflationClaimant::Developer(developer) => RewardDistribution {
                recipient: Some(developer.clone()),
                ..base
            },
        };
        self.repo.set(&row).await?;
        Ok(())
    }
}
