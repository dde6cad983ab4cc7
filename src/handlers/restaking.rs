//! Multi-asset delegation: operators, deposits, delegations, rounds and slashing.

use tracing::debug;

use super::Indexer;
use crate::domain::{
    keys, Address, Amount, DelegationPosition, Delegator, DepositLock, EventMeta, LockDuration, Operator,
    OperatorBlueprint, OperatorStatus, RestakingRewardClaim, RestakingRound, RestakingSlash, RewardDistribution,
    RewardKind, SelectionMode, StakeChangeKind, LATEST_ROUND_ID,
};
use crate::engine::points::{
    DELEGATION, DELEGATOR_DEPOSIT, DELEGATOR_HOURLY, OPERATOR_HOURLY, OPERATOR_REGISTRATION,
    OPERATOR_STAKE,
};
use crate::engine::{ledger, participation, queue, to_points_value, UnstakeTicket, WithdrawTicket};
use crate::error::IndexerError;

/// Delegator, operator and token of a delegation, with the amounts moved.
#[derive(Debug, Clone, Copy)]
pub(super) struct Delegation<'a> {
    pub delegator: &'a Address,
    pub operator: &'a Address,
    pub token: &'a Address,
    pub amount: Amount,
    pub shares: Amount,
}

impl Indexer {
    pub(super) async fn on_operator_registered(
        &self,
        meta: &EventMeta,
        operator: &Address,
        stake: Amount,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let mut op = ledger::ensure_operator(&self.repo, operator, now).await?;
        op.stake = stake;
        op.status = OperatorStatus::Active;
        op.updated_at = now;
        self.repo.set(&op).await?;

        ledger::record_stake_change(&self.repo, meta, operator, StakeChangeKind::Registered, Some(stake), None)
            .await?;
        self.award(meta, operator.as_str(), OPERATOR_REGISTRATION, to_points_value(stake), "operator registered")
            .await?;
        self.activate(OPERATOR_HOURLY, operator.as_str(), now).await
    }

    pub(super) async fn on_operator_stake_increased(
        &self,
        meta: &EventMeta,
        operator: &Address,
        amount: Amount,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let mut op = ledger::ensure_operator(&self.repo, operator, now).await?;
        op.stake = op.stake.saturating_add(amount);
        op.updated_at = now;
        self.repo.set(&op).await?;

        ledger::record_stake_change(&self.repo, meta, operator, StakeChangeKind::StakeIncreased, Some(amount), None)
            .await?;
        self.award(meta, operator.as_str(), OPERATOR_STAKE, to_points_value(amount), "stake increased")
            .await
    }

    pub(super) async fn on_operator_unstake_scheduled(
        &self,
        meta: &EventMeta,
        operator: &Address,
        amount: Amount,
        ready_round: u64,
    ) -> Result<(), IndexerError> {
        let mut op = ledger::ensure_operator(&self.repo, operator, meta.timestamp).await?;
        op.scheduled_unstake_amount = Some(amount);
        op.scheduled_unstake_round = Some(ready_round);
        op.updated_at = meta.timestamp;
        self.repo.set(&op).await?;

        ledger::record_stake_change(
            &self.repo,
            meta,
            operator,
            StakeChangeKind::UnstakeScheduled,
            Some(amount),
            Some(ready_round),
        )
        .await?;
        Ok(())
    }

    pub(super) async fn on_operator_unstake_executed(
        &self,
        meta: &EventMeta,
        operator: &Address,
        amount: Amount,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let mut op = ledger::ensure_operator(&self.repo, operator, now).await?;
        op.stake = op.stake.saturating_sub(amount);
        op.scheduled_unstake_amount = None;
        op.scheduled_unstake_round = None;
        op.updated_at = now;
        self.repo.set(&op).await?;

        ledger::record_stake_change(&self.repo, meta, operator, StakeChangeKind::UnstakeExecuted, Some(amount), None)
            .await?;
        participation::refresh_operator(&self.repo, &self.points, OPERATOR_HOURLY, operator, now).await
    }

    pub(super) async fn on_operator_leaving_scheduled(
        &self,
        meta: &EventMeta,
        operator: &Address,
        ready_round: u64,
    ) -> Result<(), IndexerError> {
        let mut op = ledger::ensure_operator(&self.repo, operator, meta.timestamp).await?;
        op.status = OperatorStatus::Leaving;
        op.leaving_round = Some(ready_round);
        op.updated_at = meta.timestamp;
        self.repo.set(&op).await?;

        ledger::record_stake_change(
            &self.repo,
            meta,
            operator,
            StakeChangeKind::LeavingScheduled,
            None,
            Some(ready_round),
        )
        .await?;
        Ok(())
    }

    pub(super) async fn on_operator_left(&self, meta: &EventMeta, operator: &Address) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let mut op = ledger::ensure_operator(&self.repo, operator, now).await?;
        op.status = OperatorStatus::Inactive;
        op.stake = Amount::ZERO;
        op.delegation_count = 0;
        op.updated_at = now;
        self.repo.set(&op).await?;

        ledger::record_stake_change(&self.repo, meta, operator, StakeChangeKind::Left, None, None).await?;
        self.deactivate(OPERATOR_HOURLY, operator.as_str(), now).await
    }

    pub(super) async fn on_deposited(
        &self,
        meta: &EventMeta,
        delegator: &Address,
        token: &Address,
        amount: Amount,
        lock: u64,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let mut asset = ledger::ensure_asset(&self.repo, token, now).await?;
        asset.current_deposits = asset.current_deposits.saturating_add(amount);
        asset.updated_at = now;
        self.repo.set(&asset).await?;

        let mut position = ledger::ensure_asset_position(&self.repo, delegator, token, now).await?;
        position.deposited = position.deposited.saturating_add(amount);
        position.updated_at = now;
        self.repo.set(&position).await?;

        let mut record = ledger::ensure_delegator(&self.repo, delegator, now).await?;
        record.total_deposited = record.total_deposited.saturating_add(amount);
        record.updated_at = now;
        self.repo.set(&record).await?;

        let duration = LockDuration::from_code(lock);
        if duration != LockDuration::None {
            let event_id = meta.event_id();
            self.repo
                .set(&DepositLock {
                    id: keys::deposit_lock(&position.id, &event_id),
                    position: position.id.clone(),
                    amount,
                    duration,
                    block_number: meta.block_number,
                    created_at: now,
                })
                .await?;
        }

        self.award(meta, delegator.as_str(), DELEGATOR_DEPOSIT, to_points_value(amount), "deposit")
            .await?;
        self.activate(DELEGATOR_HOURLY, delegator.as_str(), now).await
    }

    pub(super) async fn on_withdraw_scheduled(
        &self,
        meta: &EventMeta,
        delegator: &Address,
        token: &Address,
        amount: Amount,
        ready_round: u64,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let mut position = ledger::ensure_asset_position(&self.repo, delegator, token, now).await?;
        position.deposited = position.deposited.saturating_sub(amount);
        position.updated_at = now;
        self.repo.set(&position).await?;

        let mut record = ledger::ensure_delegator(&self.repo, delegator, now).await?;
        record.total_deposited = record.total_deposited.saturating_sub(amount);
        record.updated_at = now;
        let ticket = WithdrawTicket {
            token: token.clone(),
            amount,
            ready_round,
        };
        queue::enqueue_withdraw(&self.repo, &mut record, ticket, now).await?;
        self.repo.set(&record).await?;
        Ok(())
    }

    pub(super) async fn on_withdrawn(
        &self,
        meta: &EventMeta,
        delegator: &Address,
        token: &Address,
        amount: Amount,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let Some(mut record) = self.repo.get::<Delegator>(delegator.as_str()).await? else {
            debug!(delegator = %delegator, "Withdrawn for unknown delegator");
            return Ok(());
        };
        if queue::settle_withdraw(&self.repo, &mut record, token, amount, now)
            .await?
            .is_none()
        {
            return Ok(());
        }
        record.updated_at = now;
        self.repo.set(&record).await?;

        let mut asset = ledger::ensure_asset(&self.repo, token, now).await?;
        asset.current_deposits = asset.current_deposits.saturating_sub(amount);
        asset.updated_at = now;
        self.repo.set(&asset).await?;

        participation::refresh_delegator(&self.repo, &self.points, DELEGATOR_HOURLY, delegator, now).await
    }

    pub(super) async fn on_delegated(
        &self,
        meta: &EventMeta,
        d: Delegation<'_>,
        selection_mode: u64,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let mut record = ledger::ensure_delegator(&self.repo, d.delegator, now).await?;
        let mut op = ledger::ensure_operator(&self.repo, d.operator, now).await?;
        let mut position = ledger::ensure_delegation_position(
            &self.repo,
            d.delegator,
            d.operator,
            d.token,
            SelectionMode::from_code(selection_mode),
        )
        .await?;

        let was_empty = position.shares.is_zero();
        position.shares = position.shares.saturating_add(d.shares);
        position.last_known_amount = position.last_known_amount.saturating_add(d.amount);
        position.updated_round = ledger::latest_round(&self.repo).await?;
        self.repo.set(&position).await?;

        record.total_delegated = record.total_delegated.saturating_add(d.amount);
        record.updated_at = now;
        self.repo.set(&record).await?;

        if was_empty && d.shares.is_positive() {
            op.delegation_count += 1;
        }
        op.updated_at = now;
        self.repo.set(&op).await?;

        self.award(meta, d.delegator.as_str(), DELEGATION, to_points_value(d.amount), "delegated")
            .await?;
        self.activate(DELEGATOR_HOURLY, d.delegator.as_str(), now).await?;
        self.activate(OPERATOR_HOURLY, d.operator.as_str(), now).await
    }

    pub(super) async fn on_delegator_unstake_scheduled(
        &self,
        meta: &EventMeta,
        delegator: &Address,
        ticket: UnstakeTicket,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let mut record = ledger::ensure_delegator(&self.repo, delegator, now).await?;
        queue::enqueue_unstake(&self.repo, &mut record, ticket, now).await?;
        record.updated_at = now;
        self.repo.set(&record).await?;
        Ok(())
    }

    pub(super) async fn on_delegator_unstake_executed(
        &self,
        meta: &EventMeta,
        d: Delegation<'_>,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let Some(mut record) = self.repo.get::<Delegator>(d.delegator.as_str()).await? else {
            debug!(delegator = %d.delegator, "Unstake executed for unknown delegator");
            return Ok(());
        };
        if queue::settle_unstake(&self.repo, &mut record, d.operator, d.token, d.shares, now)
            .await?
            .is_none()
        {
            return Ok(());
        }

        let position_id = keys::delegation_position(d.delegator, d.operator, d.token);
        let mut remaining = Amount::ZERO;
        if let Some(mut position) = self.repo.get::<DelegationPosition>(&position_id).await? {
            position.shares = position.shares.saturating_sub(d.shares);
            position.last_known_amount = position.last_known_amount.saturating_sub(d.amount);
            position.updated_round = ledger::latest_round(&self.repo).await?;
            remaining = position.shares;
            self.repo.set(&position).await?;
        }

        record.total_delegated = record.total_delegated.saturating_sub(d.amount);
        record.updated_at = now;
        self.repo.set(&record).await?;
        participation::refresh_delegator(&self.repo, &self.points, DELEGATOR_HOURLY, d.delegator, now).await?;

        if remaining.is_zero() {
            if let Some(mut op) = self.repo.get::<Operator>(d.operator.as_str()).await? {
                op.delegation_count = op.delegation_count.saturating_sub(1);
                op.updated_at = now;
                self.repo.set(&op).await?;
            }
        }
        Ok(())
    }

    pub(super) async fn on_asset_enabled(
        &self,
        meta: &EventMeta,
        token: &Address,
        min_operator_stake: Amount,
        min_delegation: Amount,
    ) -> Result<(), IndexerError> {
        let mut asset = ledger::ensure_asset(&self.repo, token, meta.timestamp).await?;
        asset.enabled = true;
        asset.min_operator_stake = min_operator_stake;
        asset.min_delegation = min_delegation;
        asset.updated_at = meta.timestamp;
        self.repo.set(&asset).await?;
        Ok(())
    }

    pub(super) async fn on_asset_disabled(&self, meta: &EventMeta, token: &Address) -> Result<(), IndexerError> {
        let mut asset = ledger::ensure_asset(&self.repo, token, meta.timestamp).await?;
        asset.enabled = false;
        asset.updated_at = meta.timestamp;
        self.repo.set(&asset).await?;
        Ok(())
    }

    pub(super) async fn on_round_advanced(&self, meta: &EventMeta, round: u64) -> Result<(), IndexerError> {
        let mut record = RestakingRound {
            id: round.to_string(),
            round,
            block_number: meta.block_number,
            timestamp: meta.timestamp,
        };
        self.repo.set(&record).await?;
        record.id = LATEST_ROUND_ID.to_string();
        self.repo.set(&record).await?;
        Ok(())
    }

    pub(super) async fn on_slashed(
        &self,
        meta: &EventMeta,
        operator: &Address,
        service_id: u64,
        operator_slashed: Amount,
        delegators_slashed: Amount,
        exchange_rate_after: Amount,
    ) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let mut op = ledger::ensure_operator(&self.repo, operator, now).await?;
        self.repo
            .set(&RestakingSlash {
                id: meta.event_id(),
                operator: operator.clone(),
                service_id,
                operator_slashed,
                delegators_slashed,
                exchange_rate_after,
                block_number: meta.block_number,
                tx_hash: meta.tx_hash().to_string(),
            })
            .await?;

        op.stake = op.stake.saturating_sub(operator_slashed);
        op.updated_at = now;
        self.repo.set(&op).await?;

        ledger::record_stake_change(&self.repo, meta, operator, StakeChangeKind::Slashed, Some(operator_slashed), None)
            .await?;
        participation::refresh_operator(&self.repo, &self.points, OPERATOR_HOURLY, operator, now).await
    }

    pub(super) async fn on_reward_distributed(
        &self,
        meta: &EventMeta,
        operator: &Address,
        amount: Amount,
    ) -> Result<(), IndexerError> {
        let op = ledger::ensure_operator(&self.repo, operator, meta.timestamp).await?;
        self.repo.set(&op).await?;
        self.repo
            .set(&RewardDistribution {
                id: keys::reward_distribution(&meta.event_id()),
                kind: RewardKind::Pool,
                operator: Some(operator.clone()),
                recipient: None,
                asset: Address::zero(),
                amount,
                commission: None,
                block_number: meta.block_number,
                timestamp: meta.timestamp,
                tx_hash: meta.tx_hash().to_string(),
            })
            .await?;
        Ok(())
    }

    pub(super) async fn on_reward_claimed(
        &self,
        meta: &EventMeta,
        account: &Address,
        amount: Amount,
    ) -> Result<(), IndexerError> {
        let record = ledger::ensure_delegator(&self.repo, account, meta.timestamp).await?;
        self.repo.set(&record).await?;
        self.repo
            .set(&RestakingRewardClaim {
                id: keys::reward_claim(&meta.event_id()),
                kind: RewardKind::DelegatorClaim,
                delegator: account.clone(),
                operator: None,
                asset: Address::zero(),
                amount,
                block_number: meta.block_number,
                timestamp: meta.timestamp,
                tx_hash: meta.tx_hash().to_string(),
            })
            .await?;
        Ok(())
    }

    pub(super) async fn on_operator_blueprint_added(
        &self,
        meta: &EventMeta,
        operator: &Address,
        blueprint_id: u64,
    ) -> Result<(), IndexerError> {
        let op = ledger::ensure_operator(&self.repo, operator, meta.timestamp).await?;
        self.repo.set(&op).await?;
        self.repo
            .set(&OperatorBlueprint {
                id: keys::operator_blueprint(operator, blueprint_id),
                operator: operator.clone(),
                blueprint_id,
                active: true,
                added_at: meta.timestamp,
                removed_at: None,
            })
            .await?;
        Ok(())
    }

    pub(super) async fn on_operator_blueprint_removed(
        &self,
        meta: &EventMeta,
        operator: &Address,
        blueprint_id: u64,
    ) -> Result<(), IndexerError> {
        let op = ledger::ensure_operator(&self.repo, operator, meta.timestamp).await?;
        self.repo.set(&op).await?;
        let id = keys::operator_blueprint(operator, blueprint_id);
        let Some(mut membership) = self.repo.get::<OperatorBlueprint>(&id).await? else {
            debug!(operator = %operator, blueprint_id, "Removal of unknown blueprint membership");
            return Ok(());
        };
        membership.active = false;
        membership.removed_at = Some(meta.timestamp);
        self.repo.set(&membership).await?;
        Ok(())
    }
}
