//! Event dispatch.
//!
//! Each chain event goes to exactly one handler. Handlers load or create the
//! records they touch, apply the mutation, write back, and then trigger
//! participation changes or point awards. Events are processed strictly one at
//! a time; a handler sees every write of the handlers before it.

mod clock;
mod liquid;
mod restaking;
mod rewards;
mod services;
mod slashing;

use std::sync::Arc;
use tracing::debug;

pub use clock::{BlockClock, BlockReport, BlockTick, ReplaySummary};

use crate::domain::{Amount, ChainEvent, EventKind, EventMeta, Timestamp};
use crate::engine::{participation, Award, AwardContext, PointsManager};
use crate::error::IndexerError;
use crate::pricing::PriceOracle;
use crate::store::Repository;

#[derive(Debug)]
pub struct Indexer {
    repo: Repository,
    oracle: Arc<PriceOracle>,
    points: PointsManager,
}

impl Indexer {
    pub fn new(repo: Repository, oracle: Arc<PriceOracle>, points: PointsManager) -> Self {
        Self { repo, oracle, points }
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn oracle(&self) -> &Arc<PriceOracle> {
        &self.oracle
    }

    pub fn points(&self) -> &PointsManager {
        &self.points
    }

    /// Apply one event.
    ///
    /// # Errors
    /// Store failures and awards against undefined programs. Benign no-ops
    /// (unknown vaults, unmatched executions) are not errors.
    pub async fn handle(&self, event: &ChainEvent) -> Result<(), IndexerError> {
        let meta = &event.meta;
        debug!(
            event = event.kind.name(),
            block = meta.block_number,
            log_index = meta.log_index,
            "Dispatching event"
        );

        match &event.kind {
            EventKind::OperatorRegistered { operator, stake } => {
                self.on_operator_registered(meta, operator, *stake).await
            }
            EventKind::OperatorStakeIncreased { operator, amount } => {
                self.on_operator_stake_increased(meta, operator, *amount).await
            }
            EventKind::OperatorUnstakeScheduled {
                operator,
                amount,
                ready_round,
            } => {
                self.on_operator_unstake_scheduled(meta, operator, *amount, *ready_round)
                    .await
            }
            EventKind::OperatorUnstakeExecuted { operator, amount } => {
                self.on_operator_unstake_executed(meta, operator, *amount).await
            }
            EventKind::OperatorLeavingScheduled {
                operator,
                ready_round,
            } => self.on_operator_leaving_scheduled(meta, operator, *ready_round).await,
            EventKind::OperatorLeft { operator } => self.on_operator_left(meta, operator).await,
            EventKind::Deposited {
                delegator,
                token,
                amount,
                lock,
            } => self.on_deposited(meta, delegator, token, *amount, *lock).await,
            EventKind::WithdrawScheduled {
                delegator,
                token,
                amount,
                ready_round,
            } => {
                self.on_withdraw_scheduled(meta, delegator, token, *amount, *ready_round)
                    .await
            }
            EventKind::Withdrawn {
                delegator,
                token,
                amount,
            } => self.on_withdrawn(meta, delegator, token, *amount).await,
            EventKind::Delegated {
                delegator,
                operator,
                token,
                amount,
                shares,
                selection_mode,
            } => {
                self.on_delegated(
                    meta,
                    restaking::Delegation {
                        delegator,
                        operator,
                        token,
                        amount: *amount,
                        shares: *shares,
                    },
                    *selection_mode,
                )
                .await
            }
            EventKind::DelegatorUnstakeScheduled {
                delegator,
                operator,
                token,
                shares,
                estimated_amount,
                ready_round,
            } => {
                self.on_delegator_unstake_scheduled(
                    meta,
                    delegator,
                    crate::engine::UnstakeTicket {
                        operator: operator.clone(),
                        token: token.clone(),
                        shares: *shares,
                        estimated_amount: *estimated_amount,
                        ready_round: *ready_round,
                    },
                )
                .await
            }
            EventKind::DelegatorUnstakeExecuted {
                delegator,
                operator,
                token,
                shares,
                amount,
            } => {
                self.on_delegator_unstake_executed(
                    meta,
                    restaking::Delegation {
                        delegator,
                        operator,
                        token,
                        amount: *amount,
                        shares: *shares,
                    },
                )
                .await
            }
            EventKind::AssetEnabled {
                token,
                min_operator_stake,
                min_delegation,
            } => {
                self.on_asset_enabled(meta, token, *min_operator_stake, *min_delegation)
                    .await
            }
            EventKind::AssetDisabled { token } => self.on_asset_disabled(meta, token).await,
            EventKind::RoundAdvanced { round } => self.on_round_advanced(meta, *round).await,
            EventKind::Slashed {
                operator,
                service_id,
                operator_slashed,
                delegators_slashed,
                new_exchange_rate,
            } => {
                self.on_slashed(
                    meta,
                    operator,
                    *service_id,
                    *operator_slashed,
                    *delegators_slashed,
                    *new_exchange_rate,
                )
                .await
            }
            EventKind::RewardDistributed { operator, amount } => {
                self.on_reward_distributed(meta, operator, *amount).await
            }
            EventKind::RewardClaimed { account, amount } => {
                self.on_reward_claimed(meta, account, *amount).await
            }
            EventKind::OperatorBlueprintAdded {
                operator,
                blueprint_id,
            } => {
                self.on_operator_blueprint_added(meta, operator, *blueprint_id)
                    .await
            }
            EventKind::OperatorBlueprintRemoved {
                operator,
                blueprint_id,
            } => {
                self.on_operator_blueprint_removed(meta, operator, *blueprint_id)
                    .await
            }
            EventKind::SlashProposed {
                slash_id,
                service_id,
                operator,
                proposer,
                amount,
                effective_amount,
                evidence,
                execute_after,
            } => {
                self.on_slash_proposed(
                    meta,
                    slashing::NewSlash {
                        slash_id: *slash_id,
                        service_id: *service_id,
                        operator,
                        proposer,
                        amount: *amount,
                        effective_amount: *effective_amount,
                        evidence: evidence.as_str(),
                        execute_after: *execute_after,
                    },
                )
                .await
            }
            EventKind::SlashDisputed {
                slash_id,
                disputer,
                reason,
            } => self.on_slash_disputed(meta, *slash_id, disputer, reason).await,
            EventKind::SlashCancelled {
                slash_id,
                canceller,
                reason,
            } => self.on_slash_cancelled(meta, *slash_id, canceller, reason).await,
            EventKind::SlashExecuted {
                slash_id,
                operator,
                service_id,
                actual_slashed,
            } => {
                self.on_slash_executed(meta, *slash_id, operator, *service_id, *actual_slashed)
                    .await
            }
            EventKind::OperatorRewardClaimed { operator, amount } => {
                self.on_inflation_claimed(meta, rewards::InflationClaimant::Operator(operator), *amount)
                    .await
            }
            EventKind::CustomerRewardClaimed { customer, amount } => {
                self.on_inflation_claimed(meta, rewards::InflationClaimant::Customer(customer), *amount)
                    .await
            }
            EventKind::DeveloperRewardClaimed { developer, amount } => {
                self.on_inflation_claimed(meta, rewards::InflationClaimant::Developer(developer), *amount)
                    .await
            }
            EventKind::VaultCreated {
                vault,
                operator,
                asset,
                name,
                symbol,
                blueprint_ids,
            } => {
                self.on_vault_created(
                    meta,
                    liquid::NewVault {
                        vault,
                        operator,
                        asset,
                        name,
                        symbol,
                        fixed_selection: !blueprint_ids.is_empty(),
                    },
                )
                .await
            }
            EventKind::VaultDeposit {
                owner,
                assets,
                shares,
                ..
            } => self.on_vault_deposit(meta, owner, *assets, *shares).await,
            EventKind::VaultWithdraw {
                receiver,
                owner,
                assets,
                shares,
                ..
            } => {
                self.on_vault_withdraw(meta, receiver, owner, *assets, *shares)
                    .await
            }
            EventKind::RedeemRequest {
                controller,
                owner,
                request_id,
                shares,
            } => {
                self.on_redeem_request(meta, controller, owner, *request_id, *shares)
                    .await
            }
            EventKind::VaultTransfer { from, to, value } => {
                self.on_vault_transfer(meta, from, to, *value).await
            }
            EventKind::RewardsHarvested { amount } => {
                self.on_rewards_harvested(meta, *amount).await
            }
            EventKind::RewardVaultCreated {
                asset,
                apy_bps,
                deposit_cap,
                incentive_cap,
            } => {
                self.on_reward_vault_configured(
                    meta,
                    rewards::VaultConfig {
                        asset,
                        apy_bps: *apy_bps,
                        deposit_cap: *deposit_cap,
                        incentive_cap: *incentive_cap,
                    },
                    true,
                )
                .await
            }
            EventKind::RewardVaultConfigUpdated {
                asset,
                apy_bps,
                deposit_cap,
                incentive_cap,
            } => {
                self.on_reward_vault_configured(
                    meta,
                    rewards::VaultConfig {
                        asset,
                        apy_bps: *apy_bps,
                        deposit_cap: *deposit_cap,
                        incentive_cap: *incentive_cap,
                    },
                    false,
                )
                .await
            }
            EventKind::RewardVaultDeactivated { asset } => {
                self.on_reward_vault_deactivated(meta, asset).await
            }
            EventKind::StakeRecorded {
                asset,
                delegator,
                amount,
                ..
            } => self.on_stake_recorded(meta, asset, delegator, *amount).await,
            EventKind::UnstakeRecorded { asset, amount, .. } => {
                self.on_unstake_recorded(meta, asset, *amount).await
            }
            EventKind::RewardsDistributed {
                asset,
                operator,
                pool_reward,
                commission,
            } => {
                self.on_rewards_distributed(meta, asset, operator, *pool_reward, *commission)
                    .await
            }
            EventKind::DelegatorRewardsClaimed {
                asset,
                delegator,
                operator,
                amount,
            } => {
                self.on_delegator_rewards_claimed(meta, asset, delegator, operator, *amount)
                    .await
            }
            EventKind::OperatorCommissionClaimed {
                asset,
                operator,
                amount,
            } => {
                self.on_operator_commission_claimed(meta, asset, operator, *amount)
                    .await
            }
            EventKind::ServiceActivated {
                service_id,
                blueprint_id,
                owner,
            } => {
                self.on_service_activated(meta, *service_id, *blueprint_id, owner)
                    .await
            }
            EventKind::ServiceTerminated { service_id } => {
                self.on_service_terminated(meta, *service_id).await
            }
            EventKind::OperatorJoinedService {
                service_id,
                operator,
                exposure_bps,
            } => {
                self.on_operator_joined_service(meta, *service_id, operator, *exposure_bps)
                    .await
            }
            EventKind::OperatorLeftService {
                service_id,
                operator,
            } => self.on_operator_left_service(meta, *service_id, operator).await,
        }
    }

    /// Apply events in order, stopping at the first error.
    pub async fn handle_all(&self, events: &[ChainEvent]) -> Result<(), IndexerError> {
        for event in events {
            self.handle(event).await?;
        }
        Ok(())
    }

    async fn award(
        &self,
        meta: &EventMeta,
        account: &str,
        program: &str,
        amount: Amount,
        reason: &str,
    ) -> Result<(), IndexerError> {
        self.points
            .award(
                &self.repo,
                &AwardContext::from_event(meta),
                Award {
                    account,
                    program,
                    amount,
                    reason,
                    basis: None,
                },
            )
            .await?;
        Ok(())
    }

    async fn activate(&self, program: &str, entity_id: &str, now: Timestamp) -> Result<(), IndexerError> {
        participation::activate(&self.repo, &self.points, program, entity_id, now).await
    }

    async fn deactivate(&self, program: &str, entity_id: &str, now: Timestamp) -> Result<(), IndexerError> {
        participation::deactivate(&self.repo, &self.points, program, entity_id, now).await
    }
}
