//! Points programs and the award ledger.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::domain::{
    Amount, EventMeta, PointsAccount, PointsEvent, PointsNetwork, PointsProgram, PointsSnapshot,
    ProgramCategory, Timestamp, UsdBasis,
};
use crate::error::IndexerError;
use crate::store::Repository;

pub const OPERATOR_REGISTRATION: &str = "operator-registration";
pub const OPERATOR_STAKE: &str = "operator-stake";
pub const DELEGATOR_DEPOSIT: &str = "delegator-deposit";
pub const DELEGATION: &str = "delegation";
pub const RESTAKER_VAULT: &str = "restaker-vault";
pub const LIQUID_VAULT_DEPOSIT: &str = "liquid-vault-deposit";
pub const CUSTOMER_SERVICE: &str = "customer-service";
pub const OPERATOR_SERVICE: &str = "operator-service";
pub const OPERATOR_HOURLY: &str = "operator-hourly";
pub const DELEGATOR_HOURLY: &str = "delegator-hourly";
pub const SERVICE_HOURLY: &str = "service-hourly";

/// Hourly programs swept by the clock, in sweep order.
pub const HOURLY_PROGRAMS: [&str; 3] = [OPERATOR_HOURLY, DELEGATOR_HOURLY, SERVICE_HOURLY];

/// 1 point per 0.01 USD of 1e18-scaled value.
const POINTS_DIVISOR_EXP: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: ProgramCategory,
    pub weight: u32,
}

const PROGRAMS: &[ProgramDefinition] = &[
    ProgramDefinition {
        id: OPERATOR_REGISTRATION,
        name: "Operator Registration",
        description: "Registration bonus",
        category: ProgramCategory::Operator,
        weight: 100,
    },
    ProgramDefinition {
        id: OPERATOR_STAKE,
        name: "Operator Stake",
        description: "Self-stake boost",
        category: ProgramCategory::Operator,
        weight: 10,
    },
    ProgramDefinition {
        id: DELEGATOR_DEPOSIT,
        name: "Delegator Deposit",
        description: "Depositing assets into restaking",
        category: ProgramCategory::Delegator,
        weight: 5,
    },
    ProgramDefinition {
        id: DELEGATION,
        name: "Delegation",
        description: "Delegating stake to operators",
        category: ProgramCategory::Delegator,
        weight: 8,
    },
    ProgramDefinition {
        id: RESTAKER_VAULT,
        name: "Restaker Vault",
        description: "Stake recorded in reward vaults",
        category: ProgramCategory::Delegator,
        weight: 6,
    },
    ProgramDefinition {
        id: LIQUID_VAULT_DEPOSIT,
        name: "Liquid Vault Deposit",
        description: "Depositing into liquid delegation vaults",
        category: ProgramCategory::Delegator,
        weight: 4,
    },
    ProgramDefinition {
        id: CUSTOMER_SERVICE,
        name: "Customer Service",
        description: "Activating a service",
        category: ProgramCategory::Service,
        weight: 4,
    },
    ProgramDefinition {
        id: OPERATOR_SERVICE,
        name: "Operator Service",
        description: "Joining a service as operator",
        category: ProgramCategory::Operator,
        weight: 15,
    },
    ProgramDefinition {
        id: OPERATOR_HOURLY,
        name: "Operator Uptime",
        description: "Hourly reward for active operators",
        category: ProgramCategory::Operator,
        weight: 1,
    },
    ProgramDefinition {
        id: DELEGATOR_HOURLY,
        name: "Delegator Uptime",
        description: "Hourly reward for active delegators",
        category: ProgramCategory::Delegator,
        weight: 1,
    },
    ProgramDefinition {
        id: SERVICE_HOURLY,
        name: "Service Uptime",
        description: "Hourly reward for active services",
        category: ProgramCategory::Service,
        weight: 1,
    },
];

/// Definition for `id`, if one exists.
pub fn program_definition(id: &str) -> Option<&'static ProgramDefinition> {
    PROGRAMS.iter().find(|p| p.id == id)
}

/// Convert a 1e18-scaled value into points: `value / 1e16`, at least 1 for any nonzero value.
pub fn to_points_value(value: Amount) -> Amount {
    if value.is_zero() {
        return Amount::ZERO;
    }
    let points = value
        .checked_div(Amount::pow10(POINTS_DIVISOR_EXP))
        .unwrap_or(Amount::ZERO);
    if points.is_zero() {
        Amount::from_u64(1)
    } else {
        points
    }
}

/// Block coordinates stamped on every award.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardContext {
    pub block_number: u64,
    pub timestamp: Timestamp,
    pub tx_hash: String,
}

impl AwardContext {
    pub fn from_event(meta: &EventMeta) -> Self {
        Self {
            block_number: meta.block_number,
            timestamp: meta.timestamp,
            tx_hash: meta.tx_hash().to_string(),
        }
    }
}

/// One award request.
#[derive(Debug, Clone)]
pub struct Award<'a> {
    pub account: &'a str,
    pub program: &'a str,
    pub amount: Amount,
    pub reason: &'a str,
    pub basis: Option<UsdBasis>,
}

/// Writes awards and keeps account totals.
///
/// Event ids carry a process-wide counter so two awards in one transaction
/// never collide.
#[derive(Debug)]
pub struct PointsManager {
    network: PointsNetwork,
    counter: AtomicU64,
}

impl PointsManager {
    pub fn new(network: PointsNetwork) -> Self {
        Self {
            network,
            counter: AtomicU64::new(0),
        }
    }

    pub fn network(&self) -> PointsNetwork {
        self.network
    }

    /// Stored program definition, written on first use.
    pub async fn ensure_program(
        &self,
        repo: &Repository,
        program_id: &str,
        now: Timestamp,
    ) -> Result<PointsProgram, IndexerError> {
        let def = program_definition(program_id)
            .ok_or_else(|| IndexerError::UnknownProgram(program_id.to_string()))?;
        if let Some(existing) = repo.get::<PointsProgram>(def.id).await? {
            return Ok(existing);
        }
        let program = PointsProgram {
            id: def.id.to_string(),
            name: def.name.to_string(),
            description: def.description.to_string(),
            category: def.category,
            network: self.network,
            weight: def.weight,
            created_at: now,
        };
        repo.set(&program).await?;
        Ok(program)
    }

    /// Credit `award.amount` points. Zero amounts write nothing.
    ///
    /// # Errors
    /// `UnknownProgram` for a program id with no definition, even for zero amounts.
    pub async fn award(
        &self,
        repo: &Repository,
        ctx: &AwardContext,
        award: Award<'_>,
    ) -> Result<Option<PointsEvent>, IndexerError> {
        if program_definition(award.program).is_none() {
            return Err(IndexerError::UnknownProgram(award.program.to_string()));
        }
        if award.amount.is_zero() {
            return Ok(None);
        }
        let program = self.ensure_program(repo, award.program, ctx.timestamp).await?;

        let account_id = award.account.to_lowercase();
        let mut account = repo
            .get::<PointsAccount>(&account_id)
            .await?
            .unwrap_or_else(|| PointsAccount::new(account_id.clone(), ctx.timestamp));
        account.total_points = account.total_points.saturating_add(award.amount);
        match program.network {
            PointsNetwork::Mainnet => {
                account.total_mainnet_points = account.total_mainnet_points.saturating_add(award.amount)
            }
            PointsNetwork::Testnet => {
                account.total_testnet_points = account.total_testnet_points.saturating_add(award.amount)
            }
            PointsNetwork::Generic => {}
        }
        account.leaderboard_score = account.total_points;
        account.updated_at = ctx.timestamp;

        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        let event = PointsEvent {
            id: format!("{}-{}-{}", ctx.tx_hash, program.id, seq),
            account: account_id.clone(),
            program: program.id.clone(),
            amount: award.amount,
            reason: award.reason.to_string(),
            block_number: ctx.block_number,
            timestamp: ctx.timestamp,
            tx_hash: ctx.tx_hash.clone(),
        };
        let snapshot = PointsSnapshot {
            id: format!("{}-snapshot", event.id),
            account: account_id,
            program: program.id,
            total_points: account.total_points,
            block_number: ctx.block_number,
            timestamp: ctx.timestamp,
            basis: award.basis,
        };

        repo.set(&account).await?;
        repo.set(&event).await?;
        repo.set(&snapshot).await?;
        debug!(account = %account.id, program = %event.program, amount = %event.amount, "Awarded points");
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AwardContext {
        AwardContext {
            block_number: 7,
            timestamp: Timestamp::new(100),
            tx_hash: "0xtx".to_string(),
        }
    }

    fn award<'a>(account: &'a str, program: &'a str, amount: u64) -> Award<'a> {
        Award {
            account,
            program,
            amount: Amount::from_u64(amount),
            reason: "test",
            basis: None,
        }
    }

    #[test]
    fn test_to_points_value() {
        assert_eq!(to_points_value(Amount::ZERO), Amount::ZERO);
        assert_eq!(to_points_value(Amount::from_u64(1)), Amount::from_u64(1));
        assert_eq!(to_points_value(Amount::pow10(16)), Amount::from_u64(1));
        // $200 at 1e18 scale
        let basis = Amount::from_u64(200).saturating_mul(Amount::pow10(18));
        assert_eq!(to_points_value(basis), Amount::from_u64(20_000));
    }

    #[test]
    fn test_every_hourly_program_is_defined() {
        for id in HOURLY_PROGRAMS {
            assert!(program_definition(id).is_some(), "{} missing", id);
        }
        assert!(program_definition("credit-claim").is_none());
    }

    #[tokio::test]
    async fn test_award_updates_account_and_ledger() {
        let repo = Repository::in_memory();
        let points = PointsManager::new(PointsNetwork::Mainnet);

        let event = points
            .award(&repo, &ctx(), award("0xAbC", DELEGATION, 5))
            .await
            .unwrap()
            .unwrap();
        points
            .award(&repo, &ctx(), award("0xabc", DELEGATION, 3))
            .await
            .unwrap();

        assert_eq!(event.id, "0xtx-delegation-0");
        let account: PointsAccount = repo.get("0xabc").await.unwrap().unwrap();
        assert_eq!(account.total_points, Amount::from_u64(8));
        assert_eq!(account.total_mainnet_points, Amount::from_u64(8));
        assert_eq!(account.total_testnet_points, Amount::ZERO);
        assert_eq!(account.leaderboard_score, Amount::from_u64(8));
        assert_eq!(repo.count::<PointsEvent>().await.unwrap(), 2);

        let snapshot: PointsSnapshot = repo.get("0xtx-delegation-0-snapshot").await.unwrap().unwrap();
        assert_eq!(snapshot.total_points, Amount::from_u64(5));
        assert_eq!(repo.count::<PointsProgram>().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_testnet_program_splits_totals() {
        let repo = Repository::in_memory();
        let points = PointsManager::new(PointsNetwork::Testnet);
        points
            .award(&repo, &ctx(), award("0xa", OPERATOR_STAKE, 2))
            .await
            .unwrap();

        let account: PointsAccount = repo.get("0xa").await.unwrap().unwrap();
        assert_eq!(account.total_testnet_points, Amount::from_u64(2));
        assert_eq!(account.total_mainnet_points, Amount::ZERO);
    }

    #[tokio::test]
    async fn test_zero_award_is_noop() {
        let repo = Repository::in_memory();
        let points = PointsManager::new(PointsNetwork::Mainnet);
        let result = points.award(&repo, &ctx(), award("0xa", DELEGATION, 0)).await.unwrap();
        assert!(result.is_none());
        assert_eq!(repo.count::<PointsAccount>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_program_is_fatal() {
        let repo = Repository::in_memory();
        let points = PointsManager::new(PointsNetwork::Mainnet);
        let err = points
            .award(&repo, &ctx(), award("0xa", "credit-claim", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::UnknownProgram(id) if id == "credit-claim"));
    }
}
