//! Hourly participation: eligibility tracking, USD basis and the award sweep.

use tracing::{debug, info};

use super::points::{to_points_value, Award, AwardContext, PointsManager};
use crate::domain::{
    keys, Address, Amount, DelegationPosition, Delegator, DelegatorAssetPosition, LiquidDelegationVault,
    LiquidVaultPosition, Operator, ParticipationState, PointsHourlyTotal, ProgramCategory,
    Service, ServiceOperator, Timestamp, UsdBasis,
};
use crate::error::IndexerError;
use crate::pricing::PriceOracle;
use crate::store::{Repository, StoreError};

/// Minimum seconds between two hourly awards for one entity.
pub const AWARD_INTERVAL_SECS: u64 = 3600;

/// 1 USD at 1e18 scale, the basis of one active service membership.
fn usd_unit() -> Amount {
    Amount::pow10(18)
}

/// Mark `entity_id` eligible for `program`.
///
/// A new or inactive record restarts its award clock at `now`. An already
/// active record is left untouched.
pub async fn activate(
    repo: &Repository,
    points: &PointsManager,
    program: &str,
    entity_id: &str,
    now: Timestamp,
) -> Result<(), IndexerError> {
    let program = points.ensure_program(repo, program, now).await?;
    let id = keys::participation(&program.id, entity_id);
    match repo.get::<ParticipationState>(&id).await? {
        Some(state) if state.active => {}
        Some(mut state) => {
            state.active = true;
            state.last_award_at = now;
            repo.set(&state).await?;
        }
        None => {
            repo.set(&ParticipationState {
                id,
                program: program.id,
                entity_id: entity_id.to_string(),
                category: program.category,
                active: true,
                last_award_at: now,
            })
            .await?;
        }
    }
    Ok(())
}

/// Mark `entity_id` ineligible. Missing or inactive records are left alone.
pub async fn deactivate(
    repo: &Repository,
    points: &PointsManager,
    program: &str,
    entity_id: &str,
    now: Timestamp,
) -> Result<(), IndexerError> {
    let program = points.ensure_program(repo, program, now).await?;
    let id = keys::participation(&program.id, entity_id);
    if let Some(mut state) = repo.get::<ParticipationState>(&id).await? {
        if state.active {
            state.active = false;
            repo.set(&state).await?;
        }
    }
    Ok(())
}

/// Whether the operator has self-stake or shares delegated to it.
pub async fn operator_has_stake(repo: &Repository, operator: &Address) -> Result<bool, StoreError> {
    if let Some(op) = repo.get::<Operator>(operator.as_str()).await? {
        if op.stake.is_positive() {
            return Ok(true);
        }
    }
    let delegations: Vec<DelegationPosition> = repo.find_by("operator", operator).await?;
    Ok(delegations.iter().any(|d| d.shares.is_positive()))
}

/// Whether the delegator still holds a deposit, a delegation or liquid vault shares.
pub async fn delegator_has_stake(repo: &Repository, delegator: &Address) -> Result<bool, StoreError> {
    let positions: Vec<DelegatorAssetPosition> = repo.find_by("delegator", delegator).await?;
    if positions.iter().any(|p| p.deposited.is_positive()) {
        return Ok(true);
    }
    if let Some(d) = repo.get::<Delegator>(delegator.as_str()).await? {
        if d.total_delegated.is_positive() {
            return Ok(true);
        }
    }
    let liquid: Vec<LiquidVaultPosition> = repo.find_by("account", delegator).await?;
    Ok(liquid.iter().any(|p| p.has_stake()))
}

async fn service_is_active(repo: &Repository, service_id: &str) -> Result<bool, StoreError> {
    Ok(repo
        .get::<Service>(service_id)
        .await?
        .map(|s| s.is_active())
        .unwrap_or(false))
}

async fn qualifies(repo: &Repository, state: &ParticipationState) -> Result<bool, StoreError> {
    match state.category {
        ProgramCategory::Operator => operator_has_stake(repo, &Address::new(&state.entity_id)).await,
        ProgramCategory::Delegator => delegator_has_stake(repo, &Address::new(&state.entity_id)).await,
        ProgramCategory::Service => service_is_active(repo, &state.entity_id).await,
    }
}

/// Deactivate `program` for an operator whose stake is gone.
pub async fn refresh_operator(
    repo: &Repository,
    points: &PointsManager,
    program: &str,
    operator: &Address,
    now: Timestamp,
) -> Result<(), IndexerError> {
    if !operator_has_stake(repo, operator).await? {
        deactivate(repo, points, program, operator.as_str(), now).await?;
    }
    Ok(())
}

/// Deactivate `program` for a delegator with nothing left at stake.
pub async fn refresh_delegator(
    repo: &Repository,
    points: &PointsManager,
    program: &str,
    delegator: &Address,
    now: Timestamp,
) -> Result<(), IndexerError> {
    if !delegator_has_stake(repo, delegator).await? {
        deactivate(repo, points, program, delegator.as_str(), now).await?;
    }
    Ok(())
}

/// Everything the basis computation needs besides the repository.
#[derive(Debug, Clone, Copy)]
pub struct Valuation<'a> {
    pub oracle: &'a PriceOracle,
    pub block_number: u64,
    pub timestamp: Timestamp,
}

impl Valuation<'_> {
    async fn usd(&self, repo: &Repository, amount: Amount, token: &Address) -> Result<Amount, StoreError> {
        self.oracle
            .convert_to_usd(repo, amount, token, self.block_number, self.timestamp)
            .await
    }
}

async fn operator_basis(repo: &Repository, val: Valuation<'_>, operator: &str) -> Result<UsdBasis, StoreError> {
    let stake = repo
        .get::<Operator>(operator)
        .await?
        .map(|op| op.stake)
        .unwrap_or(Amount::ZERO);
    let total = val.usd(repo, stake, &Address::zero()).await?;
    Ok(UsdBasis {
        total,
        direct: Some(total),
        ..Default::default()
    })
}

/// USD value of the delegator's liquid vault shares at current share prices.
async fn liquid_basis(repo: &Repository, val: Valuation<'_>, delegator: &Address) -> Result<Amount, StoreError> {
    let positions: Vec<LiquidVaultPosition> = repo.find_by("account", delegator).await?;
    let mut total = Amount::ZERO;
    for position in positions.iter().filter(|p| p.shares.is_positive()) {
        let Some(vault) = repo.get::<LiquidDelegationVault>(position.vault.as_str()).await? else {
            continue;
        };
        if vault.total_assets.is_zero() {
            continue;
        }
        let Some(assets) = vault.share_value(position.shares) else {
            continue;
        };
        if assets.is_zero() {
            continue;
        }
        total = total.saturating_add(val.usd(repo, assets, &vault.asset).await?);
    }
    Ok(total)
}

async fn delegator_basis(repo: &Repository, val: Valuation<'_>, delegator: &str) -> Result<UsdBasis, StoreError> {
    let Some(record) = repo.get::<Delegator>(delegator).await? else {
        return Ok(UsdBasis::default());
    };
    let positions: Vec<DelegatorAssetPosition> = repo.find_by("delegator", &record.id).await?;
    let mut direct = Amount::ZERO;
    for position in positions.iter().filter(|p| p.deposited.is_positive()) {
        direct = direct.saturating_add(val.usd(repo, position.deposited, &position.token).await?);
    }
    if direct.is_zero() {
        direct = val.usd(repo, record.total_delegated, &Address::zero()).await?;
    }
    let liquid = liquid_basis(repo, val, &record.id).await?;
    Ok(UsdBasis {
        total: direct.saturating_add(liquid),
        direct: Some(direct),
        liquid: Some(liquid),
        service: None,
    })
}

async fn service_basis(repo: &Repository, service_id: &str) -> Result<UsdBasis, StoreError> {
    if repo.get::<Service>(service_id).await?.is_none() {
        return Ok(UsdBasis::default());
    }
    let members: Vec<ServiceOperator> = repo.find_by("service", service_id).await?;
    let active = members.iter().filter(|m| m.active).count() as u64;
    let total = usd_unit().saturating_mul(Amount::from_u64(active));
    Ok(UsdBasis {
        total,
        service: Some(total),
        ..Default::default()
    })
}

/// USD basis for one participation record, 1e18-scaled.
pub async fn participation_basis(
    repo: &Repository,
    val: Valuation<'_>,
    state: &ParticipationState,
) -> Result<UsdBasis, StoreError> {
    match state.category {
        ProgramCategory::Operator => operator_basis(repo, val, &state.entity_id).await,
        ProgramCategory::Delegator => delegator_basis(repo, val, &state.entity_id).await,
        ProgramCategory::Service => service_basis(repo, &state.entity_id).await,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub awarded: usize,
    pub deactivated: usize,
    pub points: Amount,
}

async fn add_hourly_total(
    repo: &Repository,
    program: &str,
    now: Timestamp,
    points: Amount,
    basis: Amount,
) -> Result<(), StoreError> {
    let hour = now.hour_floor();
    let id = format!("{}:{}", program, hour);
    let mut total = repo
        .get::<PointsHourlyTotal>(&id)
        .await?
        .unwrap_or_else(|| PointsHourlyTotal::new(program, hour));
    total.points = total.points.saturating_add(points);
    total.usd_basis = total.usd_basis.saturating_add(basis);
    total.award_count += 1;
    repo.set(&total).await
}

/// Award every active, due record of `program` on its current USD basis.
///
/// Records with nothing left at stake are deactivated instead. A zero basis
/// awards nothing and leaves the award clock where it was.
pub async fn sweep(
    repo: &Repository,
    points: &PointsManager,
    oracle: &PriceOracle,
    program: &str,
    ctx: &AwardContext,
) -> Result<SweepStats, IndexerError> {
    let program = points.ensure_program(repo, program, ctx.timestamp).await?;
    let states: Vec<ParticipationState> = repo.find_by("program", &program.id).await?;
    let val = Valuation {
        oracle,
        block_number: ctx.block_number,
        timestamp: ctx.timestamp,
    };

    let mut stats = SweepStats::default();
    for mut state in states {
        if !state.active || ctx.timestamp.since(state.last_award_at) < AWARD_INTERVAL_SECS {
            continue;
        }
        if !qualifies(repo, &state).await? {
            state.active = false;
            repo.set(&state).await?;
            stats.deactivated += 1;
            continue;
        }

        let basis = participation_basis(repo, val, &state).await?;
        let amount = to_points_value(basis.total);
        if amount.is_zero() {
            continue;
        }
        let usd_total = basis.total;
        points
            .award(
                repo,
                ctx,
                Award {
                    account: &state.entity_id,
                    program: &program.id,
                    amount,
                    reason: "hourly participation",
                    basis: Some(basis),
                },
            )
            .await?;
        state.last_award_at = ctx.timestamp;
        repo.set(&state).await?;
        add_hourly_total(repo, &program.id, ctx.timestamp, amount, usd_total).await?;

        stats.awarded += 1;
        stats.points = stats.points.saturating_add(amount);
    }

    if stats.awarded > 0 || stats.deactivated > 0 {
        info!(
            program = %program.id,
            awarded = stats.awarded,
            deactivated = stats.deactivated,
            points = %stats.points,
            "Participation sweep"
        );
    } else {
        debug!(program = %program.id, "Participation sweep found nothing due");
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PointsEvent, PointsNetwork, SelectionMode};
    use crate::engine::points::{DELEGATOR_HOURLY, OPERATOR_HOURLY};
    use crate::pricing::{AssetRegistry, MockPriceFeed, PriceOracleConfig};
    use std::sync::Arc;

    fn oracle() -> PriceOracle {
        PriceOracle::new(
            Arc::new(MockPriceFeed::new().with_price("tangle", 2.0)),
            Arc::new(AssetRegistry::with_defaults("tangle")),
            PriceOracleConfig::default(),
        )
    }

    fn ctx(ts: u64) -> AwardContext {
        AwardContext {
            block_number: ts / 12,
            timestamp: Timestamp::new(ts),
            tx_hash: format!("hourly-{}", ts / 12),
        }
    }

    async fn state(repo: &Repository, entity: &str) -> ParticipationState {
        repo.get(&keys::participation(DELEGATOR_HOURLY, entity))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_activate_is_idempotent() {
        let repo = Repository::in_memory();
        let points = PointsManager::new(PointsNetwork::Mainnet);
        activate(&repo, &points, DELEGATOR_HOURLY, "0xd", Timestamp::new(10)).await.unwrap();
        let once = state(&repo, "0xd").await;
        activate(&repo, &points, DELEGATOR_HOURLY, "0xd", Timestamp::new(99)).await.unwrap();
        assert_eq!(state(&repo, "0xd").await, once);
        assert_eq!(once.last_award_at, Timestamp::new(10));
    }

    #[tokio::test]
    async fn test_reactivation_restarts_award_clock() {
        let repo = Repository::in_memory();
        let points = PointsManager::new(PointsNetwork::Mainnet);
        let oracle = oracle();
        let d = Address::new("0xd");
        let mut delegator = Delegator::new(d.clone(), Timestamp::new(0));
        delegator.total_delegated = Amount::pow10(18);
        repo.set(&delegator).await.unwrap();

        activate(&repo, &points, DELEGATOR_HOURLY, d.as_str(), Timestamp::new(0)).await.unwrap();
        deactivate(&repo, &points, DELEGATOR_HOURLY, d.as_str(), Timestamp::new(100)).await.unwrap();
        activate(&repo, &points, DELEGATOR_HOURLY, d.as_str(), Timestamp::new(36_000)).await.unwrap();
        assert_eq!(state(&repo, d.as_str()).await.last_award_at, Timestamp::new(36_000));

        let soon = sweep(&repo, &points, &oracle, DELEGATOR_HOURLY, &ctx(36_012)).await.unwrap();
        assert_eq!(soon.awarded, 0);

        let due = sweep(&repo, &points, &oracle, DELEGATOR_HOURLY, &ctx(39_600)).await.unwrap();
        assert_eq!(due.awarded, 1);
    }

    #[tokio::test]
    async fn test_deactivate_missing_is_noop() {
        let repo = Repository::in_memory();
        let points = PointsManager::new(PointsNetwork::Mainnet);
        deactivate(&repo, &points, DELEGATOR_HOURLY, "0xd", Timestamp::new(1)).await.unwrap();
        assert_eq!(repo.count::<ParticipationState>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_program_rejected() {
        let repo = Repository::in_memory();
        let points = PointsManager::new(PointsNetwork::Mainnet);
        let err = activate(&repo, &points, "bonus-hourly", "0xd", Timestamp::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::UnknownProgram(_)));
    }

    #[tokio::test]
    async fn test_sweep_awards_on_priced_deposit() {
        let repo = Repository::in_memory();
        let points = PointsManager::new(PointsNetwork::Mainnet);
        let oracle = oracle();
        let d = Address::new("0xd");

        let mut delegator = Delegator::new(d.clone(), Timestamp::new(0));
        delegator.total_deposited = Amount::from_u64(100).saturating_mul(Amount::pow10(18));
        repo.set(&delegator).await.unwrap();
        repo.set(&DelegatorAssetPosition {
            id: keys::asset_position(&d, &Address::zero()),
            delegator: d.clone(),
            token: Address::zero(),
            deposited: delegator.total_deposited,
            delegated: Amount::ZERO,
            locked: Amount::ZERO,
            updated_at: Timestamp::new(0),
        })
        .await
        .unwrap();
        activate(&repo, &points, DELEGATOR_HOURLY, d.as_str(), Timestamp::new(0)).await.unwrap();

        // Not due yet
        let early = sweep(&repo, &points, &oracle, DELEGATOR_HOURLY, &ctx(3599)).await.unwrap();
        assert_eq!(early.awarded, 0);

        let stats = sweep(&repo, &points, &oracle, DELEGATOR_HOURLY, &ctx(3600)).await.unwrap();
        assert_eq!(stats.awarded, 1);
        assert_eq!(stats.points, Amount::from_u64(20_000));
        assert_eq!(state(&repo, d.as_str()).await.last_award_at, Timestamp::new(3600));

        let hourly: PointsHourlyTotal = repo
            .get(&format!("{}:3600", DELEGATOR_HOURLY))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hourly.award_count, 1);
        assert_eq!(hourly.usd_basis, Amount::from_u64(200).saturating_mul(Amount::pow10(18)));

        // Same hour again: nothing due
        let again = sweep(&repo, &points, &oracle, DELEGATOR_HOURLY, &ctx(3700)).await.unwrap();
        assert_eq!(again.awarded, 0);
        assert_eq!(repo.count::<PointsEvent>().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sweep_deactivates_empty_delegator() {
        let repo = Repository::in_memory();
        let points = PointsManager::new(PointsNetwork::Mainnet);
        let oracle = oracle();
        repo.set(&Delegator::new(Address::new("0xd"), Timestamp::new(0))).await.unwrap();
        activate(&repo, &points, DELEGATOR_HOURLY, "0xd", Timestamp::new(0)).await.unwrap();

        let stats = sweep(&repo, &points, &oracle, DELEGATOR_HOURLY, &ctx(7200)).await.unwrap();
        assert_eq!(stats.deactivated, 1);
        assert!(!state(&repo, "0xd").await.active);
        assert_eq!(repo.count::<PointsEvent>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_operator_with_delegations_stays_active() {
        let repo = Repository::in_memory();
        let points = PointsManager::new(PointsNetwork::Mainnet);
        let oracle = oracle();
        let op = Address::new("0xop");
        let d = Address::new("0xd");
        repo.set(&Operator::new(op.clone(), Timestamp::new(0))).await.unwrap();
        repo.set(&DelegationPosition {
            id: keys::delegation_position(&d, &op, &Address::zero()),
            delegator: d,
            operator: op.clone(),
            token: Address::zero(),
            shares: Amount::pow10(18),
            last_known_amount: Amount::pow10(18),
            selection_mode: SelectionMode::All,
            created_round: 0,
            updated_round: 0,
        })
        .await
        .unwrap();
        assert!(operator_has_stake(&repo, &op).await.unwrap());

        activate(&repo, &points, OPERATOR_HOURLY, op.as_str(), Timestamp::new(0)).await.unwrap();
        let stats = sweep(&repo, &points, &oracle, OPERATOR_HOURLY, &ctx(3600)).await.unwrap();
        assert_eq!(stats.deactivated, 0);
        let record: ParticipationState = repo
            .get(&keys::participation(OPERATOR_HOURLY, op.as_str()))
            .await
            .unwrap()
            .unwrap();
        assert!(record.active);
    }
}
