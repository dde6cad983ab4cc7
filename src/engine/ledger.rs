//! Load-or-create helpers for ledger entities and the stake-change audit trail.
//!
//! Helpers return the current record (or a zeroed one stamped `now`); callers
//! patch fields and write back with `Repository::set`.

use crate::domain::{
    keys, Address, Amount, DelegationPosition, Delegator, DelegatorAssetPosition, EventMeta,
    Operator, OperatorStakeChange, RestakingAsset, RestakingRound, SelectionMode,
    StakeChangeKind, Timestamp, LATEST_ROUND_ID,
};
use crate::store::{Repository, StoreError};

pub async fn ensure_operator(
    repo: &Repository,
    id: &Address,
    now: Timestamp,
) -> Result<Operator, StoreError> {
    Ok(repo
        .get::<Operator>(id.as_str())
        .await?
        .unwrap_or_else(|| Operator::new(id.clone(), now)))
}

pub async fn ensure_delegator(
    repo: &Repository,
    id: &Address,
    now: Timestamp,
) -> Result<Delegator, StoreError> {
    Ok(repo
        .get::<Delegator>(id.as_str())
        .await?
        .unwrap_or_else(|| Delegator::new(id.clone(), now)))
}

pub async fn ensure_asset(
    repo: &Repository,
    token: &Address,
    now: Timestamp,
) -> Result<RestakingAsset, StoreError> {
    Ok(repo
        .get::<RestakingAsset>(token.as_str())
        .await?
        .unwrap_or_else(|| RestakingAsset::new(token.clone(), now)))
}

pub async fn ensure_asset_position(
    repo: &Repository,
    delegator: &Address,
    token: &Address,
    now: Timestamp,
) -> Result<DelegatorAssetPosition, StoreError> {
    let id = keys::asset_position(delegator, token);
    Ok(repo
        .get::<DelegatorAssetPosition>(&id)
        .await?
        .unwrap_or_else(|| DelegatorAssetPosition {
            id,
            delegator: delegator.clone(),
            token: token.clone(),
            deposited: Amount::ZERO,
            delegated: Amount::ZERO,
            locked: Amount::ZERO,
            updated_at: now,
        }))
}

/// Current round number, 0 before the first `RoundAdvanced`.
pub async fn latest_round(repo: &Repository) -> Result<u64, StoreError> {
    Ok(repo
        .get::<RestakingRound>(LATEST_ROUND_ID)
        .await?
        .map(|r| r.round)
        .unwrap_or(0))
}

pub async fn ensure_delegation_position(
    repo: &Repository,
    delegator: &Address,
    operator: &Address,
    token: &Address,
    selection_mode: SelectionMode,
) -> Result<DelegationPosition, StoreError> {
    let id = keys::delegation_position(delegator, operator, token);
    if let Some(position) = repo.get::<DelegationPosition>(&id).await? {
        return Ok(position);
    }
    let round = latest_round(repo).await?;
    Ok(DelegationPosition {
        id,
        delegator: delegator.clone(),
        operator: operator.clone(),
        token: token.clone(),
        shares: Amount::ZERO,
        last_known_amount: Amount::ZERO,
        selection_mode,
        created_round: round,
        updated_round: round,
    })
}

/// Append an immutable stake-change row for `meta`'s event.
///
/// `amount` is the amount the event asked for, even when the stake itself clamped.
pub async fn record_stake_change(
    repo: &Repository,
    meta: &EventMeta,
    operator: &Address,
    kind: StakeChangeKind,
    amount: Option<Amount>,
    ready_round: Option<u64>,
) -> Result<(), StoreError> {
    let change = OperatorStakeChange {
        id: keys::stake_change(operator, &meta.event_id()),
        operator: operator.clone(),
        kind,
        amount,
        ready_round,
        block_number: meta.block_number,
        timestamp: meta.timestamp,
        tx_hash: meta.tx_hash().to_string(),
    };
    repo.set(&change).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> EventMeta {
        EventMeta {
            block_number: 3,
            block_hash: "0xblock".to_string(),
            timestamp: Timestamp::new(30),
            tx_hash: None,
            log_index: 1,
            src_address: Address::zero(),
        }
    }

    #[tokio::test]
    async fn test_ensure_operator_creates_zeroed() {
        let repo = Repository::in_memory();
        let op = ensure_operator(&repo, &Address::new("0xop"), Timestamp::new(5))
            .await
            .unwrap();
        assert!(op.stake.is_zero());
        assert_eq!(op.created_at, Timestamp::new(5));
        // Not persisted until the caller writes it
        assert_eq!(repo.count::<Operator>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delegation_position_stamps_latest_round() {
        let repo = Repository::in_memory();
        repo.set(&RestakingRound {
            id: LATEST_ROUND_ID.to_string(),
            round: 12,
            block_number: 1,
            timestamp: Timestamp::new(1),
        })
        .await
        .unwrap();

        let position = ensure_delegation_position(
            &repo,
            &Address::new("0xd"),
            &Address::new("0xo"),
            &Address::zero(),
            SelectionMode::Fixed,
        )
        .await
        .unwrap();
        assert_eq!(position.created_round, 12);
        assert_eq!(position.selection_mode, SelectionMode::Fixed);
    }

    #[tokio::test]
    async fn test_stake_change_uses_block_hash_when_tx_missing() {
        let repo = Repository::in_memory();
        let op = Address::new("0xop");
        record_stake_change(&repo, &meta(), &op, StakeChangeKind::Slashed, Some(Amount::from_u64(9)), None)
            .await
            .unwrap();

        let change: OperatorStakeChange = repo.get("stake-0xop-0xblock-1").await.unwrap().unwrap();
        assert_eq!(change.tx_hash, "0xblock");
        assert_eq!(change.amount, Some(Amount::from_u64(9)));
    }
}
