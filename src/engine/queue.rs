//! FIFO matching of withdraw and unstake requests to their executions.
//!
//! Each delegator carries a `nonce`/`cursor` pair per queue. Requests take the
//! next nonce. An execution resolves the oldest PENDING request in
//! `cursor..nonce` whose descriptor equals it exactly, and the cursor moves
//! just past that request. Unmatched executions change nothing.

use std::ops::Range;
use tracing::warn;

use crate::domain::{
    keys, Address, Amount, DelegationUnstakeRequest, Delegator, Entity, RequestStatus,
    Timestamp, WithdrawRequest,
};
use crate::store::{Repository, StoreError};

/// Oldest record in `range` (by nonce) that satisfies `matches`.
async fn first_match<E, K, F>(
    repo: &Repository,
    range: Range<u64>,
    key: K,
    matches: F,
) -> Result<Option<(u64, E)>, StoreError>
where
    E: Entity,
    K: Fn(u64) -> String,
    F: Fn(&E) -> bool,
{
    for nonce in range {
        if let Some(record) = repo.get::<E>(&key(nonce)).await? {
            if matches(&record) {
                return Ok(Some((nonce, record)));
            }
        }
    }
    Ok(None)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawTicket {
    pub token: Address,
    pub amount: Amount,
    pub ready_round: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnstakeTicket {
    pub operator: Address,
    pub token: Address,
    pub shares: Amount,
    pub estimated_amount: Amount,
    pub ready_round: u64,
}

/// Write a PENDING withdraw request under the delegator's next nonce.
///
/// The caller persists `delegator` afterwards.
pub async fn enqueue_withdraw(
    repo: &Repository,
    delegator: &mut Delegator,
    ticket: WithdrawTicket,
    now: Timestamp,
) -> Result<WithdrawRequest, StoreError> {
    let nonce = delegator.withdraw_nonce;
    delegator.withdraw_nonce += 1;
    let request = WithdrawRequest {
        id: keys::withdraw_request(&delegator.id, nonce),
        delegator: delegator.id.clone(),
        nonce,
        token: ticket.token,
        amount: ticket.amount,
        ready_round: ticket.ready_round,
        status: RequestStatus::Pending,
        requested_at: now,
        executed_at: None,
    };
    repo.set(&request).await?;
    Ok(request)
}

/// Resolve the oldest pending withdraw for exactly `token` and `amount`.
pub async fn settle_withdraw(
    repo: &Repository,
    delegator: &mut Delegator,
    token: &Address,
    amount: Amount,
    now: Timestamp,
) -> Result<Option<WithdrawRequest>, StoreError> {
    let id = delegator.id.clone();
    let found = first_match::<WithdrawRequest, _, _>(
        repo,
        delegator.withdraw_cursor..delegator.withdraw_nonce,
        |n| keys::withdraw_request(&id, n),
        |r| r.status == RequestStatus::Pending && &r.token == token && r.amount == amount,
    )
    .await?;

    let Some((nonce, mut request)) = found else {
        warn!(delegator = %id, token = %token, amount = %amount, "No pending withdraw matches execution");
        return Ok(None);
    };
    request.status = RequestStatus::Executed;
    request.executed_at = Some(now);
    repo.set(&request).await?;
    delegator.withdraw_cursor = nonce + 1;
    Ok(Some(request))
}

/// Write a PENDING delegation unstake request under the delegator's next nonce.
pub async fn enqueue_unstake(
    repo: &Repository,
    delegator: &mut Delegator,
    ticket: UnstakeTicket,
    now: Timestamp,
) -> Result<DelegationUnstakeRequest, StoreError> {
    let nonce = delegator.unstake_nonce;
    delegator.unstake_nonce += 1;
    let request = DelegationUnstakeRequest {
        id: keys::unstake_request(&delegator.id, nonce),
        delegator: delegator.id.clone(),
        nonce,
        operator: ticket.operator,
        token: ticket.token,
        shares: ticket.shares,
        estimated_amount: ticket.estimated_amount,
        ready_round: ticket.ready_round,
        status: RequestStatus::Pending,
        requested_at: now,
        executed_at: None,
    };
    repo.set(&request).await?;
    Ok(request)
}

/// Resolve the oldest pending unstake for exactly `operator`, `token` and `shares`.
pub async fn settle_unstake(
    repo: &Repository,
    delegator: &mut Delegator,
    operator: &Address,
    token: &Address,
    shares: Amount,
    now: Timestamp,
) -> Result<Option<DelegationUnstakeRequest>, StoreError> {
    let id = delegator.id.clone();
    let found = first_match::<DelegationUnstakeRequest, _, _>(
        repo,
        delegator.unstake_cursor..delegator.unstake_nonce,
        |n| keys::unstake_request(&id, n),
        |r| {
            r.status == RequestStatus::Pending
                && &r.operator == operator
                && &r.token == token
                && r.shares == shares
        },
    )
    .await?;

    let Some((nonce, mut request)) = found else {
        warn!(delegator = %id, operator = %operator, shares = %shares, "No pending unstake matches execution");
        return Ok(None);
    };
    request.status = RequestStatus::Executed;
    request.executed_at = Some(now);
    repo.set(&request).await?;
    delegator.unstake_cursor = nonce + 1;
    Ok(Some(request))
}
