//! Restaking ledger records: operators, delegators, positions and queued requests.

use serde::{Deserialize, Serialize};

use super::{Address, Amount, Timestamp};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorStatus {
    #[default]
    Active,
    Leaving,
    Inactive,
}

/// A restaking operator. Created on first reference, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: Address,
    pub stake: Amount,
    pub status: OperatorStatus,
    pub scheduled_unstake_amount: Option<Amount>,
    pub scheduled_unstake_round: Option<u64>,
    pub leaving_round: Option<u64>,
    pub delegation_count: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Operator {
    pub fn new(id: Address, now: Timestamp) -> Self {
        Self {
            id,
            stake: Amount::ZERO,
            status: OperatorStatus::Active,
            scheduled_unstake_amount: None,
            scheduled_unstake_round: None,
            leaving_round: None,
            delegation_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StakeChangeKind {
    Registered,
    StakeIncreased,
    UnstakeScheduled,
    UnstakeExecuted,
    LeavingScheduled,
    Left,
    Slashed,
}

/// Immutable audit row for every operator stake mutation.
///
/// `amount` is the raw amount carried by the event, even when the stake
/// itself was clamped at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorStakeChange {
    pub id: String,
    pub operator: Address,
    pub kind: StakeChangeKind,
    pub amount: Option<Amount>,
    pub ready_round: Option<u64>,
    pub block_number: u64,
    pub timestamp: Timestamp,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegator {
    pub id: Address,
    pub total_deposited: Amount,
    pub total_delegated: Amount,
    pub withdraw_nonce: u64,
    pub withdraw_cursor: u64,
    pub unstake_nonce: u64,
    pub unstake_cursor: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Delegator {
    pub fn new(id: Address, now: Timestamp) -> Self {
        Self {
            id,
            total_deposited: Amount::ZERO,
            total_delegated: Amount::ZERO,
            withdraw_nonce: 0,
            withdraw_cursor: 0,
            unstake_nonce: 0,
            unstake_cursor: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Running per-asset balances of one delegator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorAssetPosition {
    pub id: String,
    pub delegator: Address,
    pub token: Address,
    pub deposited: Amount,
    pub delegated: Amount,
    pub locked: Amount,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionMode {
    #[default]
    All,
    Fixed,
}

impl SelectionMode {
    /// Map the on-chain selection code. Only `1` means FIXED.
    pub fn from_code(code: u64) -> Self {
        if code == 1 {
            SelectionMode::Fixed
        } else {
            SelectionMode::All
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationPosition {
    pub id: String,
    pub delegator: Address,
    pub operator: Address,
    pub token: Address,
    pub shares: Amount,
    /// Underlying amount as of the last delegate or unstake event.
    pub last_known_amount: Amount,
    pub selection_mode: SelectionMode,
    pub created_round: u64,
    pub updated_round: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Executed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub id: String,
    pub delegator: Address,
    pub nonce: u64,
    pub token: Address,
    pub amount: Amount,
    pub ready_round: u64,
    pub status: RequestStatus,
    pub requested_at: Timestamp,
    pub executed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationUnstakeRequest {
    pub id: String,
    pub delegator: Address,
    pub nonce: u64,
    pub operator: Address,
    pub token: Address,
    pub shares: Amount,
    /// Estimate at request time, replaced by the executed amount on settlement.
    pub estimated_amount: Amount,
    pub ready_round: u64,
    pub status: RequestStatus,
    pub requested_at: Timestamp,
    pub executed_at: Option<Timestamp>,
}

/// Restakable asset configuration and aggregate deposits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestakingAsset {
    pub id: Address,
    pub enabled: bool,
    pub min_operator_stake: Amount,
    pub min_delegation: Amount,
    pub current_deposits: Amount,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RestakingAsset {
    pub fn new(id: Address, now: Timestamp) -> Self {
        Self {
            id,
            enabled: true,
            min_operator_stake: Amount::ZERO,
            min_delegation: Amount::ZERO,
            current_deposits: Amount::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Round marker. Stored once under the round number and once under [`LATEST_ROUND_ID`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestakingRound {
    pub id: String,
    pub round: u64,
    pub block_number: u64,
    pub timestamp: Timestamp,
}

pub const LATEST_ROUND_ID: &str = "latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockDuration {
    None,
    OneMonth,
    TwoMonths,
    ThreeMonths,
    SixMonths,
}

impl LockDuration {
    pub fn from_code(code: u64) -> Self {
        match code {
            1 => LockDuration::OneMonth,
            2 => LockDuration::TwoMonths,
            3 => LockDuration::ThreeMonths,
            4 => LockDuration::SixMonths,
            _ => LockDuration::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositLock {
    pub id: String,
    pub position: String,
    pub amount: Amount,
    pub duration: LockDuration,
    pub block_number: u64,
    pub created_at: Timestamp,
}

/// Slash applied to an operator and its delegators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestakingSlash {
    pub id: String,
    pub operator: Address,
    pub service_id: u64,
    pub operator_slashed: Amount,
    pub delegators_slashed: Amount,
    pub exchange_rate_after: Amount,
    pub block_number: u64,
    pub tx_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlashStatus {
    Pending,
    Disputed,
    Cancelled,
    Executed,
}

impl SlashStatus {
    /// Cancelled and executed proposals accept no further transitions.
    pub fn is_final(self) -> bool {
        matches!(self, SlashStatus::Cancelled | SlashStatus::Executed)
    }
}

/// A proposed slash moving through dispute, cancellation or execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashProposal {
    pub id: String,
    pub slash_id: u64,
    pub service_id: u64,
    pub operator: Address,
    pub proposer: Address,
    pub amount: Amount,
    pub effective_amount: Amount,
    /// Hex-encoded evidence bytes.
    pub evidence: String,
    pub execute_after: u64,
    pub status: SlashStatus,
    pub created_at: Timestamp,
    pub disputer: Option<Address>,
    pub dispute_reason: Option<String>,
    pub disputed_at: Option<Timestamp>,
    pub canceller: Option<Address>,
    pub cancel_reason: Option<String>,
    pub cancelled_at: Option<Timestamp>,
    pub actual_slashed: Option<Amount>,
    pub executed_at: Option<Timestamp>,
}

/// An operator's registration for a blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorBlueprint {
    pub id: String,
    pub operator: Address,
    pub blueprint_id: u64,
    pub active: bool,
    pub added_at: Timestamp,
    pub removed_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_duration_codes() {
        assert_eq!(LockDuration::from_code(1), LockDuration::OneMonth);
        assert_eq!(LockDuration::from_code(4), LockDuration::SixMonths);
        assert_eq!(LockDuration::from_code(0), LockDuration::None);
        assert_eq!(LockDuration::from_code(9), LockDuration::None);
    }

    #[test]
    fn test_selection_mode_codes() {
        assert_eq!(SelectionMode::from_code(1), SelectionMode::Fixed);
        assert_eq!(SelectionMode::from_code(0), SelectionMode::All);
        assert_eq!(SelectionMode::from_code(2), SelectionMode::All);
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&RequestStatus::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
        let kind = serde_json::to_string(&StakeChangeKind::UnstakeExecuted).unwrap();
        assert_eq!(kind, "\"UNSTAKE_EXECUTED\"");
    }

    #[test]
    fn test_slash_status_finality() {
        assert!(!SlashStatus::Pending.is_final());
        assert!(!SlashStatus::Disputed.is_final());
        assert!(SlashStatus::Cancelled.is_final());
        assert!(SlashStatus::Executed.is_final());
    }
}
