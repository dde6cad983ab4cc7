//! Typed chain events consumed by the indexer.
//!
//! One JSON object per event: block coordinates at the top level, the event
//! name under `event` and its arguments under `params`.

use serde::{Deserialize, Serialize};

use super::{Address, Amount, EventMeta};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "params")]
pub enum EventKind {
    // Multi-asset delegation
    OperatorRegistered {
        operator: Address,
        #[serde(default)]
        stake: Amount,
    },
    OperatorStakeIncreased {
        operator: Address,
        amount: Amount,
    },
    OperatorUnstakeScheduled {
        operator: Address,
        amount: Amount,
        #[serde(default)]
        ready_round: u64,
    },
    OperatorUnstakeExecuted {
        operator: Address,
        amount: Amount,
    },
    OperatorLeavingScheduled {
        operator: Address,
        #[serde(default)]
        ready_round: u64,
    },
    OperatorLeft {
        operator: Address,
    },
    Deposited {
        delegator: Address,
        #[serde(default)]
        token: Address,
        amount: Amount,
        #[serde(default)]
        lock: u64,
    },
    WithdrawScheduled {
        delegator: Address,
        #[serde(default)]
        token: Address,
        amount: Amount,
        #[serde(default)]
        ready_round: u64,
    },
    Withdrawn {
        delegator: Address,
        #[serde(default)]
        token: Address,
        amount: Amount,
    },
    Delegated {
        delegator: Address,
        operator: Address,
        #[serde(default)]
        token: Address,
        amount: Amount,
        shares: Amount,
        #[serde(default)]
        selection_mode: u64,
    },
    DelegatorUnstakeScheduled {
        delegator: Address,
        operator: Address,
        #[serde(default)]
        token: Address,
        shares: Amount,
        #[serde(default)]
        estimated_amount: Amount,
        #[serde(default)]
        ready_round: u64,
    },
    DelegatorUnstakeExecuted {
        delegator: Address,
        operator: Address,
        #[serde(default)]
        token: Address,
        shares: Amount,
        amount: Amount,
    },
    AssetEnabled {
        #[serde(default)]
        token: Address,
        #[serde(default)]
        min_operator_stake: Amount,
        #[serde(default)]
        min_delegation: Amount,
    },
    AssetDisabled {
        #[serde(default)]
        token: Address,
    },
    RoundAdvanced {
        round: u64,
    },
    Slashed {
        operator: Address,
        #[serde(default)]
        service_id: u64,
        operator_slashed: Amount,
        #[serde(default)]
        delegators_slashed: Amount,
        #[serde(default)]
        new_exchange_rate: Amount,
    },
    RewardDistributed {
        operator: Address,
        amount: Amount,
    },
    RewardClaimed {
        account: Address,
        amount: Amount,
    },
    OperatorBlueprintAdded {
        operator: Address,
        blueprint_id: u64,
    },
    OperatorBlueprintRemoved {
        operator: Address,
        blueprint_id: u64,
    },

    // Slash proposals
    SlashProposed {
        slash_id: u64,
        #[serde(default)]
        service_id: u64,
        operator: Address,
        #[serde(default)]
        proposer: Address,
        amount: Amount,
        #[serde(default)]
        effective_amount: Amount,
        #[serde(default)]
        evidence: String,
        #[serde(default)]
        execute_after: u64,
    },
    SlashDisputed {
        slash_id: u64,
        #[serde(default)]
        disputer: Address,
        #[serde(default)]
        reason: String,
    },
    SlashCancelled {
        slash_id: u64,
        #[serde(default)]
        canceller: Address,
        #[serde(default)]
        reason: String,
    },
    SlashExecuted {
        slash_id: u64,
        operator: Address,
        #[serde(default)]
        service_id: u64,
        actual_slashed: Amount,
    },

    // Inflation pool
    OperatorRewardClaimed {
        operator: Address,
        amount: Amount,
    },
    CustomerRewardClaimed {
        customer: Address,
        amount: Amount,
    },
    DeveloperRewardClaimed {
        developer: Address,
        amount: Amount,
    },

    // Liquid delegation. Vault events are identified by `src_address`.
    VaultCreated {
        vault: Address,
        operator: Address,
        #[serde(default)]
        asset: Address,
        #[serde(default)]
        name: String,
        #[serde(default)]
        symbol: String,
        #[serde(default)]
        blueprint_ids: Vec<u64>,
    },
    VaultDeposit {
        #[serde(default)]
        sender: Address,
        owner: Address,
        assets: Amount,
        shares: Amount,
    },
    VaultWithdraw {
        #[serde(default)]
        sender: Address,
        #[serde(default)]
        receiver: Address,
        owner: Address,
        assets: Amount,
        shares: Amount,
    },
    RedeemRequest {
        controller: Address,
        owner: Address,
        request_id: u64,
        shares: Amount,
    },
    VaultTransfer {
        from: Address,
        to: Address,
        value: Amount,
    },
    RewardsHarvested {
        amount: Amount,
    },

    // Reward vaults
    RewardVaultCreated {
        #[serde(default)]
        asset: Address,
        #[serde(default)]
        apy_bps: u64,
        #[serde(default)]
        deposit_cap: Amount,
        #[serde(default)]
        incentive_cap: Amount,
    },
    RewardVaultConfigUpdated {
        #[serde(default)]
        asset: Address,
        #[serde(default)]
        apy_bps: u64,
        #[serde(default)]
        deposit_cap: Amount,
        #[serde(default)]
        incentive_cap: Amount,
    },
    RewardVaultDeactivated {
        #[serde(default)]
        asset: Address,
    },
    StakeRecorded {
        #[serde(default)]
        asset: Address,
        delegator: Address,
        #[serde(default)]
        operator: Address,
        amount: Amount,
    },
    UnstakeRecorded {
        #[serde(default)]
        asset: Address,
        delegator: Address,
        #[serde(default)]
        operator: Address,
        amount: Amount,
    },
    RewardsDistributed {
        #[serde(default)]
        asset: Address,
        operator: Address,
        pool_reward: Amount,
        #[serde(default)]
        commission: Amount,
    },
    DelegatorRewardsClaimed {
        #[serde(default)]
        asset: Address,
        delegator: Address,
        #[serde(default)]
        operator: Address,
        amount: Amount,
    },
    OperatorCommissionClaimed {
        #[serde(default)]
        asset: Address,
        operator: Address,
        amount: Amount,
    },

    // Services
    ServiceActivated {
        service_id: u64,
        #[serde(default)]
        blueprint_id: u64,
        #[serde(default)]
        owner: Address,
    },
    ServiceTerminated {
        service_id: u64,
    },
    OperatorJoinedService {
        service_id: u64,
        operator: Address,
        #[serde(default)]
        exposure_bps: u64,
    },
    OperatorLeftService {
        service_id: u64,
        operator: Address,
    },
}

impl EventKind {
    /// Event name as it appears in the feed.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::OperatorRegistered { .. } => "OperatorRegistered",
            EventKind::OperatorStakeIncreased { .. } => "OperatorStakeIncreased",
            EventKind::OperatorUnstakeScheduled { .. } => "OperatorUnstakeScheduled",
            EventKind::OperatorUnstakeExecuted { .. } => "OperatorUnstakeExecuted",
            EventKind::OperatorLeavingScheduled { .. } => "OperatorLeavingScheduled",
            EventKind::OperatorLeft { .. } => "OperatorLeft",
            EventKind::Deposited { .. } => "Deposited",
            EventKind::WithdrawScheduled { .. } => "WithdrawScheduled",
            EventKind::Withdrawn { .. } => "Withdrawn",
            EventKind::Delegated { .. } => "Delegated",
            EventKind::DelegatorUnstakeScheduled { .. } => "DelegatorUnstakeScheduled",
            EventKind::DelegatorUnstakeExecuted { .. } => "DelegatorUnstakeExecuted",
            EventKind::AssetEnabled { .. } => "AssetEnabled",
            EventKind::AssetDisabled { .. } => "AssetDisabled",
            EventKind::RoundAdvanced { .. } => "RoundAdvanced",
            EventKind::Slashed { .. } => "Slashed",
            EventKind::RewardDistributed { .. } => "RewardDistributed",
            EventKind::RewardClaimed { .. } => "RewardClaimed",
            EventKind::OperatorBlueprintAdded { .. } => "OperatorBlueprintAdded",
            EventKind::OperatorBlueprintRemoved { .. } => "OperatorBlueprintRemoved",
            EventKind::SlashProposed { .. } => "SlashProposed",
            EventKind::SlashDisputed { .. } => "SlashDisputed",
            EventKind::SlashCancelled { .. } => "SlashCancelled",
            EventKind::SlashExecuted { .. } => "SlashExecuted",
            EventKind::OperatorRewardClaimed { .. } => "OperatorRewardClaimed",
            EventKind::CustomerRewardClaimed { .. } => "CustomerRewardClaimed",
            EventKind::DeveloperRewardClaimed { .. } => "DeveloperRewardClaimed",
            EventKind::VaultCreated { .. } => "VaultCreated",
            EventKind::VaultDeposit { .. } => "VaultDeposit",
            EventKind::VaultWithdraw { .. } => "VaultWithdraw",
            EventKind::RedeemRequest { .. } => "RedeemRequest",
            EventKind::VaultTransfer { .. } => "VaultTransfer",
            EventKind::RewardsHarvested { .. } => "RewardsHarvested",
            EventKind::RewardVaultCreated { .. } => "RewardVaultCreated",
            EventKind::RewardVaultConfigUpdated { .. } => "RewardVaultConfigUpdated",
            EventKind::RewardVaultDeactivated { .. } => "RewardVaultDeactivated",
            EventKind::StakeRecorded { .. } => "StakeRecorded",
            EventKind::UnstakeRecorded { .. } => "UnstakeRecorded",
            EventKind::RewardsDistributed { .. } => "RewardsDistributed",
            EventKind::DelegatorRewardsClaimed { .. } => "DelegatorRewardsClaimed",
            EventKind::OperatorCommissionClaimed { .. } => "OperatorCommissionClaimed",
            EventKind::ServiceActivated { .. } => "ServiceActivated",
            EventKind::ServiceTerminated { .. } => "ServiceTerminated",
            EventKind::OperatorJoinedService { .. } => "OperatorJoinedService",
            EventKind::OperatorLeftService { .. } => "OperatorLeftService",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deposited_line() {
        let line = r#"{
            "block_number": 10,
            "block_hash": "0xabc",
            "timestamp": 1000,
            "tx_hash": "0xtx",
            "log_index": 2,
            "event": "Deposited",
            "params": {"delegator": "0xDEAD", "amount": "100000000000000000000"}
        }"#;
        let event: ChainEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.meta.block_number, 10);
        assert_eq!(event.kind.name(), "Deposited");
        match event.kind {
            EventKind::Deposited {
                delegator,
                token,
                amount,
                lock,
            } => {
                assert_eq!(delegator.as_str(), "0xdead");
                assert!(token.is_zero());
                assert_eq!(amount, Amount::pow10(20));
                assert_eq!(lock, 0);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_slash_proposed_defaults() {
        let line = r#"{"block_number":7,"block_hash":"0xb7","timestamp":84,"log_index":1,"event":"SlashProposed","params":{"slash_id":3,"operator":"0xOP","amount":"500","evidence":"0xdeadbeef"}}"#;
        let event: ChainEvent = serde_json::from_str(line).unwrap();
        match event.kind {
            EventKind::SlashProposed {
                slash_id,
                service_id,
                operator,
                proposer,
                effective_amount,
                evidence,
                ..
            } => {
                assert_eq!(slash_id, 3);
                assert_eq!(service_id, 0);
                assert_eq!(operator.as_str(), "0xop");
                assert!(proposer.is_zero());
                assert!(effective_amount.is_zero());
                assert_eq!(evidence, "0xdeadbeef");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let line = r#"{"block_number":1,"block_hash":"0x","timestamp":0,"log_index":0,"event":"Nope","params":{}}"#;
        assert!(serde_json::from_str::<ChainEvent>(line).is_err());
    }
}
