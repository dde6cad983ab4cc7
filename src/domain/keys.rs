//! Stable composite ids for stored records.

use super::Address;

pub fn asset_position(delegator: &Address, token: &Address) -> String {
    format!("{}-{}", delegator, token)
}

pub fn delegation_position(delegator: &Address, operator: &Address, token: &Address) -> String {
    format!("{}-{}-{}", delegator, operator, token)
}

pub fn withdraw_request(delegator: &Address, nonce: u64) -> String {
    format!("withdraw-{}-{}", delegator, nonce)
}

pub fn unstake_request(delegator: &Address, nonce: u64) -> String {
    format!("unstake-{}-{}", delegator, nonce)
}

pub fn stake_change(operator: &Address, event_id: &str) -> String {
    format!("stake-{}-{}", operator, event_id)
}

pub fn deposit_lock(position_id: &str, event_id: &str) -> String {
    format!("lock-{}-{}", position_id, event_id)
}

pub fn vault_position(vault: &Address, account: &Address) -> String {
    format!("{}-{}", vault, account)
}

pub fn redeem_request(vault: &Address, controller: &Address, request_id: u64) -> String {
    format!("{}-{}-{}", vault, controller, request_id)
}

pub fn participation(program: &str, entity_id: &str) -> String {
    format!("{}:{}", program, entity_id)
}

pub fn service_operator(service_id: &str, operator: &Address) -> String {
    format!("{}-{}", service_id, operator)
}

pub fn slash_proposal(slash_id: u64) -> String {
    format!("slash-{}", slash_id)
}

pub fn operator_blueprint(operator: &Address, blueprint_id: u64) -> String {
    format!("{}-{}", operator, blueprint_id)
}

pub fn reward_distribution(event_id: &str) -> String {
    format!("reward-{}", event_id)
}

pub fn reward_claim(event_id: &str) -> String {
    format!("restaking-claim-{}", event_id)
}
