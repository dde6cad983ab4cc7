//! Liquid delegation vault records.

use serde::{Deserialize, Serialize};

use super::{Address, Amount, SelectionMode, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidDelegationVault {
    pub id: Address,
    pub operator: Address,
    pub asset: Address,
    pub name: String,
    pub symbol: String,
    pub selection_mode: SelectionMode,
    pub total_assets: Amount,
    pub total_shares: Amount,
    pub pending_redeem_shares: Amount,
    pub total_depositors: u64,
    pub harvested_rewards: Amount,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LiquidDelegationVault {
    /// Underlying value of `shares` at the current share price.
    ///
    /// `None` while the vault has no shares outstanding.
    pub fn share_value(&self, shares: Amount) -> Option<Amount> {
        if self.total_shares.is_zero() {
            return None;
        }
        shares.mul_div(self.total_assets, self.total_shares)
    }

    /// Estimated assets for a redeem of `shares`, 1:1 when the vault is empty.
    pub fn estimate_assets(&self, shares: Amount) -> Amount {
        if self.total_assets.is_zero() {
            return shares;
        }
        self.share_value(shares).unwrap_or(shares)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidVaultPosition {
    pub id: String,
    pub vault: Address,
    pub account: Address,
    /// Active shares. Excludes anything reserved by a redeem request.
    pub shares: Amount,
    pub pending_shares: Amount,
    pub pending_assets: Amount,
    pub first_minted_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LiquidVaultPosition {
    pub fn has_pending(&self) -> bool {
        self.pending_shares.is_positive() || self.pending_assets.is_positive()
    }

    pub fn has_stake(&self) -> bool {
        self.shares.is_positive() || self.has_pending()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidRedeemRequest {
    pub id: String,
    pub vault: Address,
    pub controller: Address,
    pub owner: Address,
    pub request_id: u64,
    pub shares: Amount,
    pub estimated_assets: Amount,
    pub claimed: bool,
    pub claimed_at: Option<Timestamp>,
    pub claimer: Option<Address>,
    pub created_at: Timestamp,
    pub tx_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault(total_assets: u64, total_shares: u64) -> LiquidDelegationVault {
        LiquidDelegationVault {
            id: Address::new("0xvault"),
            operator: Address::new("0xop"),
            asset: Address::zero(),
            name: String::new(),
            symbol: String::new(),
            selection_mode: SelectionMode::All,
            total_assets: Amount::from_u64(total_assets),
            total_shares: Amount::from_u64(total_shares),
            pending_redeem_shares: Amount::ZERO,
            total_depositors: 0,
            harvested_rewards: Amount::ZERO,
            created_at: Timestamp::new(0),
            updated_at: Timestamp::new(0),
        }
    }

    #[test]
    fn test_share_value_undefined_without_shares() {
        assert_eq!(vault(100, 0).share_value(Amount::from_u64(5)), None);
    }

    #[test]
    fn test_share_value_truncates() {
        let v = vault(10, 3);
        assert_eq!(v.share_value(Amount::from_u64(1)), Some(Amount::from_u64(3)));
    }

    #[test]
    fn test_estimate_falls_back_one_to_one() {
        assert_eq!(vault(0, 0).estimate_assets(Amount::from_u64(7)), Amount::from_u64(7));
        assert_eq!(vault(200, 100).estimate_assets(Amount::from_u64(7)), Amount::from_u64(14));
    }
}
