//! Liquid delegation vault share accounting.
//!
//! Vault totals and per-account positions move together here; handlers decide
//! which moves an event implies and deal with points afterwards. Every
//! decrement saturates at zero.

use crate::domain::{
    keys, Address, Amount, Decimal, LiquidDelegationVault, LiquidRedeemRequest,
    LiquidVaultPosition, Timestamp,
};
use crate::pricing::{AssetCategory, AssetMetadata, AssetRegistry};
use crate::store::{Repository, StoreError};

/// Fractional digits kept in a vault share token's derived scale.
const SHARE_SCALE_PRECISION: u32 = 6;

/// Pricing metadata for a vault's share token: derived from the underlying at
/// the current assets-per-share ratio, or 1 while the vault is empty.
pub fn share_token_metadata(vault: &LiquidDelegationVault) -> AssetMetadata {
    let scale = if vault.total_assets.is_zero() {
        None
    } else {
        Decimal::from_ratio(vault.total_assets, vault.total_shares, SHARE_SCALE_PRECISION)
    };
    let symbol = if vault.symbol.is_empty() {
        let tag: String = vault.id.as_str().chars().skip(2).take(4).collect();
        format!("ld-{}", tag)
    } else {
        vault.symbol.clone()
    };
    AssetMetadata {
        address: vault.id.clone(),
        symbol,
        decimals: 18,
        price_id: None,
        category: AssetCategory::Vault,
        fallback_price_usd: None,
        derived_from: Some(vault.asset.clone()),
        derived_scale: Some(scale.unwrap_or_else(Decimal::one)),
    }
}

/// Persist `vault` and refresh its share token's pricing metadata.
pub async fn save_vault(
    repo: &Repository,
    registry: &AssetRegistry,
    vault: &LiquidDelegationVault,
) -> Result<(), StoreError> {
    repo.set(vault).await?;
    registry.register(share_token_metadata(vault)).await;
    Ok(())
}

pub async fn ensure_position(
    repo: &Repository,
    vault: &Address,
    account: &Address,
    now: Timestamp,
) -> Result<LiquidVaultPosition, StoreError> {
    let id = keys::vault_position(vault, account);
    Ok(repo
        .get::<LiquidVaultPosition>(&id)
        .await?
        .unwrap_or_else(|| LiquidVaultPosition {
            id,
            vault: vault.clone(),
            account: account.clone(),
            shares: Amount::ZERO,
            pending_shares: Amount::ZERO,
            pending_assets: Amount::ZERO,
            first_minted_at: now,
            updated_at: now,
        }))
}

/// Add active shares to a position, counting a new depositor on 0 → positive.
pub fn credit_shares(vault: &mut LiquidDelegationVault, position: &mut LiquidVaultPosition, shares: Amount) {
    let was_empty = position.shares.is_zero();
    position.shares = position.shares.saturating_add(shares);
    if was_empty && position.shares.is_positive() {
        vault.total_depositors += 1;
    }
}

/// Remove active shares from a position, dropping a depositor on positive → 0.
///
/// Returns true if the position's active shares reached zero here.
pub fn debit_shares(vault: &mut LiquidDelegationVault, position: &mut LiquidVaultPosition, shares: Amount) -> bool {
    let had_shares = position.shares.is_positive();
    position.shares = position.shares.saturating_sub(shares);
    let emptied = had_shares && position.shares.is_zero();
    if emptied {
        vault.total_depositors = vault.total_depositors.saturating_sub(1);
    }
    emptied
}

/// Reserve `shares` (worth `assets`) on the position for a pending redeem.
pub fn reserve_pending(position: &mut LiquidVaultPosition, shares: Amount, assets: Amount) {
    position.pending_shares = position.pending_shares.saturating_add(shares);
    position.pending_assets = position.pending_assets.saturating_add(assets);
}

/// Release a redeem reservation made by [`reserve_pending`].
pub fn release_pending(position: &mut LiquidVaultPosition, shares: Amount, assets: Amount) {
    position.pending_shares = position.pending_shares.saturating_sub(shares);
    position.pending_assets = position.pending_assets.saturating_sub(assets);
}

/// Oldest unclaimed redeem request of `vault` for `controller` and exactly `shares`.
pub async fn find_open_redeem(
    repo: &Repository,
    vault: &Address,
    controller: &Address,
    shares: Amount,
) -> Result<Option<LiquidRedeemRequest>, StoreError> {
    let requests: Vec<LiquidRedeemRequest> = repo.find_by("vault", vault).await?;
    Ok(requests
        .into_iter()
        .find(|r| !r.claimed && &r.controller == controller && r.shares == shares))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SelectionMode;

    fn vault(total_assets: u64, total_shares: u64) -> LiquidDelegationVault {
        LiquidDelegationVault {
            id: Address::new("0xfeedbeef"),
            operator: Address::new("0xop"),
            asset: Address::zero(),
            name: "Vault".to_string(),
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
    fn test_share_token_scale() {
        let meta = share_token_metadata(&vault(150, 100));
        assert_eq!(meta.derived_scale, Some(Decimal::from_str_canonical("1.5").unwrap()));
        assert_eq!(meta.derived_from, Some(Address::zero()));
        assert_eq!(meta.symbol, "ld-feed");

        let empty = share_token_metadata(&vault(0, 0));
        assert_eq!(empty.derived_scale, Some(Decimal::one()));
    }

    #[tokio::test]
    async fn test_depositor_count_tracks_zero_crossings() {
        let repo = Repository::in_memory();
        let mut v = vault(0, 0);
        let mut p = ensure_position(&repo, &v.id, &Address::new("0xa"), Timestamp::new(1))
            .await
            .unwrap();

        credit_shares(&mut v, &mut p, Amount::from_u64(10));
        credit_shares(&mut v, &mut p, Amount::from_u64(5));
        assert_eq!(v.total_depositors, 1);

        assert!(!debit_shares(&mut v, &mut p, Amount::from_u64(5)));
        assert!(debit_shares(&mut v, &mut p, Amount::from_u64(50)));
        assert_eq!(p.shares, Amount::ZERO);
        assert_eq!(v.total_depositors, 0);

        // Already empty: no further change
        assert!(!debit_shares(&mut v, &mut p, Amount::from_u64(1)));
        assert_eq!(v.total_depositors, 0);
    }

    #[test]
    fn test_pending_release_saturates() {
        let mut p = LiquidVaultPosition {
            id: "p".to_string(),
            vault: Address::new("0xv"),
            account: Address::new("0xa"),
            shares: Amount::ZERO,
            pending_shares: Amount::ZERO,
            pending_assets: Amount::ZERO,
            first_minted_at: Timestamp::new(0),
            updated_at: Timestamp::new(0),
        };
        reserve_pending(&mut p, Amount::from_u64(4), Amount::from_u64(8));
        assert!(p.has_pending());
        release_pending(&mut p, Amount::from_u64(10), Amount::from_u64(10));
        assert!(!p.has_pending());
    }

    #[tokio::test]
    async fn test_find_open_redeem_skips_claimed() {
        let repo = Repository::in_memory();
        let v = Address::new("0xv");
        let c = Address::new("0xc");
        for (request_id, claimed) in [(1u64, true), (2, false), (3, false)] {
            repo.set(&LiquidRedeemRequest {
                id: keys::redeem_request(&v, &c, request_id),
                vault: v.clone(),
                controller: c.clone(),
                owner: c.clone(),
                request_id,
                shares: Amount::from_u64(5),
                estimated_assets: Amount::from_u64(5),
                claimed,
                claimed_at: None,
                claimer: None,
                created_at: Timestamp::new(request_id),
                tx_hash: "0x".to_string(),
            })
            .await
            .unwrap();
        }

        let found = find_open_redeem(&repo, &v, &c, Amount::from_u64(5)).await.unwrap().unwrap();
        assert_eq!(found.request_id, 2);
        assert!(find_open_redeem(&repo, &v, &c, Amount::from_u64(6)).await.unwrap().is_none());
    }
}
