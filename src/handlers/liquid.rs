//! Liquid delegation vaults. Vault-level events name their vault via `src_address`.

use tracing::debug;

use super::Indexer;
use crate::domain::{
    keys, Address, Amount, Delegator, EventMeta, LiquidDelegationVault, LiquidRedeemRequest,
    SelectionMode,
};
use crate::engine::points::{DELEGATOR_HOURLY, LIQUID_VAULT_DEPOSIT};
use crate::engine::{ledger, participation, to_points_value, vault};
use crate::error::IndexerError;

#[derive(Debug, Clone, Copy)]
pub(super) struct NewVault<'a> {
    pub vault: &'a Address,
    pub operator: &'a Address,
    pub asset: &'a Address,
    pub name: &'a str,
    pub symbol: &'a str,
    pub fixed_selection: bool,
}

impl Indexer {
    async fn load_vault(&self, meta: &EventMeta) -> Result<Option<LiquidDelegationVault>, IndexerError> {
        let found = self
            .repo
            .get::<LiquidDelegationVault>(meta.src_address.as_str())
            .await?;
        if found.is_none() {
            debug!(vault = %meta.src_address, "Event for unknown vault");
        }
        Ok(found)
    }

    async fn save_vault(&self, v: &LiquidDelegationVault) -> Result<(), IndexerError> {
        vault::save_vault(&self.repo, self.oracle.registry(), v).await?;
        Ok(())
    }

    /// Make sure `account` has a delegator record so its vault shares count toward its basis.
    async fn touch_delegator(&self, account: &Address, meta: &EventMeta) -> Result<(), IndexerError> {
        if self
            .repo
            .get::<Delegator>(account.as_str())
            .await?
            .is_none()
        {
            let record = ledger::ensure_delegator(&self.repo, account, meta.timestamp).await?;
            self.repo.set(&record).await?;
        }
        Ok(())
    }

    pub(super) async fn on_vault_created(&self, meta: &EventMeta, v: NewVault<'_>) -> Result<(), IndexerError> {
        let now = meta.timestamp;
        let op = ledger::ensure_operator(&self.repo, v.operator, now).await?;
        self.repo.set(&op).await?;
        let asset = ledger::ensure_asset(&self.repo, v.asset, now).await?;
        self.repo.set(&asset).await?;

        if self
            .repo
            .get::<LiquidDelegationVault>(v.vault.as_str())
            .await?
            .is_some()
        {
            return Ok(());
        }
        let record = LiquidDelegationVault {
            id: v.vault.clone(),
            operator: v.operator.clone(),
            asset: v.asset.clone(),
            name: v.name.to_string(),
            symbol: v.symbol.to_string(),
            selection_mode: if v.fixed_selection {
                SelectionMode::Fixed
            } else {
                SelectionMode::All
            },
            total_assets: Amount::ZERO,
            total_shares: Amount::ZERO,
            pending_redeem_shares: Amount::ZERO,
            total_depositors: 0,
            harvested_rewards: Amount::ZERO,
            created_at: now,
            updated_at: now,
        };
        self.save_vault(&record).await
    }

    pub(super) async fn on_vault_deposit(
        &self,
        meta: &EventMeta,
        owner: &Address,
        assets: Amount,
        shares: Amount,
    ) -> Result<(), IndexerError> {
        let Some(mut v) = self.load_vault(meta).await? else {
            return Ok(());
        };
        let now = meta.timestamp;
        v.total_assets = v.total_assets.saturating_add(assets);
        v.total_shares = v.total_shares.saturating_add(shares);

        let mut position = vault::ensure_position(&self.repo, &v.id, owner, now).await?;
        vault::credit_shares(&mut v, &mut position, shares);
        position.updated_at = now;
        v.updated_at = now;
        self.repo.set(&position).await?;
        self.save_vault(&v).await?;

        self.touch_delegator(owner, meta).await?;
        self.award(meta, owner.as_str(), LIQUID_VAULT_DEPOSIT, to_points_value(assets), "liquid vault deposit")
            .await?;
        self.activate(DELEGATOR_HOURLY, owner.as_str(), now).await
    }

    pub(super) async fn on_vault_withdraw(
        &self,
        meta: &EventMeta,
        receiver: &Address,
        controller: &Address,
        assets: Amount,
        shares: Amount,
    ) -> Result<(), IndexerError> {
        let Some(mut v) = self.load_vault(meta).await? else {
            return Ok(());
        };
        let now = meta.timestamp;
        v.total_assets = v.total_assets.saturating_sub(assets);
        v.pending_redeem_shares = v.pending_redeem_shares.saturating_sub(shares);
        v.updated_at = now;
        self.save_vault(&v).await?;

        let Some(mut request) = vault::find_open_redeem(&self.repo, &v.id, controller, shares).await? else {
            debug!(vault = %v.id, controller = %controller, shares = %shares, "No open redeem request matches withdraw");
            return Ok(());
        };
        request.claimed = true;
        request.claimed_at = Some(now);
        request.claimer = Some(receiver.clone());
        self.repo.set(&request).await?;

        let mut position = vault::ensure_position(&self.repo, &v.id, &request.owner, now).await?;
        vault::release_pending(&mut position, request.shares, request.estimated_assets);
        position.updated_at = now;
        self.repo.set(&position).await?;

        participation::refresh_delegator(&self.repo, &self.points, DELEGATOR_HOURLY, &request.owner, now).await
    }

    pub(super) async fn on_redeem_request(
        &self,
        meta: &EventMeta,
        controller: &Address,
        owner: &Address,
        request_id: u64,
        shares: Amount,
    ) -> Result<(), IndexerError> {
        let Some(mut v) = self.load_vault(meta).await? else {
            return Ok(());
        };
        let now = meta.timestamp;
        let estimated_assets = v.estimate_assets(shares);
        self.repo
            .set(&LiquidRedeemRequest {
                id: keys::redeem_request(&v.id, controller, request_id),
                vault: v.id.clone(),
                controller: controller.clone(),
                owner: owner.clone(),
                request_id,
                shares,
                estimated_assets,
                claimed: false,
                claimed_at: None,
                claimer: None,
                created_at: now,
                tx_hash: meta.tx_hash().to_string(),
            })
            .await?;

        v.total_shares = v.total_shares.saturating_sub(shares);
        v.pending_redeem_shares = v.pending_redeem_shares.saturating_add(shares);

        let mut position = vault::ensure_position(&self.repo, &v.id, owner, now).await?;
        vault::debit_shares(&mut v, &mut position, shares);
        vault::reserve_pending(&mut position, shares, estimated_assets);
        position.updated_at = now;
        v.updated_at = now;
        self.repo.set(&position).await?;
        self.save_vault(&v).await?;

        self.touch_delegator(owner, meta).await?;
        self.activate(DELEGATOR_HOURLY, owner.as_str(), now).await
    }

    /// Move active shares between accounts. Mints, burns and moves into or
    /// out of the vault itself are booked by deposit/redeem/withdraw instead.
    pub(super) async fn on_vault_transfer(
        &self,
        meta: &EventMeta,
        from: &Address,
        to: &Address,
        value: Amount,
    ) -> Result<(), IndexerError> {
        let Some(mut v) = self.load_vault(meta).await? else {
            return Ok(());
        };
        let booked_elsewhere = |a: &Address| a.is_zero() || a == &v.id;
        if value.is_zero() || booked_elsewhere(from) || booked_elsewhere(to) {
            return Ok(());
        }
        let now = meta.timestamp;

        let mut sender = vault::ensure_position(&self.repo, &v.id, from, now).await?;
        vault::debit_shares(&mut v, &mut sender, value);
        sender.updated_at = now;
        self.repo.set(&sender).await?;

        let mut recipient = vault::ensure_position(&self.repo, &v.id, to, now).await?;
        vault::credit_shares(&mut v, &mut recipient, value);
        recipient.updated_at = now;
        self.repo.set(&recipient).await?;

        v.updated_at = now;
        self.save_vault(&v).await?;

        if !sender.has_stake() {
            participation::refresh_delegator(&self.repo, &self.points, DELEGATOR_HOURLY, from, now).await?;
        }
        if recipient.shares.is_positive() {
            self.touch_delegator(to, meta).await?;
            self.activate(DELEGATOR_HOURLY, to.as_str(), now).await?;
        }
        Ok(())
    }

    pub(super) async fn on_rewards_harvested(&self, meta: &EventMeta, amount: Amount) -> Result<(), IndexerError> {
        let Some(mut v) = self.load_vault(meta).await? else {
            return Ok(());
        };
        v.total_assets = v.total_assets.saturating_add(amount);
        v.harvested_rewards = v.harvested_rewards.saturating_add(amount);
        v.updated_at = meta.timestamp;
        self.save_vault(&v).await
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{
        Address, Amount, ChainEvent, EventKind, LiquidDelegationVault, LiquidRedeemRequest,
        LiquidVaultPosition,
    };
    use crate::handlers::test_support::{addr, indexer, meta};

    const VAULT: &str = "0xvault";

    fn vault_event(block: u64, kind: EventKind) -> ChainEvent {
        let mut m = meta(block);
        m.src_address = addr(VAULT);
        ChainEvent { meta: m, kind }
    }

    async fn create_vault(ix: &crate::handlers::Indexer) {
        ix.handle(&vault_event(
            1,
            EventKind::VaultCreated {
                vault: addr(VAULT),
                operator: addr("0xop"),
                asset: addr(""),
                name: "Liquid".to_string(),
                symbol: "lTNT".to_string(),
                blueprint_ids: vec![],
            },
        ))
        .await
        .unwrap();
    }

    async fn deposit(ix: &crate::handlers::Indexer, block: u64, owner: &str, amount: u64) {
        ix.handle(&vault_event(
            block,
            EventKind::VaultDeposit {
                sender: addr(owner),
                owner: addr(owner),
                assets: Amount::from_u64(amount),
                shares: Amount::from_u64(amount),
            },
        ))
        .await
        .unwrap();
    }

    async fn position(ix: &crate::handlers::Indexer, account: &str) -> LiquidVaultPosition {
        ix.repo()
            .get(&crate::domain::keys::vault_position(&addr(VAULT), &addr(account)))
            .await
            .unwrap()
            .unwrap()
    }

    async fn vault(ix: &crate::handlers::Indexer) -> LiquidDelegationVault {
        ix.repo().get(VAULT).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_events_for_unknown_vault_are_ignored() {
        let ix = indexer();
        deposit(&ix, 2, "0xa", 10).await;
        assert_eq!(ix.repo().count::<LiquidVaultPosition>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_harvest_raises_share_price() {
        let ix = indexer();
        create_vault(&ix).await;
        deposit(&ix, 2, "0xa", 100).await;
        let before = vault(&ix).await.share_value(Amount::from_u64(100)).unwrap();

        ix.handle(&vault_event(3, EventKind::RewardsHarvested { amount: Amount::from_u64(10) }))
            .await
            .unwrap();
        let after = vault(&ix).await;
        assert!(after.share_value(Amount::from_u64(100)).unwrap() > before);
        assert_eq!(after.harvested_rewards, Amount::from_u64(10));

        let share_token = ix.oracle().registry().get(&addr(VAULT)).await;
        assert_eq!(share_token.derived_from, Some(Address::zero()));
        assert_eq!(
            share_token.derived_scale,
            Some(crate::domain::Decimal::from_str_canonical("1.1").unwrap())
        );
    }

    #[tokio::test]
    async fn test_redeem_then_withdraw_releases_reservation() {
        let ix = indexer();
        create_vault(&ix).await;
        deposit(&ix, 2, "0xa", 100).await;

        ix.handle(&vault_event(
            3,
            EventKind::RedeemRequest {
                controller: addr("0xa"),
                owner: addr("0xa"),
                request_id: 1,
                shares: Amount::from_u64(40),
            },
        ))
        .await
        .unwrap();
        let pos = position(&ix, "0xa").await;
        assert_eq!(pos.shares, Amount::from_u64(60));
        assert_eq!(pos.pending_shares, Amount::from_u64(40));
        let v = vault(&ix).await;
        assert_eq!(v.total_shares, Amount::from_u64(60));
        assert_eq!(v.pending_redeem_shares, Amount::from_u64(40));

        ix.handle(&vault_event(
            4,
            EventKind::VaultWithdraw {
                sender: addr("0xa"),
                receiver: addr("0xr"),
                owner: addr("0xa"),
                assets: Amount::from_u64(40),
                shares: Amount::from_u64(40),
            },
        ))
        .await
        .unwrap();
        let pos = position(&ix, "0xa").await;
        assert!(!pos.has_pending());
        let request: LiquidRedeemRequest = ix
            .repo()
            .get(&crate::domain::keys::redeem_request(&addr(VAULT), &addr("0xa"), 1))
            .await
            .unwrap()
            .unwrap();
        assert!(request.claimed);
        assert_eq!(request.claimer, Some(addr("0xr")));
        let v = vault(&ix).await;
        assert_eq!(v.total_assets, Amount::from_u64(60));
        assert!(v.pending_redeem_shares.is_zero());
    }

    #[tokio::test]
    async fn test_transfer_moves_shares_and_depositors() {
        let ix = indexer();
        create_vault(&ix).await;
        deposit(&ix, 2, "0xa", 100).await;

        ix.handle(&vault_event(
            3,
            EventKind::VaultTransfer {
                from: addr("0xa"),
                to: addr("0xb"),
                value: Amount::from_u64(100),
            },
        ))
        .await
        .unwrap();
        assert!(position(&ix, "0xa").await.shares.is_zero());
        assert_eq!(position(&ix, "0xb").await.shares, Amount::from_u64(100));
        assert_eq!(vault(&ix).await.total_depositors, 1);

        // Mint-style transfer from the zero address is already booked by the deposit
        ix.handle(&vault_event(
            4,
            EventKind::VaultTransfer {
                from: Address::zero(),
                to: addr("0xb"),
                value: Amount::from_u64(5),
            },
        ))
        .await
        .unwrap();
        assert_eq!(position(&ix, "0xb").await.shares, Amount::from_u64(100));
    }
}
