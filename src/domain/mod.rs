//! Domain types for the restaking ledger.
//!
//! This module provides:
//! - Normalized primitives: Address, Timestamp, EventMeta
//! - 256-bit token amounts and decimal USD prices
//! - Every stored record, each tagged with its store kind via [`Entity`]
//! - Typed chain events

pub mod amount;
pub mod decimal;
pub mod events;
pub mod keys;
pub mod ledger;
pub mod points;
pub mod price;
pub mod primitives;
pub mod rewards;
pub mod service;
pub mod vault;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use amount::{to_amount, Amount};
pub use decimal::Decimal;
pub use events::{ChainEvent, EventKind};
pub use ledger::{
    DelegationPosition, DelegationUnstakeRequest, Delegator, DelegatorAssetPosition,
    DepositLock, LockDuration, Operator, OperatorBlueprint, OperatorStakeChange, OperatorStatus,
    RequestStatus, RestakingAsset, RestakingRound, RestakingSlash, SelectionMode, SlashProposal,
    SlashStatus, StakeChangeKind, WithdrawRequest, LATEST_ROUND_ID,
};
pub use points::{
    ParticipationState, PointsAccount, PointsEvent, PointsHourlyTotal, PointsNetwork,
    PointsProgram, PointsSnapshot, ProgramCategory, UsdBasis,
};
pub use price::{AssetPrice, AssetPriceSample, PriceSource, PriceStatus};
pub use primitives::{Address, EventMeta, Timestamp, ZERO_ADDRESS};
pub use rewards::{RestakingRewardClaim, RewardDistribution, RewardKind, RewardVault, RewardVaultState};
pub use service::{Service, ServiceOperator, ServiceStatus};
pub use vault::{LiquidDelegationVault, LiquidRedeemRequest, LiquidVaultPosition};

/// A record persisted in the entity store under `(KIND, id)`.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const KIND: &'static str;

    fn id(&self) -> String;
}

macro_rules! entity {
    ($($ty:ty => $kind:literal),* $(,)?) => {
        $(
            impl Entity for $ty {
                const KIND: &'static str = $kind;

                fn id(&self) -> String {
                    self.id.to_string()
                }
            }
        )*
    };
}

entity! {
    Operator => "Operator",
    OperatorStakeChange => "OperatorStakeChange",
    Delegator => "Delegator",
    DelegatorAssetPosition => "DelegatorAssetPosition",
    DelegationPosition => "DelegationPosition",
    WithdrawRequest => "WithdrawRequest",
    DelegationUnstakeRequest => "DelegationUnstakeRequest",
    RestakingAsset => "RestakingAsset",
    RestakingRound => "RestakingRound",
    DepositLock => "DepositLock",
    RestakingSlash => "RestakingSlash",
    SlashProposal => "SlashProposal",
    OperatorBlueprint => "OperatorBlueprint",
    LiquidDelegationVault => "LiquidDelegationVault",
    LiquidVaultPosition => "LiquidVaultPosition",
    LiquidRedeemRequest => "LiquidRedeemRequest",
    RewardDistribution => "RewardDistribution",
    RestakingRewardClaim => "RestakingRewardClaim",
    RewardVault => "RewardVault",
    RewardVaultState => "RewardVaultState",
    Service => "Service",
    ServiceOperator => "ServiceOperator",
    PointsProgram => "PointsProgram",
    ParticipationState => "ParticipationState",
    PointsAccount => "PointsAccount",
    PointsEvent => "PointsEvent",
    PointsSnapshot => "PointsSnapshot",
    PointsHourlyTotal => "PointsHourlyTotal",
    AssetPrice => "AssetPrice",
    AssetPriceSample => "AssetPriceSample",
}
