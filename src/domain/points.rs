//! Points programs, participation state and the award ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Amount, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramCategory {
    Operator,
    Delegator,
    Service,
}

/// Which account total a program's awards count toward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointsNetwork {
    #[default]
    Mainnet,
    Testnet,
    Generic,
}

impl FromStr for PointsNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MAINNET" => Ok(PointsNetwork::Mainnet),
            "TESTNET" => Ok(PointsNetwork::Testnet),
            "GENERIC" => Ok(PointsNetwork::Generic),
            other => Err(format!("unknown points network: {}", other)),
        }
    }
}

impl fmt::Display for PointsNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PointsNetwork::Mainnet => "MAINNET",
            PointsNetwork::Testnet => "TESTNET",
            PointsNetwork::Generic => "GENERIC",
        };
        write!(f, "{}", s)
    }
}

/// Persisted program definition, written on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsProgram {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: ProgramCategory,
    pub network: PointsNetwork,
    pub weight: u32,
    pub created_at: Timestamp,
}

/// Eligibility of one entity for one hourly program. Keyed `{program}:{entity}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationState {
    pub id: String,
    pub program: String,
    pub entity_id: String,
    pub category: ProgramCategory,
    pub active: bool,
    pub last_award_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsAccount {
    pub id: String,
    pub total_points: Amount,
    pub total_mainnet_points: Amount,
    pub total_testnet_points: Amount,
    pub leaderboard_score: Amount,
    pub updated_at: Timestamp,
}

impl PointsAccount {
    pub fn new(id: String, now: Timestamp) -> Self {
        Self {
            id,
            total_points: Amount::ZERO,
            total_mainnet_points: Amount::ZERO,
            total_testnet_points: Amount::ZERO,
            leaderboard_score: Amount::ZERO,
            updated_at: now,
        }
    }
}

/// USD basis behind an hourly award, 1e18-scaled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsdBasis {
    pub total: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquid: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Amount>,
}

/// One immutable award.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsEvent {
    pub id: String,
    pub account: String,
    pub program: String,
    pub amount: Amount,
    pub reason: String,
    pub block_number: u64,
    pub timestamp: Timestamp,
    pub tx_hash: String,
}

/// Account total right after an award, with the basis that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsSnapshot {
    pub id: String,
    pub account: String,
    pub program: String,
    pub total_points: Amount,
    pub block_number: u64,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<UsdBasis>,
}

/// Per-program aggregate of sweep awards within one hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsHourlyTotal {
    pub id: String,
    pub program: String,
    pub hour: Timestamp,
    pub points: Amount,
    pub usd_basis: Amount,
    pub award_count: u64,
}

impl PointsHourlyTotal {
    pub fn new(program: &str, hour: Timestamp) -> Self {
        Self {
            id: format!("{}:{}", program, hour),
            program: program.to_string(),
            hour,
            points: Amount::ZERO,
            usd_basis: Amount::ZERO,
            award_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parse() {
        assert_eq!("testnet".parse::<PointsNetwork>().unwrap(), PointsNetwork::Testnet);
        assert_eq!(" MAINNET ".parse::<PointsNetwork>().unwrap(), PointsNetwork::Mainnet);
        assert!("devnet".parse::<PointsNetwork>().is_err());
    }

    #[test]
    fn test_basis_omits_missing_components() {
        let basis = UsdBasis {
            total: Amount::from_u64(5),
            direct: Some(Amount::from_u64(5)),
            ..Default::default()
        };
        let json = serde_json::to_value(&basis).unwrap();
        assert_eq!(json["total"], "5");
        assert!(json.get("liquid").is_none());
    }
}
