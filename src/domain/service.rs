//! Service instances and their operator memberships.

use serde::{Deserialize, Serialize};

use super::{Address, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Active,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub blueprint_id: u64,
    pub owner: Address,
    pub status: ServiceStatus,
    pub created_at: Timestamp,
    pub terminated_at: Option<Timestamp>,
}

impl Service {
    pub fn is_active(&self) -> bool {
        self.status == ServiceStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOperator {
    pub id: String,
    pub service: String,
    pub operator: Address,
    pub exposure_bps: u64,
    pub joined_at: Timestamp,
    pub left_at: Option<Timestamp>,
    pub active: bool,
}
