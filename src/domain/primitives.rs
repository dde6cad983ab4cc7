//! Domain primitives: Address, Timestamp, EventMeta.

use serde::{Deserialize, Serialize};

/// The all-zero address. Stands in for the native asset and for missing addresses.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Chain time in seconds since Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a Timestamp from seconds.
    pub fn new(secs: u64) -> Self {
        Timestamp(secs)
    }

    /// Get the underlying seconds value.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Start of the hour containing this timestamp.
    pub fn hour_floor(&self) -> Timestamp {
        Timestamp(self.0 - self.0 % 3600)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical (lowercase) account or contract address.
///
/// Deserializing always normalizes, so an `Address` read from an event or the
/// store can be compared and used as a key directly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Address(String);

impl Address {
    /// Normalize a raw address: trimmed and lowercased, empty becomes the zero address.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Self::zero();
        }
        Address(trimmed.to_lowercase())
    }

    /// The zero address.
    pub fn zero() -> Self {
        Address(ZERO_ADDRESS.to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_ADDRESS
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Address::new(value)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Address::new(value)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block and log coordinates carried by every chain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    pub block_number: u64,
    pub block_hash: String,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub log_index: u32,
    /// Emitting contract. Liquid vault events identify their vault by this field.
    #[serde(default)]
    pub src_address: Address,
}

impl EventMeta {
    /// Stable id for audit rows: `{blockHash}-{logIndex}`.
    pub fn event_id(&self) -> String {
        format!("{}-{}", self.block_hash, self.log_index)
    }

    /// Transaction hash, falling back to the block hash when absent.
    pub fn tx_hash(&self) -> &str {
        self.tx_hash
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.block_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_normalizes_case_and_whitespace() {
        let addr = Address::new("  0xABCdef  ");
        assert_eq!(addr.as_str(), "0xabcdef");
    }

    #[test]
    fn test_empty_address_is_zero() {
        assert!(Address::new("").is_zero());
        assert_eq!(Address::default().as_str(), ZERO_ADDRESS);
    }

    #[test]
    fn test_address_deserialize_normalizes() {
        let addr: Address = serde_json::from_str("\"0xDEADBEEF\"").unwrap();
        assert_eq!(addr.as_str(), "0xdeadbeef");
        assert_eq!(serde_json::to_string(&addr).unwrap(), "\"0xdeadbeef\"");
    }

    #[test]
    fn test_event_id_and_tx_fallback() {
        let meta = EventMeta {
            block_number: 7,
            block_hash: "0xblock".to_string(),
            timestamp: Timestamp::new(100),
            tx_hash: None,
            log_index: 3,
            src_address: Address::zero(),
        };
        assert_eq!(meta.event_id(), "0xblock-3");
        assert_eq!(meta.tx_hash(), "0xblock");
    }

    #[test]
    fn test_timestamp_since_saturates() {
        let t1 = Timestamp::new(1000);
        let t2 = Timestamp::new(4600);
        assert_eq!(t2.since(t1), 3600);
        assert_eq!(t1.since(t2), 0);
        assert_eq!(Timestamp::new(7300).hour_floor(), Timestamp::new(7200));
    }
}
