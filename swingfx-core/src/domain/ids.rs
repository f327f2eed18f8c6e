use serde::{Deserialize, Serialize};
use std::fmt;

/// Broker-assigned identifier of an opened trade.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeId(pub String);

impl TradeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broker-assigned identifier of the stop-loss (or trailing stop) order attached to a trade.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StopId(pub String);

impl StopId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TradeId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for StopId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}
