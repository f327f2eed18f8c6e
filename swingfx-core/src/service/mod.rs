//! Price/order service abstraction.
//!
//! The engine never talks to a broker directly. Every external call goes
//! through `PriceService`; an `Err` from any method means "the action did not
//! happen this tick" and is never mapped to a default business value.

pub mod paper;

pub use paper::{PaperConfig, PaperService};

use crate::data::Granularity;
use crate::domain::{Direction, RawBar, StopId, TradeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error types for service calls.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    /// Timeout or connection failure. Retried naturally on the next tick.
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// Validation, authentication or bad-parameter response.
    #[error("request rejected: {detail}")]
    Rejected { detail: String },

    #[error("{pair} isn't tradeable at the moment")]
    NotTradeable { pair: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ServiceError {
    pub fn rejected(detail: impl Into<String>) -> Self {
        ServiceError::Rejected {
            detail: detail.into(),
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, ServiceError::Unreachable(_))
    }

    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ServiceError::Rejected { .. } | ServiceError::NotTradeable { .. }
        )
    }
}

/// Current price and conversion factors for one pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
    /// Base currency → account currency.
    pub base_conversion: f64,
    /// Quote currency → account currency.
    pub quote_conversion: f64,
    pub tradeable: bool,
}

impl Quote {
    /// Price a new position enters at: ask for longs, bid for shorts.
    pub fn entry_for(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.ask,
            Direction::Short => self.bid,
        }
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// Market order with a worst-acceptable price bound and an initial stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub pair: String,
    pub volume: f64,
    pub limit_price: f64,
    pub stop_price: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillConfirmation {
    pub trade_id: TradeId,
    /// Stop order created with the fill, if the broker attached one.
    pub stop_id: Option<StopId>,
    pub fill_price: f64,
    pub fill_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TradeStatus {
    Open,
    Closed {
        close_price: f64,
        close_time: DateTime<Utc>,
        /// Realized result in account currency.
        net: f64,
    },
}

/// Synchronous price/order service. Implementations bound their own timeouts.
pub trait PriceService: Send {
    /// Human-readable name of this service.
    fn name(&self) -> &str;

    /// Most recent `count` mid-price bars, oldest first.
    fn candles(
        &mut self,
        pair: &str,
        granularity: Granularity,
        count: usize,
    ) -> Result<Vec<RawBar>, ServiceError>;

    /// Margin currently available for new positions, in account currency.
    fn account_margin(&mut self) -> Result<f64, ServiceError>;

    fn spread(&mut self, pair: &str) -> Result<Quote, ServiceError>;

    fn place_order(
        &mut self,
        request: &PlaceOrderRequest,
    ) -> Result<FillConfirmation, ServiceError>;

    /// Replace the trade's stop with a trailing stop at `trail_distance`.
    fn adjust_stop(
        &mut self,
        trade_id: &TradeId,
        stop_id: Option<&StopId>,
        trail_distance: f64,
    ) -> Result<StopId, ServiceError>;

    fn trade_status(&mut self, trade_id: &TradeId) -> Result<TradeStatus, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServiceError::Unreachable("timeout".into()).is_connectivity());
        assert!(ServiceError::rejected("bad units").is_rejection());
        assert!(ServiceError::NotTradeable {
            pair: "EUR_USD".into()
        }
        .is_rejection());
        assert!(!ServiceError::Malformed("x".into()).is_rejection());
    }

    #[test]
    fn quote_entry_side() {
        let q = Quote {
            bid: 1.1000,
            ask: 1.1002,
            base_conversion: 1.0,
            quote_conversion: 1.0,
            tradeable: true,
        };
        assert_eq!(q.entry_for(Direction::Long), 1.1002);
        assert_eq!(q.entry_for(Direction::Short), 1.1000);
        assert!((q.spread() - 0.0002).abs() < 1e-12);
    }
}
