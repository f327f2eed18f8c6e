use crate::domain::{truncate, Direction, StopId, TradeId};
use crate::service::FillConfirmation;
use crate::sizing::SizedOrder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Order lifecycle state. Transitions only move forward:
/// Pending → Trailing → Closed, or Pending → Closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Filled by the broker; initial stop only.
    Pending,
    /// Trailing stop placed.
    Trailing,
    /// Terminal.
    Closed,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Trailing => write!(f, "TRAILING"),
            OrderStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseStatus {
    Profit,
    Loss,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LifecycleError {
    #[error("order is closed")]
    AlreadyClosed,

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

/// Broker report of a closed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub close_price: f64,
    pub close_time: DateTime<Utc>,
    pub net: f64,
}

/// A broker-confirmed position with full lifecycle tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub pair: String,
    pub direction: Direction,
    /// Fill price.
    pub entry: f64,
    /// Initial stop.
    pub stop: f64,
    pub target: f64,
    pub volume: f64,
    pub status: OrderStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_price: Option<f64>,
    /// Realized result in account currency.
    pub net: f64,
    /// Realized risk/reward multiple, signed.
    pub rvr: Option<f64>,
    pub trade_id: TradeId,
    pub stop_id: Option<StopId>,
}

impl Order {
    /// Order created from a broker fill; starts `Pending`.
    pub fn from_fill(sized: &SizedOrder, fill: FillConfirmation) -> Self {
        Self {
            pair: sized.pair.clone(),
            direction: sized.direction,
            entry: fill.fill_price,
            stop: sized.stop,
            target: sized.target,
            volume: sized.volume,
            status: OrderStatus::Pending,
            opened_at: fill.fill_time,
            closed_at: None,
            close_price: None,
            net: 0.0,
            rvr: None,
            trade_id: fill.trade_id,
            stop_id: fill.stop_id,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status != OrderStatus::Closed
    }

    pub fn stop_distance(&self) -> f64 {
        (self.entry - self.stop).abs()
    }

    /// Trailing distance: stop distance × `trail_multiplier`, truncated to price precision.
    pub fn trail_buffer(&self, trail_multiplier: f64, price_decimals: u32) -> f64 {
        truncate(self.stop_distance() * trail_multiplier, price_decimals)
    }

    /// Price level that activates the trailing stop.
    pub fn trail_activation(&self, buffer: f64) -> f64 {
        self.target - self.direction.sign() * buffer
    }

    /// True when the stop should be moved: not trailing yet, and either no
    /// stop exists or price reached the activation level.
    pub fn should_trail(&self, bid: f64, ask: f64, buffer: f64) -> bool {
        if self.status != OrderStatus::Pending {
            return false;
        }
        if self.stop_id.is_none() {
            return true;
        }
        let activation = self.trail_activation(buffer);
        match self.direction {
            Direction::Long => bid >= activation,
            Direction::Short => ask <= activation,
        }
    }

    /// Pending → Trailing.
    pub fn mark_trailing(&mut self, stop_id: StopId) -> Result<(), LifecycleError> {
        match self.status {
            OrderStatus::Pending => {
                self.stop_id = Some(stop_id);
                self.status = OrderStatus::Trailing;
                Ok(())
            }
            OrderStatus::Closed => Err(LifecycleError::AlreadyClosed),
            from => Err(LifecycleError::InvalidTransition {
                from,
                to: OrderStatus::Trailing,
            }),
        }
    }

    /// Record the stop id of a replacement stop without changing state.
    pub fn set_stop_id(&mut self, stop_id: StopId) -> Result<(), LifecycleError> {
        if !self.is_open() {
            return Err(LifecycleError::AlreadyClosed);
        }
        self.stop_id = Some(stop_id);
        Ok(())
    }

    /// Any open state → Closed. Close fields are written exactly once.
    pub fn close(&mut self, trade: ClosedTrade) -> Result<(), LifecycleError> {
        if !self.is_open() {
            return Err(LifecycleError::AlreadyClosed);
        }
        self.rvr = Some(self.realized_rvr(trade.close_price));
        self.close_price = Some(trade.close_price);
        self.closed_at = Some(trade.close_time);
        self.net = trade.net;
        self.status = OrderStatus::Closed;
        Ok(())
    }

    /// Signed multiple of the initial risk, truncated to one decimal.
    pub fn realized_rvr(&self, close_price: f64) -> f64 {
        let risk = self.stop_distance();
        if risk <= 0.0 || !risk.is_finite() {
            return 0.0;
        }
        truncate(self.direction.sign() * (close_price - self.entry) / risk, 1)
    }

    pub fn close_status(&self) -> Option<CloseStatus> {
        if self.is_open() {
            return None;
        }
        Some(if self.net > 0.0 {
            CloseStatus::Profit
        } else {
            CloseStatus::Loss
        })
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.close_price {
            Some(_) => write!(f, "{} {} {:.2}", self.pair, self.direction, self.net),
            None => write!(f, "{} {} x{}", self.pair, self.direction, self.volume),
        }
    }
}
