//! Position sizing.
//!
//! Converts a signal into entry, stop, target and market-bound prices plus a
//! margin-constrained volume.
//!
//! # Formula
//! ```text
//! stop   = entry - k * ATR * buffer_multiplier
//! target = entry + k * |entry - stop| * min_risk_reward
//! limit  = entry + k * ATR * limit_multiplier
//! volume = risk% * available_margin / |entry - stop| / quote_conversion
//! ```
//! with `k = +1` for longs and `-1` for shorts. Volume is then capped so that
//! `volume * base_conversion / leverage <= available_margin`, and truncated to
//! the pair's lot precision.

use crate::domain::{Direction, PairConfig, Signal};
use crate::service::Quote;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SizingError {
    #[error("volume {volume} below minimum order size {minimum}")]
    BelowMinimum { volume: f64, minimum: f64 },

    #[error("stop distance is zero or undefined")]
    InvalidStopDistance,

    #[error("no ATR value available")]
    NoAtr,

    #[error("no margin available")]
    NoMargin,

    #[error("invalid quote: {0}")]
    InvalidQuote(String),
}

/// Group-level risk parameters consumed by the sizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    /// Percent of available margin risked per order.
    pub risk_percent: f64,
    /// Upper bound on the margin used for trading.
    pub trading_balance: Option<f64>,
    /// Always trade the pair's minimum order size.
    pub min_order: bool,
    /// Use the pair's max leverage for the margin cap.
    pub margin: bool,
    pub single_position_only: bool,
    /// Share of the margin per position when several may be open.
    pub single_trade_allocation_percent: f64,
    pub buffer_multiplier: f64,
    pub limit_multiplier: f64,
    pub min_risk_reward: f64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            risk_percent: 2.0,
            trading_balance: None,
            min_order: false,
            margin: true,
            single_position_only: true,
            single_trade_allocation_percent: 100.0,
            buffer_multiplier: 1.0,
            limit_multiplier: 0.1,
            min_risk_reward: 1.5,
        }
    }
}

impl RiskParameters {
    /// Margin this order may use.
    pub fn available_margin(&self, account_margin: f64) -> f64 {
        let available = match self.trading_balance {
            Some(balance) => balance.min(account_margin),
            None => account_margin,
        };
        if self.single_position_only {
            available
        } else {
            available * self.single_trade_allocation_percent / 100.0
        }
    }
}

/// A fully priced order that has not been sent to the broker yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizedOrder {
    pub pair: String,
    pub direction: Direction,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    /// Worst acceptable fill price.
    pub limit: f64,
    pub volume: f64,
    /// ATR the prices were derived from.
    pub atr: f64,
    pub available_margin: f64,
}

impl SizedOrder {
    pub fn stop_distance(&self) -> f64 {
        (self.entry - self.stop).abs()
    }
}

pub struct PositionSizer;

impl PositionSizer {
    pub fn size(
        signal: &Signal,
        quote: &Quote,
        atr: f64,
        pair: &PairConfig,
        risk: &RiskParameters,
        account_margin: f64,
    ) -> Result<SizedOrder, SizingError> {
        if !atr.is_finite() || atr <= 0.0 {
            return Err(SizingError::NoAtr);
        }
        if !account_margin.is_finite() || account_margin <= 0.0 {
            return Err(SizingError::NoMargin);
        }
        if !(quote.quote_conversion.is_finite() && quote.quote_conversion > 0.0) {
            return Err(SizingError::InvalidQuote("quote conversion factor".into()));
        }
        if !(quote.base_conversion.is_finite() && quote.base_conversion > 0.0) {
            return Err(SizingError::InvalidQuote("base conversion factor".into()));
        }

        let direction = signal.direction;
        let k = direction.sign();
        let entry = signal.price.unwrap_or_else(|| quote.entry_for(direction));

        let stop = entry - k * atr * risk.buffer_multiplier;
        let distance = (entry - stop).abs();
        if !distance.is_finite() || distance <= 0.0 {
            return Err(SizingError::InvalidStopDistance);
        }
        let target = entry + k * distance * risk.min_risk_reward;
        let limit = entry + k * atr * risk.limit_multiplier;

        let available = risk.available_margin(account_margin);
        if available <= 0.0 {
            return Err(SizingError::NoMargin);
        }

        let volume = if risk.min_order {
            pair.min_order_size
        } else {
            risk.risk_percent / 100.0 * available / distance / quote.quote_conversion
        };
        let volume = pair.truncate_volume(cap_by_margin(
            volume,
            quote.base_conversion,
            effective_leverage(pair, risk),
            available,
        ));

        if volume < pair.min_order_size {
            return Err(SizingError::BelowMinimum {
                volume,
                minimum: pair.min_order_size,
            });
        }

        Ok(SizedOrder {
            pair: pair.name.clone(),
            direction,
            entry: pair.truncate_price(entry),
            stop: pair.truncate_price(stop),
            target: pair.truncate_price(target),
            limit: pair.truncate_price(limit),
            volume,
            atr,
            available_margin: available,
        })
    }
}

pub fn effective_leverage(pair: &PairConfig, risk: &RiskParameters) -> f64 {
    if risk.margin {
        f64::from(pair.max_leverage.max(1))
    } else {
        1.0
    }
}

/// Scale `volume` down so its margin requirement fits in `available`.
pub fn cap_by_margin(volume: f64, base_conversion: f64, leverage: f64, available: f64) -> f64 {
    let required = volume * base_conversion / leverage;
    if required > available {
        volume * available / required
    } else {
        volume
    }
}
