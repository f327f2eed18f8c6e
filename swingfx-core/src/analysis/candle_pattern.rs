//! Reversal candle classification on the two most recent candles.

use crate::domain::Candle;
use serde::{Deserialize, Serialize};

/// Fraction of the range a reversal body must reach into.
const REVERSAL_DEPTH: f64 = 0.75;
/// Fibonacci retracement used for the hammer / shooting star annotation.
const HAMMER_RETRACEMENT: f64 = 0.382;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandlePattern {
    Bullish,
    Bearish,
    Neutral,
}

/// Bullish reversal: the body reaches the top quarter of the range, the
/// candle is up, and it either closes above the prior high or outgrows the
/// prior body.
pub fn is_bullish(prior: &Candle, current: &Candle) -> bool {
    let mid = current.low + current.range() * REVERSAL_DEPTH;
    if current.open < mid && current.close < mid {
        return false;
    }
    current.is_up() && (current.close > prior.high || current.body() > prior.body())
}

/// Mirror of [`is_bullish`].
pub fn is_bearish(prior: &Candle, current: &Candle) -> bool {
    let mid = current.high - current.range() * REVERSAL_DEPTH;
    if current.open > mid && current.close > mid {
        return false;
    }
    current.is_down() && (current.close < prior.low || current.body() > prior.body())
}

/// Pattern of the last candle against the one before it.
pub fn classify(candles: &[Candle]) -> CandlePattern {
    let [.., prior, current] = candles else {
        return CandlePattern::Neutral;
    };
    if is_bullish(prior, current) {
        CandlePattern::Bullish
    } else if is_bearish(prior, current) {
        CandlePattern::Bearish
    } else {
        CandlePattern::Neutral
    }
}

/// Directional annotation of the last candle (report output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lean {
    Up,
    Down,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleAnalysis {
    /// Body larger than the prior body, in the candle's direction.
    pub engulf: Lean,
    /// Close beyond the prior high (up) or low (down).
    pub closed_beyond: Lean,
    /// Up: hammer (body in the top 38.2%); Down: shooting star (body in the bottom 38.2%).
    pub hammer: Lean,
}

impl CandleAnalysis {
    pub fn of(prior: &Candle, current: &Candle) -> Self {
        let (engulf, closed_beyond) = if current.is_up() {
            (
                lean_if(current.body() > prior.body(), Lean::Up),
                lean_if(current.close > prior.high, Lean::Up),
            )
        } else if current.is_down() {
            (
                lean_if(current.body() > prior.body(), Lean::Down),
                lean_if(current.close < prior.low, Lean::Down),
            )
        } else {
            (Lean::None, Lean::None)
        };

        let upper = current.high - current.range() * HAMMER_RETRACEMENT;
        let lower = current.low + current.range() * HAMMER_RETRACEMENT;
        let hammer = if current.open > upper && current.close > upper {
            Lean::Up
        } else if current.open < lower && current.close < lower {
            Lean::Down
        } else {
            Lean::None
        };

        Self {
            engulf,
            closed_beyond,
            hammer,
        }
    }

    /// Analysis of the last two candles, `None` with fewer than two.
    pub fn last(candles: &[Candle]) -> Option<Self> {
        match candles {
            [.., prior, current] => Some(Self::of(prior, current)),
            _ => None,
        }
    }
}

fn lean_if(condition: bool, lean: Lean) -> Lean {
    if condition {
        lean
    } else {
        Lean::None
    }
}
