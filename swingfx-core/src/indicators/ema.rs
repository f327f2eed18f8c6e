//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1]
//! alpha = 2 / (period + 1), seeded from the first close (no warm-up NaNs).

use super::indicator::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        ewm(&closes, 2.0 / (self.period as f64 + 1.0))
    }
}

/// Exponentially weighted mean seeded from the first finite value.
///
/// Leading NaNs stay NaN; a NaN after the seed carries the previous mean forward.
/// Shared by ATR (alpha = 1/period) and EMA (alpha = 2/(period+1)).
pub fn ewm(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    let mut prev: Option<f64> = None;

    for (i, &v) in values.iter().enumerate() {
        let next = match (prev, v.is_finite()) {
            (None, true) => v,
            (None, false) => continue,
            (Some(p), true) => alpha * v + (1.0 - alpha) * p,
            (Some(p), false) => p,
        };
        result[i] = next;
        prev = Some(next);
    }

    result
}
