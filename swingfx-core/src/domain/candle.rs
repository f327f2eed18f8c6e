//! Candle: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw mid-price bar as delivered by the price service (before normalization).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Normalized OHLC candle.
///
/// Produced only by `CandleSeries` normalization; never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    /// Larger of open and close.
    pub fn upper_body(&self) -> f64 {
        self.open.max(self.close)
    }

    /// Smaller of open and close.
    pub fn lower_body(&self) -> f64 {
        self.open.min(self.close)
    }

    /// Absolute body size.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_up(&self) -> bool {
        self.close > self.open
    }

    pub fn is_down(&self) -> bool {
        self.close < self.open
    }

    /// Returns true if any OHLC field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

impl From<RawBar> for Candle {
    fn from(bar: RawBar) -> Self {
        Self {
            timestamp: bar.timestamp,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            open: 1.1000,
            high: 1.1050,
            low: 1.0980,
            close: 1.1030,
        }
    }

    #[test]
    fn body_levels() {
        let c = sample();
        assert_eq!(c.upper_body(), 1.1030);
        assert_eq!(c.lower_body(), 1.1000);
        assert!(c.is_up());
        assert!(!c.is_down());
        assert!((c.body() - 0.0030).abs() < 1e-12);
    }

    #[test]
    fn candle_is_sane() {
        assert!(sample().is_sane());
    }

    #[test]
    fn candle_detects_void() {
        let mut c = sample();
        c.close = f64::NAN;
        assert!(c.is_void());
        assert!(!c.is_sane());
    }

    #[test]
    fn candle_detects_insane_high_low() {
        let mut c = sample();
        c.high = 1.0970; // below low
        assert!(!c.is_sane());
    }
}
