//! Candle series normalization.
//!
//! Turns the raw bar window returned by the price service into an ordered,
//! immutable `CandleSeries`:
//! - validation (non-empty, finite prices, strictly increasing timestamps)
//! - optional smoothing (open = previous close)
//! - optional merge of the in-progress last bar into the one before it

use crate::domain::{Candle, RawBar};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("empty bar window")]
    Empty,

    #[error("non-finite price at bar {index}")]
    NonFinite { index: usize },

    #[error("timestamps not strictly increasing at bar {index}")]
    NonMonotonic { index: usize },
}

/// Normalization switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesOptions {
    /// Rebuild each bar's open from the previous close.
    pub smooth: bool,
    /// Fold the last (unclosed) bar into the previous one and drop it.
    pub merge_last: bool,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            smooth: false,
            merge_last: true,
        }
    }
}

/// Ordered, index-addressable candle sequence. Insertion order is chronological.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Normalize a raw bar window.
    pub fn from_raw(bars: &[RawBar], options: SeriesOptions) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }
        for (i, bar) in bars.iter().enumerate() {
            if !(bar.open.is_finite()
                && bar.high.is_finite()
                && bar.low.is_finite()
                && bar.close.is_finite())
            {
                return Err(SeriesError::NonFinite { index: i });
            }
            if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
                return Err(SeriesError::NonMonotonic { index: i });
            }
        }

        let mut candles: Vec<Candle> = bars.iter().copied().map(Candle::from).collect();

        if options.smooth {
            for i in 1..candles.len() {
                let prev_close = candles[i - 1].close;
                let c = &mut candles[i];
                c.open = prev_close;
                c.high = c.high.max(c.open).max(c.close);
                c.low = c.low.min(c.open).min(c.close);
            }
        }

        if options.merge_last && candles.len() >= 2 {
            let n = candles.len();
            let last = candles[n - 1];
            let prev = &mut candles[n - 2];
            let hi = [prev.open, prev.high, prev.low, prev.close, last.open, last.high, last.low, last.close]
                .into_iter()
                .fold(f64::NEG_INFINITY, f64::max);
            let lo = [prev.open, prev.high, prev.low, prev.close, last.open, last.high, last.low, last.close]
                .into_iter()
                .fold(f64::INFINITY, f64::min);
            prev.close = last.close;
            prev.high = hi;
            prev.low = lo;
            candles.truncate(n - 1);
        }

        Ok(Self { candles })
    }

    /// Wrap already-normalized candles (tests, CSV import).
    pub fn from_candles(candles: Vec<Candle>) -> Result<Self, SeriesError> {
        if candles.is_empty() {
            return Err(SeriesError::Empty);
        }
        for i in 1..candles.len() {
            if candles[i].timestamp <= candles[i - 1].timestamp {
                return Err(SeriesError::NonMonotonic { index: i });
            }
        }
        Ok(Self { candles })
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// The last `n` candles (or all of them when shorter).
    pub fn window(&self, n: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(n);
        &self.candles[start..]
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.candles.first().map(|c| c.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.candles.last().map(|c| c.timestamp)
    }
}
