//! The series abstraction behind `IndicatorEngine`.
//!
//! Each indicator maps a candle window to one `f64` per candle. The engine
//! stores the results by name in `IndicatorValues`; analysis code reads the
//! tail of those series (last finite value, value before the forming candle,
//! window mean).

use crate::domain::Candle;
use std::collections::HashMap;

/// One numeric series over a candle window.
///
/// `compute` returns exactly `candles.len()` values. Entry `t` uses candles
/// `0..=t` only, so a value never changes when later candles arrive.
/// Smoothed indicators (ATR, EMA) are seeded from the first candle and
/// return a value everywhere; windowed ones return NaN for the first
/// `lookback()` entries.
pub trait Indicator: Send + Sync {
    /// Series label including its period, like `rsi_14`.
    fn name(&self) -> &str;

    /// Candles consumed before the first settled value.
    fn lookback(&self) -> usize;

    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Named series from one analysis pass.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Raw value at `bar_index`, NaN included.
    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.get(bar_index).copied())
    }

    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    /// Last finite value of a series.
    pub fn last(&self, name: &str) -> Option<f64> {
        self.get_series(name)
            .and_then(|s| s.iter().rev().find(|v| v.is_finite()).copied())
    }

    /// Value `offset` bars before the end (0 = last bar), if finite.
    pub fn from_end(&self, name: &str, offset: usize) -> Option<f64> {
        let series = self.get_series(name)?;
        let idx = series.len().checked_sub(offset + 1)?;
        series.get(idx).copied().filter(|v| v.is_finite())
    }

    /// Mean of the finite values of a series.
    pub fn mean(&self, name: &str) -> Option<f64> {
        self.get_series(name).and_then(finite_mean)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Mean of the finite values, `None` when there are none.
pub fn finite_mean(values: &[f64]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_reads_raw_values_by_bar() {
        let mut iv = IndicatorValues::new();
        iv.insert(
            "sma_20",
            vec![f64::NAN; 19]
                .into_iter()
                .chain(vec![100.0, 101.0])
                .collect(),
        );
        assert!(iv.get("sma_20", 0).unwrap().is_nan());
        assert_eq!(iv.get("sma_20", 19), Some(100.0));
        assert_eq!(iv.get("sma_20", 20), Some(101.0));
        assert_eq!(iv.get("sma_20", 21), None);
    }

    #[test]
    fn unknown_series_is_none() {
        let iv = IndicatorValues::new();
        assert_eq!(iv.get("nonexistent", 0), None);
        assert_eq!(iv.mean("nonexistent"), None);
    }

    #[test]
    fn from_end_and_mean_skip_nan() {
        let mut iv = IndicatorValues::new();
        iv.insert("atr", vec![f64::NAN, 2.0, 4.0]);
        assert_eq!(iv.from_end("atr", 0), Some(4.0));
        assert_eq!(iv.from_end("atr", 1), Some(2.0));
        assert_eq!(iv.from_end("atr", 2), None);
        assert_eq!(iv.from_end("atr", 3), None);
        assert_eq!(iv.mean("atr"), Some(3.0));
        assert_eq!(iv.last("atr"), Some(4.0));
    }
}
