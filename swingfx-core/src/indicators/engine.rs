//! Computes the configured indicator set over a candle series.

use super::atr::Atr;
use super::bollinger::Bollinger;
use super::ema::Ema;
use super::indicator::{Indicator, IndicatorValues};
use super::rsi::Rsi;
use super::sma::Sma;
use super::stochastic::{Stochastic, StochasticLine};
use crate::data::CandleSeries;
use serde::{Deserialize, Serialize};

pub const ATR: &str = "ATR";
pub const MA: &str = "MA";
pub const BB_UPPER: &str = "BB_UPPER";
pub const BB_MIDDLE: &str = "BB_MIDDLE";
pub const BB_LOWER: &str = "BB_LOWER";
pub const BB_WIDTH: &str = "BB_WIDTH";
pub const RSI: &str = "RSI";
pub const STOCH_K: &str = "STOCH_K";
pub const STOCH_D: &str = "STOCH_D";
pub const STOCH_SIGNAL: &str = "STOCH_SIGNAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovingAverageKind {
    Sma,
    Ema,
}

/// Indicator periods. Part of `GroupConfig` under `[indicators]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub atr_period: usize,
    pub ma_kind: MovingAverageKind,
    pub ma_period: usize,
    pub bollinger_period: usize,
    pub bollinger_sigma: f64,
    pub rsi_period: usize,
    pub stochastic_period: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            atr_period: 14,
            ma_kind: MovingAverageKind::Ema,
            ma_period: 50,
            bollinger_period: 20,
            bollinger_sigma: 2.0,
            rsi_period: 14,
            stochastic_period: 14,
        }
    }
}

impl IndicatorSettings {
    /// Periods must be at least 1; the sigma must be positive.
    pub fn is_valid(&self) -> bool {
        self.atr_period >= 1
            && self.ma_period >= 1
            && self.bollinger_period >= 1
            && self.rsi_period >= 1
            && self.stochastic_period >= 1
            && self.bollinger_sigma.is_finite()
            && self.bollinger_sigma > 0.0
    }
}

/// Stateless indicator engine.
pub struct IndicatorEngine;

impl IndicatorEngine {
    /// Build the indicator set described by `settings`, keyed by output name.
    pub fn indicators(settings: &IndicatorSettings) -> Vec<(&'static str, Box<dyn Indicator>)> {
        let ma: Box<dyn Indicator> = match settings.ma_kind {
            MovingAverageKind::Sma => Box::new(Sma::new(settings.ma_period)),
            MovingAverageKind::Ema => Box::new(Ema::new(settings.ma_period)),
        };
        let bb = settings.bollinger_period;
        let sigma = settings.bollinger_sigma;
        let so = settings.stochastic_period;

        let mut out: Vec<(&'static str, Box<dyn Indicator>)> = Vec::with_capacity(10);
        out.push((ATR, Box::new(Atr::new(settings.atr_period))));
        out.push((MA, ma));
        out.push((BB_UPPER, Box::new(Bollinger::upper(bb, sigma))));
        out.push((BB_MIDDLE, Box::new(Bollinger::middle(bb, sigma))));
        out.push((BB_LOWER, Box::new(Bollinger::lower(bb, sigma))));
        out.push((BB_WIDTH, Box::new(Bollinger::width(bb))));
        out.push((RSI, Box::new(Rsi::new(settings.rsi_period))));
        out.push((STOCH_K, Box::new(Stochastic::new(StochasticLine::K, so))));
        out.push((STOCH_D, Box::new(Stochastic::new(StochasticLine::D, so))));
        out.push((STOCH_SIGNAL, Box::new(Stochastic::new(StochasticLine::Signal, so))));
        out
    }

    /// Compute every configured series over `series`.
    pub fn compute(series: &CandleSeries, settings: &IndicatorSettings) -> IndicatorValues {
        let candles = series.candles();
        let mut values = IndicatorValues::new();
        for (name, indicator) in Self::indicators(settings) {
            values.insert(name, indicator.compute(candles));
        }
        values
    }
}
