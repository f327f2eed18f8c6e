//! Market-structure analysis of one candle series.
//!
//! `MarketAnalysis::run` is the per-timeframe pipeline: indicators, swings,
//! zones. The result is immutable and cached per bot and timeframe.

pub mod candle_pattern;
pub mod swing;
pub mod trend;
pub mod zones;

pub use candle_pattern::{classify, is_bearish, is_bullish, CandleAnalysis, CandlePattern, Lean};
pub use swing::{BreakDirection, SwingAnalysis, SwingDetector, SwingKind, SwingPoint, TrendBreak};
pub use trend::TrendClassifier;
pub use zones::{nearest_zone, ValueZone, ValueZoneBuilder, ZONE_WIDTH_FACTOR};

use crate::data::CandleSeries;
use crate::indicators::{IndicatorEngine, IndicatorSettings, IndicatorValues, ATR};

#[derive(Debug, Clone)]
pub struct MarketAnalysis {
    pub series: CandleSeries,
    pub indicators: IndicatorValues,
    pub swings: SwingAnalysis,
    pub zones: Vec<ValueZone>,
    /// Mean of the finite ATR values over the window.
    pub mean_atr: Option<f64>,
}

impl MarketAnalysis {
    pub fn run(series: CandleSeries, settings: &IndicatorSettings) -> Self {
        let indicators = IndicatorEngine::compute(&series, settings);
        let swings = SwingDetector::detect(series.candles());
        let mean_atr = indicators.mean(ATR);
        let zones = match mean_atr {
            Some(atr) => ValueZoneBuilder::from_mean_atr(atr)
                .build(&swings.breaks, series.len().saturating_sub(1)),
            None => Vec::new(),
        };

        Self {
            series,
            indicators,
            swings,
            zones,
            mean_atr,
        }
    }

    pub fn last_close(&self) -> Option<f64> {
        self.series.last().map(|c| c.close)
    }

    pub fn pattern(&self) -> CandlePattern {
        classify(self.series.candles())
    }

    /// ATR of the last closed candle, falling back to the newest value.
    pub fn sizing_atr(&self) -> Option<f64> {
        self.indicators
            .from_end(ATR, 1)
            .or_else(|| self.indicators.from_end(ATR, 0))
    }
}
