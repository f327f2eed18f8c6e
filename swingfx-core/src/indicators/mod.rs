//! Indicator implementations and the engine that computes them per analysis pass.
//!
//! Multi-series indicators (Bollinger, Stochastic) are exposed as separate
//! named instances per line, keeping the single-series `Indicator` trait
//! unchanged. The engine stores every series under a stable name constant.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod engine;
pub mod indicator;
pub mod rsi;
pub mod sma;
pub mod stochastic;

pub use atr::{true_range, Atr};
pub use bollinger::{Bollinger, BollingerBand};
pub use ema::{ewm, Ema};
pub use engine::{
    IndicatorEngine, IndicatorSettings, MovingAverageKind, ATR, BB_LOWER, BB_MIDDLE, BB_UPPER,
    BB_WIDTH, MA, RSI, STOCH_D, STOCH_K, STOCH_SIGNAL,
};
pub use indicator::{finite_mean, Indicator, IndicatorValues};
pub use rsi::Rsi;
pub use sma::{rolling_mean, Sma};
pub use stochastic::{Stochastic, StochasticLine};

/// Create synthetic candles from close prices for testing.
///
/// open = prev_close (or close for the first candle),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, hourly timestamps.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<crate::domain::Candle> {
    let ohlc: Vec<(f64, f64, f64, f64)> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            (open, open.max(close) + 1.0, open.min(close) - 1.0, close)
        })
        .collect();
    make_ohlc(&ohlc)
}

/// Create synthetic candles from explicit (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc(bars: &[(f64, f64, f64, f64)]) -> Vec<crate::domain::Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    bars.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| crate::domain::Candle {
            timestamp: base + chrono::Duration::hours(i as i64),
            open,
            high,
            low,
            close,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
