//! Stochastic oscillator.
//!
//! %K = 100 * (close - LL) / (HH - LL) over `period` bars
//! %D = SMA3(%K)
//! Signal: +1 from a bullish %K/%D cross with %D < 20 until the next bearish
//! cross; -1 from a bearish cross with %D > 80 until the next bullish cross.
//! The long and short legs are tracked independently and summed.

use super::indicator::Indicator;
use super::sma::rolling_mean;
use crate::domain::Candle;

const OVERSOLD: f64 = 20.0;
const OVERBOUGHT: f64 = 80.0;
const SMOOTHING: usize = 3;

/// Which stochastic series to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StochasticLine {
    K,
    D,
    Signal,
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    period: usize,
    line: StochasticLine,
    name: String,
}

impl Stochastic {
    pub fn new(line: StochasticLine, period: usize) -> Self {
        assert!(period >= 1, "Stochastic period must be >= 1");
        let tag = match line {
            StochasticLine::K => "k",
            StochasticLine::D => "d",
            StochasticLine::Signal => "signal",
        };
        Self {
            period,
            line,
            name: format!("stoch_{tag}_{period}"),
        }
    }
}

/// %K series. NaN during warm-up or when the window has no range.
pub fn percent_k(candles: &[Candle], period: usize) -> Vec<f64> {
    let n = candles.len();
    let mut k = vec![f64::NAN; n];
    if period == 0 || n < period {
        return k;
    }

    for i in (period - 1)..n {
        let window = &candles[i + 1 - period..=i];
        let lowest = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let highest = window
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let range = highest - lowest;
        if range > 0.0 {
            k[i] = 100.0 * (candles[i].close - lowest) / range;
        }
    }

    k
}

/// Entry/exit state series derived from %K and %D.
pub fn cross_signal(k: &[f64], d: &[f64]) -> Vec<f64> {
    let n = k.len().min(d.len());
    let mut signal = vec![0.0; n];
    let mut long = 0.0;
    let mut short = 0.0;

    for i in 1..n {
        // NaN comparisons are false, so warm-up bars never trigger.
        let bullish_cross = k[i] > d[i] && k[i - 1] < d[i - 1];
        let bearish_cross = k[i] < d[i] && k[i - 1] > d[i - 1];

        if bullish_cross && d[i] < OVERSOLD {
            long = 1.0;
        } else if bearish_cross {
            long = 0.0;
        }

        if bearish_cross && d[i] > OVERBOUGHT {
            short = -1.0;
        } else if bullish_cross {
            short = 0.0;
        }

        signal[i] = long + short;
    }

    signal
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period + SMOOTHING - 2
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let k = percent_k(candles, self.period);
        match self.line {
            StochasticLine::K => k,
            StochasticLine::D => rolling_mean(&k, SMOOTHING),
            StochasticLine::Signal => {
                let d = rolling_mean(&k, SMOOTHING);
                cross_signal(&k, &d)
            }
        }
    }
}
