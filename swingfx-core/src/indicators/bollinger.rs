//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! Four series, one `Indicator` instance each:
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//! - Width: stddev(close, period)
//!
//! Population stddev (divide by N). Lookback: period - 1.

use super::indicator::Indicator;
use crate::domain::Candle;

/// Which Bollinger series to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
    Width,
}

impl BollingerBand {
    fn label(self) -> &'static str {
        match self {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
            BollingerBand::Width => "width",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(band: BollingerBand, period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{}_{period}_{multiplier}", band.label()),
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Upper, period, multiplier)
    }

    pub fn middle(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Middle, period, multiplier)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Lower, period, multiplier)
    }

    pub fn width(period: usize) -> Self {
        Self::new(BollingerBand::Width, period, 1.0)
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period {
            return result;
        }

        for i in (self.period - 1)..n {
            let window = &candles[i + 1 - self.period..=i];
            let mean = window.iter().map(|c| c.close).sum::<f64>() / self.period as f64;

            let variance = window
                .iter()
                .map(|c| {
                    let diff = c.close - mean;
                    diff * diff
                })
                .sum::<f64>()
                / self.period as f64;
            let stddev = variance.sqrt();

            result[i] = match self.band {
                BollingerBand::Middle => mean,
                BollingerBand::Upper => mean + self.multiplier * stddev,
                BollingerBand::Lower => mean - self.multiplier * stddev,
                BollingerBand::Width => stddev,
            };
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn bollinger_middle_is_sma() {
        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let result = Bollinger::middle(3, 2.0).compute(&candles);

        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 11.0, DEFAULT_EPSILON);
        assert_approx(result[3], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_bands_symmetric_around_width() {
        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let upper = Bollinger::upper(3, 2.0).compute(&candles);
        let middle = Bollinger::middle(3, 2.0).compute(&candles);
        let lower = Bollinger::lower(3, 2.0).compute(&candles);
        let width = Bollinger::width(3).compute(&candles);

        for i in 2..5 {
            assert_approx(upper[i] - middle[i], 2.0 * width[i], DEFAULT_EPSILON);
            assert_approx(middle[i] - lower[i], 2.0 * width[i], DEFAULT_EPSILON);
        }
        // population stddev of (10, 11, 12) = sqrt(2/3)
        assert_approx(width[2], (2.0f64 / 3.0).sqrt(), DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_constant_price_zero_width() {
        let candles = make_candles(&[100.0, 100.0, 100.0, 100.0]);
        let upper = Bollinger::upper(3, 2.0).compute(&candles);
        let width = Bollinger::width(3).compute(&candles);

        assert_approx(upper[2], 100.0, DEFAULT_EPSILON);
        assert_approx(width[3], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_names_are_distinct() {
        assert_ne!(
            Bollinger::upper(20, 2.0).name(),
            Bollinger::lower(20, 2.0).name()
        );
        assert_eq!(Bollinger::width(20).lookback(), 19);
    }
}
