use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Candle timeframe. Labels follow the broker's granularity codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Granularity {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D,
    W,
}

impl Granularity {
    pub fn minutes(self) -> i64 {
        match self {
            Granularity::M1 => 1,
            Granularity::M5 => 5,
            Granularity::M15 => 15,
            Granularity::M30 => 30,
            Granularity::H1 => 60,
            Granularity::H4 => 240,
            Granularity::D => 1440,
            Granularity::W => 10080,
        }
    }

    /// Length of one candle; also the validity window of cached analysis.
    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    pub fn label(self) -> &'static str {
        match self {
            Granularity::M1 => "M1",
            Granularity::M5 => "M5",
            Granularity::M15 => "M15",
            Granularity::M30 => "M30",
            Granularity::H1 => "H1",
            Granularity::H4 => "H4",
            Granularity::D => "D",
            Granularity::W => "W",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
