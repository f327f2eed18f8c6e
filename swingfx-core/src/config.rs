//! Serializable bot group configuration.
//!
//! Loaded from TOML; every field has a default so a minimal file only lists
//! the pairs. The fingerprint identifies the exact configuration a persisted
//! snapshot was produced under.

use crate::data::{Granularity, SeriesOptions};
use crate::domain::PairConfig;
use crate::indicators::IndicatorSettings;
use crate::orders::LifecyclePolicy;
use crate::sizing::RiskParameters;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    pub name: String,
    /// Fine timeframe (short-horizon trend, sizing ATR).
    pub interval_short: Granularity,
    /// Coarse timeframe (long-horizon trend).
    pub interval_long: Granularity,
    /// Bars requested per analysis.
    pub candle_count: usize,
    pub risk_percent: f64,
    pub trading_balance: Option<f64>,
    pub max_consecutive_losses: u32,
    pub max_consecutive_losses_per_bot: Option<u32>,
    pub buffer_multiplier: f64,
    pub limit_multiplier: f64,
    pub min_risk_reward: f64,
    pub trail_multiplier: f64,
    pub single_trade_allocation_percent: f64,
    pub smooth: bool,
    pub merge_last: bool,
    pub margin: bool,
    pub min_order: bool,
    pub single_position_only: bool,
    pub enabled: bool,
    pub pairs: Vec<PairConfig>,
    pub indicators: IndicatorSettings,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            name: "Oanda".into(),
            interval_short: Granularity::M5,
            interval_long: Granularity::H4,
            candle_count: 500,
            risk_percent: 2.0,
            trading_balance: None,
            max_consecutive_losses: 10,
            max_consecutive_losses_per_bot: None,
            buffer_multiplier: 1.0,
            limit_multiplier: 0.1,
            min_risk_reward: 1.5,
            trail_multiplier: 0.5,
            single_trade_allocation_percent: 100.0,
            smooth: false,
            merge_last: true,
            margin: true,
            min_order: false,
            single_position_only: true,
            enabled: true,
            pairs: Vec::new(),
            indicators: IndicatorSettings::default(),
        }
    }
}

impl GroupConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values the engine cannot trade with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be > 0, got {v}")))
            }
        };

        positive("risk_percent", self.risk_percent)?;
        positive("buffer_multiplier", self.buffer_multiplier)?;
        positive("limit_multiplier", self.limit_multiplier)?;
        positive("min_risk_reward", self.min_risk_reward)?;
        positive("trail_multiplier", self.trail_multiplier)?;
        if let Some(balance) = self.trading_balance {
            positive("trading_balance", balance)?;
        }

        if self.risk_percent > 100.0 {
            return Err(ConfigError::Invalid("risk_percent must be <= 100".into()));
        }
        let alloc = self.single_trade_allocation_percent;
        if !(alloc > 0.0 && alloc <= 100.0) {
            return Err(ConfigError::Invalid(format!(
                "single_trade_allocation_percent must be in (0, 100], got {alloc}"
            )));
        }
        if self.max_consecutive_losses == 0 || self.max_consecutive_losses_per_bot == Some(0) {
            return Err(ConfigError::Invalid(
                "consecutive loss limits must be >= 1".into(),
            ));
        }
        if self.candle_count < 2 {
            return Err(ConfigError::Invalid("candle_count must be >= 2".into()));
        }
        if self.interval_long <= self.interval_short {
            return Err(ConfigError::Invalid(format!(
                "interval_long ({}) must be coarser than interval_short ({})",
                self.interval_long, self.interval_short
            )));
        }
        if !self.indicators.is_valid() {
            return Err(ConfigError::Invalid("indicator periods must be >= 1".into()));
        }

        let mut seen = HashSet::new();
        for pair in &self.pairs {
            if !seen.insert(pair.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate pair {}", pair.name)));
            }
            if !(pair.min_order_size.is_finite() && pair.min_order_size > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{}: min_order_size must be > 0",
                    pair.name
                )));
            }
        }
        Ok(())
    }

    /// BLAKE3 hex digest of the canonical JSON form.
    pub fn fingerprint(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => blake3::hash(json.as_bytes()).to_hex().to_string(),
            // Only non-string map keys fail to serialize; the config has none.
            Err(_) => String::new(),
        }
    }

    pub fn risk(&self) -> RiskParameters {
        RiskParameters {
            risk_percent: self.risk_percent,
            trading_balance: self.trading_balance,
            min_order: self.min_order,
            margin: self.margin,
            single_position_only: self.single_position_only,
            single_trade_allocation_percent: self.single_trade_allocation_percent,
            buffer_multiplier: self.buffer_multiplier,
            limit_multiplier: self.limit_multiplier,
            min_risk_reward: self.min_risk_reward,
        }
    }

    pub fn lifecycle(&self) -> LifecyclePolicy {
        LifecyclePolicy {
            trail_multiplier: self.trail_multiplier,
            max_consecutive_losses: self.max_consecutive_losses,
            max_consecutive_losses_per_bot: self.max_consecutive_losses_per_bot,
        }
    }

    pub fn series_options(&self) -> SeriesOptions {
        SeriesOptions {
            smooth: self.smooth,
            merge_last: self.merge_last,
        }
    }
}
