use serde::{Deserialize, Serialize};

use super::precision::{step, truncate};

/// Instrument metadata for one traded currency pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PairConfig {
    /// Broker instrument name, e.g. `EUR_USD`.
    pub name: String,
    /// Human readable name, e.g. `EUR/USD`. Defaults to `name`.
    #[serde(default)]
    pub display_name: String,
    /// Price precision (decimal places).
    pub price_decimals: u32,
    /// Volume precision (decimal places).
    #[serde(default)]
    pub lot_decimals: u32,
    /// Minimal order volume accepted by the broker.
    pub min_order_size: f64,
    /// Maximum leverage (1 / margin rate).
    #[serde(default = "default_leverage")]
    pub max_leverage: u32,
}

fn default_leverage() -> u32 {
    1
}

impl PairConfig {
    pub fn new(name: impl Into<String>, price_decimals: u32, lot_decimals: u32) -> Self {
        let name = name.into();
        Self {
            display_name: name.replace('_', "/"),
            name,
            price_decimals,
            lot_decimals,
            min_order_size: 1.0,
            max_leverage: 1,
        }
    }

    pub fn with_min_order(mut self, min_order_size: f64) -> Self {
        self.min_order_size = min_order_size;
        self
    }

    pub fn with_max_leverage(mut self, max_leverage: u32) -> Self {
        self.max_leverage = max_leverage;
        self
    }

    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// One pip at the configured price precision.
    pub fn pip(&self) -> f64 {
        step(self.price_decimals)
    }

    /// One lot at the configured volume precision.
    pub fn lot(&self) -> f64 {
        step(self.lot_decimals)
    }

    pub fn truncate_price(&self, price: f64) -> f64 {
        truncate(price, self.price_decimals)
    }

    pub fn truncate_volume(&self, volume: f64) -> f64 {
        truncate(volume, self.lot_decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_defaults_from_instrument() {
        let pair = PairConfig::new("EUR_USD", 5, 0);
        assert_eq!(pair.label(), "EUR/USD");
    }

    #[test]
    fn price_and_volume_truncation() {
        let pair = PairConfig::new("USD_JPY", 3, 0);
        assert_eq!(pair.truncate_price(151.23489), 151.234);
        assert_eq!(pair.truncate_volume(1234.9), 1234.0);
        assert!((pair.pip() - 0.001).abs() < 1e-12);
    }

    #[test]
    fn deserializes_with_defaults() {
        let pair: PairConfig = toml::from_str(
            r#"
            name = "GBP_USD"
            price_decimals = 5
            min_order_size = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(pair.lot_decimals, 0);
        assert_eq!(pair.max_leverage, 1);
        assert_eq!(pair.label(), "GBP_USD");
    }
}
