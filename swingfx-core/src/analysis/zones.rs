//! Support/resistance value zones built from trend-break levels.
//!
//! Each break level becomes a fixed-width band; overlapping bands are merged
//! and every merged group is re-centred to the fixed width again, so the
//! output is sorted by `bottom` and non-overlapping.

use super::swing::TrendBreak;
use serde::{Deserialize, Serialize};

/// Zone width as a multiple of the mean ATR.
pub const ZONE_WIDTH_FACTOR: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueZone {
    pub top: f64,
    pub bottom: f64,
}

impl ValueZone {
    pub fn around(center: f64, width: f64) -> Self {
        let half = width / 2.0;
        Self {
            top: center + half,
            bottom: center - half,
        }
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.bottom && price <= self.top
    }

    pub fn center(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    pub fn width(&self) -> f64 {
        self.top - self.bottom
    }

    /// Distance from `price` to the zone edge; 0 inside the zone.
    pub fn distance_to(&self, price: f64) -> f64 {
        if self.contains(price) {
            0.0
        } else if price > self.top {
            price - self.top
        } else {
            self.bottom - price
        }
    }
}

/// Zone nearest to `price`; the lower zone wins on equal distance.
pub fn nearest_zone(zones: &[ValueZone], price: f64) -> Option<&ValueZone> {
    zones.iter().fold(None, |best: Option<&ValueZone>, z| match best {
        Some(b) if b.distance_to(price) <= z.distance_to(price) => Some(b),
        _ => Some(z),
    })
}

#[derive(Debug, Clone, Copy)]
pub struct ValueZoneBuilder {
    width: f64,
}

impl ValueZoneBuilder {
    /// Builder for zones of `ZONE_WIDTH_FACTOR × mean_atr`.
    pub fn from_mean_atr(mean_atr: f64) -> Self {
        Self {
            width: mean_atr * ZONE_WIDTH_FACTOR,
        }
    }

    pub fn with_width(width: f64) -> Self {
        Self { width }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Zones for every break except one sitting on the final, still forming
    /// candle (`last_index`).
    pub fn build(&self, breaks: &[TrendBreak], last_index: usize) -> Vec<ValueZone> {
        let levels: Vec<f64> = breaks
            .iter()
            .filter(|b| b.index() != last_index)
            .map(TrendBreak::price)
            .collect();
        self.from_levels(&levels)
    }

    /// Band per level, merge overlapping groups, re-centre to fixed width.
    pub fn from_levels(&self, levels: &[f64]) -> Vec<ValueZone> {
        if !self.width.is_finite() || self.width <= 0.0 {
            return Vec::new();
        }

        let mut bands: Vec<ValueZone> = levels
            .iter()
            .filter(|p| p.is_finite())
            .map(|&p| ValueZone::around(p, self.width))
            .collect();
        bands.sort_by(|a, b| {
            a.bottom
                .total_cmp(&b.bottom)
                .then_with(|| a.top.total_cmp(&b.top))
        });

        let mut zones = Vec::new();
        let mut group: Vec<ValueZone> = Vec::new();
        let mut running_top = f64::NEG_INFINITY;

        for band in bands {
            if !group.is_empty() && band.bottom > running_top {
                zones.push(self.collapse(&group));
                group.clear();
                running_top = f64::NEG_INFINITY;
            }
            running_top = running_top.max(band.top);
            group.push(band);
        }
        if !group.is_empty() {
            zones.push(self.collapse(&group));
        }

        zones
    }

    fn collapse(&self, group: &[ValueZone]) -> ValueZone {
        let n = group.len() as f64;
        let mean_top = group.iter().map(|z| z.top).sum::<f64>() / n;
        let mean_bottom = group.iter().map(|z| z.bottom).sum::<f64>() / n;
        let top = mean_top - (mean_top - mean_bottom) / 2.0 + self.width / 2.0;
        ValueZone {
            top,
            bottom: top - self.width,
        }
    }
}
