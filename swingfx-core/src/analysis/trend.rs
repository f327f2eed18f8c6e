//! Trend classification across a coarse and a fine timeframe.
//!
//! Long horizon: direction of the latest trend break, kept only when the
//! break originates outside the value zone nearest the current price.
//! Short horizon: a down break that is still the latest low, followed by a
//! bullish reversal candle, reads LONG (mirrored for SHORT).
//! A signal needs both horizons to agree.

use super::candle_pattern::CandlePattern;
use super::swing::{BreakDirection, SwingKind};
use super::zones::nearest_zone;
use super::MarketAnalysis;
use crate::domain::{Direction, Signal};

pub struct TrendClassifier;

impl TrendClassifier {
    pub fn long_horizon(analysis: &MarketAnalysis) -> Option<Direction> {
        if !analysis.swings.has_structure() {
            return None;
        }
        let last = analysis.swings.last_break()?;
        let close = analysis.last_close()?;

        let Some(zone) = nearest_zone(&analysis.zones, close) else {
            return Some(direction_of(last.direction));
        };

        match last.direction {
            BreakDirection::Up if last.price() < zone.bottom => Some(Direction::Long),
            BreakDirection::Down if last.price() > zone.top => Some(Direction::Short),
            _ => None,
        }
    }

    pub fn short_horizon(analysis: &MarketAnalysis) -> Option<Direction> {
        if !analysis.swings.has_structure() {
            return None;
        }
        let last = analysis.swings.last_break()?;

        let (kind, pattern, direction) = match last.direction {
            BreakDirection::Down => (SwingKind::Low, CandlePattern::Bullish, Direction::Long),
            BreakDirection::Up => (SwingKind::High, CandlePattern::Bearish, Direction::Short),
        };

        let still_latest = analysis
            .swings
            .last_swing_of(kind)
            .is_some_and(|s| s.index == last.index());

        (still_latest && analysis.pattern() == pattern).then_some(direction)
    }

    pub fn combine(long: Option<Direction>, short: Option<Direction>) -> Option<Signal> {
        match (long, short) {
            (Some(l), Some(s)) if l == s => Some(Signal::new(l)),
            _ => None,
        }
    }

    /// Signal for one tick from the coarse and fine analyses.
    pub fn evaluate(long: &MarketAnalysis, short: &MarketAnalysis) -> Option<Signal> {
        Self::combine(Self::long_horizon(long), Self::short_horizon(short))
    }
}

fn direction_of(direction: BreakDirection) -> Direction {
    match direction {
        BreakDirection::Up => Direction::Long,
        BreakDirection::Down => Direction::Short,
    }
}
