//! Swing detection.
//!
//! Pipeline over the candle bodies:
//! 1. raw high/low candidates from consecutive upper/lower body comparisons
//! 2. conflict resolution when one bar is both
//! 3. run collapse to one representative point per run (alternating kinds)
//! 4. HH/LL classification against the swing two positions back
//! 5. redundancy filter over the provisional trend breaks
//! 6. major levels: breaks beyond the break two positions back, last of each
//!    rising/falling leg
//! 7. amplitude filter against the median break amplitude
//!
//! Every step is an index scan over ordered arrays; ties always resolve to the
//! chronologically first candidate, so output is a pure function of the input.

use crate::domain::Candle;
use serde::{Deserialize, Serialize};

/// Minimum number of swings for the structure to be considered defined.
pub const MIN_STRUCTURE_SWINGS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwingKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreakDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    /// Bar index into the series.
    pub index: usize,
    /// Body level: upper body for highs, lower body for lows.
    pub price: f64,
    pub kind: SwingKind,
    /// Higher-high or lower-low relative to the swing two positions back.
    pub is_extreme: bool,
}

/// A swing point confirmed as a directional pivot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendBreak {
    pub point: SwingPoint,
    pub direction: BreakDirection,
}

impl TrendBreak {
    pub fn index(&self) -> usize {
        self.point.index
    }

    pub fn price(&self) -> f64 {
        self.point.price
    }
}

/// Swing structure of one series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwingAnalysis {
    pub swings: Vec<SwingPoint>,
    pub breaks: Vec<TrendBreak>,
}

impl SwingAnalysis {
    pub fn last_break(&self) -> Option<&TrendBreak> {
        self.breaks.last()
    }

    pub fn last_swing_of(&self, kind: SwingKind) -> Option<&SwingPoint> {
        self.swings.iter().rev().find(|s| s.kind == kind)
    }

    pub fn has_structure(&self) -> bool {
        self.swings.len() >= MIN_STRUCTURE_SWINGS
    }
}

pub struct SwingDetector;

impl SwingDetector {
    pub fn detect(candles: &[Candle]) -> SwingAnalysis {
        let candidates = resolve_candidates(candles);
        let swings = classify_extremes(collapse_runs(&candidates));
        let provisional: Vec<TrendBreak> = swings
            .iter()
            .filter(|s| s.is_extreme)
            .map(|s| TrendBreak {
                point: *s,
                direction: match s.kind {
                    SwingKind::High => BreakDirection::Up,
                    SwingKind::Low => BreakDirection::Down,
                },
            })
            .collect();
        let breaks = filter_amplitude(keep_major_levels(&remove_redundant(&provisional)));
        SwingAnalysis { swings, breaks }
    }
}

// ── 1-2. Candidates ─────────────────────────────────────────────────

/// One surviving candidate per bar at most: (index, kind, level).
fn resolve_candidates(candles: &[Candle]) -> Vec<(usize, SwingKind, f64)> {
    let n = candles.len();
    let mut raw_high = vec![false; n];
    let mut raw_low = vec![false; n];
    for i in 1..n {
        raw_high[i] = candles[i].upper_body() > candles[i - 1].upper_body();
        raw_low[i] = candles[i].lower_body() < candles[i - 1].lower_body();
    }

    let mut out = Vec::new();
    // Most recent bar (so far) where each raw flag was false.
    let mut last_false_high = 0;
    let mut last_false_low = 0;

    for i in 1..n {
        let kind = match (raw_high[i], raw_low[i]) {
            (true, true) => {
                // The run that started more recently wins; highs win ties.
                if last_false_high >= last_false_low {
                    Some(SwingKind::High)
                } else {
                    Some(SwingKind::Low)
                }
            }
            (true, false) => Some(SwingKind::High),
            (false, true) => Some(SwingKind::Low),
            (false, false) => None,
        };

        if !raw_high[i] {
            last_false_high = i;
        }
        if !raw_low[i] {
            last_false_low = i;
        }

        if let Some(kind) = kind {
            let level = match kind {
                SwingKind::High => candles[i].upper_body(),
                SwingKind::Low => candles[i].lower_body(),
            };
            out.push((i, kind, level));
        }
    }
    out
}

// ── 3. Run collapse ─────────────────────────────────────────────────

fn more_extreme(kind: SwingKind, a: f64, b: f64) -> bool {
    match kind {
        SwingKind::High => a > b,
        SwingKind::Low => a < b,
    }
}

fn collapse_runs(candidates: &[(usize, SwingKind, f64)]) -> Vec<SwingPoint> {
    let mut swings: Vec<SwingPoint> = Vec::new();
    let mut run_kind: Option<SwingKind> = None;

    for &(index, kind, price) in candidates {
        if run_kind == Some(kind) {
            if let Some(best) = swings.last_mut() {
                if more_extreme(kind, price, best.price) {
                    best.index = index;
                    best.price = price;
                }
            }
        } else {
            swings.push(SwingPoint {
                index,
                price,
                kind,
                is_extreme: false,
            });
            run_kind = Some(kind);
        }
    }
    swings
}

// ── 4. HH / LL ──────────────────────────────────────────────────────

fn classify_extremes(mut swings: Vec<SwingPoint>) -> Vec<SwingPoint> {
    for k in 2..swings.len() {
        let reference = swings[k - 2].price;
        let s = &mut swings[k];
        s.is_extreme = more_extreme(s.kind, s.price, reference);
    }
    swings
}

// ── 5. Redundancy ───────────────────────────────────────────────────

/// Within each run of same-direction breaks keep the last point sitting at
/// the run's extreme level.
fn remove_redundant(provisional: &[TrendBreak]) -> Vec<TrendBreak> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < provisional.len() {
        let direction = provisional[start].direction;
        let mut end = start;
        while end + 1 < provisional.len() && provisional[end + 1].direction == direction {
            end += 1;
        }

        let run = &provisional[start..=end];
        let extreme = run
            .iter()
            .map(|b| b.price())
            .fold(run[0].price(), |acc, p| match direction {
                BreakDirection::Up => acc.max(p),
                BreakDirection::Down => acc.min(p),
            });
        if let Some(kept) = run.iter().rev().find(|b| b.price() == extreme) {
            out.push(*kept);
        }

        start = end + 1;
    }
    out
}

// ── 6. Major levels ─────────────────────────────────────────────────

/// Keep breaks that extend past the break two positions back (an Up break
/// above it, a Down break below it). Among those, consecutive breaks moving
/// the same way form a leg and only the last of each leg survives. The first
/// qualifying break is always kept.
///
/// Fewer than three breaks leave nothing to compare against, so no break
/// qualifies.
fn keep_major_levels(breaks: &[TrendBreak]) -> Vec<TrendBreak> {
    let qualifying: Vec<TrendBreak> = breaks
        .iter()
        .enumerate()
        .skip(2)
        .filter(|(k, b)| {
            let reference = breaks[k - 2].price();
            match b.direction {
                BreakDirection::Up => b.price() > reference,
                BreakDirection::Down => b.price() < reference,
            }
        })
        .map(|(_, b)| *b)
        .collect();

    // The first break has no predecessor and counts as falling.
    let rising = |k: usize| k > 0 && qualifying[k].price() > qualifying[k - 1].price();

    qualifying
        .iter()
        .enumerate()
        .filter(|(k, _)| *k == 0 || k + 1 == qualifying.len() || rising(k + 1) != rising(*k))
        .map(|(_, b)| *b)
        .collect()
}

// ── 7. Amplitude ────────────────────────────────────────────────────

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Drop breaks whose move from the previous break is below the median move,
/// unless they sit at the highest or lowest break price.
fn filter_amplitude(breaks: Vec<TrendBreak>) -> Vec<TrendBreak> {
    let amplitudes: Vec<f64> = breaks
        .windows(2)
        .map(|w| (w[1].price() - w[0].price()).abs())
        .collect();
    let Some(median) = median(&amplitudes) else {
        return breaks;
    };

    let highest = breaks
        .iter()
        .map(TrendBreak::price)
        .fold(f64::NEG_INFINITY, f64::max);
    let lowest = breaks
        .iter()
        .map(TrendBreak::price)
        .fold(f64::INFINITY, f64::min);

    breaks
        .iter()
        .enumerate()
        .filter(|(k, b)| {
            if *k == 0 || b.price() == highest || b.price() == lowest {
                return true;
            }
            amplitudes[k - 1] >= median
        })
        .map(|(_, b)| *b)
        .collect()
}
