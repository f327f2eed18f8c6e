//! In-process paper trading service.
//!
//! Each pair follows a deterministic one-minute random walk seeded from the
//! master seed and the pair name, so two services with the same config
//! produce identical prices. Candles of any granularity are aggregated from
//! the minute path. Fills happen at the current quote; stops are checked
//! minute by minute while the clock advances.
//!
//! The account currency is the quote currency of every pair, so the quote
//! conversion factor is 1 and the base conversion factor is the mid price.

use super::{
    FillConfirmation, PlaceOrderRequest, PriceService, Quote, ServiceError, TradeStatus,
};
use crate::data::Granularity;
use crate::domain::{Direction, RawBar, StopId, TradeId};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub seed: u64,
    pub start_price: f64,
    /// Largest absolute move per minute.
    pub step: f64,
    /// Bid/ask spread, absolute.
    pub spread: f64,
    /// Starting account balance.
    pub balance: f64,
    /// Leverage used for the margin the service reports.
    pub leverage: f64,
    /// History generated before the first price request.
    pub warmup_minutes: i64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start_price: 1.1,
            step: 0.0002,
            spread: 0.0002,
            balance: 10_000.0,
            leverage: 30.0,
            // 500 H4 candles
            warmup_minutes: 500 * 240,
        }
    }
}

/// Minute path of one pair.
struct PricePath {
    rng: StdRng,
    origin: DateTime<Utc>,
    /// Close of minute `i` after `origin`.
    closes: Vec<f64>,
}

impl PricePath {
    fn new(seed: u64, origin: DateTime<Utc>, start_price: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            origin,
            closes: vec![start_price],
        }
    }

    fn minute_of(&self, at: DateTime<Utc>) -> i64 {
        (at - self.origin).num_minutes()
    }

    /// Extend the path through `at`; returns the index of the first new minute.
    fn extend_to(&mut self, at: DateTime<Utc>, step: f64) -> usize {
        let first_new = self.closes.len();
        let target = self.minute_of(at).max(0) as usize;
        while self.closes.len() <= target {
            let last = self.closes[self.closes.len() - 1];
            let next = (last + self.rng.gen_range(-step..=step)).max(step);
            self.closes.push(next);
        }
        first_new
    }

    fn mid_at(&self, minute: usize) -> f64 {
        self.closes[minute.min(self.closes.len() - 1)]
    }

    fn time_of(&self, minute: usize) -> DateTime<Utc> {
        self.origin + Duration::minutes(minute as i64)
    }
}

#[derive(Debug, Clone)]
struct PaperTrade {
    pair: String,
    direction: Direction,
    entry: f64,
    volume: f64,
    stop: f64,
    stop_id: StopId,
    /// Trailing distance once a trailing stop replaced the initial stop.
    trailing: Option<f64>,
    closed: Option<(f64, DateTime<Utc>, f64)>,
}

impl PaperTrade {
    /// Apply one minute of prices; returns true when the stop was hit.
    fn on_price(&mut self, bid: f64, ask: f64, at: DateTime<Utc>) -> bool {
        if self.closed.is_some() {
            return false;
        }
        if let Some(distance) = self.trailing {
            self.stop = match self.direction {
                Direction::Long => self.stop.max(bid - distance),
                Direction::Short => self.stop.min(ask + distance),
            };
        }
        let hit = match self.direction {
            Direction::Long => bid <= self.stop,
            Direction::Short => ask >= self.stop,
        };
        if hit {
            let net = self.direction.sign() * (self.stop - self.entry) * self.volume;
            self.closed = Some((self.stop, at, net));
        }
        hit
    }
}

pub struct PaperService {
    config: PaperConfig,
    now: DateTime<Utc>,
    paths: HashMap<String, PricePath>,
    trades: HashMap<TradeId, PaperTrade>,
    realized: f64,
    next_id: u64,
}

impl PaperService {
    pub fn new(config: PaperConfig) -> Self {
        let now = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default();
        Self {
            config,
            now,
            paths: HashMap::new(),
            trades: HashMap::new(),
            realized: 0.0,
            next_id: 1,
        }
    }

    /// Start the clock at `now` instead of 2024-01-01.
    pub fn starting_at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Move the clock forward, walking every known pair and triggering stops.
    pub fn advance_to(&mut self, now: DateTime<Utc>) {
        if now <= self.now {
            return;
        }
        self.now = now;
        let pairs: Vec<String> = self.paths.keys().cloned().collect();
        for pair in pairs {
            self.walk(&pair);
        }
    }

    pub fn realized(&self) -> f64 {
        self.realized
    }

    pub fn open_trades(&self) -> usize {
        self.trades.values().filter(|t| t.closed.is_none()).count()
    }

    /// Per-pair seed, independent of the order pairs are first requested in.
    fn pair_seed(&self, pair: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.config.seed.to_le_bytes());
        hasher.update(pair.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Extend `pair`'s path to the clock and run its trades over the new minutes.
    fn walk(&mut self, pair: &str) -> &PricePath {
        if !self.paths.contains_key(pair) {
            let origin = self.now - Duration::minutes(self.config.warmup_minutes);
            let path = PricePath::new(self.pair_seed(pair), origin, self.config.start_price);
            self.paths.insert(pair.to_string(), path);
        }
        let step = self.config.step;
        let half_spread = self.config.spread / 2.0;
        let now = self.now;
        let first_new = self
            .paths
            .get_mut(pair)
            .map_or(0, |path| path.extend_to(now, step));

        let path = &self.paths[pair];
        for minute in first_new..path.closes.len() {
            let mid = path.closes[minute];
            let at = path.time_of(minute);
            for trade in self.trades.values_mut().filter(|t| t.pair == pair) {
                if trade.on_price(mid - half_spread, mid + half_spread, at) {
                    if let Some((_, _, net)) = trade.closed {
                        self.realized += net;
                        log::info!("paper: {pair} stop hit at {at}, net {net:.2}");
                    }
                }
            }
        }
        path
    }

    fn quote(&mut self, pair: &str) -> Quote {
        let half_spread = self.config.spread / 2.0;
        let now = self.now;
        let path = self.walk(pair);
        let mid = path.mid_at(path.minute_of(now).max(0) as usize);
        Quote {
            bid: mid - half_spread,
            ask: mid + half_spread,
            base_conversion: mid,
            quote_conversion: 1.0,
            tradeable: true,
        }
    }

    fn used_margin(&self) -> f64 {
        self.trades
            .values()
            .filter(|t| t.closed.is_none())
            .map(|t| t.volume * t.entry / self.config.leverage)
            .sum()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl PriceService for PaperService {
    fn name(&self) -> &str {
        "paper"
    }

    fn candles(
        &mut self,
        pair: &str,
        granularity: Granularity,
        count: usize,
    ) -> Result<Vec<RawBar>, ServiceError> {
        if count == 0 {
            return Err(ServiceError::rejected("count must be >= 1"));
        }
        let path = self.walk(pair);
        let width = granularity.minutes();
        let origin_minute = path.origin.timestamp() / 60;

        let mut bars: Vec<RawBar> = Vec::new();
        let mut bucket_start = i64::MIN;
        for (i, &close) in path.closes.iter().enumerate().skip(1) {
            let open = path.closes[i - 1];
            let abs_minute = origin_minute + i as i64;
            let start = abs_minute - abs_minute.rem_euclid(width);
            match bars.last_mut() {
                Some(bar) if start == bucket_start => {
                    bar.high = bar.high.max(close);
                    bar.low = bar.low.min(close);
                    bar.close = close;
                }
                _ => {
                    bucket_start = start;
                    let timestamp = Utc
                        .timestamp_opt(start * 60, 0)
                        .single()
                        .ok_or_else(|| ServiceError::Malformed("bar timestamp".into()))?;
                    bars.push(RawBar {
                        timestamp,
                        open,
                        high: open.max(close),
                        low: open.min(close),
                        close,
                    });
                }
            }
        }

        let skip = bars.len().saturating_sub(count);
        Ok(bars.split_off(skip))
    }

    fn account_margin(&mut self) -> Result<f64, ServiceError> {
        Ok((self.config.balance + self.realized - self.used_margin()).max(0.0))
    }

    fn spread(&mut self, pair: &str) -> Result<Quote, ServiceError> {
        Ok(self.quote(pair))
    }

    fn place_order(
        &mut self,
        request: &PlaceOrderRequest,
    ) -> Result<FillConfirmation, ServiceError> {
        if !(request.volume.is_finite() && request.volume > 0.0) {
            return Err(ServiceError::rejected(format!(
                "invalid volume {}",
                request.volume
            )));
        }
        let quote = self.quote(&request.pair);
        let fill_price = quote.entry_for(request.direction);
        let beyond_bound = match request.direction {
            Direction::Long => fill_price > request.limit_price,
            Direction::Short => fill_price < request.limit_price,
        };
        if beyond_bound {
            return Err(ServiceError::rejected(format!(
                "price bound {} exceeded by fill {fill_price}",
                request.limit_price
            )));
        }
        let stop_on_wrong_side = match request.direction {
            Direction::Long => request.stop_price >= quote.bid,
            Direction::Short => request.stop_price <= quote.ask,
        };
        if stop_on_wrong_side {
            return Err(ServiceError::rejected(format!(
                "stop {} on the wrong side of the market",
                request.stop_price
            )));
        }
        let margin = self.account_margin()?;
        if request.volume * fill_price / self.config.leverage > margin {
            return Err(ServiceError::rejected("insufficient margin"));
        }

        let id = self.next_id();
        let trade_id = TradeId::new(format!("T{id}"));
        let stop_id = StopId::new(format!("S{id}"));
        self.trades.insert(
            trade_id.clone(),
            PaperTrade {
                pair: request.pair.clone(),
                direction: request.direction,
                entry: fill_price,
                volume: request.volume,
                stop: request.stop_price,
                stop_id: stop_id.clone(),
                trailing: None,
                closed: None,
            },
        );
        log::info!(
            "paper: filled {} {} x{} at {fill_price}",
            request.pair,
            request.direction,
            request.volume
        );

        Ok(FillConfirmation {
            trade_id,
            stop_id: Some(stop_id),
            fill_price,
            fill_time: self.now,
        })
    }

    fn adjust_stop(
        &mut self,
        trade_id: &TradeId,
        stop_id: Option<&StopId>,
        trail_distance: f64,
    ) -> Result<StopId, ServiceError> {
        if !(trail_distance.is_finite() && trail_distance > 0.0) {
            return Err(ServiceError::rejected(format!(
                "invalid trailing distance {trail_distance}"
            )));
        }
        let pair = self
            .trades
            .get(trade_id)
            .map(|t| t.pair.clone())
            .ok_or_else(|| ServiceError::rejected(format!("unknown trade {trade_id}")))?;
        let quote = self.quote(&pair);
        let id = self.next_id();
        let now = self.now;
        let trade = self
            .trades
            .get_mut(trade_id)
            .ok_or_else(|| ServiceError::rejected(format!("unknown trade {trade_id}")))?;
        if trade.closed.is_some() {
            return Err(ServiceError::rejected(format!("trade {trade_id} is closed")));
        }
        if let Some(expected) = stop_id {
            if *expected != trade.stop_id {
                return Err(ServiceError::rejected(format!("unknown stop {expected}")));
            }
        }

        trade.trailing = Some(trail_distance);
        trade.stop_id = StopId::new(format!("S{id}"));
        if trade.on_price(quote.bid, quote.ask, now) {
            if let Some((_, _, net)) = trade.closed {
                self.realized += net;
            }
        }
        Ok(trade.stop_id.clone())
    }

    fn trade_status(&mut self, trade_id: &TradeId) -> Result<TradeStatus, ServiceError> {
        let pair = self
            .trades
            .get(trade_id)
            .map(|t| t.pair.clone())
            .ok_or_else(|| ServiceError::rejected(format!("unknown trade {trade_id}")))?;
        self.walk(&pair);
        let trade = self
            .trades
            .get(trade_id)
            .ok_or_else(|| ServiceError::rejected(format!("unknown trade {trade_id}")))?;
        Ok(match trade.closed {
            Some((close_price, close_time, net)) => TradeStatus::Closed {
                close_price,
                close_time,
                net,
            },
            None => TradeStatus::Open,
        })
    }
}
