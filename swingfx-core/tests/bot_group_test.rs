//! Bot group tick loop against a scripted price service.
//!
//! Covers:
//! 1. Signal → sized order → placement
//! 2. Analysis cache reuse within a candle period
//! 3. Consecutive-loss breaker firing exactly at the limit
//! 4. Failure isolation between bots
//! 5. Single-position-only gating
//! 6. Market-closed ticks
//! 7. Repository persistence and archive failures

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::io;
use swingfx_core::data::Granularity;
use swingfx_core::domain::{Direction, JournalLevel, PairConfig, RawBar, StopId, TradeId};
use swingfx_core::engine::{
    AlwaysOpen, Bot, BotGroup, BotOutcome, ForexCalendar, GroupState,
};
use swingfx_core::orders::{CheckOutcome, Order, OrderStatus};
use swingfx_core::repository::{
    BotRepository, GroupSnapshot, JsonFileRepository, MemoryRepository, RepositoryError,
};
use swingfx_core::service::{
    FillConfirmation, PlaceOrderRequest, PriceService, Quote, ServiceError, TradeStatus,
};
use swingfx_core::GroupConfig;

// ── Scripted service ─────────────────────────────────────────────────

struct ScriptedService {
    candles: HashMap<(String, Granularity), Vec<RawBar>>,
    /// Pairs whose candle requests fail with a connectivity error.
    unreachable: HashSet<String>,
    statuses: HashMap<TradeId, TradeStatus>,
    quote: Quote,
    margin: f64,
    now: DateTime<Utc>,
    placed: Vec<PlaceOrderRequest>,
    candle_calls: usize,
    status_calls: usize,
}

impl ScriptedService {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            candles: HashMap::new(),
            unreachable: HashSet::new(),
            statuses: HashMap::new(),
            quote: Quote {
                bid: 1.1000,
                ask: 1.1002,
                base_conversion: 1.1,
                quote_conversion: 1.0,
                tradeable: true,
            },
            margin: 10_000.0,
            now,
            placed: Vec::new(),
            candle_calls: 0,
            status_calls: 0,
        }
    }

    fn with_candles(mut self, pair: &str, granularity: Granularity, bars: Vec<RawBar>) -> Self {
        self.candles.insert((pair.to_string(), granularity), bars);
        self
    }

    fn close_trade(&mut self, id: &str, net: f64) {
        self.statuses.insert(
            TradeId::new(id),
            TradeStatus::Closed {
                close_price: 1.0950,
                close_time: self.now,
                net,
            },
        );
    }
}

impl PriceService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    fn candles(
        &mut self,
        pair: &str,
        granularity: Granularity,
        count: usize,
    ) -> Result<Vec<RawBar>, ServiceError> {
        self.candle_calls += 1;
        if self.unreachable.contains(pair) {
            return Err(ServiceError::Unreachable("connection refused".into()));
        }
        let bars = self
            .candles
            .get(&(pair.to_string(), granularity))
            .ok_or_else(|| ServiceError::rejected(format!("no data for {pair}")))?;
        let skip = bars.len().saturating_sub(count);
        Ok(bars[skip..].to_vec())
    }

    fn account_margin(&mut self) -> Result<f64, ServiceError> {
        Ok(self.margin)
    }

    fn spread(&mut self, _pair: &str) -> Result<Quote, ServiceError> {
        Ok(self.quote)
    }

    fn place_order(
        &mut self,
        request: &PlaceOrderRequest,
    ) -> Result<FillConfirmation, ServiceError> {
        self.placed.push(request.clone());
        let n = self.placed.len();
        Ok(FillConfirmation {
            trade_id: TradeId::new(format!("T{n}")),
            stop_id: Some(StopId::new(format!("S{n}"))),
            fill_price: self.quote.entry_for(request.direction),
            fill_time: self.now,
        })
    }

    fn adjust_stop(
        &mut self,
        _trade_id: &TradeId,
        _stop_id: Option<&StopId>,
        _trail_distance: f64,
    ) -> Result<StopId, ServiceError> {
        Ok(StopId::new("trail"))
    }

    fn trade_status(&mut self, trade_id: &TradeId) -> Result<TradeStatus, ServiceError> {
        self.status_calls += 1;
        Ok(self
            .statuses
            .get(trade_id)
            .cloned()
            .unwrap_or(TradeStatus::Open))
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────

fn now() -> DateTime<Utc> {
    // Tuesday
    Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()
}

/// Hourly bars from (open, close) bodies with 0.001 wicks.
fn bars(bodies: &[(f64, f64)]) -> Vec<RawBar> {
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    bodies
        .iter()
        .enumerate()
        .map(|(i, &(open, close))| RawBar {
            timestamp: base + Duration::hours(i as i64),
            open,
            high: open.max(close) + 0.001,
            low: open.min(close) - 0.001,
            close,
        })
        .collect()
}

/// Down break at the latest low, then a bullish reversal candle.
fn short_long_setup() -> Vec<RawBar> {
    bars(&[
        (1.04, 1.00),
        (0.99, 0.92),
        (0.93, 0.90),
        (0.89, 0.85),
        (0.85, 0.90),
        (0.91, 0.84),
        (0.85, 0.89),
        (0.90, 0.85),
        (0.86, 0.91),
        (0.91, 0.87),
        (0.87, 0.83),
        (0.84, 0.79),
        (0.80, 0.87),
    ])
}

/// Up break on the forming candle: no zone to filter it.
fn long_uptrend() -> Vec<RawBar> {
    bars(&[
        (1.04, 1.00),
        (1.00, 0.96),
        (0.97, 1.00),
        (1.00, 1.03),
        (1.03, 0.99),
        (0.99, 1.02),
        (1.03, 1.10),
        (1.09, 1.05),
        (1.06, 1.03),
        (1.03, 0.99),
        (0.98, 1.02),
        (1.01, 1.06),
        (1.06, 1.11),
    ])
}

/// Flat market: no swings at all.
fn flat() -> Vec<RawBar> {
    bars(&[(1.10, 1.10); 20])
}

fn config(pairs: &[&str]) -> GroupConfig {
    GroupConfig {
        pairs: pairs.iter().map(|p| PairConfig::new(*p, 5, 0)).collect(),
        merge_last: false,
        ..GroupConfig::default()
    }
}

fn open_order(pair: &str, trade_id: &str) -> Order {
    Order {
        pair: pair.into(),
        direction: Direction::Long,
        entry: 1.1000,
        stop: 1.0950,
        target: 1.1075,
        volume: 1000.0,
        status: OrderStatus::Pending,
        opened_at: now() - Duration::hours(1),
        closed_at: None,
        close_price: None,
        net: 0.0,
        rvr: None,
        trade_id: TradeId::new(trade_id),
        stop_id: Some(StopId::new(format!("S-{trade_id}"))),
    }
}

/// Group whose bots all hold an open order with trade id = pair name.
fn group_with_orders(config: GroupConfig) -> BotGroup {
    let bots = config
        .pairs
        .iter()
        .map(|p| {
            let mut bot = Bot::new(p.clone());
            bot.current_order = Some(open_order(&p.name, &p.name));
            bot
        })
        .collect();
    BotGroup::from_parts(config, bots, GroupState::default())
}

// ── 1. Opening a position ────────────────────────────────────────────

#[test]
fn agreeing_horizons_open_a_long() {
    let cfg = config(&["EUR_USD"]);
    let mut service = ScriptedService::new(now())
        .with_candles("EUR_USD", cfg.interval_short, short_long_setup())
        .with_candles("EUR_USD", cfg.interval_long, long_uptrend());
    let mut repo = MemoryRepository::new();
    let mut group = BotGroup::new(cfg);

    let report = group.tick(now(), &mut service, &mut repo, &AlwaysOpen);
    let opened: Vec<_> = report.opened().collect();
    assert_eq!(opened.len(), 1, "turns: {:?}", report.turns);

    let order = opened[0];
    assert_eq!(order.direction, Direction::Long);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.entry, 1.1002);
    assert!(order.stop < order.entry);
    assert!(order.target > order.entry);
    assert!(order.volume >= 1.0);
    assert_eq!(order.volume.fract(), 0.0);

    let request = &service.placed[0];
    assert_eq!(request.direction, Direction::Long);
    assert!(request.limit_price > request.stop_price);

    assert!(!group.is_ready());
    assert_eq!(group.health("EUR_USD").map(|h| h.to_string()).as_deref(), Some("pending"));
    assert_eq!(repo.saves, 2);
    assert_eq!(repo.group.as_ref().map(|g| g.ready), Some(false));

    // next tick checks the order instead of analyzing again
    let calls = service.candle_calls;
    let report = group.tick(now() + Duration::minutes(1), &mut service, &mut repo, &AlwaysOpen);
    assert_eq!(report.turns[0].outcome, BotOutcome::Checked(CheckOutcome::Open));
    assert_eq!(service.candle_calls, calls);
}

// ── 2. Cache ─────────────────────────────────────────────────────────

#[test]
fn analysis_is_reused_within_the_candle_period() {
    let cfg = config(&["EUR_USD"]);
    let mut service = ScriptedService::new(now())
        .with_candles("EUR_USD", cfg.interval_short, flat())
        .with_candles("EUR_USD", cfg.interval_long, flat());
    let mut repo = MemoryRepository::new();
    let mut group = BotGroup::new(cfg);

    let report = group.tick(now(), &mut service, &mut repo, &AlwaysOpen);
    assert_eq!(report.turns[0].outcome, BotOutcome::NoSignal);
    assert_eq!(service.candle_calls, 2);

    group.tick(now() + Duration::minutes(4), &mut service, &mut repo, &AlwaysOpen);
    assert_eq!(service.candle_calls, 2);

    // M5 expired, H4 still valid
    group.tick(now() + Duration::minutes(5), &mut service, &mut repo, &AlwaysOpen);
    assert_eq!(service.candle_calls, 3);
}

// ── 3. Circuit breaker ───────────────────────────────────────────────

#[test]
fn breaker_fires_exactly_at_the_limit() {
    let cfg = GroupConfig {
        max_consecutive_losses: 3,
        ..config(&["EUR_USD", "GBP_USD", "USD_CHF"])
    };
    let mut group = group_with_orders(cfg);
    let mut service = ScriptedService::new(now());
    let mut repo = MemoryRepository::new();

    service.close_trade("EUR_USD", -5.0);
    service.close_trade("GBP_USD", -5.0);
    let report = group.tick(now(), &mut service, &mut repo, &AlwaysOpen);
    assert_eq!(report.closed().count(), 2);
    assert_eq!(group.state().consecutive_losses, 2);
    assert!(group.is_enabled());

    service.close_trade("USD_CHF", -5.0);
    group.tick(now() + Duration::minutes(1), &mut service, &mut repo, &AlwaysOpen);
    assert_eq!(group.state().consecutive_losses, 3);
    assert!(!group.is_enabled());
    assert_eq!(group.state().balance, -15.0);
    assert_eq!(repo.archive.len(), 3);

    let usd_chf = group.bot("USD_CHF").unwrap();
    assert_eq!(usd_chf.relative_balance, -1.0);
    assert!(usd_chf
        .recent_logs(5)
        .iter()
        .any(|e| e.level == JournalLevel::Warn && e.text.contains("consecutive losses")));

    // a disabled group opens nothing
    let report = group.tick(now() + Duration::minutes(2), &mut service, &mut repo, &AlwaysOpen);
    assert!(report.turns.iter().all(|t| t.outcome == BotOutcome::Stopped));
    assert!(group.is_ready());
}

#[test]
fn profit_resets_the_group_counter() {
    let mut group = group_with_orders(config(&["EUR_USD", "GBP_USD"]));
    let mut service = ScriptedService::new(now());
    let mut repo = MemoryRepository::new();

    service.close_trade("EUR_USD", -5.0);
    service.close_trade("GBP_USD", 7.5);
    group.tick(now(), &mut service, &mut repo, &AlwaysOpen);
    assert_eq!(group.state().consecutive_losses, 0);
    assert_eq!(group.state().balance, 2.5);
    assert_eq!(group.bot("EUR_USD").unwrap().consecutive_losses, 1);
}

// ── 4. Failure isolation ─────────────────────────────────────────────

#[test]
fn one_failing_bot_does_not_stop_the_others() {
    let cfg = GroupConfig {
        single_position_only: false,
        ..config(&["EUR_USD", "GBP_USD"])
    };
    let mut service = ScriptedService::new(now())
        .with_candles("GBP_USD", cfg.interval_short, flat())
        .with_candles("GBP_USD", cfg.interval_long, flat());
    service.unreachable.insert("EUR_USD".into());
    let mut repo = MemoryRepository::new();
    let mut group = BotGroup::new(cfg);

    let report = group.tick(now(), &mut service, &mut repo, &AlwaysOpen);
    assert!(matches!(report.turns[0].outcome, BotOutcome::Failed(_)));
    assert_eq!(report.turns[1].outcome, BotOutcome::NoSignal);
    assert_eq!(report.failures().count(), 1);

    let eur = group.bot("EUR_USD").unwrap();
    assert!(eur.current_order.is_none());
    assert_eq!(eur.recent_logs(1)[0].level, JournalLevel::Error);
    // both bots were persisted
    assert_eq!(repo.bots.len(), 2);
}

// ── 5. Single position ───────────────────────────────────────────────

#[test]
fn single_position_blocks_other_bots() {
    let cfg = config(&["EUR_USD", "GBP_USD"]);
    let mut bots = vec![Bot::new(cfg.pairs[0].clone()), Bot::new(cfg.pairs[1].clone())];
    bots[0].current_order = Some(open_order("EUR_USD", "T1"));
    let mut group = BotGroup::from_parts(cfg, bots, GroupState::default());
    assert!(!group.is_ready());

    let mut service = ScriptedService::new(now());
    let mut repo = MemoryRepository::new();
    let report = group.tick(now(), &mut service, &mut repo, &AlwaysOpen);

    assert_eq!(report.turns[0].outcome, BotOutcome::Checked(CheckOutcome::Open));
    assert_eq!(report.turns[1].outcome, BotOutcome::Waiting);
    assert_eq!(service.candle_calls, 0);
}

#[test]
fn closing_the_position_frees_the_group() {
    let cfg = config(&["EUR_USD", "GBP_USD"]);
    let mut bots = vec![Bot::new(cfg.pairs[0].clone()), Bot::new(cfg.pairs[1].clone())];
    bots[0].current_order = Some(open_order("EUR_USD", "T1"));
    let mut group = BotGroup::from_parts(cfg.clone(), bots, GroupState::default());

    let mut service = ScriptedService::new(now())
        .with_candles("GBP_USD", cfg.interval_short, flat())
        .with_candles("GBP_USD", cfg.interval_long, flat());
    service.close_trade("T1", 3.0);
    let mut repo = MemoryRepository::new();
    let report = group.tick(now(), &mut service, &mut repo, &AlwaysOpen);

    assert_eq!(report.closed().count(), 1);
    // readiness is recomputed before the next bot runs
    assert_eq!(report.turns[1].outcome, BotOutcome::NoSignal);
    assert!(group.is_ready());
}

// ── 6. Market hours ──────────────────────────────────────────────────

#[test]
fn closed_market_touches_nothing() {
    let mut group = group_with_orders(config(&["EUR_USD"]));
    let mut service = ScriptedService::new(now());
    service.close_trade("EUR_USD", -5.0);
    let mut repo = MemoryRepository::new();
    let saturday = Utc.with_ymd_and_hms(2024, 3, 9, 15, 0, 0).unwrap();

    let report = group.tick(saturday, &mut service, &mut repo, &ForexCalendar::default());
    assert!(report.market_closed);
    assert_eq!(service.status_calls, 0);
    assert_eq!(repo.saves, 0);
    assert!(group.bot("EUR_USD").unwrap().has_open_order());

    // Monday 09:00 New York: open again, the close is picked up
    let monday = Utc.with_ymd_and_hms(2024, 3, 11, 13, 0, 0).unwrap();
    let report = group.tick(monday, &mut service, &mut repo, &ForexCalendar::default());
    assert!(!report.market_closed);
    assert_eq!(report.closed().count(), 1);
}

// ── 7. Persistence ───────────────────────────────────────────────────

#[test]
fn json_repository_persists_tick_results() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&["EUR_USD", "GBP_USD"]);
    let fingerprint = cfg.fingerprint();
    let mut group = group_with_orders(cfg);
    let mut service = ScriptedService::new(now());
    service.close_trade("EUR_USD", -5.0);
    let mut repo = JsonFileRepository::open(dir.path()).unwrap();

    group.tick(now(), &mut service, &mut repo, &AlwaysOpen);

    let archive = repo.load_archive().unwrap();
    assert_eq!(archive.len(), 1);
    assert_eq!(archive[0].pair, "EUR_USD");
    assert_eq!(archive[0].order.status, OrderStatus::Closed);

    let eur = repo.load_bot("EUR_USD").unwrap().unwrap();
    assert!(eur.current_order.is_none());
    assert_eq!(eur.consecutive_losses, 1);
    let gbp = repo.load_bot("GBP_USD").unwrap().unwrap();
    assert!(gbp.has_open_order());

    let snapshot = repo.load_group().unwrap().unwrap();
    assert_eq!(snapshot.fingerprint, fingerprint);
    assert_eq!(snapshot.consecutive_losses, 1);
    assert!(!snapshot.ready);
}

/// Memory store whose order archive is unwritable.
struct ReadOnlyArchive {
    inner: MemoryRepository,
}

impl BotRepository for ReadOnlyArchive {
    fn save_bot(&mut self, bot: &Bot) -> Result<(), RepositoryError> {
        self.inner.save_bot(bot)
    }

    fn save_group(&mut self, snapshot: &GroupSnapshot) -> Result<(), RepositoryError> {
        self.inner.save_group(snapshot)
    }

    fn archive_order(&mut self, _pair: &str, _order: &Order) -> Result<(), RepositoryError> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "orders.jsonl is read-only").into())
    }
}

#[test]
fn archive_failure_keeps_the_close() {
    let mut group = group_with_orders(config(&["EUR_USD"]));
    let mut service = ScriptedService::new(now());
    service.close_trade("EUR_USD", -5.0);
    let mut repo = ReadOnlyArchive {
        inner: MemoryRepository::new(),
    };

    let report = group.tick(now(), &mut service, &mut repo, &AlwaysOpen);

    assert_eq!(report.failures().count(), 0);
    let closed: Vec<_> = report.closed().collect();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].status, OrderStatus::Closed);
    assert_eq!(report.persistence_errors.len(), 1);
    assert!(report.persistence_errors[0].contains("read-only"));

    // bookkeeping and the remaining saves still happened
    assert_eq!(group.state().consecutive_losses, 1);
    assert_eq!(group.state().balance, -5.0);
    assert!(group.is_ready());
    assert_eq!(repo.inner.saves, 2);
    assert!(repo.inner.archive.is_empty());
}
