//! The bot group and its tick loop.
//!
//! One tick visits every bot in configuration order. A bot holding an order
//! runs the lifecycle check; an idle bot runs the analysis pipeline and may
//! open a position. Failures stay inside the failing bot's turn: they are
//! journaled, recorded in the `TickReport`, and the loop moves on.

use super::bot::{Bot, BotError, BotHealth};
use super::calendar::MarketCalendar;
use crate::analysis::{MarketAnalysis, TrendClassifier};
use crate::config::GroupConfig;
use crate::data::{CandleSeries, Granularity};
use crate::domain::{JournalLevel, LogEntry};
use crate::orders::{CheckOutcome, LifecyclePolicy, Order, OrderLifecycle};
use crate::repository::{BotRepository, GroupSnapshot};
use crate::service::{PlaceOrderRequest, PriceService, ServiceError};
use crate::sizing::{PositionSizer, SizingError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Mutable group-level counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupState {
    pub enabled: bool,
    pub consecutive_losses: u32,
    /// Sum of realized net results, account currency.
    pub balance: f64,
    /// No bot holds an open order.
    pub ready: bool,
}

impl Default for GroupState {
    fn default() -> Self {
        Self {
            enabled: true,
            consecutive_losses: 0,
            balance: 0.0,
            ready: true,
        }
    }
}

/// What one bot did during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum BotOutcome {
    /// Group or bot is stopped.
    Stopped,
    /// Another bot holds the group's single position.
    Waiting,
    /// Analysis ran, the horizons did not agree.
    NoSignal,
    Opened(Order),
    Checked(CheckOutcome),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotTurn {
    pub pair: String,
    pub outcome: BotOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    /// The calendar reported the market closed; no bot ran.
    pub market_closed: bool,
    pub turns: Vec<BotTurn>,
    /// Repository failures, which do not fail the bot's turn.
    pub persistence_errors: Vec<String>,
}

impl TickReport {
    fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            market_closed: false,
            turns: Vec::new(),
            persistence_errors: Vec::new(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &BotTurn> {
        self.turns
            .iter()
            .filter(|t| matches!(t.outcome, BotOutcome::Failed(_)))
    }

    pub fn opened(&self) -> impl Iterator<Item = &Order> {
        self.turns.iter().filter_map(|t| match &t.outcome {
            BotOutcome::Opened(order) => Some(order),
            _ => None,
        })
    }

    pub fn closed(&self) -> impl Iterator<Item = &Order> {
        self.turns.iter().filter_map(|t| match &t.outcome {
            BotOutcome::Checked(CheckOutcome::Closed(order)) => Some(order),
            _ => None,
        })
    }
}

pub struct BotGroup {
    config: GroupConfig,
    bots: Vec<Bot>,
    state: GroupState,
    /// Last calendar reading, for edge logging.
    market_closed: Option<bool>,
}

impl BotGroup {
    /// One bot per configured pair, in configuration order.
    pub fn new(config: GroupConfig) -> Self {
        let bots = config.pairs.iter().cloned().map(Bot::new).collect();
        let state = GroupState {
            enabled: config.enabled,
            ..GroupState::default()
        };
        Self::from_parts(config, bots, state)
    }

    /// Rebuild a group from persisted bots and counters.
    pub fn from_parts(config: GroupConfig, bots: Vec<Bot>, state: GroupState) -> Self {
        let mut group = Self {
            config,
            bots,
            state,
            market_closed: None,
        };
        group.refresh_ready();
        group
    }

    pub fn config(&self) -> &GroupConfig {
        &self.config
    }

    pub fn state(&self) -> &GroupState {
        &self.state
    }

    pub fn bots(&self) -> &[Bot] {
        &self.bots
    }

    pub fn bot(&self, pair: &str) -> Option<&Bot> {
        self.bots.iter().find(|b| b.name() == pair)
    }

    pub fn bot_mut(&mut self, pair: &str) -> Option<&mut Bot> {
        self.bots.iter_mut().find(|b| b.name() == pair)
    }

    pub fn health(&self, pair: &str) -> Option<BotHealth> {
        self.bot(pair).map(Bot::health)
    }

    pub fn latest_order(&self, pair: &str) -> Option<&Order> {
        self.bot(pair).and_then(Bot::latest_order)
    }

    pub fn recent_logs(&self, pair: &str, n: usize) -> Vec<&LogEntry> {
        self.bot(pair).map(|b| b.recent_logs(n)).unwrap_or_default()
    }

    pub fn is_ready(&self) -> bool {
        self.state.ready
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn start(&mut self) {
        self.state.enabled = true;
        log::info!("{}: bot group started", self.config.name);
    }

    pub fn stop(&mut self) {
        self.state.enabled = false;
        log::info!("{}: bot group stopped", self.config.name);
    }

    /// Clear group and bot counters and re-enable everything. `full` also
    /// drops each bot's closed-order history.
    pub fn reset(&mut self, full: bool) {
        self.state.enabled = true;
        self.state.consecutive_losses = 0;
        self.state.balance = 0.0;
        for bot in &mut self.bots {
            bot.reset(full);
        }
        self.refresh_ready();
        log::info!("{}: bot group reset (full: {full})", self.config.name);
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> GroupSnapshot {
        GroupSnapshot {
            name: self.config.name.clone(),
            enabled: self.state.enabled,
            consecutive_losses: self.state.consecutive_losses,
            balance: self.state.balance,
            ready: self.state.ready,
            fingerprint: self.config.fingerprint(),
            saved_at: now,
        }
    }

    fn refresh_ready(&mut self) {
        self.state.ready = !self.bots.iter().any(Bot::has_open_order);
    }

    /// Run one scheduling tick.
    pub fn tick(
        &mut self,
        now: DateTime<Utc>,
        service: &mut dyn PriceService,
        repository: &mut dyn BotRepository,
        calendar: &dyn MarketCalendar,
    ) -> TickReport {
        let mut report = TickReport::new(now);

        let closed = calendar.is_closed(now);
        if self.market_closed != Some(closed) {
            let text = if closed { "Market closed" } else { "Market open" };
            // the first reading of an open market is not an edge
            if closed || self.market_closed.is_some() {
                for bot in &mut self.bots {
                    bot.log(now, JournalLevel::Info, text);
                }
            }
            self.market_closed = Some(closed);
        }
        if closed {
            report.market_closed = true;
            return report;
        }

        let policy = self.config.lifecycle();
        for i in 0..self.bots.len() {
            let bot = &mut self.bots[i];
            let outcome = match run_bot(
                &self.config,
                &policy,
                bot,
                &mut self.state,
                now,
                service,
            ) {
                Ok(outcome) => outcome,
                Err(e) => {
                    bot.log(now, JournalLevel::Error, e.to_string());
                    BotOutcome::Failed(e.to_string())
                }
            };
            // The order is already settled on the bot; a failed archive write
            // does not undo the close.
            if let BotOutcome::Checked(CheckOutcome::Closed(order)) = &outcome {
                if let Err(e) = repository.archive_order(bot.name(), order) {
                    log::error!("{}: failed to archive order: {e}", bot.name());
                    report.persistence_errors.push(e.to_string());
                }
            }
            report.turns.push(BotTurn {
                pair: bot.name().to_string(),
                outcome,
            });

            self.refresh_ready();
            if let Err(e) = repository.save_bot(&self.bots[i]) {
                log::error!("{}: failed to save bot: {e}", self.bots[i].name());
                report.persistence_errors.push(e.to_string());
            }
            if let Err(e) = repository.save_group(&self.snapshot(now)) {
                log::error!("{}: failed to save group: {e}", self.config.name);
                report.persistence_errors.push(e.to_string());
            }
        }

        report
    }
}

fn run_bot(
    config: &GroupConfig,
    policy: &LifecyclePolicy,
    bot: &mut Bot,
    state: &mut GroupState,
    now: DateTime<Utc>,
    service: &mut dyn PriceService,
) -> Result<BotOutcome, BotError> {
    if bot.current_order.is_some() {
        let outcome = OrderLifecycle::check(bot, state, policy, service, now)?;
        return Ok(BotOutcome::Checked(outcome));
    }

    if !state.enabled || !bot.enabled {
        return Ok(BotOutcome::Stopped);
    }
    if config.single_position_only && !state.ready {
        return Ok(BotOutcome::Waiting);
    }

    open_position(config, policy, bot, state, now, service)
}

/// Analysis pipeline: margin, both timeframes, signal, quote, sizing, placement.
fn open_position(
    config: &GroupConfig,
    policy: &LifecyclePolicy,
    bot: &mut Bot,
    state: &mut GroupState,
    now: DateTime<Utc>,
    service: &mut dyn PriceService,
) -> Result<BotOutcome, BotError> {
    let account_margin = service.account_margin()?;
    let long = analysis_for(bot, config, config.interval_long, now, service)?;
    let short = analysis_for(bot, config, config.interval_short, now, service)?;

    let Some(signal) = TrendClassifier::evaluate(&long, &short) else {
        return Ok(BotOutcome::NoSignal);
    };
    bot.log(now, JournalLevel::Info, format!("{} signal", signal.direction));

    let quote = service.spread(&bot.pair.name)?;
    if !quote.tradeable {
        return Err(ServiceError::NotTradeable {
            pair: bot.pair.name.clone(),
        }
        .into());
    }

    let atr = short.sizing_atr().ok_or(SizingError::NoAtr)?;
    let sized = PositionSizer::size(
        &signal,
        &quote,
        atr,
        &bot.pair,
        &config.risk(),
        account_margin,
    )?;

    let request = PlaceOrderRequest {
        pair: sized.pair.clone(),
        volume: sized.volume,
        limit_price: sized.limit,
        stop_price: sized.stop,
        direction: sized.direction,
    };
    let fill = service.place_order(&request)?;
    let order = Order::from_fill(&sized, fill);
    bot.log(
        now,
        JournalLevel::Info,
        format!(
            "Opened {} x{} at {} (stop {}, target {})",
            order.direction, order.volume, order.entry, order.stop, order.target
        ),
    );
    bot.current_order = Some(order.clone());
    state.ready = false;

    if let Err(e) = OrderLifecycle::trail(bot, policy, service, now) {
        bot.log(now, JournalLevel::Warn, format!("Trailing stop not placed: {e}"));
    }
    Ok(BotOutcome::Opened(order))
}

/// Cached analysis for one timeframe, refetched once the cache entry expires.
fn analysis_for(
    bot: &mut Bot,
    config: &GroupConfig,
    granularity: Granularity,
    now: DateTime<Utc>,
    service: &mut dyn PriceService,
) -> Result<Arc<MarketAnalysis>, BotError> {
    if let Some(hit) = bot.cache.get(granularity, now) {
        return Ok(hit);
    }
    let bars = service.candles(&bot.pair.name, granularity, config.candle_count)?;
    let series = CandleSeries::from_raw(&bars, config.series_options())?;
    let analysis = MarketAnalysis::run(series, &config.indicators);
    log::debug!(
        "{}: {} analysis, {} swings, {} zones",
        bot.name(),
        granularity,
        analysis.swings.swings.len(),
        analysis.zones.len()
    );
    Ok(bot.cache.insert(granularity, now, analysis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PairConfig;
    use crate::engine::{AlwaysOpen, ForexCalendar};
    use crate::repository::MemoryRepository;
    use crate::service::{PaperConfig, PaperService};
    use chrono::TimeZone;

    fn config() -> GroupConfig {
        GroupConfig {
            pairs: vec![
                PairConfig::new("EUR_USD", 5, 0),
                PairConfig::new("GBP_USD", 5, 0),
            ],
            ..GroupConfig::default()
        }
    }

    #[test]
    fn new_group_is_ready_and_ordered() {
        let group = BotGroup::new(config());
        assert!(group.is_ready());
        assert!(group.is_enabled());
        let names: Vec<_> = group.bots().iter().map(Bot::name).collect();
        assert_eq!(names, ["EUR_USD", "GBP_USD"]);
        assert_eq!(group.health("EUR_USD"), Some(BotHealth::Neutral));
        assert!(group.health("USD_JPY").is_none());
    }

    #[test]
    fn closed_market_skips_everything() {
        let mut group = BotGroup::new(config());
        let mut service = PaperService::new(PaperConfig::default());
        let mut repo = MemoryRepository::new();
        // Saturday
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();

        let report = group.tick(now, &mut service, &mut repo, &ForexCalendar::default());
        assert!(report.market_closed);
        assert!(report.turns.is_empty());
        assert_eq!(repo.saves, 0);
        assert_eq!(group.recent_logs("EUR_USD", 5).len(), 1);

        // still closed: no second journal entry
        group.tick(now, &mut service, &mut repo, &ForexCalendar::default());
        assert_eq!(group.recent_logs("EUR_USD", 5).len(), 1);
    }

    #[test]
    fn stopped_group_opens_nothing() {
        let mut group = BotGroup::new(config());
        group.stop();
        let mut service = PaperService::new(PaperConfig::default());
        let mut repo = MemoryRepository::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();

        let report = group.tick(now, &mut service, &mut repo, &AlwaysOpen);
        assert!(report
            .turns
            .iter()
            .all(|t| t.outcome == BotOutcome::Stopped));
        // bot + group saved for each bot
        assert_eq!(repo.saves, 4);
        assert_eq!(repo.group.as_ref().map(|g| g.enabled), Some(false));
    }

    #[test]
    fn reset_restores_counters() {
        let mut group = BotGroup::new(config());
        group.state.consecutive_losses = 7;
        group.state.balance = -12.0;
        group.state.enabled = false;
        group.reset(false);
        assert!(group.is_enabled());
        assert_eq!(group.state().consecutive_losses, 0);
        assert_eq!(group.state().balance, 0.0);
    }
}
