//! Per-pair bot state.
//!
//! `Bot` is a plain state struct: the decision logic lives in
//! `OrderLifecycle` and `BotGroup::tick`, persistence in `BotRepository`.

use crate::analysis::MarketAnalysis;
use crate::config::ConfigError;
use crate::data::{AnalysisCache, SeriesError};
use crate::domain::{Journal, JournalLevel, LogEntry, PairConfig};
use crate::orders::{LifecycleError, Order};
use crate::service::ServiceError;
use crate::sizing::SizingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure of one bot's turn. Never escapes the group loop.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Sizing(#[from] SizingError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("bot holds no open order")]
    NoOpenOrder,
}

/// Monitoring classification of a bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotHealth {
    Stopped,
    /// Holds an open order.
    Pending,
    Profitable,
    Unprofitable,
    Neutral,
}

impl fmt::Display for BotHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BotHealth::Stopped => "stopped",
            BotHealth::Pending => "pending",
            BotHealth::Profitable => "profitable",
            BotHealth::Unprofitable => "unprofitable",
            BotHealth::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bot {
    pub pair: PairConfig,
    pub enabled: bool,
    /// At most one open order.
    pub current_order: Option<Order>,
    /// Most recently closed order.
    pub last_closed: Option<Order>,
    pub consecutive_losses: u32,
    /// Sum of realized risk/reward multiples.
    pub relative_balance: f64,
    pub journal: Journal,
    #[serde(skip)]
    pub cache: AnalysisCache<MarketAnalysis>,
}

impl Bot {
    pub fn new(pair: PairConfig) -> Self {
        Self {
            pair,
            enabled: true,
            current_order: None,
            last_closed: None,
            consecutive_losses: 0,
            relative_balance: 0.0,
            journal: Journal::default(),
            cache: AnalysisCache::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.pair.name
    }

    pub fn has_open_order(&self) -> bool {
        self.current_order.as_ref().is_some_and(Order::is_open)
    }

    pub fn health(&self) -> BotHealth {
        if !self.enabled {
            BotHealth::Stopped
        } else if self.has_open_order() {
            BotHealth::Pending
        } else if self.relative_balance > 0.0 {
            BotHealth::Profitable
        } else if self.relative_balance < 0.0 {
            BotHealth::Unprofitable
        } else {
            BotHealth::Neutral
        }
    }

    /// Open order if any, else the last closed one.
    pub fn latest_order(&self) -> Option<&Order> {
        self.current_order.as_ref().or(self.last_closed.as_ref())
    }

    pub fn log(&mut self, at: DateTime<Utc>, level: JournalLevel, text: impl Into<String>) {
        self.journal.record(&self.pair.name, at, level, text);
    }

    pub fn recent_logs(&self, n: usize) -> Vec<&LogEntry> {
        self.journal.recent(n)
    }

    /// Clear counters, journal and cache and re-enable; `full` also drops
    /// order history. An open order is kept: it still exists at the broker.
    pub fn reset(&mut self, full: bool) {
        self.consecutive_losses = 0;
        self.relative_balance = 0.0;
        self.enabled = true;
        self.journal.clear();
        self.cache.clear();
        if full {
            self.last_closed = None;
        }
    }
}
