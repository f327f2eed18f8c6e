//! Per-tick check of an open order: closure detection, stop trailing and
//! the bookkeeping a closed order triggers on its bot and group.

use super::order::{ClosedTrade, Order, OrderStatus};
use crate::domain::{truncate, JournalLevel};
use crate::engine::{Bot, BotError, GroupState};
use crate::service::{PriceService, TradeStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Group settings the lifecycle needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    pub trail_multiplier: f64,
    pub max_consecutive_losses: u32,
    pub max_consecutive_losses_per_bot: Option<u32>,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            trail_multiplier: 0.5,
            max_consecutive_losses: 10,
            max_consecutive_losses_per_bot: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Bot holds no order.
    Idle,
    /// Still open, nothing changed.
    Open,
    /// Trailing stop placed this tick.
    Trailing,
    /// Closed this tick; the archived order.
    Closed(Order),
}

pub struct OrderLifecycle;

impl OrderLifecycle {
    /// Query the broker for the bot's open order and advance its state.
    pub fn check(
        bot: &mut Bot,
        group: &mut GroupState,
        policy: &LifecyclePolicy,
        service: &mut dyn PriceService,
        now: DateTime<Utc>,
    ) -> Result<CheckOutcome, BotError> {
        let Some(order) = bot.current_order.as_ref() else {
            return Ok(CheckOutcome::Idle);
        };

        match service.trade_status(&order.trade_id)? {
            TradeStatus::Closed {
                close_price,
                close_time,
                net,
            } => {
                let trade = ClosedTrade {
                    close_price,
                    close_time,
                    net,
                };
                Self::settle(bot, group, policy, trade, now).map(CheckOutcome::Closed)
            }
            TradeStatus::Open => Self::trail(bot, policy, service, now),
        }
    }

    /// Move the stop to a trailing stop once price reached the activation level.
    pub fn trail(
        bot: &mut Bot,
        policy: &LifecyclePolicy,
        service: &mut dyn PriceService,
        now: DateTime<Utc>,
    ) -> Result<CheckOutcome, BotError> {
        let price_decimals = bot.pair.price_decimals;
        let Some(order) = bot.current_order.as_mut() else {
            return Ok(CheckOutcome::Idle);
        };
        if order.status != OrderStatus::Pending {
            return Ok(CheckOutcome::Open);
        }

        let buffer = order.trail_buffer(policy.trail_multiplier, price_decimals);
        if order.stop_id.is_some() {
            let quote = service.spread(&order.pair)?;
            if !order.should_trail(quote.bid, quote.ask, buffer) {
                return Ok(CheckOutcome::Open);
            }
        }

        let stop_id = service.adjust_stop(&order.trade_id, order.stop_id.as_ref(), buffer)?;
        order.mark_trailing(stop_id)?;
        bot.log(now, JournalLevel::Info, format!("Placed trailing stop ({buffer})"));
        Ok(CheckOutcome::Trailing)
    }

    /// Close the bot's order and update bot and group counters.
    pub fn settle(
        bot: &mut Bot,
        group: &mut GroupState,
        policy: &LifecyclePolicy,
        trade: ClosedTrade,
        now: DateTime<Utc>,
    ) -> Result<Order, BotError> {
        let Some(mut order) = bot.current_order.take() else {
            return Err(BotError::NoOpenOrder);
        };
        if let Err(e) = order.close(trade) {
            bot.current_order = Some(order);
            return Err(e.into());
        }

        let rvr = order.rvr.unwrap_or(0.0);
        bot.relative_balance = truncate(bot.relative_balance + rvr, 1);
        group.balance = truncate(group.balance + order.net, 2);

        if order.net > 0.0 {
            bot.consecutive_losses = 0;
            group.consecutive_losses = 0;
        } else {
            bot.consecutive_losses += 1;
            group.consecutive_losses += 1;
        }

        bot.log(
            now,
            JournalLevel::Info,
            format!("Position closed. Order's net is {:.2} ({rvr:+} R)", order.net),
        );

        if group.enabled && group.consecutive_losses >= policy.max_consecutive_losses {
            group.enabled = false;
            bot.log(
                now,
                JournalLevel::Warn,
                format!(
                    "Bot group stopped after {} consecutive losses",
                    group.consecutive_losses
                ),
            );
        }

        if let Some(max) = policy.max_consecutive_losses_per_bot {
            if bot.enabled && bot.consecutive_losses >= max {
                bot.enabled = false;
                bot.log(
                    now,
                    JournalLevel::Warn,
                    format!("Bot stopped after {} consecutive losses", bot.consecutive_losses),
                );
            }
        }

        bot.last_closed = Some(order.clone());
        Ok(order)
    }
}
