//! Bots, the bot group tick loop and market hours.

pub mod bot;
pub mod bot_group;
pub mod calendar;

pub use bot::{Bot, BotError, BotHealth};
pub use bot_group::{BotGroup, BotOutcome, BotTurn, GroupState, TickReport};
pub use calendar::{AlwaysOpen, ForexCalendar, MarketCalendar};
