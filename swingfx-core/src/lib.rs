//! swingfx core: market-structure forex trading engine.
//!
//! This crate contains everything except the command line:
//! - Domain types (candles, pairs, signals, journal)
//! - Candle normalization and the per-timeframe analysis cache
//! - Indicators (ATR, moving averages, Bollinger bands, RSI, stochastic)
//! - Swing detection, value zones, candle patterns and trend classification
//! - ATR-based position sizing
//! - Order lifecycle with trailing stops and consecutive-loss breakers
//! - The bot group tick loop, behind price service and repository traits

pub mod analysis;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod orders;
pub mod repository;
pub mod service;
pub mod sizing;

pub use config::{ConfigError, GroupConfig};
pub use engine::{BotGroup, TickReport};
