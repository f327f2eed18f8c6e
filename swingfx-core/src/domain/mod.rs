//! Domain types for swingfx

pub mod candle;
pub mod ids;
pub mod journal;
pub mod pair;
pub mod precision;
pub mod signal;

pub use candle::{Candle, RawBar};
pub use ids::{StopId, TradeId};
pub use journal::{Journal, JournalLevel, LogEntry};
pub use pair::PairConfig;
pub use precision::truncate;
pub use signal::{Direction, Signal};
