//! Candle normalization, timeframes and the analysis cache

pub mod cache;
pub mod granularity;
pub mod series;

pub use cache::{AnalysisCache, CacheEntry};
pub use granularity::Granularity;
pub use series::{CandleSeries, SeriesError, SeriesOptions};
