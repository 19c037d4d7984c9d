//! 应用层

pub mod aggregator;

pub use aggregator::{AccessAggregator, DEFAULT_PROVIDER_TIMEOUT};
