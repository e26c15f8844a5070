//! # 韧性指标模块

pub mod aggregator;

pub use aggregator::{FailureSummary, MetricsAggregator, MetricsConfig, ResilienceSnapshot};
