//! # 健康监控模块
//!
//! 探针、检查记录与监控服务

pub mod checker;
pub mod monitor;
pub mod types;

pub use checker::ProbeClient;
pub use monitor::{HealthMonitor, RunSummary};
pub use types::{CheckOutcome, HealthCheckRecord, HealthConfig};
