//! # 混沌工程模块
//!
//! 故障注入、事件类型与场景编排

pub mod injector;
pub mod scenario;
pub mod types;

pub use injector::ChaosInjector;
pub use scenario::{ScenarioGate, ScenarioRunner, ScenarioSpec};
pub use types::{ActiveFaults, ChaosEvent, ChaosPayload, EventSeverity, InjectFailureParams};
