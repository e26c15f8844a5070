//! # 熔断器模块
//!
//! 以纯状态机的形式决定 Closed/Open/HalfOpen 转移

pub mod state;

pub use state::{BreakerConfig, CircuitState, Transition, current_state, force_open, record_failure, record_success, reset};
