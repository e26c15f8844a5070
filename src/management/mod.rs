//! # 管理端模块
//!
//! 面向操作员的 HTTP API：提供商状态查询、混沌操作、指标快照、
//! 场景执行、事件审计与功能开关。

pub mod handlers;
pub mod response;
pub mod routes;
pub mod server;

pub use server::{AppState, ManagementConfig};
