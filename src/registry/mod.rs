//! # 提供商注册表模块
//!
//! 提供商状态模型、持久化抽象与注册表服务

pub mod service;
pub mod store;
pub mod types;

pub use service::{ProviderListing, ProviderRegistry};
pub use store::{MemoryStore, ResilienceStore};
pub use types::{ProviderState, ProviderStatus};
