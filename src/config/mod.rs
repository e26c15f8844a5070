//! # 配置模块
//!
//! 应用配置的类型定义与加载逻辑

pub mod app_config;
pub mod manager;

pub use app_config::{AppConfig, FlagsConfig, ProviderConfig, RetentionConfig};
pub use manager::{CONFIG_PATH_ENV, ConfigManager};
