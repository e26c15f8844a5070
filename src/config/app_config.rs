//! # 应用配置结构定义

use serde::{Deserialize, Serialize};

use crate::breaker::BreakerConfig;
use crate::health::HealthConfig;
use crate::management::server::ManagementConfig;
use crate::metrics::MetricsConfig;

/// 应用主配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 管理服务器配置
    #[serde(default)]
    pub server: ManagementConfig,
    /// 熔断器配置
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// 健康检查配置
    #[serde(default)]
    pub health: HealthConfig,
    /// 指标聚合配置
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 历史数据保留配置
    #[serde(default)]
    pub retention: RetentionConfig,
    /// 功能开关配置
    #[serde(default)]
    pub flags: FlagsConfig,
    /// 受管提供商集合（静态配置，引擎不会动态增删）
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// 单个提供商的静态配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// 提供商唯一名称
    pub name: String,
    /// 调用方用于排序的优先级，引擎只读不写
    #[serde(default)]
    pub priority: i32,
    /// 健康探针地址；缺省时探针视为通过
    #[serde(default)]
    pub probe_url: Option<String>,
}

/// 历史数据保留配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// 健康检查记录保留条数上限
    #[serde(default = "default_max_check_records")]
    pub max_check_records: usize,
    /// 事件日志保留条数上限
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

const fn default_max_check_records() -> usize {
    1000
}

const fn default_max_events() -> usize {
    1000
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_check_records: default_max_check_records(),
            max_events: default_max_events(),
        }
    }
}

/// 功能开关初始配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagsConfig {
    /// 开关所属环境标识
    #[serde(default = "default_environment")]
    pub environment: String,
    /// 是否允许混沌注入操作
    #[serde(default = "default_flag_enabled")]
    pub chaos_mode_enabled: bool,
    /// 是否启用自动熔断保护
    #[serde(default = "default_flag_enabled")]
    pub circuit_breaker_enabled: bool,
}

fn default_environment() -> String {
    "production".to_string()
}

const fn default_flag_enabled() -> bool {
    true
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            chaos_mode_enabled: default_flag_enabled(),
            circuit_breaker_enabled: default_flag_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ManagementConfig::default(),
            breaker: BreakerConfig::default(),
            health: HealthConfig::default(),
            metrics: MetricsConfig::default(),
            retention: RetentionConfig::default(),
            flags: FlagsConfig::default(),
            providers: Vec::new(),
        }
    }
}

impl AppConfig {
    /// 校验配置的内部一致性
    pub fn validate(&self) -> crate::error::Result<()> {
        use std::collections::HashSet;

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(crate::error::ResilienceError::config(
                    "提供商名称不能为空",
                ));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(crate::error::ResilienceError::config(format!(
                    "提供商名称重复: {}",
                    provider.name
                )));
            }
        }

        self.breaker.validate()?;
        Ok(())
    }
}
