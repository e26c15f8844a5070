//! # 健康检查类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一次健康检查的追加记录
///
/// 只增不改；保留窗口由存储层按配置裁剪。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckRecord {
    /// 被检查的提供商
    pub provider_name: String,
    /// 检查时间
    pub checked_at: DateTime<Utc>,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
    /// 是否健康
    pub is_healthy: bool,
    /// 错误信息
    pub error_message: Option<String>,
}

impl HealthCheckRecord {
    /// 创建成功的检查记录
    pub fn success(provider_name: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            provider_name: provider_name.into(),
            checked_at: Utc::now(),
            response_time_ms,
            is_healthy: true,
            error_message: None,
        }
    }

    /// 创建失败的检查记录
    pub fn failure(
        provider_name: impl Into<String>,
        response_time_ms: u64,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            checked_at: Utc::now(),
            response_time_ms,
            is_healthy: false,
            error_message: Some(error_message.into()),
        }
    }
}

/// 探测结果（尚未落库的检查结论）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    /// 是否健康
    pub is_healthy: bool,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
    /// 失败时的错误信息
    pub error_message: Option<String>,
}

impl CheckOutcome {
    /// 成功结果
    pub const fn success(response_time_ms: u64) -> Self {
        Self {
            is_healthy: true,
            response_time_ms,
            error_message: None,
        }
    }

    /// 失败结果
    pub fn failure(response_time_ms: u64, error_message: impl Into<String>) -> Self {
        Self {
            is_healthy: false,
            response_time_ms,
            error_message: Some(error_message.into()),
        }
    }
}

/// 健康检查配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// 周期检查间隔（秒）
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// 单次检查超时（秒），超时计为失败
    #[serde(default = "default_check_timeout_secs")]
    pub check_timeout_secs: u64,
}

const fn default_check_interval_secs() -> u64 {
    30
}

const fn default_check_timeout_secs() -> u64 {
    10
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            check_timeout_secs: default_check_timeout_secs(),
        }
    }
}

impl HealthConfig {
    /// 检查间隔
    pub const fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_interval_secs)
    }

    /// 单次检查超时
    pub const fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_timeout_secs)
    }
}
