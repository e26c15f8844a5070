//! # 提供商状态模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 提供商运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    /// 正常可用
    Active,
    /// 已降级（混沌注入或故障中）
    Degraded,
    /// 完全失效
    Failed,
}

/// 单个提供商的权威状态
///
/// 每个配置的提供商一行，键为不可变的 `name`。
/// 除显式重置外，`health_score` 只能由计数器重算得出。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderState {
    /// 唯一名称，创建后不可变
    pub name: String,
    /// 调用方当前是否可以选择该提供商
    pub enabled: bool,
    /// 运行状态
    pub status: ProviderStatus,
    /// 健康分数，[0.0, 1.0]，越高越健康
    pub health_score: f64,
    /// 调用方用于排序的优先级，本引擎只读
    pub priority: i32,
    /// 自上次重置以来的失败计数
    pub error_count: u64,
    /// 自上次重置以来的成功计数
    pub success_count: u64,
    /// 熔断器是否打开
    pub circuit_breaker_open: bool,
    /// 熔断器打开时间，用于计算半开资格
    pub circuit_breaker_opens_at: Option<DateTime<Utc>>,
    /// 最近一次操作的文字描述（如混沌注入参数）
    pub notes: Option<String>,
    /// 最近一次写入时间
    pub updated_at: DateTime<Utc>,
}

impl ProviderState {
    /// 创建初始状态：启用、Active、满分
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            status: ProviderStatus::Active,
            health_score: 1.0,
            priority,
            error_count: 0,
            success_count: 0,
            circuit_breaker_open: false,
            circuit_breaker_opens_at: None,
            notes: None,
            updated_at: Utc::now(),
        }
    }

    /// 由计数器确定性地计算健康分数
    ///
    /// 两个计数器都为零时视为满分（尚无观测值）。
    pub fn compute_health_score(success_count: u64, error_count: u64) -> f64 {
        let total = success_count + error_count;
        if total == 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = success_count as f64 / total as f64;
        ratio.clamp(0.0, 1.0)
    }

    /// 计数器变化后重算健康分数
    pub fn recompute_health_score(&mut self) {
        self.health_score = Self::compute_health_score(self.success_count, self.error_count);
    }

    /// 当前观测窗口内的错误率
    pub fn error_rate(&self) -> f64 {
        let total = self.success_count + self.error_count;
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.error_count as f64 / total as f64;
        rate
    }

    /// 校验熔断不变量：打开 ⇒ 禁用且非 Active
    pub fn breaker_invariant_holds(&self) -> bool {
        if self.circuit_breaker_open {
            !self.enabled && self.status != ProviderStatus::Active
        } else {
            true
        }
    }
}
