//! # 熔断器状态机
//!
//! 纯函数实现：不做任何 IO，只对单个提供商状态行做转移判定，
//! 便于对状态机性质做精确的单元测试。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::types::{ProviderState, ProviderStatus};

/// 熔断器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// 错误率阈值，滚动错误率严格大于该值时熔断
    #[serde(default = "default_error_rate_threshold")]
    pub error_rate_threshold: f64,
    /// 触发熔断判定所需的最小样本数
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
    /// 熔断冷却时间（秒），冷却结束后自动进入半开
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_error_rate_threshold() -> f64 {
    0.5
}

const fn default_min_samples() -> u64 {
    4
}

const fn default_cooldown_secs() -> u64 {
    30
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            error_rate_threshold: default_error_rate_threshold(),
            min_samples: default_min_samples(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl BreakerConfig {
    /// 校验配置取值范围
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(0.0..=1.0).contains(&self.error_rate_threshold) {
            return Err(crate::error::ResilienceError::config(format!(
                "error_rate_threshold 必须在 [0,1] 区间: {}",
                self.error_rate_threshold
            )));
        }
        if self.cooldown_secs == 0 {
            return Err(crate::error::ResilienceError::config(
                "cooldown_secs 必须大于 0",
            ));
        }
        Ok(())
    }

    /// 冷却时间
    pub fn cooldown(&self) -> Duration {
        Duration::seconds(i64::try_from(self.cooldown_secs).unwrap_or(i64::MAX))
    }
}

/// 熔断器可观测状态
///
/// 半开不单独落库：打开标志 + 冷却时间到期即视为半开，
/// 冷却结束与流量无关，自动生效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// 关闭：提供商可用，失败计入计数器
    Closed,
    /// 打开：提供商不可用，所有调用被短路
    Open,
    /// 半开：允许一次探测决定恢复或重新熔断
    HalfOpen,
}

/// 一次状态转移的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
    /// 从熔断打开到本次恢复经过的毫秒数，仅探测成功关闭时存在
    pub recovery_ms: Option<u64>,
}

/// 由状态行推导当前熔断状态
pub fn current_state(
    state: &ProviderState,
    config: &BreakerConfig,
    now: DateTime<Utc>,
) -> CircuitState {
    if !state.circuit_breaker_open {
        return CircuitState::Closed;
    }
    match state.circuit_breaker_opens_at {
        Some(opened_at) if now.signed_duration_since(opened_at) >= config.cooldown() => {
            CircuitState::HalfOpen
        }
        Some(_) => CircuitState::Open,
        // 打开但缺少时间戳：按可探测处理，避免永久熔断
        None => CircuitState::HalfOpen,
    }
}

/// 记录一次成功的检查结果
///
/// 半开时成功 ⇒ 关闭熔断：计数器清零、健康分回满、重新启用。
pub fn record_success(
    state: &mut ProviderState,
    config: &BreakerConfig,
    now: DateTime<Utc>,
) -> Option<Transition> {
    let from = current_state(state, config, now);
    match from {
        CircuitState::HalfOpen => {
            let recovery_ms = state.circuit_breaker_opens_at.map(|opened_at| {
                u64::try_from(now.signed_duration_since(opened_at).num_milliseconds().max(0))
                    .unwrap_or(0)
            });
            state.success_count = 0;
            state.error_count = 0;
            state.health_score = 1.0;
            state.circuit_breaker_open = false;
            state.circuit_breaker_opens_at = None;
            state.enabled = true;
            state.status = ProviderStatus::Active;
            state.updated_at = now;
            Some(Transition {
                from,
                to: CircuitState::Closed,
                recovery_ms,
            })
        }
        CircuitState::Closed | CircuitState::Open => {
            state.success_count += 1;
            state.recompute_health_score();
            state.updated_at = now;
            None
        }
    }
}

/// 记录一次失败的检查结果
///
/// 关闭时超过错误率阈值 ⇒ 熔断；半开时失败 ⇒ 刷新打开时间、冷却重新计时。
pub fn record_failure(
    state: &mut ProviderState,
    config: &BreakerConfig,
    now: DateTime<Utc>,
) -> Option<Transition> {
    let from = current_state(state, config, now);
    state.error_count += 1;
    state.recompute_health_score();
    state.updated_at = now;
    match from {
        CircuitState::HalfOpen => {
            state.circuit_breaker_opens_at = Some(now);
            state.enabled = false;
            if state.status == ProviderStatus::Active {
                state.status = ProviderStatus::Failed;
            }
            Some(Transition {
                from,
                to: CircuitState::Open,
                recovery_ms: None,
            })
        }
        CircuitState::Closed => {
            let total = state.success_count + state.error_count;
            if total >= config.min_samples && state.error_rate() > config.error_rate_threshold {
                state.circuit_breaker_open = true;
                state.circuit_breaker_opens_at = Some(now);
                state.enabled = false;
                state.status = ProviderStatus::Failed;
                Some(Transition {
                    from,
                    to: CircuitState::Open,
                    recovery_ms: None,
                })
            } else {
                None
            }
        }
        CircuitState::Open => None,
    }
}

/// 强制打开熔断（混沌注入 / 全量切断）
///
/// 始终按不变量修正 `enabled` 与 `status`；已打开时只刷新元数据，不产生转移。
pub fn force_open(
    state: &mut ProviderState,
    status: ProviderStatus,
    now: DateTime<Utc>,
) -> Option<Transition> {
    let was_open = state.circuit_breaker_open;
    state.circuit_breaker_open = true;
    state.circuit_breaker_opens_at = Some(now);
    state.enabled = false;
    state.status = status;
    state.updated_at = now;
    if was_open {
        None
    } else {
        Some(Transition {
            from: CircuitState::Closed,
            to: CircuitState::Open,
            recovery_ms: None,
        })
    }
}

/// 手动重置到关闭状态
///
/// 计数器清零、健康分回满、重新启用。恢复时长不计入 MTTR
/// （MTTR 只统计探测成功导致的关闭）。
pub fn reset(state: &mut ProviderState, now: DateTime<Utc>) -> Option<Transition> {
    let was_open = state.circuit_breaker_open;
    state.success_count = 0;
    state.error_count = 0;
    state.health_score = 1.0;
    state.circuit_breaker_open = false;
    state.circuit_breaker_opens_at = None;
    state.enabled = true;
    state.status = ProviderStatus::Active;
    state.notes = None;
    state.updated_at = now;
    if was_open {
        Some(Transition {
            from: CircuitState::Open,
            to: CircuitState::Closed,
            recovery_ms: None,
        })
    } else {
        None
    }
}
