//! # 混沌事件与注入参数类型

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::breaker::CircuitState;
use crate::error::{ResilienceError, Result};

/// 注入延迟上限（毫秒）
pub const MAX_LATENCY_MS: u64 = 5000;
/// 注入持续时间下限（秒）
pub const MIN_DURATION_SECS: u64 = 10;
/// 注入持续时间上限（秒）
pub const MAX_DURATION_SECS: u64 = 3600;
/// 错误率上限（百分比）
pub const MAX_ERROR_RATE: u8 = 100;

/// 故障注入参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectFailureParams {
    /// 合成延迟（毫秒），0..=5000
    pub latency_ms: u64,
    /// 合成错误率（百分比），0..=100；只用于决定每次合成检查的成败，
    /// 不会被写入错误计数器
    pub error_rate: u8,
    /// 注入持续时间（秒），10..=3600，对操作方的提示性元数据
    pub duration_secs: u64,
}

impl InjectFailureParams {
    /// 范围校验；越界时返回指明字段的校验错误，且不做任何状态变更
    pub fn validate(&self) -> Result<()> {
        if self.latency_ms > MAX_LATENCY_MS {
            return Err(ResilienceError::validation(
                "latency_ms",
                format!("必须在 0..={MAX_LATENCY_MS} 范围内: {}", self.latency_ms),
            ));
        }
        if self.error_rate > MAX_ERROR_RATE {
            return Err(ResilienceError::validation(
                "error_rate",
                format!("必须在 0..={MAX_ERROR_RATE} 范围内: {}", self.error_rate),
            ));
        }
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&self.duration_secs) {
            return Err(ResilienceError::validation(
                "duration_secs",
                format!(
                    "必须在 {MIN_DURATION_SECS}..={MAX_DURATION_SECS} 范围内: {}",
                    self.duration_secs
                ),
            ));
        }
        Ok(())
    }

    /// 生成写入 `notes` 的描述文本
    pub fn describe(&self) -> String {
        format!(
            "chaos injection: latency {}ms, error rate {}%, duration {}s",
            self.latency_ms, self.error_rate, self.duration_secs
        )
    }
}

/// 事件严重级别（信息属性，不参与调度）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warning,
    Critical,
}

/// 场景步骤执行记录，保存子事件引用供审计回溯
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioStepRecord {
    /// 步骤描述
    pub step: String,
    /// 目标提供商（全量操作时为空）
    pub provider: Option<String>,
    /// 该步骤产生的子事件 id
    pub event_id: Option<Uuid>,
}

/// 场景执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOutcome {
    /// 所有步骤执行完成
    Completed,
    /// 被显式重置中断
    Aborted,
    /// 某个步骤执行失败
    Failed,
}

/// 事件负载，按事件类型强类型标记
///
/// 刻意不用自由文本承载参数：负载结构由 `type` 标签决定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChaosPayload {
    /// 单个提供商被注入故障
    ProviderFailure {
        target: String,
        latency_ms: u64,
        error_rate: u8,
        duration_secs: u64,
    },
    /// 全部提供商被切断
    AllProvidersCut { affected: Vec<String> },
    /// 全部提供商被重置
    ResetAllProviders { affected: Vec<String> },
    /// 一次场景执行完成或中止
    ScenarioRun {
        run_id: Uuid,
        scenario_id: String,
        steps: Vec<ScenarioStepRecord>,
        outcome: ScenarioOutcome,
    },
    /// 熔断器状态转移
    BreakerTransition {
        provider: String,
        from: CircuitState,
        to: CircuitState,
        /// 熔断打开到恢复的毫秒数，仅探测成功关闭时存在；MTTR 的数据来源
        recovery_ms: Option<u64>,
    },
}

/// 追加到事件日志的一条记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaosEvent {
    /// 事件 id
    pub id: Uuid,
    /// 事件发生时间
    pub timestamp: DateTime<Utc>,
    /// 严重级别
    pub severity: EventSeverity,
    /// 强类型负载
    #[serde(flatten)]
    pub payload: ChaosPayload,
}

impl ChaosEvent {
    /// 创建事件，自动分配 id 与时间戳
    pub fn new(severity: EventSeverity, payload: ChaosPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            severity,
            payload,
        }
    }
}

/// 当前生效的注入故障
#[derive(Debug, Clone, Copy)]
pub struct ActiveFault {
    /// 注入参数
    pub params: InjectFailureParams,
    /// 注入时间
    pub injected_at: DateTime<Utc>,
}

impl ActiveFault {
    /// 注入是否已过期（超过提示性持续时间）
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        let deadline = self.injected_at
            + chrono::Duration::seconds(i64::try_from(self.params.duration_secs).unwrap_or(i64::MAX));
        now >= deadline
    }
}

/// 生效故障表：注入器写入，健康监控读取
#[derive(Debug, Default)]
pub struct ActiveFaults {
    faults: DashMap<String, ActiveFault>,
}

impl ActiveFaults {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记某个提供商的生效故障
    pub fn insert(&self, provider: &str, fault: ActiveFault) {
        self.faults.insert(provider.to_string(), fault);
    }

    /// 读取生效故障；已过期的条目按惰性方式摘除
    pub fn get(&self, provider: &str, now: DateTime<Utc>) -> Option<ActiveFault> {
        let fault = self.faults.get(provider).map(|entry| *entry.value())?;
        if fault.expired(now) {
            self.faults.remove(provider);
            return None;
        }
        Some(fault)
    }

    /// 移除某个提供商的故障
    pub fn remove(&self, provider: &str) {
        self.faults.remove(provider);
    }

    /// 清空全部故障（reset-all 路径）
    pub fn clear(&self) {
        self.faults.clear();
    }

    /// 当前登记的故障数量（含未惰性摘除的过期条目）
    pub fn len(&self) -> usize {
        self.faults.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::latency_upper_bound(5000, 50, 60, true)]
    #[case::latency_above_bound(5001, 50, 60, false)]
    #[case::duration_below_bound(100, 50, 9, false)]
    #[case::duration_lower_bound(100, 50, 10, true)]
    #[case::duration_upper_bound(100, 50, 3600, true)]
    #[case::duration_above_bound(100, 50, 3601, false)]
    #[case::error_rate_upper_bound(100, 100, 60, true)]
    #[case::error_rate_above_bound(100, 101, 60, false)]
    fn test_inject_params_validation(
        #[case] latency_ms: u64,
        #[case] error_rate: u8,
        #[case] duration_secs: u64,
        #[case] expect_ok: bool,
    ) {
        let params = InjectFailureParams {
            latency_ms,
            error_rate,
            duration_secs,
        };
        assert_eq!(params.validate().is_ok(), expect_ok);
    }

    #[test]
    fn test_validation_error_names_offending_field() {
        let params = InjectFailureParams {
            latency_ms: 9999,
            error_rate: 10,
            duration_secs: 60,
        };
        match params.validate().unwrap_err() {
            crate::error::ResilienceError::Validation { field, .. } => {
                assert_eq!(field, "latency_ms");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_event_payload_serializes_with_type_tag() {
        let event = ChaosEvent::new(
            EventSeverity::Warning,
            ChaosPayload::ProviderFailure {
                target: "alpha".to_string(),
                latency_ms: 1000,
                error_rate: 80,
                duration_secs: 120,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "provider_failure");
        assert_eq!(json["target"], "alpha");
        assert_eq!(json["severity"], "warning");
    }

    #[test]
    fn test_active_fault_lazy_expiry() {
        let faults = ActiveFaults::new();
        let now = Utc::now();
        faults.insert(
            "alpha",
            ActiveFault {
                params: InjectFailureParams {
                    latency_ms: 100,
                    error_rate: 100,
                    duration_secs: 60,
                },
                injected_at: now,
            },
        );

        assert!(faults.get("alpha", now).is_some());
        // 持续时间过后条目被惰性摘除
        let later = now + chrono::Duration::seconds(61);
        assert!(faults.get("alpha", later).is_none());
        assert!(faults.is_empty());
    }
}
