//! # 韧性指标聚合器
//!
//! 从最近的健康检查记录与事件日志计算可用率、失败率、平均响应
//! 时间与 MTTR。没有恢复周期时 MTTR 如实报告为空，绝不猜测。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::breaker::CircuitState;
use crate::chaos::types::ChaosPayload;
use crate::error::Result;
use crate::registry::store::ResilienceStore;

/// 指标聚合配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// 观测窗口：参与计算的最近检查记录条数
    #[serde(default = "default_window")]
    pub window: usize,
    /// 快照中携带的最近失败条数
    #[serde(default = "default_recent_failures")]
    pub recent_failures: usize,
}

const fn default_window() -> usize {
    100
}

const fn default_recent_failures() -> usize {
    10
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            recent_failures: default_recent_failures(),
        }
    }
}

/// 供操作员排障的失败摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSummary {
    /// 提供商名称
    pub provider_name: String,
    /// 错误信息
    pub error_message: Option<String>,
    /// 检查时间
    pub checked_at: DateTime<Utc>,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
}

/// 韧性指标快照
#[serde_as]
#[derive(Debug, Clone, Serialize)]
pub struct ResilienceSnapshot {
    /// 窗口内的检查总数
    pub total_checks: usize,
    /// 成功检查数
    pub successful_checks: usize,
    /// 失败检查数
    pub failed_checks: usize,
    /// 可用率（百分比）
    pub uptime_percent: f64,
    /// 失败率（百分比）
    pub failure_rate_percent: f64,
    /// 平均响应时间（毫秒），成功与失败都计入
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub avg_response_time: Duration,
    /// 最近的失败记录，新者在前
    pub recent_failures: Vec<FailureSummary>,
    /// 平均恢复时间（毫秒）；窗口内没有恢复周期时为空
    pub mttr_ms: Option<f64>,
    /// 窗口内完成的恢复周期数
    pub recovery_cycles: usize,
    /// 观测窗口大小
    pub window: usize,
    /// 快照生成时间
    pub generated_at: DateTime<Utc>,
}

/// 韧性指标聚合器
pub struct MetricsAggregator {
    store: Arc<dyn ResilienceStore>,
    config: MetricsConfig,
}

impl MetricsAggregator {
    /// 创建聚合器
    pub fn new(store: Arc<dyn ResilienceStore>, config: MetricsConfig) -> Self {
        Self { store, config }
    }

    /// 计算当前快照
    pub async fn snapshot(&self) -> Result<ResilienceSnapshot> {
        let checks = self.store.recent_checks(self.config.window).await?;

        let total_checks = checks.len();
        let successful_checks = checks.iter().filter(|c| c.is_healthy).count();
        let failed_checks = total_checks - successful_checks;

        #[allow(clippy::cast_precision_loss)]
        let uptime_percent = if total_checks == 0 {
            0.0
        } else {
            successful_checks as f64 / total_checks as f64 * 100.0
        };
        let failure_rate_percent = if total_checks == 0 {
            0.0
        } else {
            100.0 - uptime_percent
        };

        let avg_response_time = if total_checks == 0 {
            Duration::ZERO
        } else {
            let total_ms: u64 = checks.iter().map(|c| c.response_time_ms).sum();
            Duration::from_millis(total_ms / total_checks as u64)
        };

        // recent_checks 已按新者在前排序
        let recent_failures: Vec<FailureSummary> = checks
            .iter()
            .filter(|c| !c.is_healthy)
            .take(self.config.recent_failures)
            .map(|c| FailureSummary {
                provider_name: c.provider_name.clone(),
                error_message: c.error_message.clone(),
                checked_at: c.checked_at,
                response_time_ms: c.response_time_ms,
            })
            .collect();

        // MTTR：每个熔断打开到探测成功关闭的周期取恢复时长，求均值
        let events = self.store.recent_events(self.config.window).await?;
        let recoveries: Vec<u64> = events
            .iter()
            .filter_map(|event| match &event.payload {
                ChaosPayload::BreakerTransition {
                    to: CircuitState::Closed,
                    recovery_ms: Some(ms),
                    ..
                } => Some(*ms),
                _ => None,
            })
            .collect();
        let recovery_cycles = recoveries.len();
        #[allow(clippy::cast_precision_loss)]
        let mttr_ms = if recoveries.is_empty() {
            None
        } else {
            Some(recoveries.iter().sum::<u64>() as f64 / recoveries.len() as f64)
        };

        Ok(ResilienceSnapshot {
            total_checks,
            successful_checks,
            failed_checks,
            uptime_percent,
            failure_rate_percent,
            avg_response_time,
            recent_failures,
            mttr_ms,
            recovery_cycles,
            window: self.config.window,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chaos::types::{ChaosEvent, EventSeverity};
    use crate::health::types::HealthCheckRecord;
    use crate::registry::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn aggregator(store: Arc<MemoryStore>) -> MetricsAggregator {
        MetricsAggregator::new(store, MetricsConfig::default())
    }

    #[tokio::test]
    async fn test_metrics_from_mixed_checks() {
        let store = Arc::new(MemoryStore::default());
        // 8 成功 + 2 失败，响应时间都是 100ms
        for _ in 0..8 {
            store
                .insert_check(&HealthCheckRecord::success("alpha", 100))
                .await
                .unwrap();
        }
        for _ in 0..2 {
            store
                .insert_check(&HealthCheckRecord::failure("beta", 100, "connection reset"))
                .await
                .unwrap();
        }

        let snapshot = aggregator(store).snapshot().await.unwrap();
        assert_eq!(snapshot.total_checks, 10);
        assert_eq!(snapshot.successful_checks, 8);
        assert_eq!(snapshot.failed_checks, 2);
        assert_eq!(snapshot.uptime_percent, 80.0);
        assert_eq!(snapshot.failure_rate_percent, 20.0);
        assert_eq!(snapshot.avg_response_time, Duration::from_millis(100));
        assert_eq!(snapshot.recent_failures.len(), 2);
        assert_eq!(snapshot.recent_failures[0].provider_name, "beta");
    }

    #[tokio::test]
    async fn test_empty_window_reports_zero_and_no_mttr() {
        let store = Arc::new(MemoryStore::default());
        let snapshot = aggregator(store).snapshot().await.unwrap();

        assert_eq!(snapshot.total_checks, 0);
        assert_eq!(snapshot.uptime_percent, 0.0);
        assert_eq!(snapshot.failure_rate_percent, 0.0);
        assert_eq!(snapshot.avg_response_time, Duration::ZERO);
        // 没有恢复周期：MTTR 如实为空
        assert_eq!(snapshot.mttr_ms, None);
        assert_eq!(snapshot.recovery_cycles, 0);
    }

    #[tokio::test]
    async fn test_mttr_from_recovery_cycles() {
        let store = Arc::new(MemoryStore::default());
        for recovery_ms in [30_000u64, 60_000] {
            store
                .append_event(&ChaosEvent::new(
                    EventSeverity::Info,
                    ChaosPayload::BreakerTransition {
                        provider: "alpha".to_string(),
                        from: CircuitState::HalfOpen,
                        to: CircuitState::Closed,
                        recovery_ms: Some(recovery_ms),
                    },
                ))
                .await
                .unwrap();
        }
        // 打开转移不计入 MTTR
        store
            .append_event(&ChaosEvent::new(
                EventSeverity::Warning,
                ChaosPayload::BreakerTransition {
                    provider: "alpha".to_string(),
                    from: CircuitState::Closed,
                    to: CircuitState::Open,
                    recovery_ms: None,
                },
            ))
            .await
            .unwrap();

        let snapshot = aggregator(store).snapshot().await.unwrap();
        assert_eq!(snapshot.recovery_cycles, 2);
        assert_eq!(snapshot.mttr_ms, Some(45_000.0));
    }

    #[tokio::test]
    async fn test_recent_failures_capped() {
        let store = Arc::new(MemoryStore::default());
        for i in 0..15u64 {
            store
                .insert_check(&HealthCheckRecord::failure(
                    format!("p{i}"),
                    10,
                    "boom",
                ))
                .await
                .unwrap();
        }

        let snapshot = aggregator(store).snapshot().await.unwrap();
        // 最多携带配置数量的失败，且新者在前
        assert_eq!(snapshot.recent_failures.len(), 10);
        assert_eq!(snapshot.recent_failures[0].provider_name, "p14");
    }
}
