//! # 健康监控服务
//!
//! 对每个提供商周期性（或按需）执行检查：真实环境走 HTTP 探针，
//! 混沌注入生效时走合成结果。结果落库、计数器更新、熔断判定
//! 全部在提供商的串行写路径上完成。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::breaker::{self, BreakerConfig, CircuitState};
use crate::chaos::types::{ActiveFault, ActiveFaults, ChaosEvent, ChaosPayload, EventSeverity};
use crate::config::ProviderConfig;
use crate::error::{ResilienceError, Result};
use crate::flags::{FLAG_CIRCUIT_BREAKER, FeatureFlagStore};
use crate::health::checker::ProbeClient;
use crate::health::types::{CheckOutcome, HealthCheckRecord, HealthConfig};
use crate::registry::ProviderRegistry;
use crate::registry::store::{ResilienceStore, write_with_retry};

/// 一轮检查的汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// 实际执行的检查数
    pub checked: usize,
    /// 因熔断/禁用被跳过的提供商数
    pub skipped: usize,
    /// 检查流程本身出错的提供商数
    pub errored: usize,
}

/// 健康监控服务
pub struct HealthMonitor {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn ResilienceStore>,
    checker: ProbeClient,
    faults: Arc<ActiveFaults>,
    flags: Arc<FeatureFlagStore>,
    config: HealthConfig,
    breaker_config: BreakerConfig,
    /// 提供商探针地址（静态配置）
    probe_urls: HashMap<String, String>,
}

impl HealthMonitor {
    /// 创建健康监控服务
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn ResilienceStore>,
        faults: Arc<ActiveFaults>,
        flags: Arc<FeatureFlagStore>,
        config: HealthConfig,
        breaker_config: BreakerConfig,
        providers: &[ProviderConfig],
    ) -> Self {
        let probe_urls = providers
            .iter()
            .filter_map(|p| p.probe_url.clone().map(|url| (p.name.clone(), url)))
            .collect();
        Self {
            registry,
            store,
            checker: ProbeClient::new(config.timeout()),
            faults,
            flags,
            config,
            breaker_config,
            probe_urls,
        }
    }

    /// 对单个提供商执行一次检查
    ///
    /// 熔断打开（冷却未到）或提供商被禁用时跳过：不产生检查记录、
    /// 不做真实 IO，向调用方返回熔断信号——快速失败正是熔断器的目的。
    pub async fn check_provider(&self, name: &str) -> Result<HealthCheckRecord> {
        let _guard = self.registry.guard(name).await;
        let mut state = self.registry.load(name).await?;
        let now = Utc::now();

        let breaker_enabled = self.flags.is_enabled(FLAG_CIRCUIT_BREAKER, true).await;
        if breaker_enabled {
            match breaker::current_state(&state, &self.breaker_config, now) {
                CircuitState::Open => {
                    debug!(provider = name, "Circuit open, skipping health check");
                    return Err(ResilienceError::circuit_open(name));
                }
                // 半开：放行一次探测决定恢复或重新熔断
                CircuitState::HalfOpen => {}
                CircuitState::Closed => {
                    if !state.enabled {
                        debug!(provider = name, "Provider disabled, skipping health check");
                        return Err(ResilienceError::circuit_open(name));
                    }
                }
            }
        }

        let outcome = match self.faults.get(name, now) {
            Some(fault) => Self::synthetic_outcome(&fault),
            None => match self.probe_urls.get(name) {
                Some(url) => self.checker.probe(url).await,
                // 未配置探针地址的提供商视为探测通过
                None => CheckOutcome::success(0),
            },
        };

        let record = HealthCheckRecord {
            provider_name: name.to_string(),
            checked_at: now,
            response_time_ms: outcome.response_time_ms,
            is_healthy: outcome.is_healthy,
            error_message: outcome.error_message.clone(),
        };
        write_with_retry(|| {
            let record = &record;
            async move { self.store.insert_check(record).await }
        })
        .await?;

        let transition = if breaker_enabled {
            if outcome.is_healthy {
                breaker::record_success(&mut state, &self.breaker_config, now)
            } else {
                breaker::record_failure(&mut state, &self.breaker_config, now)
            }
        } else {
            // 自动保护关闭：只累计计数器，不做熔断判定
            if outcome.is_healthy {
                state.success_count += 1;
            } else {
                state.error_count += 1;
            }
            state.recompute_health_score();
            state.updated_at = now;
            None
        };

        let event = transition.map(|t| {
            let severity = if t.to == CircuitState::Closed {
                EventSeverity::Info
            } else {
                EventSeverity::Warning
            };
            ChaosEvent::new(
                severity,
                ChaosPayload::BreakerTransition {
                    provider: name.to_string(),
                    from: t.from,
                    to: t.to,
                    recovery_ms: t.recovery_ms,
                },
            )
        });

        if let Some(t) = transition {
            match t.to {
                CircuitState::Closed => {
                    info!(provider = name, recovery_ms = ?t.recovery_ms, "Circuit closed, provider recovered");
                }
                CircuitState::Open => {
                    warn!(
                        provider = name,
                        error_count = state.error_count,
                        "Circuit opened for provider"
                    );
                }
                CircuitState::HalfOpen => {}
            }
        }

        self.registry.commit(state, event).await?;
        Ok(record)
    }

    /// 并发执行一轮全量检查
    ///
    /// 各提供商的检查互不阻塞：一个缓慢的探测不会拖住其他提供商。
    pub async fn run_once(&self) -> Result<RunSummary> {
        let listing = self.registry.list().await?;
        let check_futures: Vec<_> = listing
            .providers
            .iter()
            .map(|state| self.check_provider(&state.name))
            .collect();
        let results = futures::future::join_all(check_futures).await;

        let mut summary = RunSummary::default();
        for (state, result) in listing.providers.iter().zip(results) {
            match result {
                Ok(record) => {
                    summary.checked += 1;
                    debug!(
                        provider = %state.name,
                        healthy = record.is_healthy,
                        response_time_ms = record.response_time_ms,
                        "Health check completed"
                    );
                }
                Err(ResilienceError::CircuitOpen { .. }) => summary.skipped += 1,
                Err(e) => {
                    summary.errored += 1;
                    error!(provider = %state.name, error = %e, "Health check failed to execute");
                }
            }
        }
        Ok(summary)
    }

    /// 周期检查主循环
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = self.config.check_interval_secs, "Health monitor started");
        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(summary) => debug!(
                    checked = summary.checked,
                    skipped = summary.skipped,
                    errored = summary.errored,
                    "Health check round finished"
                ),
                Err(e) => error!(error = %e, "Health check round failed"),
            }
        }
    }

    /// 按注入参数生成合成检查结果
    ///
    /// `error_rate` 是单次检查的失败概率（百分比），只决定本次成败；
    /// 错误计数器由真实结果累计，绝不直接写入百分比数值。
    fn synthetic_outcome(fault: &ActiveFault) -> CheckOutcome {
        let roll = fastrand::u8(0..100);
        if roll < fault.params.error_rate {
            CheckOutcome::failure(
                fault.params.latency_ms,
                format!(
                    "synthetic fault: error rate {}%, latency {}ms",
                    fault.params.error_rate, fault.params.latency_ms
                ),
            )
        } else {
            CheckOutcome::success(fault.params.latency_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chaos::types::InjectFailureParams;
    use crate::config::FlagsConfig;
    use crate::notify::ChangeNotifier;
    use crate::registry::store::MemoryStore;
    use crate::registry::types::ProviderStatus;

    struct Fixture {
        monitor: HealthMonitor,
        registry: Arc<ProviderRegistry>,
        store: Arc<MemoryStore>,
        faults: Arc<ActiveFaults>,
        flags: Arc<FeatureFlagStore>,
    }

    async fn fixture(providers: &[(&str, i32)]) -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let notifier = ChangeNotifier::default();
        let registry = Arc::new(ProviderRegistry::new(store.clone(), notifier));
        let configs: Vec<ProviderConfig> = providers
            .iter()
            .map(|(name, priority)| ProviderConfig {
                name: (*name).to_string(),
                priority: *priority,
                probe_url: None,
            })
            .collect();
        registry.seed(&configs).await.unwrap();

        let faults = Arc::new(ActiveFaults::new());
        let flags = Arc::new(FeatureFlagStore::from_config(&FlagsConfig::default()));
        let monitor = HealthMonitor::new(
            registry.clone(),
            store.clone(),
            faults.clone(),
            flags.clone(),
            HealthConfig::default(),
            BreakerConfig::default(),
            &configs,
        );
        Fixture {
            monitor,
            registry,
            store,
            faults,
            flags,
        }
    }

    #[tokio::test]
    async fn test_check_without_probe_url_succeeds() {
        let fx = fixture(&[("alpha", 1)]).await;
        let record = fx.monitor.check_provider("alpha").await.unwrap();
        assert!(record.is_healthy);

        let state = fx.registry.load("alpha").await.unwrap();
        assert_eq!(state.success_count, 1);
        assert_eq!(state.health_score, 1.0);
    }

    #[tokio::test]
    async fn test_open_circuit_skips_check_without_record() {
        let fx = fixture(&[("alpha", 1)]).await;
        let mut state = fx.registry.load("alpha").await.unwrap();
        breaker::force_open(&mut state, ProviderStatus::Failed, Utc::now());
        fx.registry.commit(state, None).await.unwrap();

        let err = fx.monitor.check_provider("alpha").await.unwrap_err();
        assert!(matches!(err, ResilienceError::CircuitOpen { .. }));
        // 被短路的检查不产生记录
        assert!(fx.store.recent_checks(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_synthetic_fault_forces_failure() {
        let fx = fixture(&[("alpha", 1)]).await;
        fx.faults.insert(
            "alpha",
            ActiveFault {
                params: InjectFailureParams {
                    latency_ms: 1500,
                    error_rate: 100,
                    duration_secs: 600,
                },
                injected_at: Utc::now(),
            },
        );

        let record = fx.monitor.check_provider("alpha").await.unwrap();
        assert!(!record.is_healthy);
        assert_eq!(record.response_time_ms, 1500);

        let state = fx.registry.load("alpha").await.unwrap();
        // 错误计数来自真实检查结果，而不是注入的百分比
        assert_eq!(state.error_count, 1);
    }

    #[tokio::test]
    async fn test_half_open_probe_closes_circuit() {
        let fx = fixture(&[("alpha", 1)]).await;
        let mut state = fx.registry.load("alpha").await.unwrap();
        let opened_at = Utc::now() - chrono::Duration::seconds(120);
        breaker::force_open(&mut state, ProviderStatus::Failed, opened_at);
        fx.registry.commit(state, None).await.unwrap();

        // 冷却已过：探测放行，成功后熔断关闭
        let record = fx.monitor.check_provider("alpha").await.unwrap();
        assert!(record.is_healthy);

        let state = fx.registry.load("alpha").await.unwrap();
        assert!(!state.circuit_breaker_open);
        assert!(state.enabled);
        assert_eq!(state.status, ProviderStatus::Active);
        assert_eq!(state.health_score, 1.0);

        // 关闭转移落了一条带恢复时长的事件
        let events = fx.store.recent_events(10).await.unwrap();
        let closed = events.iter().find(|e| {
            matches!(
                e.payload,
                ChaosPayload::BreakerTransition {
                    to: CircuitState::Closed,
                    ..
                }
            )
        });
        match &closed.unwrap().payload {
            ChaosPayload::BreakerTransition { recovery_ms, .. } => {
                assert!(recovery_ms.unwrap() >= 120_000);
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_half_open_probe_failure_reopens() {
        let fx = fixture(&[("alpha", 1)]).await;
        let mut state = fx.registry.load("alpha").await.unwrap();
        let opened_at = Utc::now() - chrono::Duration::seconds(120);
        breaker::force_open(&mut state, ProviderStatus::Degraded, opened_at);
        fx.registry.commit(state, None).await.unwrap();

        // 故障仍然生效：半开探测失败，冷却重新计时
        fx.faults.insert(
            "alpha",
            ActiveFault {
                params: InjectFailureParams {
                    latency_ms: 100,
                    error_rate: 100,
                    duration_secs: 600,
                },
                injected_at: Utc::now(),
            },
        );

        let record = fx.monitor.check_provider("alpha").await.unwrap();
        assert!(!record.is_healthy);

        let state = fx.registry.load("alpha").await.unwrap();
        assert!(state.circuit_breaker_open);
        assert!(!state.enabled);
        // 打开时间被刷新，下一次检查仍被短路
        let err = fx.monitor.check_provider("alpha").await.unwrap_err();
        assert!(matches!(err, ResilienceError::CircuitOpen { .. }));
    }

    #[tokio::test]
    async fn test_breaker_flag_disables_short_circuit() {
        let fx = fixture(&[("alpha", 1)]).await;
        fx.flags.set(FLAG_CIRCUIT_BREAKER, "false", true).await;

        let mut state = fx.registry.load("alpha").await.unwrap();
        breaker::force_open(&mut state, ProviderStatus::Failed, Utc::now());
        fx.registry.commit(state, None).await.unwrap();

        // 保护关闭：即使熔断打开也继续探测并落记录
        let record = fx.monitor.check_provider("alpha").await.unwrap();
        assert!(record.is_healthy);
        assert_eq!(fx.store.recent_checks(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_once_reports_skipped_providers() {
        let fx = fixture(&[("alpha", 1), ("beta", 2)]).await;
        let mut state = fx.registry.load("beta").await.unwrap();
        breaker::force_open(&mut state, ProviderStatus::Failed, Utc::now());
        fx.registry.commit(state, None).await.unwrap();

        let summary = fx.monitor.run_once().await.unwrap();
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errored, 0);
    }
}
