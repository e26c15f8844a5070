//! # 混沌注入器
//!
//! 操作员驱动的故障注入：对单个或全部提供商施加合成延迟/错误条件。
//! 每个操作都是"一次提供商状态写入 + 一条事件追加"的原子动作，
//! 绝不允许只写了一半。

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::breaker;
use crate::chaos::scenario::ScenarioGate;
use crate::chaos::types::{
    ActiveFault, ActiveFaults, ChaosEvent, ChaosPayload, EventSeverity, InjectFailureParams,
};
use crate::error::{ResilienceError, Result};
use crate::events::EventLog;
use crate::flags::{FLAG_CHAOS_MODE, FeatureFlagStore};
use crate::registry::types::{ProviderState, ProviderStatus};
use crate::registry::ProviderRegistry;

/// 混沌注入器
pub struct ChaosInjector {
    registry: Arc<ProviderRegistry>,
    events: Arc<EventLog>,
    faults: Arc<ActiveFaults>,
    flags: Arc<FeatureFlagStore>,
    gate: Arc<ScenarioGate>,
}

impl ChaosInjector {
    /// 创建注入器
    pub fn new(
        registry: Arc<ProviderRegistry>,
        events: Arc<EventLog>,
        faults: Arc<ActiveFaults>,
        flags: Arc<FeatureFlagStore>,
        gate: Arc<ScenarioGate>,
    ) -> Self {
        Self {
            registry,
            events,
            faults,
            flags,
            gate,
        }
    }

    /// 校验混沌模式开关
    async fn ensure_chaos_enabled(&self) -> Result<()> {
        if self.flags.is_enabled(FLAG_CHAOS_MODE, true).await {
            Ok(())
        } else {
            Err(ResilienceError::chaos_disabled(
                "chaos_mode_enabled 开关已关闭",
            ))
        }
    }

    /// 对单个提供商注入故障
    ///
    /// 参数越界在任何状态变更之前被拒绝。`duration_secs` 是提示性
    /// 元数据：恢复走熔断器的 Open→HalfOpen→Closed 路径，除非显式重置。
    pub async fn inject_failure(
        &self,
        name: &str,
        params: InjectFailureParams,
    ) -> Result<(ProviderState, Uuid)> {
        params.validate()?;
        self.ensure_chaos_enabled().await?;

        let _guard = self.registry.guard(name).await;
        let mut state = self.registry.load(name).await?;
        let now = Utc::now();

        breaker::force_open(&mut state, ProviderStatus::Degraded, now);
        state.notes = Some(params.describe());

        let event = ChaosEvent::new(
            EventSeverity::Warning,
            ChaosPayload::ProviderFailure {
                target: name.to_string(),
                latency_ms: params.latency_ms,
                error_rate: params.error_rate,
                duration_secs: params.duration_secs,
            },
        );
        let event_id = event.id;
        let state = self.registry.commit(state, Some(event)).await?;

        // 状态与事件落库成功后才登记生效故障
        self.faults.insert(
            name,
            ActiveFault {
                params,
                injected_at: now,
            },
        );

        warn!(
            provider = name,
            latency_ms = params.latency_ms,
            error_rate = params.error_rate,
            duration_secs = params.duration_secs,
            "Chaos failure injected"
        );
        Ok((state, event_id))
    }

    /// 一次操作切断全部提供商
    ///
    /// 每个提供商的更新独立串行化；整体不要求跨提供商事务，
    /// 但任何单个提供商都不会停在"打开却仍启用"的中间态。
    pub async fn cut_all_providers(&self) -> Result<(Vec<String>, Uuid)> {
        self.ensure_chaos_enabled().await?;

        let listing = self.registry.list().await?;
        let mut affected = Vec::with_capacity(listing.providers.len());
        for provider in &listing.providers {
            let _guard = self.registry.guard(&provider.name).await;
            let mut state = self.registry.load(&provider.name).await?;
            let now = Utc::now();
            breaker::force_open(&mut state, ProviderStatus::Failed, now);
            state.notes = Some("all providers cut".to_string());
            self.registry.commit(state, None).await?;
            affected.push(provider.name.clone());
        }

        let event = ChaosEvent::new(
            EventSeverity::Critical,
            ChaosPayload::AllProvidersCut {
                affected: affected.clone(),
            },
        );
        let event_id = self.events.append(event).await?;

        warn!(count = affected.len(), "All providers cut");
        Ok((affected, event_id))
    }

    /// 重置全部提供商到关闭状态
    ///
    /// 恢复路径不受混沌开关限制。同时清空生效故障表并立即释放
    /// 场景互斥锁（中止正在执行的场景）。
    pub async fn reset_all_providers(&self) -> Result<(Vec<String>, Uuid)> {
        let listing = self.registry.list().await?;
        let mut affected = Vec::with_capacity(listing.providers.len());
        for provider in &listing.providers {
            let _guard = self.registry.guard(&provider.name).await;
            let mut state = self.registry.load(&provider.name).await?;
            breaker::reset(&mut state, Utc::now());
            self.registry.commit(state, None).await?;
            affected.push(provider.name.clone());
        }

        self.faults.clear();
        self.gate.force_release().await;

        let event = ChaosEvent::new(
            EventSeverity::Info,
            ChaosPayload::ResetAllProviders {
                affected: affected.clone(),
            },
        );
        let event_id = self.events.append(event).await?;

        info!(count = affected.len(), "All providers reset");
        Ok((affected, event_id))
    }
}
