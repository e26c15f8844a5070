//! # 测试场景执行器
//!
//! 把多个混沌操作编排成命名的、可重复执行的场景。同一时刻只允许
//! 一个场景在跑：并发启动直接返回冲突而不是悄悄排队。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chaos::injector::ChaosInjector;
use crate::chaos::types::{
    ChaosEvent, ChaosPayload, EventSeverity, InjectFailureParams, ScenarioOutcome,
    ScenarioStepRecord,
};
use crate::error::{ResilienceError, Result};
use crate::events::EventLog;
use crate::registry::ProviderRegistry;
use crate::registry::types::ProviderState;

/// 场景严重级别分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// 场景步骤定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// 按优先级从高到低依次注入故障
    InjectEachByPriority { params: InjectFailureParams },
    /// 只对最高优先级提供商注入故障
    InjectHighestPriority { params: InjectFailureParams },
    /// 切断全部提供商
    CutAll,
    /// 重置全部提供商
    ResetAll,
}

/// 一个命名场景的定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// 场景 id
    pub id: String,
    /// 展示名称
    pub name: String,
    /// 场景说明
    pub description: String,
    /// 严重级别
    pub severity: ScenarioSeverity,
    /// 预期总时长（秒）
    pub expected_duration_secs: u64,
    /// 有序步骤
    pub steps: Vec<ScenarioStep>,
}

/// 内置场景目录
pub fn builtin_catalog() -> Vec<ScenarioSpec> {
    vec![
        ScenarioSpec {
            id: "provider-cascade-failure".to_string(),
            name: "Provider Cascade Failure".to_string(),
            description: "按优先级从高到低依次注入故障，验证调用方逐级切换到低优先级提供商"
                .to_string(),
            severity: ScenarioSeverity::Critical,
            expected_duration_secs: 300,
            steps: vec![ScenarioStep::InjectEachByPriority {
                params: InjectFailureParams {
                    latency_ms: 2000,
                    error_rate: 100,
                    duration_secs: 120,
                },
            }],
        },
        ScenarioSpec {
            id: "primary-provider-outage".to_string(),
            name: "Primary Provider Outage".to_string(),
            description: "只打掉最高优先级提供商，验证单点故障切换".to_string(),
            severity: ScenarioSeverity::High,
            expected_duration_secs: 300,
            steps: vec![ScenarioStep::InjectHighestPriority {
                params: InjectFailureParams {
                    latency_ms: 1000,
                    error_rate: 80,
                    duration_secs: 300,
                },
            }],
        },
        ScenarioSpec {
            id: "total-blackout".to_string(),
            name: "Total Blackout".to_string(),
            description: "切断全部提供商后整体重置，验证全局熔断与恢复路径".to_string(),
            severity: ScenarioSeverity::Critical,
            expected_duration_secs: 60,
            steps: vec![ScenarioStep::CutAll, ScenarioStep::ResetAll],
        },
    ]
}

/// 正在执行的场景信息
#[derive(Debug, Clone, Serialize)]
pub struct ActiveScenario {
    /// 本次执行 id
    pub run_id: Uuid,
    /// 场景 id
    pub scenario_id: String,
    /// 开始时间
    pub started_at: DateTime<Utc>,
}

/// 场景互斥锁
///
/// 启动前检查、完成或中止时清除；`reset_all_providers` 通过
/// `force_release` 立即解锁。
#[derive(Debug, Default)]
pub struct ScenarioGate {
    active: tokio::sync::Mutex<Option<ActiveScenario>>,
}

impl ScenarioGate {
    /// 创建空闲的互斥锁
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试占用；已有场景在跑时返回冲突
    pub async fn try_begin(&self, scenario_id: &str) -> Result<Uuid> {
        let mut active = self.active.lock().await;
        if let Some(running) = active.as_ref() {
            return Err(ResilienceError::conflict(format!(
                "场景 {} 正在执行中，无法启动 {scenario_id}",
                running.scenario_id
            )));
        }
        let run_id = Uuid::new_v4();
        *active = Some(ActiveScenario {
            run_id,
            scenario_id: scenario_id.to_string(),
            started_at: Utc::now(),
        });
        Ok(run_id)
    }

    /// 当前执行方是否仍然持有锁
    pub async fn is_owner(&self, run_id: Uuid) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| running.run_id == run_id)
    }

    /// 执行方释放锁（仅当仍然持有时生效）
    pub async fn release(&self, run_id: Uuid) {
        let mut active = self.active.lock().await;
        if active
            .as_ref()
            .is_some_and(|running| running.run_id == run_id)
        {
            *active = None;
        }
    }

    /// 无条件释放（重置路径，立即中止在跑场景）
    pub async fn force_release(&self) {
        let mut active = self.active.lock().await;
        if let Some(running) = active.take() {
            warn!(
                scenario_id = %running.scenario_id,
                run_id = %running.run_id,
                "Active scenario aborted by reset"
            );
        }
    }

    /// 当前在跑的场景
    pub async fn active(&self) -> Option<ActiveScenario> {
        self.active.lock().await.clone()
    }
}

/// 一次场景执行的报告
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioRunReport {
    /// 本次执行 id
    pub run_id: Uuid,
    /// 场景 id
    pub scenario_id: String,
    /// 执行结果
    pub outcome: ScenarioOutcome,
    /// 各步骤记录（含子事件引用）
    pub steps: Vec<ScenarioStepRecord>,
    /// 汇总事件 id
    pub event_id: Uuid,
    /// 开始时间
    pub started_at: DateTime<Utc>,
    /// 结束时间
    pub finished_at: DateTime<Utc>,
}

/// 场景执行器
pub struct ScenarioRunner {
    catalog: Vec<ScenarioSpec>,
    injector: Arc<ChaosInjector>,
    registry: Arc<ProviderRegistry>,
    events: Arc<EventLog>,
    gate: Arc<ScenarioGate>,
}

impl ScenarioRunner {
    /// 以内置目录创建执行器
    pub fn new(
        injector: Arc<ChaosInjector>,
        registry: Arc<ProviderRegistry>,
        events: Arc<EventLog>,
        gate: Arc<ScenarioGate>,
    ) -> Self {
        Self {
            catalog: builtin_catalog(),
            injector,
            registry,
            events,
            gate,
        }
    }

    /// 列出全部场景定义
    pub fn list(&self) -> &[ScenarioSpec] {
        &self.catalog
    }

    /// 查找场景
    pub fn find(&self, id: &str) -> Option<&ScenarioSpec> {
        self.catalog.iter().find(|spec| spec.id == id)
    }

    /// 当前在跑的场景
    pub async fn active(&self) -> Option<ActiveScenario> {
        self.gate.active().await
    }

    /// 执行一个场景
    ///
    /// 已有场景在跑时返回冲突，不排队、不打断对方。完成或中止都会
    /// 落一条 `scenario_run` 事件，引用所有步骤的子事件。
    pub async fn run(&self, scenario_id: &str) -> Result<ScenarioRunReport> {
        let spec = self
            .find(scenario_id)
            .ok_or_else(|| {
                ResilienceError::validation("scenario_id", format!("未知的场景: {scenario_id}"))
            })?
            .clone();

        let run_id = self.gate.try_begin(&spec.id).await?;
        let started_at = Utc::now();
        info!(scenario_id = %spec.id, run_id = %run_id, "Scenario started");

        let (steps, outcome) = self.execute_steps(&spec, run_id).await;

        let severity = match spec.severity {
            ScenarioSeverity::Critical => EventSeverity::Critical,
            ScenarioSeverity::High | ScenarioSeverity::Medium => EventSeverity::Warning,
            ScenarioSeverity::Low => EventSeverity::Info,
        };
        let event = ChaosEvent::new(
            severity,
            ChaosPayload::ScenarioRun {
                run_id,
                scenario_id: spec.id.clone(),
                steps: steps.clone(),
                outcome,
            },
        );
        // 无论汇总事件是否落库成功，互斥锁都必须释放
        let append_result = self.events.append(event).await;
        self.gate.release(run_id).await;
        let event_id = append_result?;

        let finished_at = Utc::now();
        info!(
            scenario_id = %spec.id,
            run_id = %run_id,
            outcome = ?outcome,
            steps = steps.len(),
            "Scenario finished"
        );
        Ok(ScenarioRunReport {
            run_id,
            scenario_id: spec.id,
            outcome,
            steps,
            event_id,
            started_at,
            finished_at,
        })
    }

    /// 依次执行场景步骤
    ///
    /// 任何步骤失败都不外抛错误，而是折算进执行结果，保证调用方
    /// 总能拿到一条完整的 `scenario_run` 记录且互斥锁被释放。
    async fn execute_steps(
        &self,
        spec: &ScenarioSpec,
        run_id: Uuid,
    ) -> (Vec<ScenarioStepRecord>, ScenarioOutcome) {
        let mut steps: Vec<ScenarioStepRecord> = Vec::new();
        let mut outcome = ScenarioOutcome::Completed;

        'steps: for step in &spec.steps {
            // 显式重置会立即释放互斥锁，此时中止剩余步骤
            if !self.gate.is_owner(run_id).await {
                outcome = ScenarioOutcome::Aborted;
                break 'steps;
            }

            match step {
                ScenarioStep::InjectEachByPriority { params } => {
                    let providers = match self.providers_by_priority().await {
                        Ok(providers) => providers,
                        Err(e) => {
                            warn!(scenario_id = %spec.id, error = %e, "Scenario step failed");
                            outcome = ScenarioOutcome::Failed;
                            break 'steps;
                        }
                    };
                    for provider in providers {
                        match self.injector.inject_failure(&provider.name, *params).await {
                            Ok((_, event_id)) => steps.push(ScenarioStepRecord {
                                step: "inject_failure".to_string(),
                                provider: Some(provider.name.clone()),
                                event_id: Some(event_id),
                            }),
                            Err(e) => {
                                warn!(scenario_id = %spec.id, provider = %provider.name, error = %e, "Scenario step failed");
                                outcome = ScenarioOutcome::Failed;
                                break 'steps;
                            }
                        }
                    }
                }
                ScenarioStep::InjectHighestPriority { params } => {
                    let provider = match self.providers_by_priority().await {
                        Ok(providers) => providers.into_iter().next(),
                        Err(e) => {
                            warn!(scenario_id = %spec.id, error = %e, "Scenario step failed");
                            outcome = ScenarioOutcome::Failed;
                            break 'steps;
                        }
                    };
                    let Some(provider) = provider else {
                        outcome = ScenarioOutcome::Failed;
                        break 'steps;
                    };
                    match self.injector.inject_failure(&provider.name, *params).await {
                        Ok((_, event_id)) => steps.push(ScenarioStepRecord {
                            step: "inject_failure".to_string(),
                            provider: Some(provider.name),
                            event_id: Some(event_id),
                        }),
                        Err(e) => {
                            warn!(scenario_id = %spec.id, error = %e, "Scenario step failed");
                            outcome = ScenarioOutcome::Failed;
                            break 'steps;
                        }
                    }
                }
                ScenarioStep::CutAll => match self.injector.cut_all_providers().await {
                    Ok((_, event_id)) => steps.push(ScenarioStepRecord {
                        step: "cut_all".to_string(),
                        provider: None,
                        event_id: Some(event_id),
                    }),
                    Err(e) => {
                        warn!(scenario_id = %spec.id, error = %e, "Scenario step failed");
                        outcome = ScenarioOutcome::Failed;
                        break 'steps;
                    }
                },
                ScenarioStep::ResetAll => match self.injector.reset_all_providers().await {
                    Ok((_, event_id)) => steps.push(ScenarioStepRecord {
                        step: "reset_all".to_string(),
                        provider: None,
                        event_id: Some(event_id),
                    }),
                    Err(e) => {
                        warn!(scenario_id = %spec.id, error = %e, "Scenario step failed");
                        outcome = ScenarioOutcome::Failed;
                        break 'steps;
                    }
                },
            }
        }

        (steps, outcome)
    }

    /// 提供商按优先级从高到低排序（同优先级按名称）
    async fn providers_by_priority(&self) -> Result<Vec<ProviderState>> {
        let mut providers = self.registry.list().await?.providers;
        providers.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.name.cmp(&b.name)));
        Ok(providers)
    }
}
