//! # 持久化协作方抽象
//!
//! 存储技术不在本引擎职责范围内：这里只定义引擎需要的读写契约，
//! 并提供一个内存实现作为默认后端与测试替身。

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::chaos::types::ChaosEvent;
use crate::config::RetentionConfig;
use crate::error::{ResilienceError, Result};
use crate::health::types::HealthCheckRecord;
use crate::registry::types::ProviderState;

/// 写边界上的瞬时存储故障重试次数上限
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

/// 持久化存储契约
///
/// `apply` 必须把状态写入与事件追加作为一个原子动作完成：
/// 状态更新了但事件没记（或反之）属于正确性缺陷。
#[async_trait]
pub trait ResilienceStore: Send + Sync {
    /// 读取全部提供商状态
    async fn load_providers(&self) -> Result<Vec<ProviderState>>;

    /// 按名称读取单个提供商状态
    async fn get_provider(&self, name: &str) -> Result<Option<ProviderState>>;

    /// 写入（插入或覆盖）单个提供商状态
    async fn upsert_provider(&self, state: &ProviderState) -> Result<()>;

    /// 原子地写入提供商状态并追加一条事件（事件可选）
    async fn apply(&self, state: &ProviderState, event: Option<&ChaosEvent>) -> Result<()>;

    /// 追加一条健康检查记录
    async fn insert_check(&self, record: &HealthCheckRecord) -> Result<()>;

    /// 读取最近的健康检查记录，新者在前
    async fn recent_checks(&self, limit: usize) -> Result<Vec<HealthCheckRecord>>;

    /// 读取某个提供商最近的健康检查记录，新者在前
    async fn recent_checks_for(
        &self,
        provider: &str,
        limit: usize,
    ) -> Result<Vec<HealthCheckRecord>>;

    /// 追加一条事件日志
    async fn append_event(&self, event: &ChaosEvent) -> Result<()>;

    /// 读取最近的事件日志，新者在前
    async fn recent_events(&self, limit: usize) -> Result<Vec<ChaosEvent>>;
}

/// 内存存储内部数据
#[derive(Debug, Default)]
struct MemoryInner {
    providers: HashMap<String, ProviderState>,
    checks: VecDeque<HealthCheckRecord>,
    events: VecDeque<ChaosEvent>,
}

/// 内存存储实现
///
/// 单把写锁覆盖全部数据，`apply` 的原子性由此天然成立。
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
    retention: RetentionConfig,
}

impl MemoryStore {
    /// 按保留配置创建内存存储
    pub fn new(retention: RetentionConfig) -> Self {
        Self {
            inner: RwLock::new(MemoryInner::default()),
            retention,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(RetentionConfig::default())
    }
}

fn trim_front<T>(queue: &mut VecDeque<T>, cap: usize) {
    while queue.len() > cap {
        queue.pop_front();
    }
}

#[async_trait]
impl ResilienceStore for MemoryStore {
    async fn load_providers(&self) -> Result<Vec<ProviderState>> {
        let inner = self.inner.read().await;
        let mut providers: Vec<_> = inner.providers.values().cloned().collect();
        providers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(providers)
    }

    async fn get_provider(&self, name: &str) -> Result<Option<ProviderState>> {
        let inner = self.inner.read().await;
        Ok(inner.providers.get(name).cloned())
    }

    async fn upsert_provider(&self, state: &ProviderState) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .providers
            .insert(state.name.clone(), state.clone());
        Ok(())
    }

    async fn apply(&self, state: &ProviderState, event: Option<&ChaosEvent>) -> Result<()> {
        // 同一把写锁内完成两个写入，保证不会部分生效
        let mut inner = self.inner.write().await;
        inner
            .providers
            .insert(state.name.clone(), state.clone());
        if let Some(event) = event {
            inner.events.push_back(event.clone());
            trim_front(&mut inner.events, self.retention.max_events);
        }
        Ok(())
    }

    async fn insert_check(&self, record: &HealthCheckRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.checks.push_back(record.clone());
        trim_front(&mut inner.checks, self.retention.max_check_records);
        Ok(())
    }

    async fn recent_checks(&self, limit: usize) -> Result<Vec<HealthCheckRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.checks.iter().rev().take(limit).cloned().collect())
    }

    async fn recent_checks_for(
        &self,
        provider: &str,
        limit: usize,
    ) -> Result<Vec<HealthCheckRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .checks
            .iter()
            .rev()
            .filter(|record| record.provider_name == provider)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn append_event(&self, event: &ChaosEvent) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.events.push_back(event.clone());
        trim_front(&mut inner.events, self.retention.max_events);
        Ok(())
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<ChaosEvent>> {
        let inner = self.inner.read().await;
        Ok(inner.events.iter().rev().take(limit).cloned().collect())
    }
}

/// 在写边界上对瞬时存储故障做有限次重试
///
/// 非瞬时错误立即上抛；重试耗尽后如实上抛，绝不伪造成功。
pub async fn write_with_retry<F, Fut>(mut operation: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let mut last_error: Option<ResilienceError> = None;
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        match operation().await {
            Ok(()) => return Ok(()),
            Err(error) if error.is_transient() && attempt < MAX_WRITE_ATTEMPTS => {
                tracing::warn!(attempt, error = %error, "Transient store failure, retrying write");
                last_error = Some(error);
                tokio::time::sleep(std::time::Duration::from_millis(u64::from(attempt) * 50))
                    .await;
            }
            Err(error) => return Err(error),
        }
    }
    Err(last_error
        .unwrap_or_else(|| ResilienceError::persistence("write retries exhausted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chaos::types::{ChaosPayload, EventSeverity};

    fn small_retention() -> RetentionConfig {
        RetentionConfig {
            max_check_records: 3,
            max_events: 2,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_load_providers() {
        let store = MemoryStore::default();
        store
            .upsert_provider(&ProviderState::new("beta", 1))
            .await
            .unwrap();
        store
            .upsert_provider(&ProviderState::new("alpha", 2))
            .await
            .unwrap();

        let providers = store.load_providers().await.unwrap();
        assert_eq!(providers.len(), 2);
        // 名称排序保证读取顺序稳定
        assert_eq!(providers[0].name, "alpha");
        assert_eq!(providers[1].name, "beta");
    }

    #[tokio::test]
    async fn test_check_retention_window() {
        let store = MemoryStore::new(small_retention());
        for i in 0..5u64 {
            store
                .insert_check(&HealthCheckRecord::success("alpha", i))
                .await
                .unwrap();
        }

        let checks = store.recent_checks(10).await.unwrap();
        assert_eq!(checks.len(), 3);
        // 新者在前，最旧的两条已被裁剪
        assert_eq!(checks[0].response_time_ms, 4);
        assert_eq!(checks[2].response_time_ms, 2);
    }

    #[tokio::test]
    async fn test_apply_writes_state_and_event_together() {
        let store = MemoryStore::default();
        let state = ProviderState::new("alpha", 1);
        let event = ChaosEvent::new(
            EventSeverity::Warning,
            ChaosPayload::ProviderFailure {
                target: "alpha".to_string(),
                latency_ms: 100,
                error_rate: 50,
                duration_secs: 60,
            },
        );

        store.apply(&state, Some(&event)).await.unwrap();

        assert!(store.get_provider("alpha").await.unwrap().is_some());
        let events = store.recent_events(10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, event.id);
    }

    #[tokio::test]
    async fn test_event_retention_window() {
        let store = MemoryStore::new(small_retention());
        for i in 0..4u64 {
            store
                .append_event(&ChaosEvent::new(
                    EventSeverity::Info,
                    ChaosPayload::ProviderFailure {
                        target: format!("p{i}"),
                        latency_ms: 0,
                        error_rate: 0,
                        duration_secs: 10,
                    },
                ))
                .await
                .unwrap();
        }
        let events = store.recent_events(10).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_write_with_retry_surfaces_persistent_failure() {
        let result = write_with_retry(|| async {
            Err::<(), _>(ResilienceError::persistence("store down"))
        })
        .await;
        assert!(matches!(
            result,
            Err(ResilienceError::Persistence { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_with_retry_recovers_after_transient_failure() {
        let attempts = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = attempts.clone();
        write_with_retry(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                    Err(ResilienceError::persistence("flaky"))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
