//! # 提供商注册表
//!
//! 所有提供商状态的权威入口：写路径统一经过 `commit`，
//! 由它保证不变量校验、有限重试、快照刷新与变更广播。

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

use crate::chaos::types::ChaosEvent;
use crate::config::ProviderConfig;
use crate::error::{ResilienceError, Result};
use crate::notify::{ChangeEvent, ChangeNotifier};
use crate::registry::store::{ResilienceStore, write_with_retry};
use crate::registry::types::ProviderState;

/// 提供商列表读取结果
///
/// `stale == true` 表示存储不可用，返回的是最近一次已知快照。
#[derive(Debug, Clone)]
pub struct ProviderListing {
    pub providers: Vec<ProviderState>,
    pub stale: bool,
}

/// 提供商注册表服务
pub struct ProviderRegistry {
    store: Arc<dyn ResilienceStore>,
    notifier: ChangeNotifier,
    /// 每个提供商一把互斥锁，序列化并发写
    locks: DashMap<String, Arc<Mutex<()>>>,
    /// 最近一次已知状态快照，存储故障时的降级读来源
    snapshot: RwLock<HashMap<String, ProviderState>>,
}

impl ProviderRegistry {
    /// 创建注册表
    pub fn new(store: Arc<dyn ResilienceStore>, notifier: ChangeNotifier) -> Self {
        Self {
            store,
            notifier,
            locks: DashMap::new(),
            snapshot: RwLock::new(HashMap::new()),
        }
    }

    /// 按配置播种提供商行
    ///
    /// 提供商集合是静态的：配置里有而存储里没有的行在这里创建，
    /// 运行期间不会动态增删。
    pub async fn seed(&self, providers: &[ProviderConfig]) -> Result<()> {
        for config in providers {
            if self.store.get_provider(&config.name).await?.is_none() {
                let state = ProviderState::new(&config.name, config.priority);
                self.store.upsert_provider(&state).await?;
                debug!(provider = %config.name, priority = config.priority, "Seeded provider state");
            }
        }
        self.refresh_snapshot().await?;
        Ok(())
    }

    /// 获取某提供商的写锁
    ///
    /// 同一提供商的两个并发写方（健康检查完成与操作员注入同时发生）
    /// 绝不能交错出不一致状态。
    pub async fn guard(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(name.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// 读取单个提供商的权威状态（写路径基础，不做降级）
    pub async fn load(&self, name: &str) -> Result<ProviderState> {
        self.store
            .get_provider(name)
            .await?
            .ok_or_else(|| ResilienceError::provider_not_found(name))
    }

    /// 读取单个提供商状态，存储故障时降级到快照
    pub async fn get(&self, name: &str) -> Result<ProviderState> {
        match self.store.get_provider(name).await {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Err(ResilienceError::provider_not_found(name)),
            Err(error) => {
                warn!(provider = name, error = %error, "Store read failed, falling back to stale snapshot");
                self.snapshot
                    .read()
                    .await
                    .get(name)
                    .cloned()
                    .ok_or(error)
            }
        }
    }

    /// 读取全部提供商状态；存储故障时返回最近快照并标记 stale
    pub async fn list(&self) -> Result<ProviderListing> {
        match self.store.load_providers().await {
            Ok(providers) => {
                let mut snapshot = self.snapshot.write().await;
                snapshot.clear();
                for state in &providers {
                    snapshot.insert(state.name.clone(), state.clone());
                }
                Ok(ProviderListing {
                    providers,
                    stale: false,
                })
            }
            Err(error) => {
                let snapshot = self.snapshot.read().await;
                if snapshot.is_empty() {
                    return Err(error);
                }
                warn!(error = %error, "Store read failed, serving stale provider snapshot");
                let mut providers: Vec<_> = snapshot.values().cloned().collect();
                providers.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(ProviderListing {
                    providers,
                    stale: true,
                })
            }
        }
    }

    /// 提交一次提供商状态写入（可附带一条事件，两者原子落库）
    ///
    /// 写入前校验熔断不变量：宁可报错也不落一笔不一致状态。
    pub async fn commit(
        &self,
        state: ProviderState,
        event: Option<ChaosEvent>,
    ) -> Result<ProviderState> {
        if !state.breaker_invariant_holds() {
            return Err(ResilienceError::internal(format!(
                "拒绝写入违反熔断不变量的状态: {}",
                state.name
            )));
        }

        write_with_retry(|| {
            let state = &state;
            let event = event.as_ref();
            async move { self.store.apply(state, event).await }
        })
        .await?;

        self.snapshot
            .write()
            .await
            .insert(state.name.clone(), state.clone());

        self.notifier.publish(ChangeEvent::ProviderChanged {
            name: state.name.clone(),
            state: state.clone(),
        });
        if let Some(event) = event {
            self.notifier.publish(ChangeEvent::EventAppended { event });
        }
        Ok(state)
    }

    /// 刷新内存快照
    async fn refresh_snapshot(&self) -> Result<()> {
        let providers = self.store.load_providers().await?;
        let mut snapshot = self.snapshot.write().await;
        snapshot.clear();
        for state in providers {
            snapshot.insert(state.name.clone(), state);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::store::MemoryStore;
    use crate::registry::types::ProviderStatus;

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(Arc::new(MemoryStore::default()), ChangeNotifier::default())
    }

    fn provider_configs(names: &[(&str, i32)]) -> Vec<ProviderConfig> {
        names
            .iter()
            .map(|(name, priority)| ProviderConfig {
                name: (*name).to_string(),
                priority: *priority,
                probe_url: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_seed_creates_configured_providers() {
        let registry = registry();
        registry
            .seed(&provider_configs(&[("alpha", 3), ("beta", 2)]))
            .await
            .unwrap();

        let listing = registry.list().await.unwrap();
        assert_eq!(listing.providers.len(), 2);
        assert!(!listing.stale);
        assert_eq!(registry.load("alpha").await.unwrap().priority, 3);
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let registry = registry();
        let configs = provider_configs(&[("alpha", 1)]);
        registry.seed(&configs).await.unwrap();

        // 第一次播种后对状态做修改
        let mut state = registry.load("alpha").await.unwrap();
        state.success_count = 5;
        state.recompute_health_score();
        registry.commit(state, None).await.unwrap();

        // 再次播种不得覆盖已有状态
        registry.seed(&configs).await.unwrap();
        assert_eq!(registry.load("alpha").await.unwrap().success_count, 5);
    }

    #[tokio::test]
    async fn test_load_unknown_provider() {
        let registry = registry();
        let err = registry.load("ghost").await.unwrap_err();
        assert!(matches!(err, ResilienceError::ProviderNotFound { .. }));
    }

    #[tokio::test]
    async fn test_commit_rejects_invariant_violation() {
        let registry = registry();
        registry
            .seed(&provider_configs(&[("alpha", 1)]))
            .await
            .unwrap();

        let mut state = registry.load("alpha").await.unwrap();
        state.circuit_breaker_open = true; // 打开但仍 enabled=true
        let err = registry.commit(state, None).await.unwrap_err();
        assert!(matches!(err, ResilienceError::Internal { .. }));

        // 原状态未被破坏
        let stored = registry.load("alpha").await.unwrap();
        assert!(!stored.circuit_breaker_open);
    }

    #[tokio::test]
    async fn test_commit_publishes_change() {
        let registry = registry();
        registry
            .seed(&provider_configs(&[("alpha", 1)]))
            .await
            .unwrap();
        let mut rx = registry.notifier.subscribe();

        let mut state = registry.load("alpha").await.unwrap();
        state.status = ProviderStatus::Degraded;
        state.enabled = false;
        registry.commit(state, None).await.unwrap();

        match rx.recv().await.unwrap() {
            ChangeEvent::ProviderChanged { name, state } => {
                assert_eq!(name, "alpha");
                assert_eq!(state.status, ProviderStatus::Degraded);
            }
            ChangeEvent::EventAppended { .. } => panic!("unexpected event kind"),
        }
    }
}
