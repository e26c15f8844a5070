//! 简单的应用上下文（DI 容器）
//!
//! 统一持有跨模块共享的服务实例，便于在测试中注入替身实现。

use std::sync::Arc;

use crate::chaos::injector::ChaosInjector;
use crate::chaos::scenario::{ScenarioGate, ScenarioRunner};
use crate::chaos::types::ActiveFaults;
use crate::config::AppConfig;
use crate::error::Result;
use crate::events::EventLog;
use crate::flags::FeatureFlagStore;
use crate::health::HealthMonitor;
use crate::metrics::MetricsAggregator;
use crate::notify::ChangeNotifier;
use crate::registry::store::{MemoryStore, ResilienceStore};
use crate::registry::ProviderRegistry;

/// 应用上下文
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ResilienceStore>,
    pub registry: Arc<ProviderRegistry>,
    pub flags: Arc<FeatureFlagStore>,
    pub faults: Arc<ActiveFaults>,
    pub events: Arc<EventLog>,
    pub notifier: ChangeNotifier,
    pub monitor: Arc<HealthMonitor>,
    pub injector: Arc<ChaosInjector>,
    pub scenarios: Arc<ScenarioRunner>,
    pub metrics: Arc<MetricsAggregator>,
}

impl AppContext {
    /// 以内存存储引导整个引擎
    pub async fn bootstrap(config: AppConfig) -> Result<Arc<Self>> {
        let store = Arc::new(MemoryStore::new(config.retention.clone()));
        Self::bootstrap_with_store(config, store).await
    }

    /// 以外部提供的存储引导（测试或接入真实持久化时使用）
    pub async fn bootstrap_with_store(
        config: AppConfig,
        store: Arc<dyn ResilienceStore>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let notifier = ChangeNotifier::default();
        let registry = Arc::new(ProviderRegistry::new(store.clone(), notifier.clone()));
        registry.seed(&config.providers).await?;

        let flags = Arc::new(FeatureFlagStore::from_config(&config.flags));
        let faults = Arc::new(ActiveFaults::new());
        let events = Arc::new(EventLog::new(store.clone(), notifier.clone()));
        let gate = Arc::new(ScenarioGate::new());

        let monitor = Arc::new(HealthMonitor::new(
            registry.clone(),
            store.clone(),
            faults.clone(),
            flags.clone(),
            config.health.clone(),
            config.breaker.clone(),
            &config.providers,
        ));
        let injector = Arc::new(ChaosInjector::new(
            registry.clone(),
            events.clone(),
            faults.clone(),
            flags.clone(),
            gate.clone(),
        ));
        let scenarios = Arc::new(ScenarioRunner::new(
            injector.clone(),
            registry.clone(),
            events.clone(),
            gate,
        ));
        let metrics = Arc::new(MetricsAggregator::new(store.clone(), config.metrics.clone()));

        Ok(Arc::new(Self {
            config: Arc::new(config),
            store,
            registry,
            flags,
            faults,
            events,
            notifier,
            monitor,
            injector,
            scenarios,
            metrics,
        }))
    }
}
