//! # 功能开关模块
//!
//! 与提供商状态正交的开关集合，健康监控与熔断器据此判断
//! 自动保护是否生效。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::config::FlagsConfig;
use crate::error::{ResilienceError, Result};

/// 混沌注入总开关键名
pub const FLAG_CHAOS_MODE: &str = "chaos_mode_enabled";
/// 自动熔断保护开关键名
pub const FLAG_CIRCUIT_BREAKER: &str = "circuit_breaker_enabled";

/// 功能开关
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlag {
    /// 开关键名
    pub key: String,
    /// 开关取值（布尔字符串）
    pub value: String,
    /// 所属环境
    pub environment: String,
    /// 是否生效；未生效的开关按默认值处理
    pub is_active: bool,
    /// 最近修改时间
    pub updated_at: DateTime<Utc>,
}

/// 功能开关存储
pub struct FeatureFlagStore {
    flags: RwLock<HashMap<String, FeatureFlag>>,
    environment: String,
}

impl FeatureFlagStore {
    /// 从配置播种开关集合
    pub fn from_config(config: &FlagsConfig) -> Self {
        let mut flags = HashMap::new();
        let now = Utc::now();
        for (key, value) in [
            (FLAG_CHAOS_MODE, config.chaos_mode_enabled),
            (FLAG_CIRCUIT_BREAKER, config.circuit_breaker_enabled),
        ] {
            flags.insert(
                key.to_string(),
                FeatureFlag {
                    key: key.to_string(),
                    value: value.to_string(),
                    environment: config.environment.clone(),
                    is_active: true,
                    updated_at: now,
                },
            );
        }
        Self {
            flags: RwLock::new(flags),
            environment: config.environment.clone(),
        }
    }

    /// 判断布尔开关是否打开
    ///
    /// 未知键或未生效的开关回落到 `default`。
    pub async fn is_enabled(&self, key: &str, default: bool) -> bool {
        let flags = self.flags.read().await;
        flags
            .get(key)
            .filter(|flag| flag.is_active)
            .map_or(default, |flag| flag.value == "true")
    }

    /// 读取单个开关
    pub async fn get(&self, key: &str) -> Result<FeatureFlag> {
        let flags = self.flags.read().await;
        flags.get(key).cloned().ok_or_else(|| {
            ResilienceError::validation("key", format!("未知的功能开关: {key}"))
        })
    }

    /// 写入（插入或覆盖）一个开关
    pub async fn set(&self, key: &str, value: &str, is_active: bool) -> FeatureFlag {
        let mut flags = self.flags.write().await;
        let flag = FeatureFlag {
            key: key.to_string(),
            value: value.to_string(),
            environment: self.environment.clone(),
            is_active,
            updated_at: Utc::now(),
        };
        flags.insert(key.to_string(), flag.clone());
        info!(key, value, is_active, "Feature flag updated");
        flag
    }

    /// 列出全部开关，按键名排序
    pub async fn list(&self) -> Vec<FeatureFlag> {
        let flags = self.flags.read().await;
        let mut all: Vec<_> = flags.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FeatureFlagStore {
        FeatureFlagStore::from_config(&FlagsConfig::default())
    }

    #[tokio::test]
    async fn test_seeded_flags() {
        let store = store();
        assert!(store.is_enabled(FLAG_CHAOS_MODE, false).await);
        assert!(store.is_enabled(FLAG_CIRCUIT_BREAKER, false).await);
        assert_eq!(store.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_flag_falls_back_to_default() {
        let store = store();
        assert!(store.is_enabled("unknown_flag", true).await);
        assert!(!store.is_enabled("unknown_flag", false).await);
        assert!(store.get("unknown_flag").await.is_err());
    }

    #[tokio::test]
    async fn test_set_overrides_value() {
        let store = store();
        store.set(FLAG_CIRCUIT_BREAKER, "false", true).await;
        assert!(!store.is_enabled(FLAG_CIRCUIT_BREAKER, true).await);
    }

    #[tokio::test]
    async fn test_inactive_flag_uses_default() {
        let store = store();
        store.set(FLAG_CHAOS_MODE, "false", false).await;
        // 未生效的开关按默认值处理
        assert!(store.is_enabled(FLAG_CHAOS_MODE, true).await);
    }
}
