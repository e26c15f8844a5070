//! # 配置管理器
//!
//! 负责从 TOML 文件或环境变量解析应用配置

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::AppConfig;
use crate::error::{ResilienceError, Result};

/// 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "RESILIENCE_CONFIG";

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: AppConfig,
    path: Option<PathBuf>,
}

impl ConfigManager {
    /// 按以下顺序加载配置：显式路径 > 环境变量 > 内置默认值
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let Some(path) = path else {
            warn!("No config file specified, using built-in defaults");
            return Ok(Self {
                config: AppConfig::default(),
                path: None,
            });
        };

        let raw = std::fs::read_to_string(&path).map_err(|e| {
            ResilienceError::config_with_source(
                format!("无法读取配置文件: {}", path.display()),
                e,
            )
        })?;
        let config: AppConfig = toml::from_str(&raw)?;
        config.validate()?;

        info!(path = %path.display(), providers = config.providers.len(), "Configuration loaded");
        Ok(Self {
            config,
            path: Some(path),
        })
    }

    /// 获取解析后的配置
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 配置文件来源路径（默认配置时为 None）
    pub fn source_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_defaults_without_path() {
        let manager = ConfigManager::load(None).unwrap();
        assert!(manager.source_path().is_none());
        assert!(manager.config().providers.is_empty());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[breaker]
error_rate_threshold = 0.4

[[providers]]
name = "alpha"
priority = 3
probe_url = "http://alpha.internal/health"

[[providers]]
name = "beta"
priority = 1
"#
        )
        .unwrap();

        let manager = ConfigManager::load(Some(file.path())).unwrap();
        let config = manager.config();
        assert_eq!(config.server.port, 9090);
        assert!((config.breaker.error_rate_threshold - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].probe_url.as_deref(), Some("http://alpha.internal/health"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "providers = 42").unwrap();
        let err = ConfigManager::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ResilienceError::Config { .. }));
    }
}
