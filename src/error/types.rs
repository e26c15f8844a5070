//! # 错误类型定义

use axum::http::StatusCode;
use thiserror::Error;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 参数校验错误
    #[error("参数校验失败: {field}: {message}")]
    Validation { field: String, message: String },

    /// 提供商未找到
    #[error("提供商未找到: {name}")]
    ProviderNotFound { name: String },

    /// 资源冲突错误
    #[error("资源冲突: {message}")]
    Conflict { message: String },

    /// 熔断器打开信号
    ///
    /// 不是引擎故障，而是调用方访问已熔断提供商时得到的预期信号，
    /// 必须与真实的提供商错误区分开。
    #[error("熔断器已打开: {provider}")]
    CircuitOpen { provider: String },

    /// 混沌注入未启用
    #[error("混沌模式未启用: {message}")]
    ChaosDisabled { message: String },

    /// 持久化存储错误
    #[error("存储错误: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("IO错误: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 序列化/反序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// 服务器初始化错误
    #[error("服务器初始化错误: {message}")]
    ServerInit {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 服务器启动错误
    #[error("服务器启动错误: {message}")]
    ServerStart {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 上下文包装错误
    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<ResilienceError>,
    },
}

impl ResilienceError {
    /// 将错误转换为HTTP状态码和错误代码
    pub fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Config { .. } => (StatusCode::BAD_REQUEST, "CONFIG_ERROR"),
            Self::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::ProviderNotFound { .. } => (StatusCode::NOT_FOUND, "PROVIDER_NOT_FOUND"),
            Self::Conflict { .. } => (StatusCode::CONFLICT, "RESOURCE_CONFLICT"),
            Self::CircuitOpen { .. } => (StatusCode::CONFLICT, "CIRCUIT_OPEN"),
            Self::ChaosDisabled { .. } => (StatusCode::FORBIDDEN, "CHAOS_DISABLED"),
            Self::Persistence { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Self::Serialization { .. } => (StatusCode::BAD_REQUEST, "SERIALIZATION_ERROR"),
            Self::ServerInit { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_INIT_ERROR"),
            Self::ServerStart { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_START_ERROR"),
            Self::Context { source, .. } => source.to_http_response_parts(),
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建参数校验错误，`field` 指向非法字段
    pub fn validation<F: Into<String>, T: Into<String>>(field: F, message: T) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 创建提供商未找到错误
    pub fn provider_not_found<T: Into<String>>(name: T) -> Self {
        Self::ProviderNotFound { name: name.into() }
    }

    /// 创建资源冲突错误
    pub fn conflict<T: Into<String>>(message: T) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// 创建熔断器打开信号
    pub fn circuit_open<T: Into<String>>(provider: T) -> Self {
        Self::CircuitOpen {
            provider: provider.into(),
        }
    }

    /// 创建混沌模式未启用错误
    pub fn chaos_disabled<T: Into<String>>(message: T) -> Self {
        Self::ChaosDisabled {
            message: message.into(),
        }
    }

    /// 创建存储错误
    pub fn persistence<T: Into<String>>(message: T) -> Self {
        Self::Persistence {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的存储错误
    pub fn persistence_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Persistence {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建服务器初始化错误
    pub fn server_init<T: Into<String>>(message: T) -> Self {
        Self::ServerInit {
            message: message.into(),
            source: None,
        }
    }

    /// 创建服务器启动错误
    pub fn server_start<T: Into<String>>(message: T) -> Self {
        Self::ServerStart {
            message: message.into(),
            source: None,
        }
    }

    /// 判断错误是否为可重试的瞬时存储故障
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

impl From<std::io::Error> for ResilienceError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            message: source.to_string(),
            source,
        }
    }
}

impl From<serde_json::Error> for ResilienceError {
    fn from(source: serde_json::Error) -> Self {
        Self::Serialization {
            message: source.to_string(),
            source: source.into(),
        }
    }
}

impl From<toml::de::Error> for ResilienceError {
    fn from(source: toml::de::Error) -> Self {
        Self::Config {
            message: source.to_string(),
            source: Some(source.into()),
        }
    }
}
