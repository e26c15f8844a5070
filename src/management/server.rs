//! # 管理服务器
//!
//! Axum HTTP服务器，提供引擎的操作与监控API

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;

use axum::Router;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::context::AppContext;
use crate::error::{ResilienceError, Result};
use crate::management::{response, routes};

/// 管理服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementConfig {
    /// 监听地址
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 是否启用CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
    /// API前缀
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_enable_cors() -> bool {
    true
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            enable_cors: default_enable_cors(),
            api_prefix: default_api_prefix(),
        }
    }
}

/// 管理服务器应用状态
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    #[must_use]
    pub const fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }
}

impl Deref for AppState {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// 构建完整的管理端路由
pub fn build_router(state: AppState) -> Router {
    let config = &state.context.config.server;
    let api = routes::create_routes(state.clone());

    let mut router = Router::new().nest(&config.api_prefix, api);

    if config.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// 启动管理服务器并阻塞运行
pub async fn serve(context: Arc<AppContext>) -> Result<()> {
    let config = context.config.server.clone();
    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .map_err(|e| {
            ResilienceError::server_init(format!(
                "非法的监听地址 {}:{} ({e})",
                config.bind_address, config.port
            ))
        })?;

    let router = build_router(AppState::new(context));
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        ResilienceError::ServerStart {
            message: format!("无法绑定监听地址 {addr}"),
            source: Some(e.into()),
        }
    })?;

    info!(%addr, prefix = %config.api_prefix, "Management server listening");
    axum::serve(listener, router)
        .await
        .map_err(|e| ResilienceError::ServerStart {
            message: "管理服务器退出".to_string(),
            source: Some(e.into()),
        })
}

/// 服务自身健康检查端点
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    let providers = state.registry.list().await;
    match providers {
        Ok(listing) => response::success(json!({
            "status": "healthy",
            "providers": listing.providers.len(),
            "stale": listing.stale,
            "subscribers": state.notifier.subscriber_count(),
        })),
        Err(e) => response::app_error(e),
    }
}
