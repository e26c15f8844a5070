//! # 路由配置
//!
//! 定义所有API路由和路由组织

use axum::Router;
use axum::routing::{get, post};

use crate::management::server::AppState;

/// 创建所有路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 服务自身健康检查
        .route("/health", get(crate::management::server::health_check))
        // 提供商状态与混沌操作
        .nest("/providers", provider_routes())
        // 韧性指标
        .nest("/metrics", metrics_routes())
        // 场景管理
        .nest("/scenarios", scenario_routes())
        // 事件审计
        .nest("/events", event_routes())
        // 功能开关
        .nest("/feature-flags", flag_routes())
        .with_state(state)
}

/// 提供商路由
fn provider_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(crate::management::handlers::providers::list_providers),
        )
        .route(
            "/cut-all",
            post(crate::management::handlers::chaos::cut_all_providers),
        )
        .route(
            "/reset-all",
            post(crate::management::handlers::chaos::reset_all_providers),
        )
        .route(
            "/{name}",
            get(crate::management::handlers::providers::get_provider),
        )
        .route(
            "/{name}/inject",
            post(crate::management::handlers::chaos::inject_failure),
        )
        .route(
            "/{name}/check",
            post(crate::management::handlers::providers::check_provider),
        )
        .route(
            "/{name}/checks",
            get(crate::management::handlers::providers::list_provider_checks),
        )
}

/// 指标路由
fn metrics_routes() -> Router<AppState> {
    Router::new().route("/", get(crate::management::handlers::metrics::get_metrics))
}

/// 场景路由
fn scenario_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(crate::management::handlers::scenarios::list_scenarios),
        )
        .route(
            "/{id}/run",
            post(crate::management::handlers::scenarios::run_scenario),
        )
}

/// 事件路由
fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(crate::management::handlers::events::list_events))
        .route(
            "/stream",
            get(crate::management::handlers::events::stream_changes),
        )
}

/// 功能开关路由
fn flag_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(crate::management::handlers::flags::list_flags))
        .route(
            "/{key}",
            get(crate::management::handlers::flags::get_flag)
                .post(crate::management::handlers::flags::set_flag),
        )
}
