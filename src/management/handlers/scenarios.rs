//! # 测试场景处理器

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Serialize;

use crate::chaos::scenario::{ActiveScenario, ScenarioSpec};
use crate::management::response;
use crate::management::server::AppState;

/// 场景列表响应体
#[derive(Debug, Serialize)]
struct ScenarioListResponse {
    scenarios: Vec<ScenarioSpec>,
    /// 当前在跑的场景（如有）
    active: Option<ActiveScenario>,
}

/// 列出全部场景
pub async fn list_scenarios(State(state): State<AppState>) -> impl IntoResponse {
    let body = ScenarioListResponse {
        scenarios: state.scenarios.list().to_vec(),
        active: state.scenarios.active().await,
    };
    response::success(body)
}

/// 执行指定场景
///
/// 已有场景在跑时返回 409 冲突，调用方可稍后重试。
pub async fn run_scenario(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.scenarios.run(&id).await {
        Ok(report) => response::success_with_message(report, "场景执行完成"),
        Err(e) => response::app_error(e),
    }
}
