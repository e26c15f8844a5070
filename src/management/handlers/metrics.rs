//! # 韧性指标处理器

use axum::extract::State;
use axum::response::IntoResponse;

use crate::management::response;
use crate::management::server::AppState;

/// 获取韧性指标快照
pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.snapshot().await {
        Ok(snapshot) => response::success(snapshot),
        Err(e) => response::app_error(e),
    }
}
