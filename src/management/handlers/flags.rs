//! # 功能开关处理器

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::management::response;
use crate::management::server::AppState;

/// 列出全部功能开关
pub async fn list_flags(State(state): State<AppState>) -> impl IntoResponse {
    response::success(state.flags.list().await)
}

/// 读取单个功能开关
pub async fn get_flag(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match state.flags.get(&key).await {
        Ok(flag) => response::success(flag),
        Err(e) => response::app_error(e),
    }
}

/// 开关写入请求体
#[derive(Debug, Deserialize)]
pub struct SetFlagRequest {
    /// 开关取值
    pub value: String,
    /// 是否生效，缺省为 true
    pub is_active: Option<bool>,
}

/// 写入功能开关
pub async fn set_flag(
    State(state): State<AppState>,
    Path(key): Path<String>,
    axum::Json(request): axum::Json<SetFlagRequest>,
) -> impl IntoResponse {
    let flag = state
        .flags
        .set(&key, &request.value, request.is_active.unwrap_or(true))
        .await;
    response::success_with_message(flag, "开关已更新")
}
