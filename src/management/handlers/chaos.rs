//! # 混沌操作处理器

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chaos::types::InjectFailureParams;
use crate::error::ResilienceError;
use crate::management::response;
use crate::management::server::AppState;

/// 故障注入请求体
#[derive(Debug, Deserialize)]
pub struct InjectRequest {
    /// 合成延迟（毫秒）
    pub latency_ms: u64,
    /// 合成错误率（百分比）
    pub error_rate: u64,
    /// 持续时间（秒）
    pub duration_secs: u64,
}

/// 注入结果响应体
#[derive(Debug, Serialize)]
struct InjectResponse {
    provider: crate::registry::types::ProviderState,
    event_id: uuid::Uuid,
}

/// 对单个提供商注入故障
pub async fn inject_failure(
    State(state): State<AppState>,
    Path(name): Path<String>,
    axum::Json(request): axum::Json<InjectRequest>,
) -> impl IntoResponse {
    let error_rate = match u8::try_from(request.error_rate) {
        Ok(rate) => rate,
        Err(_) => {
            return response::app_error(ResilienceError::validation(
                "error_rate",
                format!("必须在 0..=100 范围内: {}", request.error_rate),
            ));
        }
    };
    let params = InjectFailureParams {
        latency_ms: request.latency_ms,
        error_rate,
        duration_secs: request.duration_secs,
    };

    match state.injector.inject_failure(&name, params).await {
        Ok((provider, event_id)) => response::success_with_message(
            InjectResponse { provider, event_id },
            "故障注入成功",
        ),
        Err(e) => response::app_error(e),
    }
}

/// 切断全部提供商
pub async fn cut_all_providers(State(state): State<AppState>) -> impl IntoResponse {
    match state.injector.cut_all_providers().await {
        Ok((affected, event_id)) => response::success_with_message(
            json!({ "affected": affected, "event_id": event_id }),
            "全部提供商已切断",
        ),
        Err(e) => response::app_error(e),
    }
}

/// 重置全部提供商
pub async fn reset_all_providers(State(state): State<AppState>) -> impl IntoResponse {
    match state.injector.reset_all_providers().await {
        Ok((affected, event_id)) => response::success_with_message(
            json!({ "affected": affected, "event_id": event_id }),
            "全部提供商已重置",
        ),
        Err(e) => response::app_error(e),
    }
}
