//! # 提供商状态处理器

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Serialize;

use crate::management::response;
use crate::management::server::AppState;
use crate::registry::store::ResilienceStore;
use crate::registry::types::ProviderState;

/// 提供商列表响应体
#[derive(Debug, Serialize)]
struct ProviderListResponse {
    providers: Vec<ProviderState>,
    /// 存储不可用、数据来自最近一次已知快照时为 true
    stale: bool,
}

/// 获取全部提供商状态
pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    match state.registry.list().await {
        Ok(listing) => {
            let body = ProviderListResponse {
                providers: listing.providers,
                stale: listing.stale,
            };
            if body.stale {
                response::success_with_message(body, "存储不可用，返回过期快照")
            } else {
                response::success(body)
            }
        }
        Err(e) => response::app_error(e),
    }
}

/// 获取单个提供商状态
pub async fn get_provider(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&name).await {
        Ok(provider) => response::success(provider),
        Err(e) => response::app_error(e),
    }
}

/// 按需触发一次健康检查
///
/// 熔断打开时返回 `CIRCUIT_OPEN` 信号，与真实的提供商错误可区分。
pub async fn check_provider(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.monitor.check_provider(&name).await {
        Ok(record) => response::success(record),
        Err(e) => response::app_error(e),
    }
}

/// 检查历史查询参数
#[derive(Debug, serde::Deserialize)]
pub struct CheckHistoryQuery {
    /// 返回条数上限
    pub limit: Option<usize>,
}

const DEFAULT_CHECK_LIMIT: usize = 50;

/// 读取单个提供商最近的检查记录，新者在前
pub async fn list_provider_checks(
    State(state): State<AppState>,
    Path(name): Path<String>,
    axum::extract::Query(query): axum::extract::Query<CheckHistoryQuery>,
) -> impl IntoResponse {
    // 未知提供商先报 404，再查历史
    if let Err(e) = state.registry.get(&name).await {
        return response::app_error(e);
    }
    match state
        .store
        .recent_checks_for(&name, query.limit.unwrap_or(DEFAULT_CHECK_LIMIT))
        .await
    {
        Ok(records) => response::success(records),
        Err(e) => response::app_error(e),
    }
}
