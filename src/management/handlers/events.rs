//! # 事件审计处理器

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;

use crate::management::response;
use crate::management::server::AppState;

/// 事件查询参数
#[derive(Debug, Deserialize)]
pub struct EventQuery {
    /// 返回条数上限
    pub limit: Option<usize>,
}

const DEFAULT_EVENT_LIMIT: usize = 50;

/// 读取最近的事件日志，新者在前
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    match state.events.recent(limit).await {
        Ok(events) => response::success(events),
        Err(e) => response::app_error(e),
    }
}

/// 变更流（SSE）
///
/// 外部仪表盘订阅提供商状态与事件日志变更。订阅方滞后产生的
/// 丢帧在这里被静默跳过，引擎写路径不受影响。
pub async fn stream_changes(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.notifier.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|change| async move {
        let change = change.ok()?;
        let event = Event::default().json_data(&change).ok()?;
        Some(Ok(event))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
