//! # 事件日志模块
//!
//! 追加式审计日志：每一次状态转移与混沌操作都恰好落一条记录，
//! 供审计查询与恢复指标聚合消费。

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::chaos::types::ChaosEvent;
use crate::error::Result;
use crate::notify::{ChangeEvent, ChangeNotifier};
use crate::registry::store::{ResilienceStore, write_with_retry};

/// 事件日志服务
pub struct EventLog {
    store: Arc<dyn ResilienceStore>,
    notifier: ChangeNotifier,
}

impl EventLog {
    /// 创建事件日志服务
    pub fn new(store: Arc<dyn ResilienceStore>, notifier: ChangeNotifier) -> Self {
        Self { store, notifier }
    }

    /// 追加一条事件并广播
    ///
    /// 写入走有限重试；重试耗尽后如实上抛，不做静默吞错。
    pub async fn append(&self, event: ChaosEvent) -> Result<Uuid> {
        write_with_retry(|| {
            let event = &event;
            async move { self.store.append_event(event).await }
        })
        .await?;

        debug!(event_id = %event.id, severity = ?event.severity, "Chaos event appended");
        let id = event.id;
        self.notifier.publish(ChangeEvent::EventAppended { event });
        Ok(id)
    }

    /// 读取最近的事件，新者在前
    pub async fn recent(&self, limit: usize) -> Result<Vec<ChaosEvent>> {
        self.store.recent_events(limit).await
    }
}
