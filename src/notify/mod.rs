//! # 变更通知模块
//!
//! 显式的发布/订阅通道：提供商状态每次写入、事件日志每次追加都会
//! 广播一条消息给外部仪表盘。发送即忘——订阅方缓慢或掉线绝不能
//! 阻塞引擎的写路径。

use serde::Serialize;
use tokio::sync::broadcast;

use crate::chaos::types::ChaosEvent;
use crate::registry::types::ProviderState;

/// 默认广播通道容量
const DEFAULT_CAPACITY: usize = 256;

/// 广播给订阅方的变更消息
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// 提供商状态发生写入
    ProviderChanged {
        name: String,
        state: ProviderState,
    },
    /// 事件日志追加了一条记录
    EventAppended { event: ChaosEvent },
}

/// 变更通知器
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    /// 创建通知器
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 发布变更；无订阅方或订阅方滞后时直接丢弃，不阻塞写路径
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    /// 订阅变更流
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// 当前订阅方数量
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
