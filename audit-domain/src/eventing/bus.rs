//! 事件总线（EventBus）协议
//!
//! 定义批次发布与订阅的统一抽象。发布粒度是整个批次：一个批次对应
//! 一个已提交工作单元的全部事件记录，部分投递不是合法状态；重复投递
//! 由消费方按 `(process_instance_id, sequence_number)` 幂等处理。
//!
use crate::{error::AuditResult as Result, eventing::EventBatch};
use async_trait::async_trait;
use futures_core::stream::BoxStream;

/// 事件总线：负责分发批次与订阅批次流
#[async_trait]
pub trait EventBus: Send + Sync {
    /// 原子发布一个批次；失败时整批重试（至少一次语义）
    async fn publish(&self, batch: &EventBatch) -> Result<()>;

    /// 返回一个 'static 生命周期的批次流，便于在 tokio::spawn 中使用
    async fn subscribe(&self) -> BoxStream<'static, Result<EventBatch>>;
}
