//! 事件系统（Eventing）
//!
//! 定义批次级事件总线协议（`EventBus`）、内存实现（`InMemoryEventBus`）
//! 与事务化发布器（`TransactionalPublisher`）：提交的工作单元整批发布，
//! 回滚的工作单元零发布。

mod bus;
mod bus_inmemory;
mod publisher;

pub use bus::EventBus;
pub use bus_inmemory::InMemoryEventBus;
pub use publisher::{
    EventBatch, PublisherConfig, ServiceInfo, TransactionalPublisher, TransportInfo,
    UnitOfWorkOutcome,
};
