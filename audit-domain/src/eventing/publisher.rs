//! 事务化发布器（TransactionalPublisher）
//!
//! 工作单元结束时的唯一出口：
//! - `Committed`：取出缓冲区的有序记录，附加传输元数据，作为单条批次
//!   消息整批发布；发布失败按配置整批重试（至少一次），重试耗尽以
//!   `PublishFailure` 上抛，从不静默丢弃；
//! - `RolledBack`：丢弃缓冲区，零发布——审计事件永远不描述已被撤销
//!   的状态。
//!
//! 批内记录按 `sequence_number` 非降序排列；同一实例的批次按提交序
//! 到达（由实例执行守卫的互斥保证，发布器自身不做跨批排序）。
//!
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::buffer::{BufferHandle, EventAggregator};
use crate::error::{AuditError, AuditResult};
use crate::event::EventRecord;
use crate::eventing::EventBus;

/// 工作单元的最终结局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkOutcome {
    Committed,
    RolledBack,
}

/// 应用/服务身份（传输头的静态部分）
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    app_name: String,
    service_name: String,
    service_version: String,
    service_full_name: String,
}

impl ServiceInfo {
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn service_version(&self) -> &str {
        &self.service_version
    }

    pub fn service_full_name(&self) -> &str {
        &self.service_full_name
    }
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            app_name: "default-app".to_string(),
            service_name: "runtime-bundle".to_string(),
            service_version: "0.1.0".to_string(),
            service_full_name: "runtime-bundle".to_string(),
        }
    }
}

/// 批次的传输头：服务身份加按流程定义派生的路由键
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportInfo {
    app_name: String,
    service_name: String,
    service_version: String,
    service_full_name: String,
    routing_key: String,
}

impl TransportInfo {
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn service_version(&self) -> &str {
        &self.service_version
    }

    pub fn service_full_name(&self) -> &str {
        &self.service_full_name
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }
}

/// 一个已提交工作单元产出的完整有序批次（下游消费的基本单位）
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    batch_id: String,
    transport: TransportInfo,
    records: Vec<EventRecord>,
}

impl EventBatch {
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn transport(&self) -> &TransportInfo {
        &self.transport
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }
}

/// 发布器配置
#[derive(Debug, Clone, Copy)]
pub struct PublisherConfig {
    /// 单个批次的最大发布尝试次数
    pub max_publish_attempts: usize,
    /// 相邻尝试之间的退避间隔
    pub publish_retry_backoff: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_publish_attempts: 3,
            publish_retry_backoff: Duration::from_millis(200),
        }
    }
}

/// 事务化发布器
pub struct TransactionalPublisher {
    bus: Arc<dyn EventBus>,
    aggregator: Arc<EventAggregator>,
    info: ServiceInfo,
    config: PublisherConfig,
}

impl TransactionalPublisher {
    pub fn new(
        bus: Arc<dyn EventBus>,
        aggregator: Arc<EventAggregator>,
        info: ServiceInfo,
        config: PublisherConfig,
    ) -> Self {
        Self {
            bus,
            aggregator,
            info,
            config,
        }
    }

    /// 按工作单元结局收尾：提交则整批发布后丢弃缓冲区，回滚只丢弃
    pub async fn on_outcome(
        &self,
        handle: BufferHandle,
        outcome: UnitOfWorkOutcome,
    ) -> AuditResult<()> {
        match outcome {
            UnitOfWorkOutcome::RolledBack => self.aggregator.discard(handle),
            UnitOfWorkOutcome::Committed => self.flush(handle).await,
        }
    }

    async fn flush(&self, handle: BufferHandle) -> AuditResult<()> {
        let records = self.aggregator.drain(handle)?;
        if records.is_empty() {
            // 空工作单元不产生空批次
            return self.aggregator.discard(handle);
        }

        let batch = self.assemble(records);
        let publish_result = self.publish_with_retry(&batch).await;

        // 结局已定（成功或重试耗尽），缓冲区都不再存活
        self.aggregator.discard(handle)?;
        publish_result
    }

    fn assemble(&self, records: Vec<EventRecord>) -> EventBatch {
        // 路由键按服务名与流程定义 key 派生；一个批次属于同一调用链，
        // 取首条记录的定义信息即可
        let routing_key = format!(
            "engineEvents.{}.{}",
            self.info.service_name,
            records[0].provenance().process_definition_key()
        );

        let transport = TransportInfo::builder()
            .app_name(self.info.app_name.clone())
            .service_name(self.info.service_name.clone())
            .service_version(self.info.service_version.clone())
            .service_full_name(self.info.service_full_name.clone())
            .routing_key(routing_key)
            .build();

        EventBatch::builder()
            .batch_id(Uuid::new_v4().to_string())
            .transport(transport)
            .records(records)
            .build()
    }

    async fn publish_with_retry(&self, batch: &EventBatch) -> AuditResult<()> {
        let mut last_reason = String::new();

        for attempt in 1..=self.config.max_publish_attempts {
            match self.bus.publish(batch).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(
                        batch_id = batch.batch_id(),
                        attempt,
                        error = %err,
                        "audit batch publish failed"
                    );
                    last_reason = err.to_string();
                    if attempt < self.config.max_publish_attempts {
                        tokio::time::sleep(self.config.publish_retry_backoff).await;
                    }
                }
            }
        }

        Err(AuditError::publish_failure(
            self.config.max_publish_attempts,
            last_reason,
        ))
    }
}
