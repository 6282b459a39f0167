use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event_type::RuntimeEventType;
use super::payload::EventPayload;
use super::provenance::Provenance;

/// 引擎边界提交的原始事件：尚未定序，不携带序号与时间戳
#[derive(Builder, Debug, Clone, PartialEq)]
pub struct RawEvent {
    event_type: RuntimeEventType,
    /// 受影响实体的标识（任务 ID、变量名、定时器 ID 等）
    entity_id: String,
    payload: EventPayload,
    provenance: Provenance,
}

impl RawEvent {
    pub fn event_type(&self) -> RuntimeEventType {
        self.event_type
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub(crate) fn into_parts(self) -> (RuntimeEventType, String, EventPayload, Provenance) {
        (self.event_type, self.entity_id, self.payload, self.provenance)
    }
}

/// 不可变事件记录
///
/// 由缓冲区在追加时定序生成，之后不再变更：
/// - `sequence_number` 在所属缓冲区内严格递增、从不复用；
/// - `produced_at` 在缓冲区内单调不减（墙钟回拨时按上一条钳制）。
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    event_type: RuntimeEventType,
    sequence_number: u64,
    entity_id: String,
    payload: EventPayload,
    provenance: Provenance,
    produced_at: DateTime<Utc>,
}

impl EventRecord {
    pub fn event_type(&self) -> RuntimeEventType {
        self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn produced_at(&self) -> DateTime<Utc> {
        self.produced_at
    }
}
