//! 事务缓冲区与定序器（EventAggregator）
//!
//! 每个并发执行的工作单元持有一个缓冲区，以 `BufferHandle` 寻址：
//! - `begin` 开启缓冲区；`append` 为原始事件分配缓冲区内严格递增的
//!   序号与单调时间戳（纯内存操作，不做任何 I/O）；
//! - `drain` 只读取出有序记录，不清空；`discard` 清空且无任何副作用；
//! - 不同工作单元的缓冲区彼此独立，从不合并；嵌套/子流程操作沿用父
//!   工作单元的句柄追加，使父子事件在同一有序流中正确交织。
//!
//! 对已丢弃句柄的任何操作都是编程错误，以 `BufferCorruption` 失败，
//! 工作单元应按回滚收场（fail closed）。
//!
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{AuditError, AuditResult};
use crate::event::{EventRecord, RawEvent};

/// 缓冲区句柄：工作单元期间在调用链上传递的轻量标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u64);

impl BufferHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

struct BufferState {
    records: Vec<EventRecord>,
    next_sequence: u64,
    last_produced_at: Option<DateTime<Utc>>,
}

impl BufferState {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            next_sequence: 0,
            last_produced_at: None,
        }
    }
}

/// 事件聚合器：全部存活缓冲区的属主
///
/// 内部以互斥的句柄表管理缓冲区；锁只覆盖内存表操作，`append` 等
/// 调用不会因其他工作单元而阻塞等待 I/O。
pub struct EventAggregator {
    buffers: Mutex<HashMap<u64, BufferState>>,
    next_handle: AtomicU64,
}

impl EventAggregator {
    pub fn new() -> Self {
        Self {
            buffers: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// 开启一个新的事务缓冲区
    pub fn begin(&self) -> BufferHandle {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let mut buffers = self.lock_buffers();
        buffers.insert(id, BufferState::new());
        BufferHandle(id)
    }

    /// 追加原始事件：分配序号与时间戳，返回定序后的不可变记录
    pub fn append(&self, handle: BufferHandle, raw: RawEvent) -> AuditResult<EventRecord> {
        let mut buffers = self.lock_buffers();
        let state = buffers
            .get_mut(&handle.0)
            .ok_or_else(|| Self::corrupted(handle, "append"))?;

        let sequence_number = state.next_sequence;
        state.next_sequence += 1;

        // 墙钟回拨时钳制到上一条记录的时间，保证缓冲区内单调不减
        let now = Utc::now();
        let produced_at = match state.last_produced_at {
            Some(last) if now < last => last,
            _ => now,
        };
        state.last_produced_at = Some(produced_at);

        let (event_type, entity_id, payload, provenance) = raw.into_parts();
        let record = EventRecord::builder()
            .event_type(event_type)
            .sequence_number(sequence_number)
            .entity_id(entity_id)
            .payload(payload)
            .provenance(provenance)
            .produced_at(produced_at)
            .build();

        state.records.push(record.clone());
        Ok(record)
    }

    /// 只读取出缓冲区的有序记录（不清空）
    pub fn drain(&self, handle: BufferHandle) -> AuditResult<Vec<EventRecord>> {
        let buffers = self.lock_buffers();
        let state = buffers
            .get(&handle.0)
            .ok_or_else(|| Self::corrupted(handle, "drain"))?;
        Ok(state.records.clone())
    }

    /// 丢弃缓冲区：移除全部记录，无任何副作用
    pub fn discard(&self, handle: BufferHandle) -> AuditResult<()> {
        let mut buffers = self.lock_buffers();
        buffers
            .remove(&handle.0)
            .ok_or_else(|| Self::corrupted(handle, "discard"))?;
        Ok(())
    }

    /// 当前缓冲区内的记录条数（诊断/背压）
    pub fn commit_size(&self, handle: BufferHandle) -> AuditResult<usize> {
        let buffers = self.lock_buffers();
        let state = buffers
            .get(&handle.0)
            .ok_or_else(|| Self::corrupted(handle, "commit_size"))?;
        Ok(state.records.len())
    }

    fn corrupted(handle: BufferHandle, op: &str) -> AuditError {
        tracing::warn!(buffer = handle.0, op, "operation on drained/discarded buffer");
        AuditError::buffer_corruption(format!(
            "{op} targeted unknown or discarded buffer {}",
            handle.0
        ))
    }

    fn lock_buffers(&self) -> std::sync::MutexGuard<'_, HashMap<u64, BufferState>> {
        // 句柄表的写入都是整体插入/移除，持锁 panic 不会留下半成品状态，
        // 中毒时直接取回内层数据
        match self.buffers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for EventAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventPayload, Provenance, RuntimeEventType};

    fn provenance(instance: &str) -> Provenance {
        Provenance::builder()
            .process_instance_id(instance.to_string())
            .process_definition_key("order-flow".to_string())
            .process_definition_id("order-flow:1".to_string())
            .process_definition_version(1)
            .build()
    }

    fn raw(instance: &str, event_type: RuntimeEventType) -> RawEvent {
        RawEvent::builder()
            .event_type(event_type)
            .entity_id(instance.to_string())
            .payload(EventPayload::None)
            .provenance(provenance(instance))
            .build()
    }

    #[test]
    fn append_assigns_strictly_increasing_sequence_numbers() {
        let agg = EventAggregator::new();
        let handle = agg.begin();

        for expected in 0..5u64 {
            let record = agg
                .append(handle, raw("p-1", RuntimeEventType::ProcessUpdated))
                .unwrap();
            assert_eq!(record.sequence_number(), expected);
        }

        let records = agg.drain(handle).unwrap();
        let sequences: Vec<u64> = records.iter().map(|r| r.sequence_number()).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);

        // produced_at 单调不减
        for pair in records.windows(2) {
            assert!(pair[0].produced_at() <= pair[1].produced_at());
        }
    }

    #[test]
    fn drain_is_read_only() {
        let agg = EventAggregator::new();
        let handle = agg.begin();
        agg.append(handle, raw("p-1", RuntimeEventType::ProcessCreated))
            .unwrap();

        assert_eq!(agg.drain(handle).unwrap().len(), 1);
        assert_eq!(agg.drain(handle).unwrap().len(), 1);
        assert_eq!(agg.commit_size(handle).unwrap(), 1);
    }

    #[test]
    fn buffers_are_independent() {
        let agg = EventAggregator::new();
        let first = agg.begin();
        let second = agg.begin();

        agg.append(first, raw("p-1", RuntimeEventType::ProcessCreated))
            .unwrap();
        agg.append(second, raw("p-2", RuntimeEventType::ProcessCreated))
            .unwrap();
        agg.append(second, raw("p-2", RuntimeEventType::ProcessStarted))
            .unwrap();

        // 各自独立编号，互不可见
        assert_eq!(agg.commit_size(first).unwrap(), 1);
        assert_eq!(agg.commit_size(second).unwrap(), 2);
        assert_eq!(agg.drain(second).unwrap()[0].sequence_number(), 0);
    }

    #[test]
    fn append_after_discard_is_buffer_corruption() {
        let agg = EventAggregator::new();
        let handle = agg.begin();
        agg.discard(handle).unwrap();

        let err = agg
            .append(handle, raw("p-1", RuntimeEventType::ProcessCreated))
            .unwrap_err();
        assert!(matches!(err, AuditError::BufferCorruption { .. }));

        let err = agg.drain(handle).unwrap_err();
        assert!(matches!(err, AuditError::BufferCorruption { .. }));
    }
}
