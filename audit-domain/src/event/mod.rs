//! 事件模型（Event Model）
//!
//! 定义引擎生命周期事件的封闭类型集（`RuntimeEventType`）、变体化载荷
//! （`EventPayload`）、溯源与路由元数据（`Provenance`），以及引擎边界
//! 提交的原始事件（`RawEvent`）与缓冲区定序后的不可变记录
//! （`EventRecord`）。

mod event_type;
mod payload;
mod provenance;
mod record;

pub use event_type::RuntimeEventType;
pub use payload::{
    ActivitySnapshot, EventPayload, IntegrationSnapshot, ProcessSnapshot, ProcessStatus,
    TaskSnapshot, TimerSnapshot, VariableSnapshot,
};
pub use provenance::Provenance;
pub use record::{EventRecord, RawEvent};
