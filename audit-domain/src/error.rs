//! 领域层统一错误定义
//!
//! 聚焦守卫争用、批次发布、缓冲区误用与定时器状态机等最小必要集合，
//! 便于在各实现层统一转换为 `AuditError`。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AuditError {
    // --- 实例执行守卫 ---
    #[error("instance busy: process_instance_id={process_instance_id}")]
    InstanceBusy { process_instance_id: String },

    // --- 事务化发布 ---
    #[error("publish failure after {attempts} attempt(s): {reason}")]
    PublishFailure { attempts: usize, reason: String },
    #[error("event bus error: {reason}")]
    EventBus { reason: String },

    // --- 事务缓冲区 ---
    #[error("buffer corruption: {reason}")]
    BufferCorruption { reason: String },

    // --- 定时任务状态机 ---
    #[error("invalid timer transition: timer_id={timer_id}, from={from}, to={to}")]
    InvalidTransition {
        timer_id: String,
        from: String,
        to: String,
    },
    #[error("unknown timer: timer_id={timer_id}")]
    UnknownTimer { timer_id: String },

    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

impl AuditError {
    pub fn instance_busy(process_instance_id: impl Into<String>) -> Self {
        AuditError::InstanceBusy {
            process_instance_id: process_instance_id.into(),
        }
    }

    pub fn publish_failure(attempts: usize, reason: impl Into<String>) -> Self {
        AuditError::PublishFailure {
            attempts,
            reason: reason.into(),
        }
    }

    pub fn event_bus(reason: impl Into<String>) -> Self {
        AuditError::EventBus {
            reason: reason.into(),
        }
    }

    pub fn buffer_corruption(reason: impl Into<String>) -> Self {
        AuditError::BufferCorruption {
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(
        timer_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        AuditError::InvalidTransition {
            timer_id: timer_id.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn unknown_timer(timer_id: impl Into<String>) -> Self {
        AuditError::UnknownTimer {
            timer_id: timer_id.into(),
        }
    }
}

/// 统一 Result 类型别名
pub type AuditResult<T> = Result<T, AuditError>;
