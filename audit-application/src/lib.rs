//! 审计事件流水线编排层（audit-application）
//!
//! 在 `audit-domain` 之上提供工作单元编排：
//! - 实例执行守卫（`guard`）：同一流程实例同一时刻至多一个在途
//!   工作单元，超时以 `InstanceBusy` 上抛；
//! - 工作单元执行器（`runner`）：守卫获取 → 缓冲区开启 → 引擎操作 →
//!   按结局发布或丢弃，令牌在一切退出路径上释放。

pub mod error;
pub mod guard;
pub mod runner;

pub use guard::{GuardConfig, InstanceExecutionGuard, InstanceLockToken};
pub use runner::{UnitOfWork, UnitOfWorkRunner};
