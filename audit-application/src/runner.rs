//! 工作单元执行器（UnitOfWorkRunner）
//!
//! 把一次引擎触发的操作（信号、HTTP 命令、定时器触发）编排成一个
//! 完整的工作单元：
//! 1. 向守卫申请实例锁（超时→`InstanceBusy`）；
//! 2. 开启事务缓冲区，把 `UnitOfWork` 上下文交给引擎操作闭包，
//!    闭包内产生的事件全部进入同一缓冲区（嵌套调用沿用同一句柄）；
//! 3. 闭包成功 → 发布器整批发布；闭包失败 → 回滚丢弃，错误原样上抛；
//! 4. 令牌在全部路径上释放（含 panic 展开，由 `Drop` 兜底）。
//!
use std::sync::Arc;

use crate::error::AppError;
use crate::guard::InstanceExecutionGuard;
use audit_domain::buffer::{BufferHandle, EventAggregator};
use audit_domain::error::AuditError;
use audit_domain::event::{EventRecord, RawEvent};
use audit_domain::eventing::{TransactionalPublisher, UnitOfWorkOutcome};
use audit_domain::timer::{TimerJobService, TimerJobState};

/// 一个在途工作单元的上下文：引擎操作通过它写入事件
pub struct UnitOfWork {
    aggregator: Arc<EventAggregator>,
    handle: BufferHandle,
}

impl UnitOfWork {
    /// 向本工作单元的缓冲区追加一条事件
    pub fn emit(&self, raw: RawEvent) -> Result<EventRecord, AppError> {
        Ok(self.aggregator.append(self.handle, raw)?)
    }

    /// 缓冲区句柄：嵌套操作（子流程）沿调用链传递复用
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn aggregator(&self) -> &EventAggregator {
        &self.aggregator
    }

    /// 当前已累积的事件条数（诊断/背压）
    pub fn pending(&self) -> Result<usize, AppError> {
        Ok(self.aggregator.commit_size(self.handle)?)
    }
}

/// 工作单元执行器
pub struct UnitOfWorkRunner {
    guard: Arc<InstanceExecutionGuard>,
    aggregator: Arc<EventAggregator>,
    publisher: Arc<TransactionalPublisher>,
}

impl UnitOfWorkRunner {
    pub fn new(
        guard: Arc<InstanceExecutionGuard>,
        aggregator: Arc<EventAggregator>,
        publisher: Arc<TransactionalPublisher>,
    ) -> Self {
        Self {
            guard,
            aggregator,
            publisher,
        }
    }

    pub fn guard(&self) -> &InstanceExecutionGuard {
        &self.guard
    }

    /// 以给定实例为范围执行一个工作单元
    ///
    /// 闭包返回 `Ok` 则提交（整批发布），返回 `Err` 则回滚（零发布）
    /// 并把错误上抛；发布失败以 `PublishFailure` 上抛，调用方永远不会
    /// 观察到“发布了一半”的工作单元。
    pub async fn execute<T, F, Fut>(
        &self,
        process_instance_id: &str,
        work: F,
    ) -> Result<T, AppError>
    where
        F: FnOnce(UnitOfWork) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let token = self.guard.acquire(process_instance_id).await?;

        let handle = self.aggregator.begin();
        let unit = UnitOfWork {
            aggregator: self.aggregator.clone(),
            handle,
        };

        let result = work(unit).await;
        let outcome = match &result {
            Ok(_) => UnitOfWorkOutcome::Committed,
            Err(err) => {
                tracing::debug!(
                    process_instance_id,
                    error = %err,
                    "unit of work failed, discarding buffer"
                );
                UnitOfWorkOutcome::RolledBack
            }
        };
        let flush = self.publisher.on_outcome(handle, outcome).await;

        drop(token);

        let value = result?;
        flush?;
        Ok(value)
    }

    /// 为到期定时器打开一个独立工作单元并驱动其触发
    ///
    /// 处理器成功 → `EXECUTED`；处理器失败 → 递减重试并记录
    /// `RETRIES_DECREMENTED`/`FAILED`，失败事件随工作单元正常提交
    /// （`RetriesExhausted` 以 `FAILED` 事件呈现，不作为错误上抛）。
    pub async fn fire_timer<F, Fut>(
        &self,
        timers: &TimerJobService,
        timer_id: &str,
        handler: F,
    ) -> Result<TimerJobState, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), AppError>>,
    {
        let job = timers
            .job(timer_id)
            .ok_or_else(|| AuditError::unknown_timer(timer_id))?;
        let process_instance_id = job.provenance().process_instance_id().to_string();

        self.execute(&process_instance_id, |unit| async move {
            timers.fire(unit.aggregator(), unit.handle(), timer_id)?;
            match handler().await {
                Ok(()) => {
                    timers.mark_executed(unit.aggregator(), unit.handle(), timer_id)?;
                }
                Err(err) => {
                    tracing::debug!(timer_id, error = %err, "timer handler failed");
                    timers.mark_attempt_failed(unit.aggregator(), unit.handle(), timer_id)?;
                }
            }
            Ok(())
        })
        .await?;

        timers
            .state_of(timer_id)
            .ok_or_else(|| AuditError::unknown_timer(timer_id).into())
    }
}
