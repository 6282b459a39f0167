//! 定时任务状态机（Timer Retry State Machine）
//!
//! 有界重试的定时触发器生命周期：
//! `Scheduled → Fired → Executed`（成功路径）；
//! `Fired → RetriesDecremented →（重试剩余则再次 Fired，否则 Failed）`
//! （失败路径）；任意非终态可被外部取消进入 `Cancelled`。
//!
//! 每次状态迁移向当前活跃的事务缓冲区写入事件记录；处理器失败的迁移
//! 同时写入 `TIMER_RETRIES_DECREMENTED` 与携带当前剩余次数的
//! `TIMER_FAILED` 两条。重试间隔（backoff）是配置项，由上层调度器在
//! `RetriesDecremented` 与下一次 `fire` 之间落实，状态机自身不计时。
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::buffer::{BufferHandle, EventAggregator};
use crate::error::{AuditError, AuditResult};
use crate::event::{EventPayload, EventRecord, Provenance, RawEvent, RuntimeEventType, TimerSnapshot};

/// 定时任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerJobState {
    Scheduled,
    Fired,
    Executed,
    RetriesDecremented,
    Failed,
    Cancelled,
}

impl TimerJobState {
    pub fn name(&self) -> &'static str {
        match self {
            TimerJobState::Scheduled => "SCHEDULED",
            TimerJobState::Fired => "FIRED",
            TimerJobState::Executed => "EXECUTED",
            TimerJobState::RetriesDecremented => "RETRIES_DECREMENTED",
            TimerJobState::Failed => "FAILED",
            TimerJobState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TimerJobState::Executed | TimerJobState::Failed | TimerJobState::Cancelled
        )
    }
}

/// 定时任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerJob {
    id: String,
    activity_id: String,
    due_at: DateTime<Utc>,
    retries_remaining: u32,
    state: TimerJobState,
    provenance: Provenance,
}

impl TimerJob {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn activity_id(&self) -> &str {
        &self.activity_id
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    pub fn retries_remaining(&self) -> u32 {
        self.retries_remaining
    }

    pub fn state(&self) -> TimerJobState {
        self.state
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            timer_id: self.id.clone(),
            due_at: self.due_at,
            retries_remaining: self.retries_remaining,
        }
    }
}

/// 新建定时任务的参数
#[derive(Builder, Debug, Clone)]
pub struct NewTimerJob {
    pub id: String,
    pub activity_id: String,
    pub due_at: DateTime<Utc>,
    pub provenance: Provenance,
}

/// 定时任务配置
#[derive(Debug, Clone, Copy)]
pub struct TimerConfig {
    /// 处理器失败后的最大重试次数
    pub max_retries: u32,
    /// 相邻重试之间的退避间隔（由上层调度器使用）
    pub retry_backoff: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// 定时任务服务：持有任务表并驱动状态迁移
pub struct TimerJobService {
    jobs: Mutex<HashMap<String, TimerJob>>,
    config: TimerConfig,
}

impl TimerJobService {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> TimerConfig {
        self.config
    }

    /// 建立定时任务并写入 `TIMER_SCHEDULED`
    pub fn schedule(
        &self,
        aggregator: &EventAggregator,
        handle: BufferHandle,
        new_job: NewTimerJob,
    ) -> AuditResult<TimerJob> {
        let mut jobs = self.lock_jobs();
        if let Some(existing) = jobs.get(&new_job.id) {
            return Err(AuditError::invalid_transition(
                new_job.id,
                existing.state.name(),
                TimerJobState::Scheduled.name(),
            ));
        }

        let job = TimerJob {
            id: new_job.id,
            activity_id: new_job.activity_id,
            due_at: new_job.due_at,
            retries_remaining: self.config.max_retries,
            state: TimerJobState::Scheduled,
            provenance: new_job.provenance,
        };
        Self::emit(aggregator, handle, &job, RuntimeEventType::TimerScheduled)?;
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    /// 到期触发：`Scheduled | RetriesDecremented → Fired`，写入 `TIMER_FIRED`
    pub fn fire(
        &self,
        aggregator: &EventAggregator,
        handle: BufferHandle,
        timer_id: &str,
    ) -> AuditResult<TimerJob> {
        self.transition(aggregator, handle, timer_id, TimerJobState::Fired, |job| {
            matches!(
                job.state,
                TimerJobState::Scheduled | TimerJobState::RetriesDecremented
            )
        })
    }

    /// 处理器成功：`Fired → Executed`（终态），写入 `TIMER_EXECUTED`
    pub fn mark_executed(
        &self,
        aggregator: &EventAggregator,
        handle: BufferHandle,
        timer_id: &str,
    ) -> AuditResult<TimerJob> {
        self.transition(
            aggregator,
            handle,
            timer_id,
            TimerJobState::Executed,
            |job| job.state == TimerJobState::Fired,
        )
    }

    /// 处理器失败：递减剩余重试次数，同时写入
    /// `TIMER_RETRIES_DECREMENTED` 与 `TIMER_FAILED`；剩余次数耗尽则
    /// 进入终态 `Failed`，否则进入 `RetriesDecremented` 等待再次触发
    pub fn mark_attempt_failed(
        &self,
        aggregator: &EventAggregator,
        handle: BufferHandle,
        timer_id: &str,
    ) -> AuditResult<TimerJob> {
        let mut jobs = self.lock_jobs();
        let job = jobs
            .get_mut(timer_id)
            .ok_or_else(|| AuditError::unknown_timer(timer_id))?;
        if job.state != TimerJobState::Fired {
            return Err(AuditError::invalid_transition(
                timer_id,
                job.state.name(),
                TimerJobState::RetriesDecremented.name(),
            ));
        }

        // 饱和递减：剩余次数永不为负（max_retries 配置为 0 时首次失败即终态）
        job.retries_remaining = job.retries_remaining.saturating_sub(1);
        job.state = if job.retries_remaining > 0 {
            TimerJobState::RetriesDecremented
        } else {
            TimerJobState::Failed
        };

        Self::emit(
            aggregator,
            handle,
            job,
            RuntimeEventType::TimerRetriesDecremented,
        )?;
        Self::emit(aggregator, handle, job, RuntimeEventType::TimerFailed)?;
        Ok(job.clone())
    }

    /// 外部取消（如实例删除）：任意非终态 → `Cancelled`，写入 `TIMER_CANCELLED`
    pub fn cancel(
        &self,
        aggregator: &EventAggregator,
        handle: BufferHandle,
        timer_id: &str,
    ) -> AuditResult<TimerJob> {
        self.transition(
            aggregator,
            handle,
            timer_id,
            TimerJobState::Cancelled,
            |job| !job.state.is_terminal(),
        )
    }

    /// 取消一个流程实例名下的全部非终态任务（实例删除路径）
    pub fn cancel_instance(
        &self,
        aggregator: &EventAggregator,
        handle: BufferHandle,
        process_instance_id: &str,
    ) -> AuditResult<Vec<TimerJob>> {
        let pending: Vec<String> = {
            let jobs = self.lock_jobs();
            jobs.values()
                .filter(|job| {
                    job.provenance.process_instance_id() == process_instance_id
                        && !job.state.is_terminal()
                })
                .map(|job| job.id.clone())
                .collect()
        };

        let mut cancelled = Vec::with_capacity(pending.len());
        for timer_id in pending {
            cancelled.push(self.cancel(aggregator, handle, &timer_id)?);
        }
        Ok(cancelled)
    }

    /// 诊断查询：任务当前状态
    pub fn state_of(&self, timer_id: &str) -> Option<TimerJobState> {
        self.lock_jobs().get(timer_id).map(|job| job.state)
    }

    /// 诊断查询：任务快照
    pub fn job(&self, timer_id: &str) -> Option<TimerJob> {
        self.lock_jobs().get(timer_id).cloned()
    }

    fn transition(
        &self,
        aggregator: &EventAggregator,
        handle: BufferHandle,
        timer_id: &str,
        to: TimerJobState,
        allowed: impl Fn(&TimerJob) -> bool,
    ) -> AuditResult<TimerJob> {
        let mut jobs = self.lock_jobs();
        let job = jobs
            .get_mut(timer_id)
            .ok_or_else(|| AuditError::unknown_timer(timer_id))?;
        if !allowed(job) {
            return Err(AuditError::invalid_transition(
                timer_id,
                job.state.name(),
                to.name(),
            ));
        }

        job.state = to;
        let event_type = match to {
            TimerJobState::Fired => RuntimeEventType::TimerFired,
            TimerJobState::Executed => RuntimeEventType::TimerExecuted,
            TimerJobState::Cancelled => RuntimeEventType::TimerCancelled,
            // Scheduled/RetriesDecremented/Failed 各有专用入口
            other => {
                return Err(AuditError::invalid_transition(
                    timer_id,
                    job.state.name(),
                    other.name(),
                ));
            }
        };
        Self::emit(aggregator, handle, job, event_type)?;
        Ok(job.clone())
    }

    fn emit(
        aggregator: &EventAggregator,
        handle: BufferHandle,
        job: &TimerJob,
        event_type: RuntimeEventType,
    ) -> AuditResult<EventRecord> {
        aggregator.append(
            handle,
            RawEvent::builder()
                .event_type(event_type)
                .entity_id(job.id.clone())
                .payload(EventPayload::Timer(job.snapshot()))
                .provenance(job.provenance.clone())
                .build(),
        )
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, TimerJob>> {
        match self.jobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for TimerJobService {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provenance(instance: &str) -> Provenance {
        Provenance::builder()
            .process_instance_id(instance.to_string())
            .process_definition_key("timer-flow".to_string())
            .process_definition_id("timer-flow:1".to_string())
            .process_definition_version(1)
            .build()
    }

    fn new_job(id: &str, instance: &str) -> NewTimerJob {
        NewTimerJob::builder()
            .id(id.to_string())
            .activity_id("timer-event".to_string())
            .due_at(Utc::now())
            .provenance(provenance(instance))
            .build()
    }

    fn service() -> (TimerJobService, EventAggregator, BufferHandle) {
        let aggregator = EventAggregator::new();
        let handle = aggregator.begin();
        (TimerJobService::default(), aggregator, handle)
    }

    #[test]
    fn success_path_schedule_fire_execute() {
        let (timers, agg, handle) = service();

        timers.schedule(&agg, handle, new_job("t-1", "p-1")).unwrap();
        assert_eq!(timers.state_of("t-1"), Some(TimerJobState::Scheduled));

        timers.fire(&agg, handle, "t-1").unwrap();
        timers.mark_executed(&agg, handle, "t-1").unwrap();
        assert_eq!(timers.state_of("t-1"), Some(TimerJobState::Executed));

        let names: Vec<_> = agg
            .drain(handle)
            .unwrap()
            .iter()
            .map(|r| r.event_type().name())
            .collect();
        assert_eq!(names, vec!["TIMER_SCHEDULED", "TIMER_FIRED", "TIMER_EXECUTED"]);
    }

    #[test]
    fn retries_decrease_by_one_until_terminal_failure() {
        let (timers, agg, handle) = service();
        timers.schedule(&agg, handle, new_job("t-1", "p-1")).unwrap();

        let mut seen = Vec::new();
        loop {
            timers.fire(&agg, handle, "t-1").unwrap();
            let job = timers.mark_attempt_failed(&agg, handle, "t-1").unwrap();
            seen.push(job.retries_remaining());
            if job.state() == TimerJobState::Failed {
                break;
            }
        }

        // 恰好 max_retries 次失败，次数严格逐一递减到 0
        assert_eq!(seen, vec![2, 1, 0]);
        assert_eq!(timers.state_of("t-1"), Some(TimerJobState::Failed));

        // 终态后不再允许触发
        let err = timers.fire(&agg, handle, "t-1").unwrap_err();
        assert!(matches!(err, AuditError::InvalidTransition { .. }));
    }

    #[test]
    fn failure_transition_emits_decrement_and_failed_pair() {
        let (timers, agg, handle) = service();
        timers.schedule(&agg, handle, new_job("t-1", "p-1")).unwrap();
        timers.fire(&agg, handle, "t-1").unwrap();
        timers.mark_attempt_failed(&agg, handle, "t-1").unwrap();

        let records = agg.drain(handle).unwrap();
        let tail: Vec<_> = records[records.len() - 2..]
            .iter()
            .map(|r| r.event_type())
            .collect();
        assert_eq!(
            tail,
            vec![
                RuntimeEventType::TimerRetriesDecremented,
                RuntimeEventType::TimerFailed
            ]
        );
        // 两条都携带递减后的剩余次数
        for record in &records[records.len() - 2..] {
            match record.payload() {
                EventPayload::Timer(snapshot) => assert_eq!(snapshot.retries_remaining, 2),
                other => panic!("unexpected payload {other:?}"),
            }
        }
    }

    #[test]
    fn cancel_is_allowed_from_any_non_terminal_state() {
        let (timers, agg, handle) = service();
        timers.schedule(&agg, handle, new_job("t-1", "p-1")).unwrap();
        timers.schedule(&agg, handle, new_job("t-2", "p-1")).unwrap();
        timers.fire(&agg, handle, "t-2").unwrap();
        timers.mark_executed(&agg, handle, "t-2").unwrap();

        // 非终态可取消，终态不可
        timers.cancel(&agg, handle, "t-1").unwrap();
        let err = timers.cancel(&agg, handle, "t-2").unwrap_err();
        assert!(matches!(err, AuditError::InvalidTransition { .. }));
    }

    #[test]
    fn cancel_instance_sweeps_all_pending_jobs() {
        let (timers, agg, handle) = service();
        timers.schedule(&agg, handle, new_job("t-1", "p-1")).unwrap();
        timers.schedule(&agg, handle, new_job("t-2", "p-1")).unwrap();
        timers.schedule(&agg, handle, new_job("t-3", "p-other")).unwrap();

        let cancelled = timers.cancel_instance(&agg, handle, "p-1").unwrap();
        assert_eq!(cancelled.len(), 2);
        assert_eq!(timers.state_of("t-1"), Some(TimerJobState::Cancelled));
        assert_eq!(timers.state_of("t-2"), Some(TimerJobState::Cancelled));
        // 其他实例的任务不受影响
        assert_eq!(timers.state_of("t-3"), Some(TimerJobState::Scheduled));
    }

    #[test]
    fn duplicate_schedule_is_rejected() {
        let (timers, agg, handle) = service();
        timers.schedule(&agg, handle, new_job("t-1", "p-1")).unwrap();
        let err = timers
            .schedule(&agg, handle, new_job("t-1", "p-1"))
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidTransition { .. }));
    }
}
