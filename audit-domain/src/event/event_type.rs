use serde::{Deserialize, Serialize};

/// 生命周期事件类型（封闭标签联合）
///
/// 源系统在运行期以动态类型判断区分事件类别，这里改为封闭枚举：
/// 新增类别必须显式扩展本类型，下游匹配在编译期即可穷尽检查。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeEventType {
    ProcessCreated,
    ProcessUpdated,
    ProcessStarted,
    ProcessSuspended,
    ProcessResumed,
    ProcessCompleted,
    ProcessCancelled,
    ActivityStarted,
    ActivityCompleted,
    ActivityCancelled,
    SequenceFlowTaken,
    VariableCreated,
    VariableUpdated,
    TaskCreated,
    TaskAssigned,
    TaskUpdated,
    TaskCompleted,
    TaskCancelled,
    TaskSuspended,
    TaskActivated,
    TaskCandidateAdded,
    TaskCandidateRemoved,
    SignalReceived,
    MessageReceived,
    MessageWaiting,
    MessageSent,
    TimerScheduled,
    TimerFired,
    TimerExecuted,
    TimerRetriesDecremented,
    TimerFailed,
    TimerCancelled,
    IntegrationRequested,
    IntegrationResult,
    IntegrationError,
    ErrorReceived,
}

impl RuntimeEventType {
    /// 事件类型的线上名称（与消费方约定的稳定标识）
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeEventType::ProcessCreated => "PROCESS_CREATED",
            RuntimeEventType::ProcessUpdated => "PROCESS_UPDATED",
            RuntimeEventType::ProcessStarted => "PROCESS_STARTED",
            RuntimeEventType::ProcessSuspended => "PROCESS_SUSPENDED",
            RuntimeEventType::ProcessResumed => "PROCESS_RESUMED",
            RuntimeEventType::ProcessCompleted => "PROCESS_COMPLETED",
            RuntimeEventType::ProcessCancelled => "PROCESS_CANCELLED",
            RuntimeEventType::ActivityStarted => "ACTIVITY_STARTED",
            RuntimeEventType::ActivityCompleted => "ACTIVITY_COMPLETED",
            RuntimeEventType::ActivityCancelled => "ACTIVITY_CANCELLED",
            RuntimeEventType::SequenceFlowTaken => "SEQUENCE_FLOW_TAKEN",
            RuntimeEventType::VariableCreated => "VARIABLE_CREATED",
            RuntimeEventType::VariableUpdated => "VARIABLE_UPDATED",
            RuntimeEventType::TaskCreated => "TASK_CREATED",
            RuntimeEventType::TaskAssigned => "TASK_ASSIGNED",
            RuntimeEventType::TaskUpdated => "TASK_UPDATED",
            RuntimeEventType::TaskCompleted => "TASK_COMPLETED",
            RuntimeEventType::TaskCancelled => "TASK_CANCELLED",
            RuntimeEventType::TaskSuspended => "TASK_SUSPENDED",
            RuntimeEventType::TaskActivated => "TASK_ACTIVATED",
            RuntimeEventType::TaskCandidateAdded => "TASK_CANDIDATE_ADDED",
            RuntimeEventType::TaskCandidateRemoved => "TASK_CANDIDATE_REMOVED",
            RuntimeEventType::SignalReceived => "SIGNAL_RECEIVED",
            RuntimeEventType::MessageReceived => "MESSAGE_RECEIVED",
            RuntimeEventType::MessageWaiting => "MESSAGE_WAITING",
            RuntimeEventType::MessageSent => "MESSAGE_SENT",
            RuntimeEventType::TimerScheduled => "TIMER_SCHEDULED",
            RuntimeEventType::TimerFired => "TIMER_FIRED",
            RuntimeEventType::TimerExecuted => "TIMER_EXECUTED",
            RuntimeEventType::TimerRetriesDecremented => "TIMER_RETRIES_DECREMENTED",
            RuntimeEventType::TimerFailed => "TIMER_FAILED",
            RuntimeEventType::TimerCancelled => "TIMER_CANCELLED",
            RuntimeEventType::IntegrationRequested => "INTEGRATION_REQUESTED",
            RuntimeEventType::IntegrationResult => "INTEGRATION_RESULT",
            RuntimeEventType::IntegrationError => "INTEGRATION_ERROR",
            RuntimeEventType::ErrorReceived => "ERROR_RECEIVED",
        }
    }
}

impl std::fmt::Display for RuntimeEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
