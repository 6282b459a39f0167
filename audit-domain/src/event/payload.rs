use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 流程实例的运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    Created,
    Running,
    Suspended,
    Completed,
    Cancelled,
}

/// 流程实例快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub id: String,
    pub status: ProcessStatus,
}

/// 活动（BPMN 元素）快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    pub element_id: String,
    pub activity_name: Option<String>,
    pub activity_type: Option<String>,
}

/// 流程/任务变量快照，值为开放 JSON（变量内容由建模方决定）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSnapshot {
    pub name: String,
    pub value: Value,
    /// 任务局部变量为 true，流程级变量为 false
    pub task_variable: bool,
}

/// 人工任务快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub name: Option<String>,
    pub assignee: Option<String>,
}

/// 定时任务快照，`retries_remaining` 随失败重试递减
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub timer_id: String,
    pub due_at: DateTime<Utc>,
    pub retries_remaining: u32,
}

/// 外部集成（connector）调用快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSnapshot {
    pub id: String,
    pub connector_type: Option<String>,
}

/// 事件载荷：与 `RuntimeEventType` 对应类别的实体快照
///
/// 源系统将载荷表达为基类引用加运行期向下转型，这里同样收敛为封闭
/// 标签联合，载荷形态与事件类别的约定由调用方在构造时保证。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Process(ProcessSnapshot),
    Activity(ActivitySnapshot),
    SequenceFlow {
        source_activity_id: String,
        target_activity_id: String,
    },
    Variable(VariableSnapshot),
    Task(TaskSnapshot),
    Candidate {
        candidate_id: String,
        group: bool,
    },
    Signal {
        name: String,
    },
    Message {
        name: String,
        correlation_key: Option<String>,
    },
    Timer(TimerSnapshot),
    Integration(IntegrationSnapshot),
    Error {
        error_code: String,
        message: Option<String>,
    },
    None,
}
