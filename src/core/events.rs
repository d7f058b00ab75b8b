//! 任务过程事件：通过 broadcast 通道推送给宿主（可序列化为 JSON）

use serde::Serialize;

use crate::canvas::{ArtifactId, ExportFormat};
use crate::core::state::{TaskId, TaskState};
use crate::toolcall::Strategy;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// 阶段变化
    StateChanged { task_id: TaskId, state: TaskState },
    /// 向用户提出澄清问题
    ClarificationRequested {
        task_id: TaskId,
        question: String,
        options: Vec<String>,
    },
    /// 结构化结果已物化到画布
    BatchApplied {
        task_id: TaskId,
        strategy: Strategy,
        artifacts: Vec<ArtifactId>,
        connections: usize,
        groups: usize,
    },
    /// 回复无法解析，已创建纯文本便签
    Fallback {
        task_id: TaskId,
        artifact: Option<ArtifactId>,
        diagnostic: String,
    },
    Exported { task_id: TaskId, format: ExportFormat },
    /// 后续建议（异步到达，可能晚于 Done）
    Suggestions {
        task_id: TaskId,
        suggestions: Vec<String>,
    },
    Done { task_id: TaskId },
    /// 任务失败（每个任务至多一次）
    Failed { task_id: TaskId, error: String },
    /// 后台摘要写回
    ArtifactUpdated { artifact: ArtifactId },
    ArtifactFailed { artifact: ArtifactId, reason: String },
}

impl TaskEvent {
    /// 事件所属任务；画布元素事件返回 None
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            TaskEvent::StateChanged { task_id, .. }
            | TaskEvent::ClarificationRequested { task_id, .. }
            | TaskEvent::BatchApplied { task_id, .. }
            | TaskEvent::Fallback { task_id, .. }
            | TaskEvent::Exported { task_id, .. }
            | TaskEvent::Suggestions { task_id, .. }
            | TaskEvent::Done { task_id }
            | TaskEvent::Failed { task_id, .. } => Some(task_id),
            TaskEvent::ArtifactUpdated { .. } | TaskEvent::ArtifactFailed { .. } => None,
        }
    }
}
