//! 任务状态机定义
//!
//! Idle → Scanning → Clarifying(可选) → Dispatching → Parsing → Executing → Suggesting → Done，
//! 任一阶段可进入 Error。Done 与 Error 为终态。

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 任务 id（uuid v4 字符串）
pub type TaskId = String;

/// 任务阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Idle,
    /// 探活并收集画布上下文
    Scanning,
    /// 等待用户回答澄清问题（无超时）
    Clarifying,
    /// 调用模型并读取流
    Dispatching,
    Parsing,
    /// 布局并物化到画布
    Executing,
    /// 后续建议（不等待结果）
    Suggesting,
    Done,
    Error,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Error)
    }

    /// 进入该阶段时的默认进度
    pub fn progress(&self) -> f32 {
        match self {
            TaskState::Idle => 0.0,
            TaskState::Scanning => 0.1,
            TaskState::Clarifying => 0.2,
            TaskState::Dispatching => 0.3,
            TaskState::Parsing => 0.6,
            TaskState::Executing => 0.8,
            TaskState::Suggesting => 0.95,
            TaskState::Done | TaskState::Error => 1.0,
        }
    }

    /// 任务列表中显示的状态文本
    pub fn status_text(&self) -> &'static str {
        match self {
            TaskState::Idle => "Queued",
            TaskState::Scanning => "Reading canvas",
            TaskState::Clarifying => "Waiting for your answer",
            TaskState::Dispatching => "Asking the model",
            TaskState::Parsing => "Reading the reply",
            TaskState::Executing => "Placing items",
            TaskState::Suggesting => "Thinking about next steps",
            TaskState::Done => "Done",
            TaskState::Error => "Failed",
        }
    }
}

/// 任务列表中的一项
#[derive(Clone, Debug, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub label: String,
    pub status_text: String,
    /// [0, 1]，单调不减
    pub progress: f32,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.into(),
            status_text: TaskState::Idle.status_text().to_string(),
            progress: 0.0,
            state: TaskState::Idle,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Done.is_terminal());
        assert!(TaskState::Error.is_terminal());
        assert!(!TaskState::Suggesting.is_terminal());
    }

    #[test]
    fn test_progress_is_ordered() {
        let order = [
            TaskState::Idle,
            TaskState::Scanning,
            TaskState::Clarifying,
            TaskState::Dispatching,
            TaskState::Parsing,
            TaskState::Executing,
            TaskState::Suggesting,
            TaskState::Done,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].progress() < pair[1].progress());
        }
    }

    #[test]
    fn test_new_task() {
        let task = Task::new("Explain photosynthesis");
        assert_eq!(task.state, TaskState::Idle);
        assert_eq!(task.progress, 0.0);
        assert!(!task.id.is_empty());
    }
}
