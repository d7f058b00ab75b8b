//! 任务列表：通过 watch 通道发布快照
//!
//! 进度用 max 钳制保持单调；进入终态的任务从列表移除；被 dismiss 的任务不再接收状态更新，
//! 其记录在任务进入终态时释放。

use std::collections::HashSet;
use std::sync::Mutex;

use tokio::sync::watch;

use crate::core::state::{Task, TaskId, TaskState};

/// 可见任务列表
#[derive(Debug)]
pub struct TaskBoard {
    tx: watch::Sender<Vec<Task>>,
    dismissed: Mutex<HashSet<TaskId>>,
}

impl Default for TaskBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            tx,
            dismissed: Mutex::new(HashSet::new()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.tx.subscribe()
    }

    /// 当前可见任务
    pub fn snapshot(&self) -> Vec<Task> {
        self.tx.borrow().clone()
    }

    /// 新建任务并加入列表
    pub fn create(&self, label: impl Into<String>) -> TaskId {
        let task = Task::new(label);
        let id = task.id.clone();
        self.tx.send_modify(|tasks| tasks.push(task));
        id
    }

    /// 推进阶段；进度取 max，终态时移除
    pub fn transition(&self, id: &TaskId, state: TaskState) {
        self.update(id, state, state.status_text(), state.progress());
    }

    pub fn update(&self, id: &TaskId, state: TaskState, status_text: &str, progress: f32) {
        if state.is_terminal() {
            self.release(id);
        } else if self.is_dismissed(id) {
            return;
        }
        self.tx.send_if_modified(|tasks| {
            let Some(idx) = tasks.iter().position(|t| &t.id == id) else {
                return false;
            };
            if state.is_terminal() {
                tasks.remove(idx);
                return true;
            }
            let task = &mut tasks[idx];
            task.state = state;
            task.status_text = status_text.to_string();
            task.progress = task.progress.max(progress.clamp(0.0, 1.0));
            true
        });
    }

    /// 从列表移除并停止后续更新；进行中的调用照常完成。返回任务是否在列表中
    pub fn dismiss(&self, id: &TaskId) -> bool {
        let removed = self.tx.send_if_modified(|tasks| {
            let before = tasks.len();
            tasks.retain(|t| &t.id != id);
            tasks.len() != before
        });
        if removed {
            if let Ok(mut d) = self.dismissed.lock() {
                d.insert(id.clone());
            }
        }
        removed
    }

    fn release(&self, id: &TaskId) {
        if let Ok(mut d) = self.dismissed.lock() {
            d.remove(id);
        }
    }

    pub fn is_dismissed(&self, id: &TaskId) -> bool {
        self.dismissed
            .lock()
            .map(|d| d.contains(id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic() {
        let board = TaskBoard::new();
        let id = board.create("t");
        board.update(&id, TaskState::Parsing, "parsing", 0.6);
        board.update(&id, TaskState::Parsing, "parsing", 0.2);
        let task = &board.snapshot()[0];
        assert_eq!(task.progress, 0.6);
        assert_eq!(task.state, TaskState::Parsing);
    }

    #[test]
    fn test_terminal_state_removes_task() {
        let board = TaskBoard::new();
        let a = board.create("a");
        let b = board.create("b");
        board.transition(&a, TaskState::Done);
        let tasks = board.snapshot();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, b);
        board.transition(&b, TaskState::Error);
        assert!(board.snapshot().is_empty());
    }

    #[test]
    fn test_dismiss_stops_updates() {
        let board = TaskBoard::new();
        let id = board.create("t");
        assert!(board.dismiss(&id));
        board.transition(&id, TaskState::Executing);
        assert!(board.snapshot().is_empty());
        assert!(!board.dismiss(&id));
    }

    #[tokio::test]
    async fn test_watchers_see_changes() {
        let board = TaskBoard::new();
        let mut rx = board.subscribe();
        let id = board.create("t");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update()[0].id, id);
        board.transition(&id, TaskState::Scanning);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update()[0].state, TaskState::Scanning);
    }

    #[test]
    fn test_dismissed_record_released_on_terminal_state() {
        let board = TaskBoard::new();
        let id = board.create("t");
        assert!(board.dismiss(&id));
        assert!(board.is_dismissed(&id));

        board.transition(&id, TaskState::Parsing);
        assert!(board.snapshot().is_empty());

        board.transition(&id, TaskState::Done);
        assert!(!board.is_dismissed(&id));
        assert!(board.snapshot().is_empty());
    }

    #[test]
    fn test_dismiss_unknown_task_records_nothing() {
        let board = TaskBoard::new();
        let id = board.create("t");
        board.transition(&id, TaskState::Done);
        assert!(!board.dismiss(&id));
        assert!(!board.is_dismissed(&id));
    }
}
