//! 核心编排层：错误、任务状态与任务列表、过程事件、请求意图、提示词、主控状态机

pub mod error;
pub mod events;
pub mod intent;
pub mod orchestrator;
pub mod planner;
pub mod state;
pub mod tasks;

pub use error::WeaveError;
pub use events::TaskEvent;
pub use intent::{classify_request, CanvasRequest, RequestKind};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, TaskOutcome};
pub use state::{Task, TaskId, TaskState};
pub use tasks::TaskBoard;
