//! Weave - 工具调用解析与画布空间布局引擎
//!
//! 模块划分：
//! - **toolcall**: 恢复式解析器（七级策略阶梯）、修复通道、操作注册表
//! - **layout**: 网格 / 拓扑分层布局、表格幻灯片追加、连线与分组解析
//! - **core**: 任务状态机、任务列表、事件、请求意图与提示词
//! - **canvas**: 渲染 / 澄清 / 导出协作方 trait 与内存画布
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **config**: 应用配置加载（TOML + 环境变量）

pub mod canvas;
pub mod config;
pub mod core;
pub mod layout;
pub mod llm;
pub mod observability;
pub mod toolcall;

pub use crate::core::{CanvasRequest, Orchestrator, OrchestratorBuilder, RequestKind, WeaveError};
pub use layout::{LayoutEngine, LayoutPlan};
pub use toolcall::{parse, ParseResult, ToolCall};
