//! 任务编排：单个请求的状态机
//!
//! 探活与上下文收集 → 可选澄清 → 调用模型（累计流式文本）→ 解析 → 布局与物化 → 后续建议。
//! 传输失败进入 Error 且不重试；解析失败不算任务失败，改为创建一张纯文本便签后进入 Done。
//! 同一任务内严格串行；多个任务可同时进行，互不加锁。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::canvas::{
    ArtifactId, CanvasBatch, CanvasRenderer, Clarifier, ExportFormat, ExportPayload, Exporter,
};
use crate::config::{AppConfig, OrchestratorSection};
use crate::core::error::WeaveError;
use crate::core::events::TaskEvent;
use crate::core::intent::{CanvasRequest, RequestKind};
use crate::core::planner::{
    append_clarification, clarification_messages, extract_question, parse_suggestions,
    request_messages, suggestion_messages, summarize_messages,
};
use crate::core::state::{Task, TaskId, TaskState};
use crate::core::tasks::TaskBoard;
use crate::layout::{LayoutEngine, LayoutNode, LayoutPlan, Point};
use crate::llm::{create_llm_from_config, LlmClient, Message};
use crate::toolcall::{classify, parse_detailed, ParseDiagnostic, Strategy, ToolCall};

/// 任务标签最大字符数
const LABEL_CHARS: usize = 48;

/// 一次请求的结果
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub kind: RequestKind,
    /// 解析命中的策略；走兜底时为 None
    pub strategy: Option<Strategy>,
    pub plan: LayoutPlan,
    /// 与 plan.nodes 一一对应
    pub artifacts: Vec<ArtifactId>,
    pub fallback: bool,
    /// 模型完整回复
    pub reply: String,
}

/// 编排器：持有注入的协作方，可被多个请求并发使用
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    renderer: Arc<dyn CanvasRenderer>,
    clarifier: Option<Arc<dyn Clarifier>>,
    exporter: Option<Arc<dyn Exporter>>,
    engine: LayoutEngine,
    cfg: OrchestratorSection,
    stream_timeout: Duration,
    board: TaskBoard,
    events: broadcast::Sender<TaskEvent>,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        renderer: Arc<dyn CanvasRenderer>,
        clarifier: Option<Arc<dyn Clarifier>>,
        exporter: Option<Arc<dyn Exporter>>,
        cfg: &AppConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(cfg.orchestrator.event_capacity.max(1));
        Self {
            llm,
            renderer,
            clarifier,
            exporter,
            engine: LayoutEngine::new(cfg.layout.clone()),
            cfg: cfg.orchestrator.clone(),
            stream_timeout: Duration::from_secs(cfg.llm.timeouts.stream),
            board: TaskBoard::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    /// 可见任务列表（进入终态或被 dismiss 的任务不在其中）
    pub fn watch_tasks(&self) -> watch::Receiver<Vec<Task>> {
        self.board.subscribe()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.board.snapshot()
    }

    /// 隐藏任务并停止其状态更新；进行中的模型调用照常完成
    pub fn dismiss(&self, task_id: &TaskId) -> bool {
        info!(task_id = %task_id, "Task dismissed");
        self.board.dismiss(task_id)
    }

    pub fn engine(&self) -> &LayoutEngine {
        &self.engine
    }

    /// 处理一个请求直到 Done 或 Error
    pub async fn run_request(&self, request: CanvasRequest) -> Result<TaskOutcome, WeaveError> {
        let kind = request.kind();
        let task_id = self.board.create(task_label(&request.text));
        info!(task_id = %task_id, kind = ?kind, "Task created");

        match self.drive(&task_id, kind, request.text).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Task failed");
                self.set_state(&task_id, TaskState::Error);
                self.emit(TaskEvent::Failed {
                    task_id: task_id.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        task_id: &TaskId,
        kind: RequestKind,
        text: String,
    ) -> Result<TaskOutcome, WeaveError> {
        self.set_state(task_id, TaskState::Scanning);
        self.check_liveness().await?;
        let context = self.collect_context();
        let focus = self.renderer.focal_point();

        let mut text = text;
        if kind.wants_clarification() && self.cfg.clarification {
            if let Some(choice) = self.clarify(task_id, &text).await {
                text = append_clarification(&text, &choice);
            }
        }

        self.set_state(task_id, TaskState::Dispatching);
        let reply = self
            .request_reply(&request_messages(kind, &text, &context))
            .await?;

        self.set_state(task_id, TaskState::Parsing);
        let parsed = parse_detailed(&reply);

        self.set_state(task_id, TaskState::Executing);
        let outcome = match parsed {
            Ok((strategy, calls)) => {
                self.execute(task_id, kind, strategy, calls, reply, focus)
                    .await?
            }
            Err(diagnostic) => self.fallback(task_id, kind, reply, diagnostic, focus).await?,
        };

        if self.cfg.suggestions {
            self.set_state(task_id, TaskState::Suggesting);
            self.spawn_suggestions(task_id.clone(), text, describe_nodes(&outcome.plan.nodes));
        }

        self.set_state(task_id, TaskState::Done);
        self.emit(TaskEvent::Done {
            task_id: task_id.clone(),
        });
        info!(task_id = %task_id, fallback = outcome.fallback, "Task done");
        Ok(outcome)
    }

    /// 探活，超过 probe_timeout_ms 视为传输失败
    pub async fn check_liveness(&self) -> Result<(), WeaveError> {
        let limit = Duration::from_millis(self.cfg.probe_timeout_ms);
        match tokio::time::timeout(limit, self.llm.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(WeaveError::Transport(e)),
            Err(_) => Err(WeaveError::Transport(format!(
                "liveness probe timed out after {}ms",
                self.cfg.probe_timeout_ms
            ))),
        }
    }

    /// 选中元素优先，否则使用全部元素
    fn collect_context(&self) -> Vec<String> {
        let selected = self.renderer.selected_items_context();
        if selected.is_empty() {
            self.renderer.all_items_context()
        } else {
            selected
        }
    }

    /// 澄清轮：任何失败都只跳过本轮
    async fn clarify(&self, task_id: &TaskId, text: &str) -> Option<String> {
        let clarifier = self.clarifier.as_ref()?;
        self.set_state(task_id, TaskState::Clarifying);

        let reply = match self.llm.complete(&clarification_messages(text)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Clarification check failed, skipping");
                return None;
            }
        };
        let Some(question) = extract_question(&reply) else {
            debug!(task_id = %task_id, "No clarification needed");
            return None;
        };

        self.emit(TaskEvent::ClarificationRequested {
            task_id: task_id.clone(),
            question: question.question.clone(),
            options: question.options.clone(),
        });
        match clarifier.choose(&question.question, &question.options).await {
            Ok(choice) if !choice.trim().is_empty() => {
                info!(task_id = %task_id, choice = %choice, "Clarification answered");
                Some(choice)
            }
            Ok(_) => None,
            Err(e) => {
                let err = WeaveError::Clarification(e);
                warn!(task_id = %task_id, error = %err, "Skipping clarification");
                None
            }
        }
    }

    /// 读取完整流式回复；只解析累计后的最终文本。超时只约束相邻两块之间的等待
    async fn request_reply(&self, messages: &[Message]) -> Result<String, WeaveError> {
        let mut stream = self
            .within_stream_timeout(self.llm.complete_stream(messages))
            .await?
            .map_err(WeaveError::Transport)?;
        let mut reply = String::new();
        while let Some(chunk) = self.within_stream_timeout(stream.next()).await? {
            reply.push_str(&chunk.map_err(WeaveError::Transport)?);
        }
        Ok(reply)
    }

    async fn within_stream_timeout<F: Future>(&self, fut: F) -> Result<F::Output, WeaveError> {
        tokio::time::timeout(self.stream_timeout, fut)
            .await
            .map_err(|_| {
                WeaveError::TimeoutExceeded(format!(
                    "no model output for {}s",
                    self.stream_timeout.as_secs()
                ))
            })
    }

    async fn execute(
        &self,
        task_id: &TaskId,
        kind: RequestKind,
        strategy: Strategy,
        calls: Vec<ToolCall>,
        reply: String,
        focus: Point,
    ) -> Result<TaskOutcome, WeaveError> {
        let buckets = classify(calls);
        if !buckets.questions.is_empty() {
            debug!(
                task_id = %task_id,
                count = buckets.questions.len(),
                "Question operations outside the clarification round are ignored"
            );
        }
        if !buckets.unknown.is_empty() {
            debug!(task_id = %task_id, count = buckets.unknown.len(), "Unknown operations ignored");
        }
        if buckets.placeable_count() == 0 {
            let diagnostic = ParseDiagnostic {
                input_len: reply.len(),
                marker_count: 0,
                attempted: vec![strategy],
                message: "reply contained no placeable operations".to_string(),
            };
            return self.fallback(task_id, kind, reply, diagnostic, focus).await;
        }

        let plan = self.engine.layout(&buckets, focus);
        let artifacts = self.apply(&plan).await?;
        info!(
            task_id = %task_id,
            strategy = %strategy,
            nodes = plan.nodes.len(),
            connections = plan.connections.len(),
            groups = plan.groups.len(),
            "Batch applied"
        );
        self.emit(TaskEvent::BatchApplied {
            task_id: task_id.clone(),
            strategy,
            artifacts: artifacts.clone(),
            connections: plan.connections.len(),
            groups: plan.groups.len(),
        });

        if let RequestKind::Export(format) = kind {
            self.export(task_id, format, &plan.nodes).await;
        }

        Ok(TaskOutcome {
            task_id: task_id.clone(),
            kind,
            strategy: Some(strategy),
            plan,
            artifacts,
            fallback: false,
            reply,
        })
    }

    /// 纯文本兜底：整段回复放进一张便签
    async fn fallback(
        &self,
        task_id: &TaskId,
        kind: RequestKind,
        reply: String,
        diagnostic: ParseDiagnostic,
        focus: Point,
    ) -> Result<TaskOutcome, WeaveError> {
        warn!(task_id = %task_id, diagnostic = %diagnostic, "Falling back to a plain-text note");
        let plan = self.engine.fallback_note(&reply, focus);
        let artifacts = self.apply(&plan).await?;
        self.emit(TaskEvent::Fallback {
            task_id: task_id.clone(),
            artifact: artifacts.first().cloned(),
            diagnostic: diagnostic.to_string(),
        });
        Ok(TaskOutcome {
            task_id: task_id.clone(),
            kind,
            strategy: None,
            plan,
            artifacts,
            fallback: true,
            reply,
        })
    }

    /// 整批交给渲染器，随后把视口移到新内容上（移动失败只记日志）
    async fn apply(&self, plan: &LayoutPlan) -> Result<Vec<ArtifactId>, WeaveError> {
        let batch = CanvasBatch::from(plan.clone());
        debug!(batch = %batch.summary(), "Applying batch");
        let artifacts = self
            .renderer
            .apply_batch(batch)
            .await
            .map_err(WeaveError::Render)?;
        if artifacts.len() != plan.nodes.len() {
            return Err(WeaveError::Internal(format!(
                "renderer returned {} artifacts for {} nodes",
                artifacts.len(),
                plan.nodes.len()
            )));
        }
        if let Some(bounds) = plan.bounds {
            if let Err(e) = self.renderer.focus(bounds).await {
                warn!(error = %e, "Focus failed");
            }
        }
        Ok(artifacts)
    }

    /// 导出失败不影响任务结果
    async fn export(&self, task_id: &TaskId, format: ExportFormat, nodes: &[LayoutNode]) {
        let Some(exporter) = &self.exporter else {
            warn!(task_id = %task_id, "Export requested but no exporter is configured");
            return;
        };
        let payload = ExportPayload::from_nodes(nodes);
        if payload.is_empty() {
            warn!(task_id = %task_id, "Nothing to export: no tables or slides were placed");
            return;
        }
        match exporter.export(format, payload).await {
            Ok(()) => {
                info!(task_id = %task_id, format = format.as_str(), "Exported");
                self.emit(TaskEvent::Exported {
                    task_id: task_id.clone(),
                    format,
                });
            }
            Err(e) => {
                let err = WeaveError::Export(e);
                warn!(task_id = %task_id, error = %err, "Export failed");
            }
        }
    }

    /// 后续建议：不等待，结果以 TaskEvent::Suggestions 到达
    fn spawn_suggestions(&self, task_id: TaskId, text: String, placed: Vec<String>) {
        let llm = self.llm.clone();
        let events = self.events.clone();
        let max = self.cfg.max_suggestions;
        tokio::spawn(async move {
            match llm.complete(&suggestion_messages(&text, &placed, max)).await {
                Ok(reply) => {
                    let suggestions = parse_suggestions(&reply, max);
                    if suggestions.is_empty() {
                        debug!(task_id = %task_id, "No suggestions in reply");
                        return;
                    }
                    let _ = events.send(TaskEvent::Suggestions {
                        task_id,
                        suggestions,
                    });
                }
                Err(e) => debug!(task_id = %task_id, error = %e, "Suggestion request failed"),
            }
        });
    }

    /// 后台摘要：超过安全超时或传输失败时把元素标为错误
    pub fn summarize_in_background(&self, artifact: ArtifactId, text: String) -> JoinHandle<()> {
        let llm = self.llm.clone();
        let renderer = self.renderer.clone();
        let events = self.events.clone();
        let secs = self.cfg.summarize_timeout_secs;

        tokio::spawn(async move {
            let messages = summarize_messages(&text);
            let call = llm.complete(&messages);
            let result = match tokio::time::timeout(Duration::from_secs(secs), call).await {
                Ok(Ok(summary)) => Ok(summary),
                Ok(Err(e)) => Err(WeaveError::Transport(e)),
                Err(_) => Err(WeaveError::TimeoutExceeded(format!(
                    "summarization exceeded {}s",
                    secs
                ))),
            };

            match result {
                Ok(summary) => match renderer.set_artifact_text(&artifact, summary.trim()).await {
                    Ok(()) => {
                        let _ = events.send(TaskEvent::ArtifactUpdated { artifact });
                    }
                    Err(e) => {
                        let err = WeaveError::Render(e);
                        warn!(artifact = %artifact, error = %err, "Summary not written");
                    }
                },
                Err(err) => {
                    warn!(artifact = %artifact, error = %err, "Summarization failed");
                    let reason = err.to_string();
                    if let Err(e) = renderer.mark_artifact_error(&artifact, &reason).await {
                        warn!(artifact = %artifact, error = %e, "Could not mark artifact");
                    }
                    let _ = events.send(TaskEvent::ArtifactFailed { artifact, reason });
                }
            }
        })
    }

    /// 被 dismiss 的任务不再推送状态；进入终态时仍通知任务列表以释放其记录
    fn set_state(&self, task_id: &TaskId, state: TaskState) {
        if self.board.is_dismissed(task_id) {
            if state.is_terminal() {
                self.board.transition(task_id, state);
            }
            return;
        }
        debug!(task_id = %task_id, state = ?state, "State transition");
        self.board.transition(task_id, state);
        self.emit(TaskEvent::StateChanged {
            task_id: task_id.clone(),
            state,
        });
    }

    fn emit(&self, event: TaskEvent) {
        let _ = self.events.send(event);
    }
}

/// 构建器：渲染器必填，其余协作方可选；未指定 LLM 时按配置创建
pub struct OrchestratorBuilder {
    config: AppConfig,
    renderer: Arc<dyn CanvasRenderer>,
    llm: Option<Arc<dyn LlmClient>>,
    clarifier: Option<Arc<dyn Clarifier>>,
    exporter: Option<Arc<dyn Exporter>>,
}

impl OrchestratorBuilder {
    pub fn new(renderer: Arc<dyn CanvasRenderer>) -> Self {
        Self {
            config: AppConfig::default(),
            renderer,
            llm: None,
            clarifier: None,
            exporter: None,
        }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_clarifier(mut self, clarifier: Arc<dyn Clarifier>) -> Self {
        self.clarifier = Some(clarifier);
        self
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn build(self) -> Orchestrator {
        let llm = self
            .llm
            .unwrap_or_else(|| create_llm_from_config(&self.config));
        Orchestrator::new(
            llm,
            self.renderer,
            self.clarifier,
            self.exporter,
            &self.config,
        )
    }
}

/// 请求文本的首行，截断到 LABEL_CHARS 个字符
fn task_label(text: &str) -> String {
    let first = text.trim().lines().next().unwrap_or("").trim();
    if first.chars().count() > LABEL_CHARS {
        let cut: String = first.chars().take(LABEL_CHARS).collect();
        format!("{}…", cut)
    } else {
        first.to_string()
    }
}

/// 放置结果的单行描述，供后续建议使用
fn describe_nodes(nodes: &[LayoutNode]) -> Vec<String> {
    nodes
        .iter()
        .map(|n| {
            let title = n
                .parameters
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or(&n.name);
            format!("- {:?} {}", n.kind, title)
        })
        .collect()
}
