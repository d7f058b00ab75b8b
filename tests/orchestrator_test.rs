//! 编排器集成测试：内存画布 + Mock LLM 走完整个状态机

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use weave::canvas::{ArtifactId, CanvasBatch, CanvasRenderer, ExportFormat, InMemoryCanvas};
use weave::config::AppConfig;
use weave::core::{TaskEvent, TaskState};
use weave::layout::{BoundingBox, LayoutEngine, NodeKind, Point, FALLBACK_NOTE_NAME};
use weave::llm::MockLlmClient;
use weave::toolcall::Strategy;
use weave::{CanvasRequest, Orchestrator, OrchestratorBuilder, RequestKind, WeaveError};

const TWO_CARDS: &str = r#"[{"operation":"card","parameters":{"name":"Moon","title":"Moon"}},{"operation":"card","parameters":{"name":"Tides","title":"Tides"}},{"operation":"connection","parameters":{"from":"Moon","to":"Tides"}}]"#;

fn quiet_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.orchestrator.suggestions = false;
    cfg
}

fn build(cfg: AppConfig, llm: Arc<MockLlmClient>, canvas: Arc<InMemoryCanvas>) -> Orchestrator {
    OrchestratorBuilder::new(canvas.clone())
        .with_config(cfg)
        .with_llm(llm)
        .with_clarifier(canvas.clone())
        .with_exporter(canvas)
        .build()
}

fn drain(rx: &mut broadcast::Receiver<TaskEvent>) -> Vec<TaskEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn states(events: &[TaskEvent]) -> Vec<TaskState> {
    events
        .iter()
        .filter_map(|e| match e {
            TaskEvent::StateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_slides_request_skips_clarification() {
    let canvas = Arc::new(InMemoryCanvas::new());
    let llm = Arc::new(MockLlmClient::with_replies([TWO_CARDS]));
    let orch = build(quiet_config(), llm.clone(), canvas.clone());
    let mut rx = orch.subscribe();

    let outcome = orch
        .run_request(CanvasRequest::new("Make slides about tides"))
        .await
        .unwrap();

    assert_eq!(outcome.kind, RequestKind::Slides);
    assert_eq!(outcome.strategy, Some(Strategy::Direct));
    assert_eq!(outcome.artifacts.len(), 2);
    assert_eq!(outcome.plan.connections.len(), 1);
    assert_eq!(llm.requests().len(), 1);
    assert!(canvas.questions().is_empty());

    let events = drain(&mut rx);
    assert_eq!(
        states(&events),
        vec![
            TaskState::Scanning,
            TaskState::Dispatching,
            TaskState::Parsing,
            TaskState::Executing,
            TaskState::Done,
        ]
    );
    assert!(events
        .iter()
        .any(|e| matches!(e, TaskEvent::BatchApplied { strategy: Strategy::Direct, .. })));
    assert!(orch.tasks().is_empty());
    assert_eq!(canvas.focus_history().len(), 1);
}

#[tokio::test]
async fn test_open_ended_request_appends_clarification() {
    let canvas = Arc::new(InMemoryCanvas::new());
    canvas.push_choice("For kids");
    let question = r#"[{"operation":"question","parameters":{"question":"Who is it for?","options":["For kids","For sailors"]}}]"#;
    let llm = Arc::new(MockLlmClient::with_replies([question, TWO_CARDS]));
    let orch = build(quiet_config(), llm.clone(), canvas.clone());
    let mut rx = orch.subscribe();

    let outcome = orch
        .run_request(CanvasRequest::new("Explain tides"))
        .await
        .unwrap();

    assert!(!outcome.fallback);
    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1], "Explain tides\n\nClarification: For kids");
    assert_eq!(
        canvas.questions(),
        vec![(
            "Who is it for?".to_string(),
            vec!["For kids".to_string(), "For sailors".to_string()]
        )]
    );

    let events = drain(&mut rx);
    assert!(states(&events).contains(&TaskState::Clarifying));
    assert!(events
        .iter()
        .any(|e| matches!(e, TaskEvent::ClarificationRequested { .. })));
}

#[tokio::test]
async fn test_clarification_without_question_is_skipped() {
    let canvas = Arc::new(InMemoryCanvas::new());
    let llm = Arc::new(MockLlmClient::with_replies(["[]", TWO_CARDS]));
    let orch = build(quiet_config(), llm.clone(), canvas.clone());

    orch.run_request(CanvasRequest::new("Explain tides"))
        .await
        .unwrap();
    assert_eq!(llm.requests()[1], "Explain tides");
    assert!(canvas.questions().is_empty());
}

#[tokio::test]
async fn test_unparseable_reply_becomes_note() {
    let canvas = Arc::new(InMemoryCanvas::new().with_focal_point(Point::new(0.0, 0.0)));
    let llm = Arc::new(MockLlmClient::with_replies([
        "Tides are caused mostly by the moon's gravity.",
    ]));
    let orch = build(quiet_config(), llm, canvas.clone());
    let mut rx = orch.subscribe();

    let outcome = orch
        .run_request(CanvasRequest::new("tides").with_kind(RequestKind::Slides))
        .await
        .unwrap();

    assert!(outcome.fallback);
    assert_eq!(outcome.strategy, None);
    let entries = canvas.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].node.kind, NodeKind::Note);
    assert_eq!(entries[0].node.name, FALLBACK_NOTE_NAME);
    assert_eq!(
        entries[0].node.parameters["content"],
        "Tides are caused mostly by the moon's gravity."
    );

    let events = drain(&mut rx);
    let fallbacks = events
        .iter()
        .filter(|e| matches!(e, TaskEvent::Fallback { .. }))
        .count();
    assert_eq!(fallbacks, 1);
    assert!(!events.iter().any(|e| matches!(e, TaskEvent::Failed { .. })));
    assert_eq!(states(&events).last(), Some(&TaskState::Done));
}

#[tokio::test]
async fn test_transport_failure_ends_in_error_without_retry() {
    let canvas = Arc::new(InMemoryCanvas::new());
    let llm = Arc::new(MockLlmClient::new());
    llm.push_failure("HTTP 502");
    let orch = build(quiet_config(), llm.clone(), canvas.clone());
    let mut rx = orch.subscribe();

    let err = orch
        .run_request(CanvasRequest::new("tides").with_kind(RequestKind::Slides))
        .await
        .unwrap_err();

    assert_eq!(err, WeaveError::Transport("HTTP 502".to_string()));
    assert_eq!(llm.requests().len(), 1);
    assert!(canvas.batches().is_empty());

    let events = drain(&mut rx);
    let failures = events
        .iter()
        .filter(|e| matches!(e, TaskEvent::Failed { .. }))
        .count();
    assert_eq!(failures, 1);
    assert_eq!(states(&events).last(), Some(&TaskState::Error));
    assert!(orch.tasks().is_empty());
}

#[tokio::test]
async fn test_slow_probe_is_transport_failure() {
    let mut cfg = quiet_config();
    cfg.orchestrator.probe_timeout_ms = 20;
    let canvas = Arc::new(InMemoryCanvas::new());
    let llm = Arc::new(MockLlmClient::with_replies([TWO_CARDS]).with_delay(Duration::from_millis(300)));
    let orch = build(cfg, llm.clone(), canvas.clone());

    let err = orch.check_liveness().await.unwrap_err();
    assert!(matches!(err, WeaveError::Transport(_)));

    let err = orch
        .run_request(CanvasRequest::new("tides").with_kind(RequestKind::Slides))
        .await
        .unwrap_err();
    assert!(matches!(err, WeaveError::Transport(_)));
    assert!(llm.requests().is_empty());
}

#[tokio::test]
async fn test_context_prefers_selection() {
    let canvas = Arc::new(InMemoryCanvas::new());
    let llm = Arc::new(MockLlmClient::with_replies([TWO_CARDS, TWO_CARDS]));
    let orch = build(quiet_config(), llm.clone(), canvas.clone());

    let first = orch
        .run_request(CanvasRequest::new("tides").with_kind(RequestKind::Slides))
        .await
        .unwrap();
    canvas.select(&first.artifacts[1]);
    orch.run_request(CanvasRequest::new("more").with_kind(RequestKind::Slides))
        .await
        .unwrap();

    let second = &llm.requests()[1];
    assert!(second.contains("[card] Tides"));
    assert!(!second.contains("[card] Moon"));
    assert!(second.ends_with("more"));
}

#[tokio::test]
async fn test_suggestions_arrive_after_done() {
    let mut cfg = AppConfig::default();
    cfg.orchestrator.max_suggestions = 2;
    let canvas = Arc::new(InMemoryCanvas::new());
    let llm = Arc::new(MockLlmClient::with_replies([
        TWO_CARDS,
        r#"["Add a tide table", "Compare with Mars", "Quiz me"]"#,
    ]));
    let orch = build(cfg, llm, canvas);
    let mut rx = orch.subscribe();

    orch.run_request(CanvasRequest::new("tides").with_kind(RequestKind::Slides))
        .await
        .unwrap();

    let suggestions = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(TaskEvent::Suggestions { suggestions, .. }) => return suggestions,
                Ok(_) => continue,
                Err(e) => panic!("event channel closed: {e}"),
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(suggestions, vec!["Add a tide table", "Compare with Mars"]);
}

#[tokio::test]
async fn test_export_request_hands_tables_to_exporter() {
    let canvas = Arc::new(InMemoryCanvas::new());
    let reply = r#"[{"operation":"table","parameters":{"name":"Ports","headers":["Port","Range"],"rows":[["Brest",7.5]]}},{"operation":"slide","parameters":{"title":"Tides","slides":[{"title":"Why"}]}}]"#;
    let llm = Arc::new(MockLlmClient::with_replies([reply]));
    let orch = build(quiet_config(), llm, canvas.clone());

    let outcome = orch
        .run_request(CanvasRequest::new("Export the tide tables to Excel"))
        .await
        .unwrap();

    assert_eq!(outcome.kind, RequestKind::Export(ExportFormat::Xlsx));
    let exports = canvas.exports();
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].0, ExportFormat::Xlsx);
    assert_eq!(exports[0].1.tables.len(), 1);
    assert_eq!(exports[0].1.slides.len(), 1);
}

#[tokio::test]
async fn test_export_failure_does_not_fail_task() {
    let canvas = Arc::new(InMemoryCanvas::new().with_export_failure("disk full"));
    let reply = r#"[{"operation":"table","parameters":{"name":"Ports","headers":["Port"],"rows":[]}}]"#;
    let llm = Arc::new(MockLlmClient::with_replies([reply]));
    let orch = build(quiet_config(), llm, canvas.clone());

    let outcome = orch
        .run_request(CanvasRequest::new("export as pdf"))
        .await
        .unwrap();
    assert!(!outcome.fallback);
    assert!(canvas.exports().is_empty());
    assert_eq!(canvas.entries().len(), 1);
}

#[tokio::test]
async fn test_render_failure_is_task_error() {
    let canvas = Arc::new(InMemoryCanvas::new().with_render_failure("surface closed"));
    let llm = Arc::new(MockLlmClient::with_replies([TWO_CARDS]));
    let orch = build(quiet_config(), llm, canvas);

    let err = orch
        .run_request(CanvasRequest::new("tides").with_kind(RequestKind::Slides))
        .await
        .unwrap_err();
    assert_eq!(err, WeaveError::Render("surface closed".to_string()));
}

async fn seeded_artifact(canvas: &InMemoryCanvas) -> String {
    let plan = LayoutEngine::default().fallback_note("a long note", Point::default());
    canvas
        .apply_batch(CanvasBatch::from(plan))
        .await
        .unwrap()
        .remove(0)
}

#[tokio::test]
async fn test_background_summary_updates_artifact() {
    let canvas = Arc::new(InMemoryCanvas::new());
    let artifact = seeded_artifact(&canvas).await;
    let llm = Arc::new(MockLlmClient::with_replies(["  A short summary. "]));
    let orch = build(quiet_config(), llm, canvas.clone());
    let mut rx = orch.subscribe();

    orch.summarize_in_background(artifact.clone(), "a long note".into())
        .await
        .unwrap();

    let entry = canvas.entry(&artifact).unwrap();
    assert_eq!(entry.text.as_deref(), Some("A short summary."));
    assert!(entry.error.is_none());
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, TaskEvent::ArtifactUpdated { .. })));
}

#[tokio::test]
async fn test_background_summary_timeout_marks_error() {
    let mut cfg = quiet_config();
    cfg.orchestrator.summarize_timeout_secs = 1;
    let canvas = Arc::new(InMemoryCanvas::new());
    let artifact = seeded_artifact(&canvas).await;
    let llm = Arc::new(MockLlmClient::with_replies(["late"]).with_delay(Duration::from_secs(3)));
    let orch = build(cfg, llm, canvas.clone());

    orch.summarize_in_background(artifact.clone(), "a long note".into())
        .await
        .unwrap();

    let entry = canvas.entry(&artifact).unwrap();
    assert!(entry.text.is_none());
    assert!(entry.error.unwrap().contains("Timeout exceeded"));
}

#[tokio::test]
async fn test_background_summary_transport_failure_marks_error() {
    let canvas = Arc::new(InMemoryCanvas::new());
    let artifact = seeded_artifact(&canvas).await;
    let llm = Arc::new(MockLlmClient::new());
    llm.push_failure("HTTP 500");
    let orch = build(quiet_config(), llm, canvas.clone());

    orch.summarize_in_background(artifact.clone(), "text".into())
        .await
        .unwrap();
    assert!(canvas
        .entry(&artifact)
        .unwrap()
        .error
        .unwrap()
        .contains("HTTP 500"));
}

#[tokio::test]
async fn test_dismissed_task_still_completes() {
    let canvas = Arc::new(InMemoryCanvas::new());
    let llm = Arc::new(MockLlmClient::with_replies([TWO_CARDS]).with_delay(Duration::from_millis(100)));
    let orch = Arc::new(build(quiet_config(), llm, canvas.clone()));
    let mut tasks = orch.watch_tasks();

    let runner = {
        let orch = orch.clone();
        tokio::spawn(async move {
            orch.run_request(CanvasRequest::new("tides").with_kind(RequestKind::Slides))
                .await
        })
    };

    let task_id = loop {
        tasks.changed().await.unwrap();
        if let Some(task) = tasks.borrow_and_update().first() {
            break task.id.clone();
        }
    };
    assert!(orch.dismiss(&task_id));
    assert!(orch.tasks().is_empty());

    let outcome = runner.await.unwrap().unwrap();
    assert_eq!(outcome.task_id, task_id);
    assert_eq!(canvas.entries().len(), 2);
    assert!(orch.tasks().is_empty());
}

#[tokio::test]
async fn test_concurrent_tasks_are_independent() {
    let canvas = Arc::new(InMemoryCanvas::new());
    let llm = Arc::new(MockLlmClient::with_replies([TWO_CARDS, TWO_CARDS]));
    let orch = build(quiet_config(), llm, canvas.clone());

    let (a, b) = tokio::join!(
        orch.run_request(CanvasRequest::new("one").with_kind(RequestKind::Slides)),
        orch.run_request(CanvasRequest::new("two").with_kind(RequestKind::Slides)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.task_id, b.task_id);
    assert_eq!(canvas.batches().len(), 2);
    assert_eq!(canvas.entries().len(), 4);
}

#[tokio::test]
async fn test_steady_stream_longer_than_limit_completes() {
    let mut cfg = quiet_config();
    cfg.llm.timeouts.stream = 1;
    let canvas = Arc::new(InMemoryCanvas::new());
    let llm = Arc::new(
        MockLlmClient::with_replies([TWO_CARDS])
            .with_chunk_chars(50)
            .with_chunk_delay(Duration::from_millis(300)),
    );
    let orch = build(cfg, llm, canvas.clone());

    let started = std::time::Instant::now();
    let outcome = orch
        .run_request(CanvasRequest::new("tides").with_kind(RequestKind::Slides))
        .await
        .unwrap();
    assert!(started.elapsed() > Duration::from_secs(1));
    assert_eq!(outcome.strategy, Some(Strategy::Direct));
    assert_eq!(canvas.entries().len(), 2);
}

#[tokio::test]
async fn test_stalled_stream_times_out() {
    let mut cfg = quiet_config();
    cfg.llm.timeouts.stream = 1;
    let canvas = Arc::new(InMemoryCanvas::new());
    let llm = Arc::new(
        MockLlmClient::with_replies([TWO_CARDS]).with_chunk_delay(Duration::from_millis(1500)),
    );
    let orch = build(cfg, llm, canvas.clone());
    let mut rx = orch.subscribe();

    let err = orch
        .run_request(CanvasRequest::new("tides").with_kind(RequestKind::Slides))
        .await
        .unwrap_err();
    assert!(matches!(err, WeaveError::TimeoutExceeded(_)));
    assert!(canvas.entries().is_empty());
    let failed = drain(&mut rx)
        .iter()
        .filter(|e| matches!(e, TaskEvent::Failed { .. }))
        .count();
    assert_eq!(failed, 1);
}

/// 只返回第一个元素 id 的渲染器
struct ShortRenderer(InMemoryCanvas);

#[async_trait]
impl CanvasRenderer for ShortRenderer {
    async fn apply_batch(&self, batch: CanvasBatch) -> Result<Vec<ArtifactId>, String> {
        let mut ids = self.0.apply_batch(batch).await?;
        ids.truncate(1);
        Ok(ids)
    }

    async fn focus(&self, bounds: BoundingBox) -> Result<(), String> {
        self.0.focus(bounds).await
    }

    fn focal_point(&self) -> Point {
        self.0.focal_point()
    }

    fn selected_items_context(&self) -> Vec<String> {
        self.0.selected_items_context()
    }

    fn all_items_context(&self) -> Vec<String> {
        self.0.all_items_context()
    }

    async fn set_artifact_text(&self, artifact: &ArtifactId, text: &str) -> Result<(), String> {
        self.0.set_artifact_text(artifact, text).await
    }

    async fn mark_artifact_error(&self, artifact: &ArtifactId, reason: &str) -> Result<(), String> {
        self.0.mark_artifact_error(artifact, reason).await
    }
}

#[tokio::test]
async fn test_artifact_count_mismatch_is_internal_error() {
    let llm = Arc::new(MockLlmClient::with_replies([TWO_CARDS]));
    let orch = OrchestratorBuilder::new(Arc::new(ShortRenderer(InMemoryCanvas::new())))
        .with_config(quiet_config())
        .with_llm(llm)
        .build();
    let mut rx = orch.subscribe();

    let err = orch
        .run_request(CanvasRequest::new("tides").with_kind(RequestKind::Slides))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WeaveError::Internal("renderer returned 1 artifacts for 2 nodes".to_string())
    );
    assert!(states(&drain(&mut rx)).ends_with(&[TaskState::Error]));
}
