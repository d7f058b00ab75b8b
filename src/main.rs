//! weave 演示程序
//!
//! 从文件（或标准输入）读取一段模型回复，交给编排器走完解析 → 分类 → 布局 → 物化，
//! 在内存画布上执行后把布局结果以 JSON 打印到标准输出。
//!
//! 用法：weave [回复文件]，省略或为 `-` 时读标准输入。

use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use weave::canvas::InMemoryCanvas;
use weave::config::load_config;
use weave::llm::MockLlmClient;
use weave::{observability, CanvasRequest, OrchestratorBuilder, RequestKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let reply = match std::env::args().nth(1).filter(|a| a != "-") {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read reply from {}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read reply from stdin")?;
            buf
        }
    };

    let mut cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        Default::default()
    });
    // 回复已给定：不做澄清与后续建议
    cfg.orchestrator.clarification = false;
    cfg.orchestrator.suggestions = false;

    let canvas = Arc::new(InMemoryCanvas::new());
    let orchestrator = OrchestratorBuilder::new(canvas.clone())
        .with_config(cfg)
        .with_llm(Arc::new(MockLlmClient::with_replies([reply])))
        .with_exporter(canvas.clone())
        .build();

    let outcome = orchestrator
        .run_request(CanvasRequest::new("weave demo").with_kind(RequestKind::OpenEnded))
        .await
        .context("Request failed")?;

    let report = serde_json::json!({
        "strategy": outcome.strategy,
        "fallback": outcome.fallback,
        "artifacts": outcome.artifacts,
        "plan": outcome.plan,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize plan")?
    );
    Ok(())
}
