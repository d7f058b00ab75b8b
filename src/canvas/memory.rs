//! 内存画布：同时实现渲染、澄清、导出三个协作方，供测试与演示使用
//!
//! 每个批次在一次加锁内整体写入，观察者不会看到半个批次。

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;

use crate::canvas::{
    ArtifactId, CanvasBatch, CanvasRenderer, Clarifier, ExportFormat, ExportPayload, Exporter,
};
use crate::layout::{BoundingBox, LayoutNode, NodeKind, Point};

/// 画布上的一个元素
#[derive(Debug, Clone, Serialize)]
pub struct CanvasEntry {
    pub id: ArtifactId,
    pub node: LayoutNode,
    /// 后台摘要写回的文本
    pub text: Option<String>,
    /// 元素处于错误状态时的原因
    pub error: Option<String>,
}

impl CanvasEntry {
    /// 作为请求上下文的单行描述
    fn describe(&self) -> String {
        let p = &self.node.parameters;
        let title = p
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.node.name);
        let body = self
            .text
            .as_deref()
            .or_else(|| p.get("content").and_then(|v| v.as_str()))
            .unwrap_or("");
        let kind = match self.node.kind {
            NodeKind::Card => "card",
            NodeKind::Table => "table",
            NodeKind::Slide => "slide",
            NodeKind::Note => "note",
        };
        if body.is_empty() {
            format!("[{}] {}", kind, title)
        } else {
            format!("[{}] {}: {}", kind, title, body)
        }
    }
}

#[derive(Debug, Default)]
struct CanvasState {
    entries: Vec<CanvasEntry>,
    batches: Vec<CanvasBatch>,
    focus_history: Vec<BoundingBox>,
    selected: HashSet<ArtifactId>,
    questions: Vec<(String, Vec<String>)>,
    choices: VecDeque<String>,
    exports: Vec<(ExportFormat, ExportPayload)>,
    next_id: u64,
}

/// 内存画布
#[derive(Debug, Default)]
pub struct InMemoryCanvas {
    state: Mutex<CanvasState>,
    focal: Point,
    fail_render: Option<String>,
    fail_export: Option<String>,
}

impl InMemoryCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_focal_point(mut self, focal: Point) -> Self {
        self.focal = focal;
        self
    }

    /// 之后的 apply_batch 一律失败
    pub fn with_render_failure(mut self, reason: impl Into<String>) -> Self {
        self.fail_render = Some(reason.into());
        self
    }

    pub fn with_export_failure(mut self, reason: impl Into<String>) -> Self {
        self.fail_export = Some(reason.into());
        self
    }

    /// 预置澄清选择；队列为空时选第一个候选项
    pub fn push_choice(&self, choice: impl Into<String>) {
        if let Ok(mut s) = self.state.lock() {
            s.choices.push_back(choice.into());
        }
    }

    /// 选中某个元素，使其进入 selected_items_context
    pub fn select(&self, artifact: &ArtifactId) {
        if let Ok(mut s) = self.state.lock() {
            s.selected.insert(artifact.clone());
        }
    }

    pub fn entries(&self) -> Vec<CanvasEntry> {
        self.read(|s| s.entries.clone())
    }

    pub fn entry(&self, artifact: &ArtifactId) -> Option<CanvasEntry> {
        self.read(|s| s.entries.iter().find(|e| &e.id == artifact).cloned())
    }

    pub fn batches(&self) -> Vec<CanvasBatch> {
        self.read(|s| s.batches.clone())
    }

    pub fn focus_history(&self) -> Vec<BoundingBox> {
        self.read(|s| s.focus_history.clone())
    }

    /// 已提出的澄清问题
    pub fn questions(&self) -> Vec<(String, Vec<String>)> {
        self.read(|s| s.questions.clone())
    }

    pub fn exports(&self) -> Vec<(ExportFormat, ExportPayload)> {
        self.read(|s| s.exports.clone())
    }

    fn read<T: Default>(&self, f: impl FnOnce(&CanvasState) -> T) -> T {
        self.state.lock().map(|s| f(&*s)).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, CanvasState>, String> {
        self.state
            .lock()
            .map_err(|_| "canvas state poisoned".to_string())
    }

    fn update_entry(
        &self,
        artifact: &ArtifactId,
        f: impl FnOnce(&mut CanvasEntry),
    ) -> Result<(), String> {
        let mut state = self.lock()?;
        let entry = state
            .entries
            .iter_mut()
            .find(|e| &e.id == artifact)
            .ok_or_else(|| format!("unknown artifact: {}", artifact))?;
        f(entry);
        Ok(())
    }
}

#[async_trait]
impl CanvasRenderer for InMemoryCanvas {
    async fn apply_batch(&self, batch: CanvasBatch) -> Result<Vec<ArtifactId>, String> {
        if let Some(reason) = &self.fail_render {
            return Err(reason.clone());
        }
        let mut state = self.lock()?;
        let mut ids = Vec::with_capacity(batch.nodes.len());
        for node in &batch.nodes {
            state.next_id += 1;
            let id = format!("item-{}", state.next_id);
            state.entries.push(CanvasEntry {
                id: id.clone(),
                node: node.clone(),
                text: None,
                error: None,
            });
            ids.push(id);
        }
        state.batches.push(batch);
        Ok(ids)
    }

    async fn focus(&self, bounds: BoundingBox) -> Result<(), String> {
        self.lock()?.focus_history.push(bounds);
        Ok(())
    }

    fn focal_point(&self) -> Point {
        self.focal
    }

    fn selected_items_context(&self) -> Vec<String> {
        self.read(|s| {
            s.entries
                .iter()
                .filter(|e| s.selected.contains(&e.id))
                .map(CanvasEntry::describe)
                .collect()
        })
    }

    fn all_items_context(&self) -> Vec<String> {
        self.read(|s| s.entries.iter().map(CanvasEntry::describe).collect())
    }

    async fn set_artifact_text(&self, artifact: &ArtifactId, text: &str) -> Result<(), String> {
        self.update_entry(artifact, |e| {
            e.text = Some(text.to_string());
            e.error = None;
        })
    }

    async fn mark_artifact_error(
        &self,
        artifact: &ArtifactId,
        reason: &str,
    ) -> Result<(), String> {
        self.update_entry(artifact, |e| e.error = Some(reason.to_string()))
    }
}

#[async_trait]
impl Clarifier for InMemoryCanvas {
    async fn choose(&self, question: &str, options: &[String]) -> Result<String, String> {
        let mut state = self.lock()?;
        state
            .questions
            .push((question.to_string(), options.to_vec()));
        state
            .choices
            .pop_front()
            .or_else(|| options.first().cloned())
            .ok_or_else(|| "no options to choose from".to_string())
    }
}

#[async_trait]
impl Exporter for InMemoryCanvas {
    async fn export(&self, format: ExportFormat, payload: ExportPayload) -> Result<(), String> {
        if let Some(reason) = &self.fail_export {
            return Err(reason.clone());
        }
        self.lock()?.exports.push((format, payload));
        Ok(())
    }
}
