//! 物化批次与导出载荷

use serde::Serialize;

use crate::layout::{BoundingBox, LayoutNode, LayoutPlan, NodeKind, ResolvedConnection, ResolvedGroup};
use crate::toolcall::{SlideParams, TableParams};

/// 画布元素 id（由渲染器分配）
pub type ArtifactId = String;

/// 一次原子应用到画布的全部元素
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanvasBatch {
    pub nodes: Vec<LayoutNode>,
    pub connections: Vec<ResolvedConnection>,
    pub groups: Vec<ResolvedGroup>,
    pub bounds: Option<BoundingBox>,
}

impl CanvasBatch {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.connections.is_empty() && self.groups.is_empty()
    }

    /// 一行摘要，用于日志
    pub fn summary(&self) -> String {
        format!(
            "{} nodes, {} connections, {} groups",
            self.nodes.len(),
            self.connections.len(),
            self.groups.len()
        )
    }
}

impl From<LayoutPlan> for CanvasBatch {
    fn from(plan: LayoutPlan) -> Self {
        Self {
            nodes: plan.nodes,
            connections: plan.connections,
            groups: plan.groups,
            bounds: plan.bounds,
        }
    }
}

/// 导出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Pdf,
    Pptx,
    Xlsx,
    Docx,
    Markdown,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Pptx => "pptx",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Docx => "docx",
            ExportFormat::Markdown => "markdown",
        }
    }
}

/// 交给导出方的数据：按放置顺序排列的表格与幻灯片
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportPayload {
    pub tables: Vec<TableParams>,
    pub slides: Vec<SlideParams>,
}

impl ExportPayload {
    pub fn from_nodes(nodes: &[LayoutNode]) -> Self {
        let mut payload = Self::default();
        for node in nodes {
            match node.kind {
                NodeKind::Table => payload
                    .tables
                    .push(serde_json::from_value(node.parameters.clone()).unwrap_or_default()),
                NodeKind::Slide => payload
                    .slides
                    .push(serde_json::from_value(node.parameters.clone()).unwrap_or_default()),
                NodeKind::Card | NodeKind::Note => {}
            }
        }
        payload
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.slides.is_empty()
    }
}
