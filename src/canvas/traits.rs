//! 画布协作方抽象：渲染、澄清、导出
//!
//! 编排器只通过这三个 trait 与宿主交互；失败以字符串返回，由编排器映射为 WeaveError。

use async_trait::async_trait;

use crate::canvas::{ArtifactId, CanvasBatch, ExportFormat, ExportPayload};
use crate::layout::{BoundingBox, Point};

/// 画布渲染器：唯一的共享可变资源，每个批次作为整体原子应用
#[async_trait]
pub trait CanvasRenderer: Send + Sync {
    /// 应用一个批次，返回与 batch.nodes 一一对应的画布元素 id
    async fn apply_batch(&self, batch: CanvasBatch) -> Result<Vec<ArtifactId>, String>;

    /// 将视口移到给定区域
    async fn focus(&self, bounds: BoundingBox) -> Result<(), String>;

    /// 当前视口焦点（布局锚点）
    fn focal_point(&self) -> Point;

    /// 当前选中元素的文字描述（作为请求上下文）
    fn selected_items_context(&self) -> Vec<String>;

    /// 画布上全部元素的文字描述
    fn all_items_context(&self) -> Vec<String>;

    async fn set_artifact_text(&self, artifact: &ArtifactId, text: &str) -> Result<(), String>;

    async fn mark_artifact_error(&self, artifact: &ArtifactId, reason: &str)
        -> Result<(), String>;
}

/// 澄清协作方：把问题与候选项交给用户，返回其选择；不设超时
#[async_trait]
pub trait Clarifier: Send + Sync {
    async fn choose(&self, question: &str, options: &[String]) -> Result<String, String>;
}

/// 导出协作方：导出类请求在布局后收到表格 / 幻灯片数据
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, format: ExportFormat, payload: ExportPayload) -> Result<(), String>;
}
