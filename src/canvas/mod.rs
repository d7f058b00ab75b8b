//! 画布协作方：物化批次、渲染 / 澄清 / 导出 trait 与内存实现

pub mod batch;
pub mod memory;
pub mod traits;

pub use batch::{ArtifactId, CanvasBatch, ExportFormat, ExportPayload};
pub use memory::{CanvasEntry, InMemoryCanvas};
pub use traits::{CanvasRenderer, Clarifier, Exporter};
