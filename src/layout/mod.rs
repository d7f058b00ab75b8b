//! 空间布局：网格 / 拓扑分层放置、表格幻灯片追加、连线与分组解析

pub mod engine;
pub mod estimate;
pub mod graph;
pub mod grid;
pub mod layered;
pub mod resolve;
pub mod types;

pub use engine::{LayoutEngine, FALLBACK_NOTE_NAME};
pub use graph::{LayerGraph, Layering};
pub use grid::{grid_dimensions, grid_width};
pub use types::{
    BoundingBox, LayoutMode, LayoutNode, LayoutPlan, NodeKind, Point, ResolvedConnection,
    ResolvedGroup,
};
