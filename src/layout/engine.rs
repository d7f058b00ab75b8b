//! 布局引擎：把分桶后的操作转为确定的画布坐标
//!
//! 无 connection 且无 group 时走网格模式，否则走分层模式；
//! 表格与幻灯片追加在当前包围盒下方；最后按名称解析连线与分组。

use serde_json::Value;
use tracing::info;

use crate::config::LayoutSection;
use crate::layout::estimate::{card_size, slide_size, table_size};
use crate::layout::graph::LayerGraph;
use crate::layout::grid::place_grid;
use crate::layout::layered::{place_layers, sort_layer_by_group};
use crate::layout::resolve::{resolve_connections, resolve_groups};
use crate::layout::types::{BoundingBox, LayoutMode, LayoutNode, LayoutPlan, NodeKind, Point};
use crate::toolcall::{
    CardParams, ConnectionParams, GroupParams, OperationBuckets, SlideParams, TableParams, ToolCall,
};

/// 纯文本兜底便签的名称
pub const FALLBACK_NOTE_NAME: &str = "summary";

/// 布局引擎：只持有尺寸配置，无内部状态
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    cfg: LayoutSection,
}

/// 待放置卡片
struct CardSlot {
    name: String,
    size: (f64, f64),
    parameters: Value,
}

impl LayoutEngine {
    pub fn new(cfg: LayoutSection) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &LayoutSection {
        &self.cfg
    }

    /// 对一个批次的分桶结果做布局
    pub fn layout(&self, buckets: &OperationBuckets, focus: Point) -> LayoutPlan {
        self.layout_parts(
            &buckets.cards,
            &buckets.tables,
            &buckets.slides,
            &buckets.connections,
            &buckets.groups,
            focus,
        )
    }

    pub fn layout_parts(
        &self,
        cards: &[ToolCall],
        tables: &[ToolCall],
        slides: &[ToolCall],
        connections: &[ToolCall],
        groups: &[ToolCall],
        focus: Point,
    ) -> LayoutPlan {
        let slots = self.card_slots(cards);
        let mode = if connections.is_empty() && groups.is_empty() {
            LayoutMode::Grid
        } else {
            LayoutMode::Layered
        };

        let mut nodes = match mode {
            LayoutMode::Grid => self.grid_nodes(slots, focus),
            LayoutMode::Layered => self.layered_nodes(slots, connections, groups, focus),
        };
        self.append_sections(&mut nodes, tables, slides, focus);

        let bounds = BoundingBox::around(&nodes);
        let resolved_connections = resolve_connections(&nodes, connections);
        let resolved_groups = resolve_groups(&nodes, groups, self.cfg.group_padding);

        info!(
            mode = ?mode,
            nodes = nodes.len(),
            connections = resolved_connections.len(),
            groups = resolved_groups.len(),
            "Layout computed"
        );

        LayoutPlan {
            mode,
            nodes,
            bounds,
            connections: resolved_connections,
            groups: resolved_groups,
        }
    }

    /// 解析失败兜底：整段文本作为一张便签放在焦点下方
    pub fn fallback_note(&self, text: &str, focus: Point) -> LayoutPlan {
        let node = LayoutNode {
            name: FALLBACK_NOTE_NAME.to_string(),
            kind: NodeKind::Note,
            width: self.cfg.note_width,
            height: self.cfg.note_height,
            layer_index: 0,
            position: Point::new(
                focus.x - self.cfg.note_width / 2.0,
                focus.y + self.cfg.anchor_offset,
            ),
            parameters: serde_json::json!({ "content": text.trim() }),
        };
        let bounds = Some(node.bounds());
        LayoutPlan {
            mode: LayoutMode::Grid,
            nodes: vec![node],
            bounds,
            connections: Vec::new(),
            groups: Vec::new(),
        }
    }

    fn card_slots(&self, cards: &[ToolCall]) -> Vec<CardSlot> {
        cards
            .iter()
            .enumerate()
            .map(|(i, call)| {
                let params: CardParams = call.params();
                let size = card_size(&params, &self.cfg);
                let name = params
                    .name
                    .or(params.title)
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| format!("card-{}", i + 1));
                CardSlot {
                    name,
                    size,
                    parameters: call.parameters.clone(),
                }
            })
            .collect()
    }

    fn grid_nodes(&self, slots: Vec<CardSlot>, focus: Point) -> Vec<LayoutNode> {
        let sizes: Vec<(f64, f64)> = slots.iter().map(|s| s.size).collect();
        let placed = place_grid(&sizes, focus, &self.cfg);
        slots
            .into_iter()
            .zip(placed)
            .map(|(slot, (position, row))| card_node(slot, row, position))
            .collect()
    }

    fn layered_nodes(
        &self,
        slots: Vec<CardSlot>,
        connections: &[ToolCall],
        groups: &[ToolCall],
        focus: Point,
    ) -> Vec<LayoutNode> {
        let names: Vec<&str> = slots.iter().map(|s| s.name.as_str()).collect();
        let edges: Vec<(String, String)> = connections
            .iter()
            .map(|call| {
                let params: ConnectionParams = call.params();
                (params.from, params.to)
            })
            .collect();

        let mut layering = LayerGraph::new(&names, &edges).layers();
        if layering.cyclic {
            info!(
                layer = layering.layers.len() - 1,
                "Connections contain a cycle, remaining cards share the last layer"
            );
        }

        let group_keys = group_keys(&names, groups);
        for layer in &mut layering.layers {
            sort_layer_by_group(layer, &group_keys);
        }

        let sizes: Vec<(f64, f64)> = slots.iter().map(|s| s.size).collect();
        let positions = place_layers(&layering.layers, &sizes, focus, &self.cfg);
        let layer_of = layering.layer_of(slots.len());

        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| card_node(slot, layer_of[i], positions[i]))
            .collect()
    }

    /// 表格与幻灯片依次追加到当前包围盒下方，水平居中
    fn append_sections(
        &self,
        nodes: &mut Vec<LayoutNode>,
        tables: &[ToolCall],
        slides: &[ToolCall],
        focus: Point,
    ) {
        let mut layer = nodes.iter().map(|n| n.layer_index + 1).max().unwrap_or(0);
        let sections = tables
            .iter()
            .enumerate()
            .map(|(i, call)| {
                let params: TableParams = call.params();
                let name = params.name.clone().or(params.title.clone());
                (call, NodeKind::Table, name, table_size(&params, &self.cfg), i)
            })
            .chain(slides.iter().enumerate().map(|(i, call)| {
                let params: SlideParams = call.params();
                let name = params.name.clone().or(params.title.clone());
                (call, NodeKind::Slide, name, slide_size(&params, &self.cfg), i)
            }));

        for (call, kind, name, (width, height), i) in sections {
            let top = match BoundingBox::around(nodes.iter()) {
                Some(bounds) => bounds.max_y + self.cfg.section_gap,
                None => focus.y + self.cfg.anchor_offset,
            };
            let prefix = if kind == NodeKind::Table { "table" } else { "slide" };
            nodes.push(LayoutNode {
                name: name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| format!("{}-{}", prefix, i + 1)),
                kind,
                width,
                height,
                layer_index: layer,
                position: Point::new(focus.x - width / 2.0, top),
                parameters: call.parameters.clone(),
            });
            layer += 1;
        }
    }
}

fn card_node(slot: CardSlot, layer_index: usize, position: Point) -> LayoutNode {
    LayoutNode {
        name: slot.name,
        kind: NodeKind::Card,
        width: slot.size.0,
        height: slot.size.1,
        layer_index,
        position,
        parameters: slot.parameters,
    }
}

/// 每张卡片的分组键：未分组为 None；出现在多个分组时以最后一个为准
fn group_keys(names: &[&str], groups: &[ToolCall]) -> Vec<Option<String>> {
    let mut keys: Vec<Option<String>> = vec![None; names.len()];
    for (g, call) in groups.iter().enumerate() {
        let params: GroupParams = call.params();
        let key = params
            .label
            .or(params.name)
            .unwrap_or_else(|| format!("group-{}", g + 1));
        for member in &params.members {
            // 重名卡片以最后一个为准
            if let Some(i) = names.iter().rposition(|n| *n == member.as_str()) {
                keys[i] = Some(key.clone());
            }
        }
    }
    keys
}
