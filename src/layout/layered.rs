//! 分层模式：按拓扑层自上而下排列
//!
//! 每层以焦点 x 为中心水平居中；层高取该层最高节点；层与层之间固定间距。

use crate::config::LayoutSection;
use crate::layout::types::Point;

/// 层内排序：无分组者在前，其余按分组标签；sort_by 稳定，同键保持原始顺序
pub fn sort_layer_by_group(layer: &mut [usize], group_keys: &[Option<String>]) {
    layer.sort_by(|a, b| group_keys[*a].cmp(&group_keys[*b]));
}

/// 返回每个节点（按下标）的左上角坐标
pub fn place_layers(
    layers: &[Vec<usize>],
    sizes: &[(f64, f64)],
    focus: Point,
    cfg: &LayoutSection,
) -> Vec<Point> {
    let mut positions = vec![Point::default(); sizes.len()];
    let mut y = focus.y + cfg.anchor_offset;

    for layer in layers.iter().filter(|l| !l.is_empty()) {
        let widths: f64 = layer.iter().map(|&i| sizes[i].0).sum();
        let layer_width = widths + cfg.gap * (layer.len() - 1) as f64;
        let mut x = focus.x - layer_width / 2.0;
        let mut layer_height: f64 = 0.0;

        for &i in layer {
            let (w, h) = sizes[i];
            positions[i] = Point::new(x, y);
            x += w + cfg.gap;
            layer_height = layer_height.max(h);
        }
        y += layer_height + cfg.layer_gap;
    }
    positions
}
