//! 网格模式：无连线、无分组时使用
//!
//! 列数 = min(数量, 列上限)，行数 = ceil(数量 / 列数)；整体以焦点为水平中心，顶部锚定在焦点下方。
//! 行距取该行最高单元格（配图卡片更高）加间距。

use crate::config::LayoutSection;
use crate::layout::types::Point;

/// (列数, 行数)
pub fn grid_dimensions(count: usize, max_columns: usize) -> (usize, usize) {
    if count == 0 {
        return (0, 0);
    }
    let columns = count.min(max_columns.max(1));
    (columns, count.div_ceil(columns))
}

/// 网格总宽 = 列数 × (单元宽 + 间距) − 间距
pub fn grid_width(columns: usize, cell_width: f64, gap: f64) -> f64 {
    if columns == 0 {
        return 0.0;
    }
    columns as f64 * (cell_width + gap) - gap
}

/// 按输入顺序逐行放置；返回每个单元格的左上角坐标与行号
pub fn place_grid(sizes: &[(f64, f64)], focus: Point, cfg: &LayoutSection) -> Vec<(Point, usize)> {
    let (columns, _) = grid_dimensions(sizes.len(), cfg.max_columns);
    if columns == 0 {
        return Vec::new();
    }
    let width = grid_width(columns, cfg.card_width, cfg.gap);
    let start_x = focus.x - width / 2.0;
    let mut y = focus.y + cfg.anchor_offset;
    let mut placed = Vec::with_capacity(sizes.len());

    for (row, cells) in sizes.chunks(columns).enumerate() {
        for (col, _) in cells.iter().enumerate() {
            let x = start_x + col as f64 * (cfg.card_width + cfg.gap);
            placed.push((Point::new(x, y), row));
        }
        let row_height = cells.iter().map(|(_, h)| *h).fold(0.0, f64::max);
        y += row_height + cfg.gap;
    }
    placed
}
