//! 尺寸估算：卡片固定尺寸，表格 / 幻灯片按标题、表头、行数与标签栏确定性估算高度
//!
//! 估算值（而非渲染后的实测值）决定下一个元素的起始位置。

use crate::config::LayoutSection;
use crate::toolcall::{CardParams, SlideParams, TableParams};

pub fn card_size(params: &CardParams, cfg: &LayoutSection) -> (f64, f64) {
    let height = if params.has_image() {
        cfg.image_card_height
    } else {
        cfg.card_height
    };
    (cfg.card_width, height)
}

/// 表格高度 = 内边距 + 标题 + 标签栏（多工作表）+ 表头（若有）+ 行数 × 行高；
/// 多工作表时取行数最多的那张
pub fn table_size(params: &TableParams, cfg: &LayoutSection) -> (f64, f64) {
    let mut height = cfg.table_padding;
    if params.title.as_deref().is_some_and(|t| !t.trim().is_empty()) {
        height += cfg.table_title_height;
    }

    let (has_header, rows) = if params.sheets.is_empty() {
        (!params.headers.is_empty(), params.rows.len())
    } else {
        if params.sheets.len() > 1 {
            height += cfg.tab_bar_height;
        }
        let has_header = params.sheets.iter().any(|s| !s.headers.is_empty());
        let rows = params.sheets.iter().map(|s| s.rows.len()).max().unwrap_or(0);
        (has_header, rows)
    };

    if has_header {
        height += cfg.table_header_height;
    }
    height += rows as f64 * cfg.table_row_height;
    (cfg.table_width, height)
}

/// 幻灯片高度 = 页面高度 + 标题（若有）+ 标签栏（多页）
pub fn slide_size(params: &SlideParams, cfg: &LayoutSection) -> (f64, f64) {
    let mut height = cfg.slide_height;
    if params.title.as_deref().is_some_and(|t| !t.trim().is_empty()) {
        height += cfg.slide_title_height;
    }
    if params.slides.len() > 1 {
        height += cfg.tab_bar_height;
    }
    (cfg.slide_width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolcall::{SheetParams, SlidePage};
    use serde_json::json;

    #[test]
    fn test_card_image_variant() {
        let cfg = LayoutSection::default();
        let plain = CardParams::default();
        let with_image = CardParams {
            image: Some("https://img".into()),
            ..Default::default()
        };
        assert_eq!(card_size(&plain, &cfg), (320.0, 200.0));
        assert_eq!(card_size(&with_image, &cfg), (320.0, 360.0));
    }

    #[test]
    fn test_table_height_single_sheet() {
        let cfg = LayoutSection::default();
        let params = TableParams {
            title: Some("Budget".into()),
            headers: vec!["Item".into(), "Cost".into()],
            rows: vec![vec![json!("a"), json!(1)], vec![json!("b"), json!(2)]],
            ..Default::default()
        };
        // 32 + 48 + 40 + 2 * 36
        assert_eq!(table_size(&params, &cfg).1, 192.0);
    }

    #[test]
    fn test_table_height_without_header() {
        let cfg = LayoutSection::default();
        let params = TableParams {
            rows: vec![vec![json!(1)]; 3],
            ..Default::default()
        };
        assert_eq!(table_size(&params, &cfg).1, 32.0 + 3.0 * 36.0);
    }

    #[test]
    fn test_table_height_with_tabs() {
        let cfg = LayoutSection::default();
        let sheet = |rows: usize| SheetParams {
            name: None,
            headers: vec!["h".into()],
            rows: vec![vec![json!(0)]; rows],
        };
        let params = TableParams {
            sheets: vec![sheet(2), sheet(5)],
            ..Default::default()
        };
        // 32 + 36 (tabs) + 40 + 5 * 36
        assert_eq!(table_size(&params, &cfg).1, 288.0);
    }

    #[test]
    fn test_slide_size() {
        let cfg = LayoutSection::default();
        let single = SlideParams {
            slides: vec![SlidePage::default()],
            ..Default::default()
        };
        let deck = SlideParams {
            title: Some("Deck".into()),
            slides: vec![SlidePage::default(), SlidePage::default()],
            ..Default::default()
        };
        assert_eq!(slide_size(&single, &cfg), (960.0, 540.0));
        assert_eq!(slide_size(&deck, &cfg), (960.0, 540.0 + 48.0 + 36.0));
    }
}
