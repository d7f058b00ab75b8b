//! 请求意图：开放式 / 幻灯片 / 导出
//!
//! 关键词启发式（中英文），宿主可通过 CanvasRequest::with_kind 覆盖。导出与幻灯片请求跳过澄清轮。

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::canvas::ExportFormat;

/// 请求类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "format")]
pub enum RequestKind {
    OpenEnded,
    Slides,
    Export(ExportFormat),
}

impl RequestKind {
    pub fn wants_clarification(&self) -> bool {
        matches!(self, RequestKind::OpenEnded)
    }
}

/// 一次画布请求
#[derive(Debug, Clone)]
pub struct CanvasRequest {
    pub text: String,
    kind: Option<RequestKind>,
}

impl CanvasRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: None,
        }
    }

    /// 覆盖自动分类
    pub fn with_kind(mut self, kind: RequestKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn kind(&self) -> RequestKind {
        self.kind.unwrap_or_else(|| classify_request(&self.text))
    }
}

fn export_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(export|download|save\s+as)\b|导出|下载").ok())
        .as_ref()
}

fn slides_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(slides?|slide\s*deck|deck|presentation|keynote)\b|幻灯片|演示文稿|(?-i:PPT)")
            .ok()
    })
    .as_ref()
}

fn format_patterns() -> &'static [(ExportFormat, Regex)] {
    static RE: OnceLock<Vec<(ExportFormat, Regex)>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            (ExportFormat::Pptx, r"(?i)\b(pptx?|powerpoint)\b"),
            (ExportFormat::Xlsx, r"(?i)\b(xlsx|excel|spreadsheet)\b|表格"),
            (ExportFormat::Docx, r"(?i)\b(docx|word)\b"),
            (ExportFormat::Markdown, r"(?i)\b(markdown|md)\b"),
            (ExportFormat::Pdf, r"(?i)\bpdf\b"),
        ]
        .into_iter()
        .filter_map(|(fmt, pat)| Regex::new(pat).ok().map(|re| (fmt, re)))
        .collect()
    })
}

/// 按关键词分类；导出请求未指明格式时按 PDF 处理
pub fn classify_request(text: &str) -> RequestKind {
    let is_match = |re: Option<&Regex>| re.is_some_and(|re| re.is_match(text));

    if is_match(export_re()) {
        let format = format_patterns()
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(fmt, _)| *fmt)
            .unwrap_or(ExportFormat::Pdf);
        return RequestKind::Export(format);
    }
    if is_match(slides_re()) {
        return RequestKind::Slides;
    }
    RequestKind::OpenEnded
}
