//! 操作注册表：按操作名把 Tool Call 分桶，供布局阶段使用
//!
//! 纯函数，只做分类不做校验；各桶保持输入顺序。未知操作进入 unknown 桶，下游不读取。

use serde::Serialize;

use crate::toolcall::types::ToolCall;

/// 已知操作种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Card,
    Table,
    Connection,
    Group,
    Slide,
    Question,
}

impl OperationKind {
    pub const ALL: [OperationKind; 6] = [
        OperationKind::Card,
        OperationKind::Table,
        OperationKind::Connection,
        OperationKind::Group,
        OperationKind::Slide,
        OperationKind::Question,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Card => "card",
            OperationKind::Table => "table",
            OperationKind::Connection => "connection",
            OperationKind::Group => "group",
            OperationKind::Slide => "slide",
            OperationKind::Question => "question",
        }
    }

    /// 操作名匹配：去首尾空白、不区分大小写
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }
}

/// 分桶结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationBuckets {
    pub cards: Vec<ToolCall>,
    pub tables: Vec<ToolCall>,
    pub connections: Vec<ToolCall>,
    pub groups: Vec<ToolCall>,
    pub slides: Vec<ToolCall>,
    pub questions: Vec<ToolCall>,
    /// 未知操作：保留但不参与布局
    pub unknown: Vec<ToolCall>,
}

impl OperationBuckets {
    /// 需要放置到画布上的操作数（card / table / slide）
    pub fn placeable_count(&self) -> usize {
        self.cards.len() + self.tables.len() + self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placeable_count() == 0
            && self.connections.is_empty()
            && self.groups.is_empty()
            && self.questions.is_empty()
    }
}

/// 按操作名分桶
pub fn classify(calls: Vec<ToolCall>) -> OperationBuckets {
    let mut buckets = OperationBuckets::default();
    for call in calls {
        let bucket = match OperationKind::from_name(&call.operation) {
            Some(OperationKind::Card) => &mut buckets.cards,
            Some(OperationKind::Table) => &mut buckets.tables,
            Some(OperationKind::Connection) => &mut buckets.connections,
            Some(OperationKind::Group) => &mut buckets.groups,
            Some(OperationKind::Slide) => &mut buckets.slides,
            Some(OperationKind::Question) => &mut buckets.questions,
            None => {
                tracing::debug!(operation = %call.operation, "Unknown operation ignored");
                &mut buckets.unknown
            }
        };
        bucket.push(call);
    }
    buckets
}
