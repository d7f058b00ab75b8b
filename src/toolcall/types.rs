//! Tool Call 数据类型
//!
//! ToolCall 为解析后的单条操作；ParseResult 为解析器的唯一输出（成功列表 / 失败诊断）。
//! 各操作的参数视图（CardParams 等）用于布局与物化阶段读取字段，缺失字段一律取默认值。

use std::fmt;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 模型输出中提取出的一条结构化操作：`{"operation": "card", "parameters": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(alias = "tool")]
    pub operation: String,
    #[serde(alias = "params", alias = "args")]
    pub parameters: Value,
}

impl ToolCall {
    pub fn new(operation: impl Into<String>, parameters: Value) -> Self {
        Self {
            operation: operation.into(),
            parameters,
        }
    }

    /// 按参数视图反序列化；字段逐个宽松读取，单个字段类型不符只影响它自己
    pub fn params<T>(&self) -> T
    where
        T: for<'de> Deserialize<'de> + Default,
    {
        serde_json::from_value(self.parameters.clone()).unwrap_or_default()
    }
}

/// 解析成功时命中的策略（按阶梯顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Direct,
    FencedBlock,
    Normalized,
    BracketSlice,
    Truncation,
    ObjectScan,
    FieldScan,
}

impl Strategy {
    /// 阶梯顺序
    pub const LADDER: [Strategy; 7] = [
        Strategy::Direct,
        Strategy::FencedBlock,
        Strategy::Normalized,
        Strategy::BracketSlice,
        Strategy::Truncation,
        Strategy::ObjectScan,
        Strategy::FieldScan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::FencedBlock => "fenced_block",
            Strategy::Normalized => "normalized",
            Strategy::BracketSlice => "bracket_slice",
            Strategy::Truncation => "truncation",
            Strategy::ObjectScan => "object_scan",
            Strategy::FieldScan => "field_scan",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 全部策略失败时的诊断信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseDiagnostic {
    /// 输入字节数
    pub input_len: usize,
    /// 输入中出现的操作标记（`"operation":`）数量
    pub marker_count: usize,
    /// 依次尝试过的策略
    pub attempted: Vec<Strategy>,
    pub message: String,
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (input {} bytes, {} operation markers)",
            self.message, self.input_len, self.marker_count
        )
    }
}

/// 解析结果：成功时列表非空
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    Success(Vec<ToolCall>),
    Failure(ParseDiagnostic),
}

impl ParseResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseResult::Success(_))
    }

    pub fn calls(&self) -> &[ToolCall] {
        match self {
            ParseResult::Success(calls) => calls,
            ParseResult::Failure(_) => &[],
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 文本字段：数字与布尔值转成字符串，其余类型视为缺失
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(&Value::deserialize(deserializer)?))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

/// 字符串列表：单个字符串视为一项，非标量元素丢弃
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        other => scalar_text(&other).into_iter().collect(),
    })
}

/// 表格行：数组原样保留，对象取其值，标量成为单列行
fn lenient_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(rows) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(rows
        .into_iter()
        .map(|row| match row {
            Value::Array(cells) => cells,
            Value::Object(fields) => fields.into_iter().map(|(_, v)| v).collect(),
            scalar => vec![scalar],
        })
        .collect())
}

/// 对象列表：逐项读取，无法识别的项丢弃
fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// card 参数视图
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CardParams {
    /// 批次内唯一名称，connection / group 通过它引用卡片
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub content: Option<String>,
    /// 配图地址；存在时卡片使用加高尺寸
    #[serde(alias = "image_url", alias = "imageUrl", deserialize_with = "lenient_text")]
    pub image: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub color: Option<String>,
}

impl CardParams {
    pub fn has_image(&self) -> bool {
        self.image.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// 表格中的一个工作表
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SheetParams {
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(alias = "columns", deserialize_with = "lenient_strings")]
    pub headers: Vec<String>,
    #[serde(deserialize_with = "lenient_rows")]
    pub rows: Vec<Vec<Value>>,
}

/// table 参数视图：单表（headers/rows）或多工作表（sheets）
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TableParams {
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(alias = "columns", deserialize_with = "lenient_strings")]
    pub headers: Vec<String>,
    #[serde(deserialize_with = "lenient_rows")]
    pub rows: Vec<Vec<Value>>,
    #[serde(deserialize_with = "lenient_items")]
    pub sheets: Vec<SheetParams>,
}

/// 单页幻灯片
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SlidePage {
    #[serde(deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub bullets: Vec<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub notes: Option<String>,
}

/// slide 参数视图：一组幻灯片页
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SlideParams {
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(alias = "pages", deserialize_with = "lenient_items")]
    pub slides: Vec<SlidePage>,
}

/// connection 参数视图：from -> to 的有向连线
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ConnectionParams {
    #[serde(alias = "source", deserialize_with = "lenient_string")]
    pub from: String,
    #[serde(alias = "target", deserialize_with = "lenient_string")]
    pub to: String,
    #[serde(deserialize_with = "lenient_text")]
    pub label: Option<String>,
}

/// group 参数视图：成员名称集合 + 可选标签
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GroupParams {
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(alias = "title", deserialize_with = "lenient_text")]
    pub label: Option<String>,
    #[serde(alias = "cards", alias = "nodes", alias = "items", deserialize_with = "lenient_strings")]
    pub members: Vec<String>,
}

/// question 参数视图：澄清问题与候选项
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct QuestionParams {
    #[serde(deserialize_with = "lenient_string")]
    pub question: String,
    #[serde(alias = "choices", deserialize_with = "lenient_strings")]
    pub options: Vec<String>,
}
