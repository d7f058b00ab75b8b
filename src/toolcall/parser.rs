//! 恢复式解析器：从模型的自由文本中提取 Tool Call 列表
//!
//! 策略阶梯按顺序尝试，第一个产出非空且结构合法列表的策略胜出：
//! Direct -> FencedBlock -> Normalized -> BracketSlice -> Truncation -> ObjectScan -> FieldScan。
//! 每个策略都是纯函数 `&str -> Option<Vec<ToolCall>>`，可单独测试；解析器本身永不 panic。

use serde_json::Value;
use tracing::debug;

use crate::toolcall::repair::{normalize, repair_string_literals};
use crate::toolcall::scan::{
    enclosing_objects, fenced_blocks, last_closed_element_end, matching_close,
    operation_markers, parameter_keys, skip_whitespace, string_end,
};
use crate::toolcall::types::{ParseDiagnostic, ParseResult, Strategy, ToolCall};

const OPERATION_KEYS: [&str; 2] = ["operation", "tool"];
const PARAMETER_KEYS: [&str; 3] = ["parameters", "params", "args"];
const WRAPPER_KEYS: [&str; 2] = ["operations", "tool_calls"];

/// 解析模型输出
pub fn parse(text: &str) -> ParseResult {
    match parse_detailed(text) {
        Ok((_, calls)) => ParseResult::Success(calls),
        Err(diagnostic) => ParseResult::Failure(diagnostic),
    }
}

/// 解析模型输出，并返回命中的策略
pub fn parse_detailed(text: &str) -> Result<(Strategy, Vec<ToolCall>), ParseDiagnostic> {
    let mut attempted = Vec::with_capacity(Strategy::LADDER.len());
    for strategy in Strategy::LADDER {
        attempted.push(strategy);
        if let Some(calls) = run_strategy(strategy, text) {
            debug!(strategy = %strategy, count = calls.len(), "Tool calls recovered");
            return Ok((strategy, calls));
        }
        debug!(strategy = %strategy, "Strategy yielded nothing");
    }
    Err(ParseDiagnostic {
        input_len: text.len(),
        marker_count: operation_markers(text).len(),
        attempted,
        message: "no structured operations found".to_string(),
    })
}

/// 执行单个策略
pub fn run_strategy(strategy: Strategy, text: &str) -> Option<Vec<ToolCall>> {
    match strategy {
        Strategy::Direct => direct(text),
        Strategy::FencedBlock => fenced_block(text),
        Strategy::Normalized => normalized(text),
        Strategy::BracketSlice => bracket_slice(text),
        Strategy::Truncation => truncation(text),
        Strategy::ObjectScan => object_scan(text),
        Strategy::FieldScan => field_scan(text),
    }
}

/// 1. 直接解析整段文本
pub fn direct(text: &str) -> Option<Vec<ToolCall>> {
    serde_json::from_str::<Value>(text.trim())
        .ok()
        .and_then(calls_from_value)
}

/// 2. 围栏代码块：优先含操作标记的块，其次第一个块
pub fn fenced_block(text: &str) -> Option<Vec<ToolCall>> {
    let block = preferred_block(text)?;
    direct(block).or_else(|| direct(&repair_string_literals(block)))
}

/// 3. 激进规范化后重新解析
pub fn normalized(text: &str) -> Option<Vec<ToolCall>> {
    let candidate = preferred_block(text).unwrap_or(text);
    direct(&normalize(candidate))
}

/// 4. 截取首个开括号到最后一个同类闭括号之间的内容
pub fn bracket_slice(text: &str) -> Option<Vec<ToolCall>> {
    let mut pairs = [('[', ']'), ('{', '}')];
    pairs.sort_by_key(|(open, _)| text.find(*open).unwrap_or(usize::MAX));
    pairs.iter().find_map(|&(open, close)| {
        let start = text.find(open)?;
        let end = text.rfind(close)?;
        if end <= start {
            return None;
        }
        parse_repaired(&text[start..=end])
    })
}

/// 5. 截断恢复：保留最后一个完整闭合的数组元素，补上 `]`
pub fn truncation(text: &str) -> Option<Vec<ToolCall>> {
    let bytes = text.as_bytes();
    let start = array_start(text)?;
    let end = last_closed_element_end(bytes, start)?;
    let body = text[start..end].trim_end().trim_end_matches(',');
    parse_repaired(&format!("{body}]"))
}

/// 6. 以操作标记为锚点，逐个提取包裹它的对象并独立解析
pub fn object_scan(text: &str) -> Option<Vec<ToolCall>> {
    let bytes = text.as_bytes();
    let mut calls: Vec<ToolCall> = Vec::new();
    for marker in operation_markers(text) {
        let found = enclosing_objects(bytes, marker.clone())
            .find_map(|(open, close)| parse_repaired(&text[open..=close]));
        match found {
            Some(found) => push_unique(&mut calls, found),
            None => debug!(offset = marker.start, "Skipping malformed operation object"),
        }
    }
    (!calls.is_empty()).then_some(calls)
}

/// 7. 字段级重建：只提取标记旁的 parameters 值，不构造外层对象
pub fn field_scan(text: &str) -> Option<Vec<ToolCall>> {
    let bytes = text.as_bytes();
    let markers = operation_markers(text);
    let mut calls: Vec<ToolCall> = Vec::new();
    for (idx, marker) in markers.iter().enumerate() {
        let Some(operation) = read_operation_name(text, marker.end) else {
            continue;
        };
        let next_start = markers.get(idx + 1).map_or(text.len(), |m| m.start);
        let prev_end = if idx == 0 { 0 } else { markers[idx - 1].end };

        let forward = parameter_keys(text, marker.end..next_start)
            .into_iter()
            .next()
            .filter(|key| !crosses_object_boundary(bytes, marker.end, key.start));
        let value_range = forward
            .and_then(|key| value_span(bytes, key.end))
            .or_else(|| {
                let key = parameter_keys(text, prev_end..marker.start).pop()?;
                let (start, end) = value_span(bytes, key.end)?;
                (!crosses_object_boundary(bytes, end + 1, marker.start)).then_some((start, end))
            });
        let Some((start, end)) = value_range else {
            continue;
        };
        let Some(parameters) = parse_value_repaired(&text[start..=end]) else {
            continue;
        };
        push_unique(&mut calls, vec![ToolCall::new(operation, parameters)]);
    }
    (!calls.is_empty()).then_some(calls)
}

fn preferred_block(text: &str) -> Option<&str> {
    let blocks = fenced_blocks(text);
    blocks
        .iter()
        .copied()
        .find(|block| !operation_markers(block).is_empty())
        .or_else(|| blocks.first().copied())
}

/// 截断恢复的起点：优先紧跟 `{` 的 `[`，否则第一个 `[`
fn array_start(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    text.match_indices('[')
        .map(|(i, _)| i)
        .find(|&i| bytes.get(skip_whitespace(bytes, i + 1)) == Some(&b'{'))
        .or_else(|| text.find('['))
}

fn read_operation_name(text: &str, after_colon: usize) -> Option<String> {
    let bytes = text.as_bytes();
    let quote = skip_whitespace(bytes, after_colon);
    let end = string_end(bytes, quote)?;
    let name: String = serde_json::from_str(&text[quote..=end]).ok()?;
    (!name.trim().is_empty()).then_some(name)
}

/// parameters 键之后的对象 / 数组值区间（闭区间）；标量值不重建
fn value_span(bytes: &[u8], after_colon: usize) -> Option<(usize, usize)> {
    let start = skip_whitespace(bytes, after_colon);
    let end = matching_close(bytes, start)?;
    Some((start, end))
}

/// [from, to) 之间（字符串外）出现花括号，说明跨越了对象边界
fn crosses_object_boundary(bytes: &[u8], from: usize, to: usize) -> bool {
    let mut in_string = false;
    let mut escaped = false;
    for &b in bytes.get(from..to).unwrap_or_default() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'}' => return true,
            _ => {}
        }
    }
    false
}

fn parse_repaired(candidate: &str) -> Option<Vec<ToolCall>> {
    direct(candidate)
        .or_else(|| direct(&repair_string_literals(candidate)))
        .or_else(|| direct(&normalize(candidate)))
}

fn parse_value_repaired(candidate: &str) -> Option<Value> {
    serde_json::from_str(candidate)
        .ok()
        .or_else(|| serde_json::from_str(&repair_string_literals(candidate)).ok())
        .or_else(|| serde_json::from_str(&normalize(candidate)).ok())
}

fn push_unique(calls: &mut Vec<ToolCall>, found: Vec<ToolCall>) {
    for call in found {
        if !calls.contains(&call) {
            calls.push(call);
        }
    }
}

/// 结构校验：列表中每个元素都必须是合法操作，否则整体拒绝
fn calls_from_value(value: Value) -> Option<Vec<ToolCall>> {
    let calls = match value {
        Value::Array(items) => items
            .into_iter()
            .map(call_from_value)
            .collect::<Option<Vec<_>>>()?,
        Value::Object(map) => {
            let wrapped = WRAPPER_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array).cloned());
            match wrapped {
                Some(items) if !has_operation_key(&map) => items
                    .into_iter()
                    .map(call_from_value)
                    .collect::<Option<Vec<_>>>()?,
                _ => vec![call_from_value(Value::Object(map))?],
            }
        }
        _ => return None,
    };
    (!calls.is_empty()).then_some(calls)
}

fn has_operation_key(map: &serde_json::Map<String, Value>) -> bool {
    OPERATION_KEYS.iter().any(|key| map.contains_key(*key))
}

fn call_from_value(value: Value) -> Option<ToolCall> {
    let Value::Object(mut map) = value else {
        return None;
    };
    let operation = OPERATION_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .filter(|name| !name.trim().is_empty())?
        .to_string();
    let parameters = PARAMETER_KEYS
        .iter()
        .find_map(|key| map.remove(*key))
        .filter(|v| !v.is_null())?;
    Some(ToolCall {
        operation,
        parameters,
    })
}
