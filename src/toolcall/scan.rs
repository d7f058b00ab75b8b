//! 字节级扫描工具：围栏代码块、括号深度匹配、操作标记定位
//!
//! 所有下标都落在 ASCII 字节上（括号、引号、反斜杠），因此对原字符串切片总在字符边界上。

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

static MARKER_RE: OnceLock<Option<Regex>> = OnceLock::new();
static PARAMS_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn marker_re() -> Option<&'static Regex> {
    MARKER_RE
        .get_or_init(|| Regex::new(r#""operation"\s*:"#).ok())
        .as_ref()
}

fn params_re() -> Option<&'static Regex> {
    PARAMS_RE
        .get_or_init(|| Regex::new(r#""parameters"\s*:"#).ok())
        .as_ref()
}

/// 操作标记 `"operation":` 的所有出现位置（整段匹配的字节区间）
pub fn operation_markers(text: &str) -> Vec<Range<usize>> {
    marker_re()
        .map(|re| re.find_iter(text).map(|m| m.range()).collect())
        .unwrap_or_default()
}

/// `window` 区间内所有 `"parameters":` 键的位置
pub fn parameter_keys(text: &str, window: Range<usize>) -> Vec<Range<usize>> {
    let Some(slice) = text.get(window.clone()) else {
        return Vec::new();
    };
    params_re()
        .map(|re| {
            re.find_iter(slice)
                .map(|m| (m.start() + window.start)..(m.end() + window.start))
                .collect()
        })
        .unwrap_or_default()
}

/// 文本中的所有 ``` 围栏代码块内容（已去掉语言标签）；末尾未闭合的块延伸到文本结尾
pub fn fenced_blocks(text: &str) -> Vec<&str> {
    text.split("```")
        .enumerate()
        .filter(|(i, _)| i % 2 == 1)
        .map(|(_, block)| strip_language_tag(block).trim())
        .filter(|block| !block.is_empty())
        .collect()
}

fn strip_language_tag(block: &str) -> &str {
    match block.find('\n') {
        Some(nl) => {
            let first = block[..nl].trim();
            let is_tag = !first.is_empty()
                && first
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '+');
            if is_tag {
                &block[nl + 1..]
            } else {
                block
            }
        }
        None => block,
    }
}

pub fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// 从 `quote` 处的双引号开始，返回配对的结束引号下标（考虑转义）
pub fn string_end(bytes: &[u8], quote: usize) -> Option<usize> {
    if bytes.get(quote) != Some(&b'"') {
        return None;
    }
    let mut escaped = false;
    for (offset, &b) in bytes[quote + 1..].iter().enumerate() {
        if escaped {
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else if b == b'"' {
            return Some(quote + 1 + offset);
        }
    }
    None
}

/// 从 `open` 处的 `{` 或 `[` 开始前向计数深度（跳过字符串内容），返回配对闭括号下标
pub fn matching_close(bytes: &[u8], open: usize) -> Option<usize> {
    if !matches!(bytes.get(open), Some(b'{') | Some(b'[')) {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
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
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// 向前回溯时最多尝试的 `{` 个数
const MAX_ENCLOSING_CANDIDATES: usize = 64;

/// 可能包裹 `marker` 的对象区间（闭区间），由近及远。
/// 回溯只收集 `{` 的位置，闭合位置由识别字符串的前向匹配确定，字符串里的花括号不会打乱计数
pub fn enclosing_objects(
    bytes: &[u8],
    marker: Range<usize>,
) -> impl Iterator<Item = (usize, usize)> + '_ {
    let before = marker.start.min(bytes.len());
    bytes[..before]
        .iter()
        .enumerate()
        .rev()
        .filter(|&(_, &b)| b == b'{')
        .take(MAX_ENCLOSING_CANDIDATES)
        .filter_map(move |(open, _)| {
            let close = matching_close(bytes, open)?;
            (close >= marker.end).then_some((open, close))
        })
}

/// 截断恢复：从 `open` 处的 `[` 扫描，返回最后一个在顶层闭合的元素之后的下标
pub fn last_closed_element_end(bytes: &[u8], open: usize) -> Option<usize> {
    if bytes.get(open) != Some(&b'[') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut last_end = None;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
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
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                match depth {
                    1 => last_end = Some(i + 1),
                    0 => break,
                    _ => {}
                }
            }
            _ => {}
        }
    }
    last_end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_blocks_with_language_tag() {
        let text = "Sure!\n```json\n[1, 2]\n```\nand\n```\n{\"a\": 1}\n```";
        assert_eq!(fenced_blocks(text), vec!["[1, 2]", "{\"a\": 1}"]);
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let text = "intro ```json\n[{\"operation\":\"card\"";
        assert_eq!(fenced_blocks(text), vec!["[{\"operation\":\"card\""]);
    }

    #[test]
    fn test_matching_close_skips_strings() {
        let text = r#"{"a": "}{", "b": [1, {"c": 2}]} tail"#;
        let end = matching_close(text.as_bytes(), 0).unwrap();
        assert_eq!(&text[..=end], r#"{"a": "}{", "b": [1, {"c": 2}]}"#);
    }

    #[test]
    fn test_matching_close_unterminated() {
        assert_eq!(matching_close(br#"{"a": "x"#, 0), None);
        assert_eq!(matching_close(b"x", 0), None);
    }

    #[test]
    fn test_enclosing_objects_skips_closed_siblings() {
        let text = r#"{"parameters": {"x": {}}, "operation": "card"}"#;
        let start = text.find("\"operation\"").unwrap();
        let found: Vec<_> = enclosing_objects(text.as_bytes(), start..start + 12).collect();
        assert_eq!(found, vec![(0, text.len() - 1)]);
    }

    #[test]
    fn test_enclosing_objects_ignores_braces_in_strings() {
        let text = r#"[{"parameters": {"content": "a } b {"}, "operation": "card"}]"#;
        let start = text.find("\"operation\"").unwrap();
        let found: Vec<_> = enclosing_objects(text.as_bytes(), start..start + 12).collect();
        assert_eq!(found.first(), Some(&(1, text.len() - 2)));
    }

    #[test]
    fn test_last_closed_element_end() {
        let text = r#"[{"a": 1}, {"b": [2]}, {"c": "unfinished"#;
        let end = last_closed_element_end(text.as_bytes(), 0).unwrap();
        assert_eq!(&text[..end], r#"[{"a": 1}, {"b": [2]}"#);
    }

    #[test]
    fn test_last_closed_element_end_none_closed() {
        assert_eq!(last_closed_element_end(br#"[{"a": 1"#, 0), None);
    }

    #[test]
    fn test_operation_markers_allow_spacing() {
        let text = r#"{"operation" : "card"} {"operation":"table"}"#;
        assert_eq!(operation_markers(text).len(), 2);
    }

    #[test]
    fn test_string_end_with_escape() {
        let text = br#""a\"b" rest"#;
        assert_eq!(string_end(text, 0), Some(5));
    }
}
