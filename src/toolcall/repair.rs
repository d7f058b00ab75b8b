//! 修复通道：字符串字面量修复与激进规范化
//!
//! 两个通道都是纯函数 `&str -> String`，逐字符维护「是否在字符串内 / 是否转义」状态，
//! 因而不会改动字符串内部的 `//`、`'`、`,]` 等内容。

/// 零宽字符与 BOM
fn is_invisible(c: char) -> bool {
    matches!(c, '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}')
}

fn ascii_quote(c: char) -> char {
    match c {
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{FF02}' => '"',
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '\u{FF07}' => '\'',
        other => other,
    }
}

/// 字符串字面量修复：双引号字符串内未转义的控制字符改写为转义序列
pub fn repair_string_literals(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    for c in input.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// 激进规范化：去不可见字符、统一引号、去注释、去尾逗号、单引号转双引号，最后做字符串修复
pub fn normalize(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| !is_invisible(*c))
        .map(ascii_quote)
        .collect();
    let without_comments = strip_comments(&cleaned);
    let without_commas = strip_trailing_commas(&without_comments);
    let double_quoted = single_to_double_quotes(&without_commas);
    repair_string_literals(double_quoted.trim())
}

/// 去掉字符串外的 `// ...` 行注释与 `/* ... */` 块注释
fn strip_comments(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            i += 1;
            continue;
        }
        match (c, chars.get(i + 1)) {
            ('"', _) => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// 去掉字符串外、紧跟空白后是 `]` / `}` 的逗号
fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// 把双引号字符串外的单引号字符串改写为双引号字符串（内部的 `"` 会被转义）
fn single_to_double_quotes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_double = false;
    let mut in_single = false;
    let mut escaped = false;
    for c in input.chars() {
        if in_double {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_double = false;
            }
            out.push(c);
            continue;
        }
        if in_single {
            if escaped {
                escaped = false;
                // \' 在双引号字符串里不需要转义
                if c != '\'' {
                    out.push('\\');
                }
                out.push(c);
            } else if c == '\\' {
                escaped = true;
            } else if c == '\'' {
                in_single = false;
                out.push('"');
            } else if c == '"' {
                out.push_str("\\\"");
            } else {
                out.push(c);
            }
            continue;
        }
        match c {
            '"' => {
                in_double = true;
                out.push(c);
            }
            '\'' => {
                in_single = true;
                out.push('"');
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_raw_newline_in_string() {
        let raw = "{\"a\": \"line one\nline two\"}";
        let fixed = repair_string_literals(raw);
        let v: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(v["a"], "line one\nline two");
    }

    #[test]
    fn test_repair_leaves_structure_whitespace() {
        let raw = "{\n  \"a\": 1\n}";
        assert_eq!(repair_string_literals(raw), raw);
    }

    #[test]
    fn test_normalize_smart_quotes_and_trailing_comma() {
        let raw = "\u{FEFF}[{\u{201C}operation\u{201D}: \u{201C}card\u{201D}, \u{201C}parameters\u{201D}: {},},]";
        let v: serde_json::Value = serde_json::from_str(&normalize(raw)).unwrap();
        assert_eq!(v[0]["operation"], "card");
    }

    #[test]
    fn test_normalize_comments_outside_strings_only() {
        let raw = "{\n // note\n \"url\": \"http://x.y/z\" /* block */\n}";
        let v: serde_json::Value = serde_json::from_str(&normalize(raw)).unwrap();
        assert_eq!(v["url"], "http://x.y/z");
    }

    #[test]
    fn test_normalize_single_quotes() {
        let raw = "{'operation': 'card', 'parameters': {'title': 'say \"hi\"', 'note': 'it\\'s'}}";
        let v: serde_json::Value = serde_json::from_str(&normalize(raw)).unwrap();
        assert_eq!(v["parameters"]["title"], "say \"hi\"");
        assert_eq!(v["parameters"]["note"], "it's");
    }

    #[test]
    fn test_normalize_keeps_apostrophe_inside_double_quotes() {
        let raw = r#"{"title": "Bob's plan"}"#;
        let v: serde_json::Value = serde_json::from_str(&normalize(raw)).unwrap();
        assert_eq!(v["title"], "Bob's plan");
    }

    #[test]
    fn test_zero_width_removed() {
        let raw = "[\u{200B}1\u{200D}]";
        assert_eq!(normalize(raw), "[1]");
    }
}
