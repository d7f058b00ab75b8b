//! 提示词构造与模型回复的轻量解析
//!
//! system prompt 中注入各操作参数视图的 JSON Schema（schemars 生成），让模型输出期望的结构。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

use crate::core::intent::RequestKind;
use crate::llm::Message;
use crate::toolcall::{
    classify, parse, CardParams, ConnectionParams, GroupParams, OperationKind, ParseResult,
    QuestionParams, SlideParams, TableParams,
};

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null)
}

/// 操作目录：操作名 → 参数 JSON Schema
pub fn operation_catalog() -> String {
    let catalog: Vec<Value> = OperationKind::ALL
        .iter()
        .map(|kind| {
            let schema = match kind {
                OperationKind::Card => schema_of::<CardParams>(),
                OperationKind::Table => schema_of::<TableParams>(),
                OperationKind::Connection => schema_of::<ConnectionParams>(),
                OperationKind::Group => schema_of::<GroupParams>(),
                OperationKind::Slide => schema_of::<SlideParams>(),
                OperationKind::Question => schema_of::<QuestionParams>(),
            };
            serde_json::json!({ "operation": kind.as_str(), "parameters": schema })
        })
        .collect();
    serde_json::to_string_pretty(&catalog).unwrap_or_default()
}

/// 主请求的 system prompt
pub fn system_prompt(kind: RequestKind) -> String {
    let focus = match kind {
        RequestKind::OpenEnded => {
            "Prefer a handful of cards. When ideas depend on each other, add connection \
             operations from cause to effect; cluster related cards with group operations."
        }
        RequestKind::Slides => {
            "The user wants a presentation: answer with one slide operation holding all pages, \
             plus cards only if they help."
        }
        RequestKind::Export(_) => {
            "The result will be exported: put tabular data in table operations and presentation \
             content in slide operations."
        }
    };
    format!(
        "You arrange knowledge on an infinite canvas.\n\
         Reply with a JSON array of operations, each shaped as \
         {{\"operation\": \"<name>\", \"parameters\": {{...}}}}. No prose outside the array.\n\
         Every card needs a unique \"name\"; connections and groups refer to cards by name.\n\
         {}\n\n\
         Available operations and their parameter schemas:\n{}",
        focus,
        operation_catalog()
    )
}

/// 主请求的消息列表：画布上下文（若有）+ 请求文本
pub fn request_messages(kind: RequestKind, text: &str, context: &[String]) -> Vec<Message> {
    let user = if context.is_empty() {
        text.to_string()
    } else {
        format!(
            "Canvas context:\n{}\n\nRequest:\n{}",
            context
                .iter()
                .map(|c| format!("- {}", c))
                .collect::<Vec<_>>()
                .join("\n"),
            text
        )
    };
    vec![Message::system(system_prompt(kind)), Message::user(user)]
}

/// 澄清轮：询问模型是否需要先向用户提一个选择题
pub fn clarification_messages(text: &str) -> Vec<Message> {
    vec![
        Message::system(
            "Decide whether the request below is ambiguous enough to ask the user one \
             multiple-choice question first. If so, reply with exactly one operation \
             {\"operation\": \"question\", \"parameters\": {\"question\": \"...\", \"options\": [\"...\", \"...\"]}}. \
             Otherwise reply with an empty JSON array [].",
        ),
        Message::user(text),
    ]
}

/// 从澄清轮回复中取出第一个可用的问题（至少两个非空选项）
pub fn extract_question(reply: &str) -> Option<QuestionParams> {
    let ParseResult::Success(calls) = parse(reply) else {
        return None;
    };
    classify(calls).questions.iter().find_map(|call| {
        let mut q: QuestionParams = call.params();
        q.options.retain(|o| !o.trim().is_empty());
        (!q.question.trim().is_empty() && q.options.len() >= 2).then_some(q)
    })
}

/// 把用户选择追加到请求文本
pub fn append_clarification(text: &str, choice: &str) -> String {
    format!("{}\n\nClarification: {}", text, choice)
}

/// 后续建议：请求文本 + 本次放置的内容摘要
pub fn suggestion_messages(text: &str, placed: &[String], max: usize) -> Vec<Message> {
    vec![
        Message::system(format!(
            "Suggest up to {} short follow-up requests the user might make next. \
             Reply with a JSON array of strings only.",
            max
        )),
        Message::user(format!(
            "Request:\n{}\n\nPlaced on the canvas:\n{}",
            text,
            placed.join("\n")
        )),
    ]
}

/// 解析建议：优先 JSON 字符串数组，否则按列表行（- / * / 1.）读取；去空、截断到 max
pub fn parse_suggestions(reply: &str, max: usize) -> Vec<String> {
    let trimmed = reply.trim();
    let from_json = trimmed
        .find('[')
        .zip(trimmed.rfind(']'))
        .filter(|(start, end)| start < end)
        .and_then(|(start, end)| serde_json::from_str::<Vec<String>>(&trimmed[start..=end]).ok());

    let items = from_json.unwrap_or_else(|| {
        trimmed
            .lines()
            .map(|line| {
                let line = line.trim();
                let line = line
                    .strip_prefix("- ")
                    .or_else(|| line.strip_prefix("* "))
                    .unwrap_or(line);
                let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
                let item = match line[digits..].strip_prefix(". ") {
                    Some(rest) if digits > 0 => rest,
                    _ => line,
                };
                item.to_string()
            })
            .collect()
    });

    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(max)
        .collect()
}

/// 后台摘要
pub fn summarize_messages(text: &str) -> Vec<Message> {
    vec![
        Message::system(
            "Summarize the following text in at most three sentences. Reply with the summary only.",
        ),
        Message::user(text),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lists_every_operation() {
        let catalog: Vec<Value> = serde_json::from_str(&operation_catalog()).unwrap();
        let names: Vec<&str> = catalog
            .iter()
            .filter_map(|c| c["operation"].as_str())
            .collect();
        assert_eq!(
            names,
            vec!["card", "table", "connection", "group", "slide", "question"]
        );
        assert!(catalog[0]["parameters"].is_object());
    }

    #[test]
    fn test_request_messages_include_context() {
        let msgs = request_messages(
            RequestKind::OpenEnded,
            "Explain tides",
            &["[card] Moon".to_string()],
        );
        assert_eq!(msgs.len(), 2);
        assert!(msgs[1].content.contains("- [card] Moon"));
        assert!(msgs[1].content.ends_with("Explain tides"));
        assert!(msgs[0].content.contains("\"operation\""));
    }

    #[test]
    fn test_extract_question() {
        let reply = r#"[{"operation":"question","parameters":{"question":"Level?","options":["Intro","Deep dive"]}}]"#;
        let q = extract_question(reply).unwrap();
        assert_eq!(q.question, "Level?");
        assert_eq!(q.options, vec!["Intro", "Deep dive"]);
    }

    #[test]
    fn test_extract_question_needs_two_options() {
        let reply = r#"[{"operation":"question","parameters":{"question":"Level?","options":["Intro", " "]}}]"#;
        assert!(extract_question(reply).is_none());
        assert!(extract_question("[]").is_none());
        assert!(extract_question("no thanks").is_none());
    }

    #[test]
    fn test_append_clarification() {
        assert_eq!(
            append_clarification("Explain tides", "For kids"),
            "Explain tides\n\nClarification: For kids"
        );
    }

    #[test]
    fn test_parse_suggestions_json() {
        let reply = "Sure:\n[\"Compare with Mars\", \"\", \"Add a timeline\", \"Quiz me\", \"More\"]";
        assert_eq!(
            parse_suggestions(reply, 3),
            vec!["Compare with Mars", "Add a timeline", "Quiz me"]
        );
    }

    #[test]
    fn test_parse_suggestions_bullets() {
        let reply = "- Compare with Mars\n* Add a timeline\n3. Quiz me\n\n";
        assert_eq!(
            parse_suggestions(reply, 5),
            vec!["Compare with Mars", "Add a timeline", "Quiz me"]
        );
    }
}
