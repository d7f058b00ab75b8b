//! Mock LLM 客户端（用于测试与演示，无需 API）
//!
//! 按顺序返回预置的回复；预置回复耗尽后回显最后一条 User 消息。
//! 可设置流式分块大小、响应延迟与探活结果，便于覆盖超时与传输失败路径。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};

use crate::llm::{LlmClient, Message, Role, TextStream};

/// Mock 客户端：预置回复队列 + 回显兜底
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    /// 收到的每次请求（最后一条 User 消息）
    requests: Mutex<Vec<String>>,
    chunk_chars: Option<usize>,
    chunk_delay: Option<Duration>,
    delay: Option<Duration>,
    ping_error: Option<String>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回给定回复
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::default();
        for reply in replies {
            client.push_reply(reply);
        }
        client
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Ok(reply.into()));
        }
    }

    /// 下一次调用返回失败
    pub fn push_failure(&self, reason: impl Into<String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Err(reason.into()));
        }
    }

    /// 流式输出时每块字符数
    pub fn with_chunk_chars(mut self, chars: usize) -> Self {
        self.chunk_chars = Some(chars.max(1));
        self
    }

    /// 流式输出时每块之前等待
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// 每次调用前等待
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 探活失败
    pub fn with_ping_error(mut self, reason: impl Into<String>) -> Self {
        self.ping_error = Some(reason.into());
        self
    }

    /// 已收到的请求（每次调用的最后一条 User 消息）
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_reply(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_else(|| "(no input)".to_string());
        if let Ok(mut r) = self.requests.lock() {
            r.push(last_user.clone());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Ok(format!("Echo from Mock: {}", last_user)))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_reply(messages)
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream, String> {
        let content = self.complete(messages).await?;
        let chunks: Vec<Result<String, String>> = match self.chunk_chars {
            Some(size) => content
                .chars()
                .collect::<Vec<_>>()
                .chunks(size)
                .map(|c| Ok(c.iter().collect::<String>()))
                .collect(),
            None => vec![Ok(content)],
        };
        match self.chunk_delay {
            Some(delay) => Ok(Box::pin(stream::iter(chunks).then(move |chunk| async move {
                tokio::time::sleep(delay).await;
                chunk
            }))),
            None => Ok(Box::pin(stream::iter(chunks))),
        }
    }

    async fn ping(&self) -> Result<(), String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.ping_error {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }
}
