//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete（非流式）、complete_stream（流式文本块）、ping（探活）。
//! 失败一律以人类可读的字符串返回，由编排器映射为 WeaveError::Transport。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::llm::Message;

/// 流式文本块
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, String>> + Send>>;

/// LLM 客户端 trait：非流式完成与流式完成（返回文本块流）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 流式完成，返回文本块流；调用方只读取累计后的完整文本
    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream, String>;

    /// 探活：服务可达返回 Ok；默认视为可达
    async fn ping(&self) -> Result<(), String> {
        Ok(())
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
