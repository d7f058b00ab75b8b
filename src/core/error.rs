//! 任务错误类型
//!
//! 解析失败不在此列：它表现为 ParseResult::Failure 并走纯文本兜底。

use thiserror::Error;

/// 编排过程中可能出现的错误（传输、超时、渲染、导出、澄清、配置、内部故障）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeaveError {
    /// 模型服务不可达或请求失败（不重试）
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Timeout exceeded: {0}")]
    TimeoutExceeded(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Clarification failed: {0}")]
    Clarification(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for WeaveError {
    fn from(e: config::ConfigError) -> Self {
        WeaveError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            WeaveError::Transport("503".into()).to_string(),
            "Transport failure: 503"
        );
        let e: WeaveError = config::ConfigError::Message("bad".into()).into();
        assert!(matches!(e, WeaveError::Config(_)));
    }
}
