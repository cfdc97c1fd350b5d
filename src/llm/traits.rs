//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete（非流式）、complete_stream（流式 Token）。
//! 错误分两类：上游服务错误（可切换备用客户端）与本地意外错误（不切换）。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

use crate::conversation::Message;

/// LLM 调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// 上游服务返回的错误（限流、鉴权、请求格式、网络等）
    #[error("API error: {0}")]
    Api(String),

    /// 本地意外错误（请求构造失败、响应无法解析等）
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl LlmError {
    /// 是否为上游服务错误；只有这类错误会触发备用客户端
    pub fn is_upstream(&self) -> bool {
        matches!(self, LlmError::Api(_))
    }
}

/// 一次非流式完成的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    /// usage.total_tokens，上游未返回时为 0
    pub total_tokens: u32,
}

/// 流式 Token 流
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// LLM 客户端 trait：非流式完成与流式完成（返回 Token 流）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<Completion, LlmError>;

    /// 流式完成，返回 Token 流；建立连接失败时直接返回 Err
    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError>;

    /// 模型名（用于日志）
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_api_errors_are_upstream() {
        assert!(LlmError::Api("rate limited".into()).is_upstream());
        assert!(!LlmError::Unexpected("bad request builder".into()).is_upstream());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            LlmError::Api("429 Too Many Requests".into()).to_string(),
            "API error: 429 Too Many Requests"
        );
    }
}
