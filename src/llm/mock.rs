//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按预设脚本回复：固定文本 / 分片流 / 上游错误 / 本地错误 / 流中途断开 / panic；记录调用次数，
//! 便于断言「主客户端失败后备用客户端恰好被调用一次」。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::conversation::Message;
use crate::llm::{Completion, LlmClient, LlmError, TokenStream};

#[derive(Debug, Clone)]
enum Script {
    Reply(Vec<String>),
    Fail(LlmError),
    /// 先输出若干分片，再返回错误
    FailAfter(Vec<String>, LlmError),
    Panic(String),
}

/// Mock 客户端：按脚本回复，并记录调用次数与最后一次收到的消息
#[derive(Debug)]
pub struct MockLlmClient {
    script: Script,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<Message>>,
}

impl MockLlmClient {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    /// 总是成功，回复固定文本（流式时作为单个分片）
    pub fn replying(content: impl Into<String>) -> Self {
        Self::with_script(Script::Reply(vec![content.into()]))
    }

    /// 总是成功，流式时逐个输出分片；非流式时拼接返回
    pub fn streaming<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::Reply(fragments.into_iter().map(Into::into).collect()))
    }

    /// 总是失败
    pub fn failing(err: LlmError) -> Self {
        Self::with_script(Script::Fail(err))
    }

    /// 流式输出部分分片后失败；非流式调用直接失败
    pub fn failing_after<I, S>(fragments: I, err: LlmError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::FailAfter(
            fragments.into_iter().map(Into::into).collect(),
            err,
        ))
    }

    /// 调用即 panic（用于验证 handler 与流生产者的异常路径）
    pub fn panicking(message: impl Into<String>) -> Self {
        Self::with_script(Script::Panic(message.into()))
    }

    /// complete + complete_stream 的累计调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<Message> {
        self.last_messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    fn record(&self, messages: &[Message]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_messages.lock() {
            *last = messages.to_vec();
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<Completion, LlmError> {
        self.record(messages);
        match &self.script {
            Script::Reply(fragments) => {
                let content = fragments.concat();
                Ok(Completion {
                    total_tokens: content.split_whitespace().count() as u32,
                    content,
                })
            }
            Script::Fail(err) | Script::FailAfter(_, err) => Err(err.clone()),
            Script::Panic(message) => panic!("{message}"),
        }
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        self.record(messages);
        match &self.script {
            Script::Reply(fragments) => {
                let items: Vec<Result<String, LlmError>> =
                    fragments.iter().cloned().map(Ok).collect();
                Ok(Box::pin(stream::iter(items)))
            }
            Script::Fail(err) => Err(err.clone()),
            Script::FailAfter(fragments, err) => {
                let mut items: Vec<Result<String, LlmError>> =
                    fragments.iter().cloned().map(Ok).collect();
                items.push(Err(err.clone()));
                Ok(Box::pin(stream::iter(items)))
            }
            Script::Panic(message) => panic!("{message}"),
        }
    }

    fn model(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_replying_counts_calls() {
        let mock = MockLlmClient::replying("Good evening.");
        let out = mock.complete(&[Message::user("hi")]).await.unwrap();
        assert_eq!(out.content, "Good evening.");
        assert_eq!(out.total_tokens, 2);
        assert_eq!(mock.calls(), 1);
        assert_eq!(mock.last_messages(), vec![Message::user("hi")]);
    }

    #[tokio::test]
    async fn test_failing_after_yields_then_errors() {
        let mock = MockLlmClient::failing_after(["Good "], LlmError::Api("reset".into()));
        let items: Vec<_> = mock
            .complete_stream(&[Message::user("hi")])
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items, vec![Ok("Good ".to_string()), Err(LlmError::Api("reset".into()))]);
    }
}
