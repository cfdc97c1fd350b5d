//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）。每个客户端绑定一个 API Key、
//! 一个模型与固定的采样参数；单次请求带固定超时，瞬时错误（传输层、5xx、429 限流）最多重试 max_retries 次。
//!
//! async_openai 自带的 backoff 重试被关闭（否则 5xx/429 会在库内重试长达 15 分钟，主备切换形同虚设），
//! 重试次数完全由本客户端控制。

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::{ApiError, OpenAIError};
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use futures_util::StreamExt;

use crate::conversation::{Message, Role};
use crate::llm::{Completion, LlmClient, LlmError, TokenStream};

/// 首次重试前的等待时间，之后每次翻倍
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// 客户端公共参数（来自 [llm] 配置段）
#[derive(Debug, Clone)]
pub struct OpenAiClientOptions {
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for OpenAiClientOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

/// OpenAI 兼容客户端：持有 Client、模型名与采样参数
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str, options: &OpenAiClientOptions) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(url) = options.base_url.as_deref() {
            config = config.with_api_base(url);
        }

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .unwrap_or_default();

        // max_elapsed_time = 0：库内不重试
        let no_backoff = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::with_config(config)
                .with_http_client(http)
                .with_backoff(no_backoff),
            model: model.to_string(),
            temperature: 1.0,
            max_tokens: 500,
            max_retries: options.max_retries,
        }
    }

    /// 设置该人格固定的 temperature 与 max tokens
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// 上游只接受 system / user / assistant；其他角色等同于上游拒绝该请求
    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        messages
            .iter()
            .map(|m| {
                Ok(match &m.role {
                    Role::System => ChatCompletionRequestMessage::System(
                        ChatCompletionRequestSystemMessageArgs::default()
                            .content(m.content.clone())
                            .build()
                            .map_err(classify)?,
                    ),
                    Role::User => ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(m.content.clone())
                            .build()
                            .map_err(classify)?,
                    ),
                    Role::Assistant => ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .content(m.content.clone())
                            .build()
                            .map_err(classify)?,
                    ),
                    Role::Other(name) => {
                        return Err(LlmError::Api(format!("invalid message role: {name}")));
                    }
                })
            })
            .collect()
    }

    #[allow(deprecated)]
    fn build_request(&self, messages: &[Message]) -> Result<CreateChatCompletionRequest, LlmError> {
        let messages = self.to_openai_messages(messages)?;
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(classify)
    }

    fn retry_delay(attempt: u32) -> Duration {
        RETRY_BASE_DELAY * 2u32.saturating_pow(attempt)
    }
}

/// OpenAIError → LlmError：请求参数错误属于本地问题，其余都视为上游服务错误
fn classify(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::InvalidArgument(msg) => LlmError::Unexpected(msg),
        other => LlmError::Api(other.to_string()),
    }
}

/// 可重试：传输层错误（超时、连接失败）、5xx、非额度类 429
///
/// async_openai 把 5xx 响应体原样放进 message，type / param / code 均为空；
/// 4xx 则来自上游的结构化错误对象，至少带 type。
fn is_transient(err: &OpenAIError) -> bool {
    match err {
        OpenAIError::Reqwest(_) => true,
        OpenAIError::ApiError(api) => is_server_error(api) || is_rate_limited(api),
        _ => false,
    }
}

fn is_server_error(api: &ApiError) -> bool {
    api.r#type.is_none() && api.param.is_none() && api.code.is_none()
}

fn is_rate_limited(api: &ApiError) -> bool {
    api.code.as_deref() == Some("rate_limit_exceeded")
        && api.r#type.as_deref() != Some("insufficient_quota")
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[Message]) -> Result<Completion, LlmError> {
        let request = self.build_request(messages)?;

        let mut attempt = 0;
        let response = loop {
            match self.client.chat().create(request.clone()).await {
                Ok(response) => break response,
                Err(e) if is_transient(&e) && attempt < self.max_retries => {
                    tracing::warn!(model = %self.model, attempt, "transient LLM error, retrying: {}", e);
                    tokio::time::sleep(Self::retry_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(classify(e)),
            }
        };

        let total_tokens = response.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0);
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(Completion {
            content,
            total_tokens,
        })
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        let request = self.build_request(messages)?;

        let mut attempt = 0;
        let upstream = loop {
            match self.client.chat().create_stream(request.clone()).await {
                Ok(stream) => break stream,
                Err(e) if is_transient(&e) && attempt < self.max_retries => {
                    tracing::warn!(model = %self.model, attempt, "transient stream error, retrying: {}", e);
                    tokio::time::sleep(Self::retry_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(classify(e)),
            }
        };

        let stream = upstream.map(|item| match item {
            Ok(chunk) => Ok(chunk
                .choices
                .into_iter()
                .filter_map(|c| c.delta.content)
                .collect::<String>()),
            Err(e) => Err(classify(e)),
        });
        Ok(Box::pin(stream))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_stub;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_invalid_argument_is_not_upstream() {
        let err = classify(OpenAIError::InvalidArgument("messages is empty".into()));
        assert_eq!(err, LlmError::Unexpected("messages is empty".into()));
    }

    #[test]
    fn test_retry_delay_doubles() {
        assert_eq!(OpenAiClient::retry_delay(0), Duration::from_millis(500));
        assert_eq!(OpenAiClient::retry_delay(1), Duration::from_millis(1000));
        assert_eq!(OpenAiClient::retry_delay(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_unknown_role_is_rejected_as_upstream_error() {
        let client = OpenAiClient::new("sk-test", "gpt-4o-mini", &OpenAiClientOptions::default());
        let err = client
            .build_request(&[Message {
                role: Role::Other("wizard".into()),
                content: "boo".into(),
            }])
            .unwrap_err();
        assert!(err.is_upstream());
    }

    #[test]
    #[allow(deprecated)]
    fn test_build_request_carries_sampling() {
        let client = OpenAiClient::new("sk-test", "gpt-4o-mini", &OpenAiClientOptions::default())
            .with_sampling(0.9, 500);
        let request = client
            .build_request(&[Message::system("You are Count Dracula."), Message::user("hi")])
            .unwrap();
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.temperature, Some(0.9));
        assert_eq!(request.max_tokens, Some(500));
        assert_eq!(request.max_completion_tokens, None);
    }

    fn stub_client(base: &str) -> OpenAiClient {
        let options = OpenAiClientOptions {
            base_url: Some(format!("{base}/v1")),
            timeout: Duration::from_secs(5),
            max_retries: 2,
        };
        OpenAiClient::new("sk-test", "gpt-4o-mini", &options)
    }

    /// 始终返回 status 的桩服务，记录被调用次数
    async fn counting_stub(status: StatusCode, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let base = spawn_stub(Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (status, [("content-type", "application/json")], body)
                }
            }),
        ))
        .await;
        (base, hits)
    }

    #[tokio::test]
    async fn test_server_error_retries_are_bounded() {
        let (base, hits) = counting_stub(StatusCode::SERVICE_UNAVAILABLE, "upstream overloaded").await;
        let client = stub_client(&base);

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            client.complete(&[Message::user("hi")]),
        )
        .await
        .expect("complete must give up within the retry budget");

        assert!(matches!(result, Err(LlmError::Api(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let (base, hits) = counting_stub(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"bad role","type":"invalid_request_error","param":null,"code":null}}"#,
        )
        .await;
        let client = stub_client(&base);

        let result = client.complete(&[Message::user("hi")]).await;
        assert!(matches!(result, Err(LlmError::Api(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
