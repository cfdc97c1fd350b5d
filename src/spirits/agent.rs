//! 灵体 Agent：主/备客户端包装
//!
//! 每次调用只由一个客户端服务；主客户端遇到上游服务错误时切换备用客户端，且最多切换一次。
//! 切换逻辑写成显式的两段（先主后备），不做递归。

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::conversation::{with_system_prompt, Message};
use crate::core::Credentials;
use crate::llm::{LlmClient, LlmError, OpenAiClient, OpenAiClientOptions};
use crate::spirits::replies;
use crate::spirits::stream::{pump, PumpOutcome, SpiritStream, StreamEvent, STREAM_BUFFER};
use crate::spirits::SpiritDescriptor;

/// 本次调用由哪个客户端服务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiUsed {
    Primary,
    Fallback,
}

impl std::fmt::Display for ApiUsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiUsed::Primary => f.write_str("primary"),
            ApiUsed::Fallback => f.write_str("fallback"),
        }
    }
}

/// 主客户端 + 可选备用客户端，由单个灵体独占
#[derive(Clone)]
pub struct ClientPair {
    primary: Arc<dyn LlmClient>,
    fallback: Option<Arc<dyn LlmClient>>,
}

impl ClientPair {
    pub fn new(primary: Arc<dyn LlmClient>, fallback: Option<Arc<dyn LlmClient>>) -> Self {
        Self { primary, fallback }
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// use_fallback 且存在备用客户端时选备用，否则选主客户端
    fn select(&self, use_fallback: bool) -> (ApiUsed, &Arc<dyn LlmClient>) {
        match (&self.fallback, use_fallback) {
            (Some(fallback), true) => (ApiUsed::Fallback, fallback),
            _ => (ApiUsed::Primary, &self.primary),
        }
    }

    /// 第一次尝试失败后可否切换：第一次用的是主客户端、错误来自上游、且配置了备用客户端
    fn fallback_after(&self, first: ApiUsed, err: &LlmError) -> Option<&Arc<dyn LlmClient>> {
        if first == ApiUsed::Primary && err.is_upstream() {
            self.fallback.as_ref()
        } else {
            None
        }
    }
}

/// 统一的对话结果：成功与失败都以此返回，不持久化
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResult {
    pub content: String,
    pub model: String,
    pub tokens_used: u32,
    pub api_used: ApiUsed,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 灵体 Agent：人格描述 + 独占的客户端对
pub struct SpiritAgent {
    descriptor: SpiritDescriptor,
    clients: ClientPair,
}

impl SpiritAgent {
    pub fn new(descriptor: SpiritDescriptor, clients: ClientPair) -> Self {
        tracing::info!(
            spirit = descriptor.id,
            fallback = clients.has_fallback(),
            "{} initialized with {}",
            descriptor.name,
            descriptor.model
        );
        Self {
            descriptor,
            clients,
        }
    }

    /// 按人格参数为主/备 Key 各建一个 OpenAI 客户端
    pub fn from_credentials(
        descriptor: SpiritDescriptor,
        credentials: &Credentials,
        options: &OpenAiClientOptions,
    ) -> Self {
        let build = |key: &str| -> Arc<dyn LlmClient> {
            Arc::new(
                OpenAiClient::new(key, descriptor.model, options)
                    .with_sampling(descriptor.temperature, descriptor.max_tokens),
            )
        };
        let primary = build(&credentials.primary);
        let fallback = credentials.fallback.as_deref().map(build);
        Self::new(descriptor, ClientPair::new(primary, fallback))
    }

    pub fn descriptor(&self) -> &SpiritDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> &'static str {
        self.descriptor.id
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// 同步对话（从主客户端开始）
    pub async fn chat(&self, messages: &[Message]) -> ChatResult {
        self.chat_with(messages, false).await
    }

    /// 同步对话；use_fallback 为 true 时直接从备用客户端开始（此时不再有下一次切换）
    pub async fn chat_with(&self, messages: &[Message], use_fallback: bool) -> ChatResult {
        let conversation = with_system_prompt(self.descriptor.system_prompt, messages);

        let (first, client) = self.clients.select(use_fallback);
        let err = match self.attempt(first, client.as_ref(), &conversation).await {
            Ok(result) => return result,
            Err(err) => err,
        };

        let Some(fallback) = self.clients.fallback_after(first, &err) else {
            return self.failure(first, err);
        };

        tracing::info!(spirit = self.id(), "{} trying fallback...", self.name());
        match self
            .attempt(ApiUsed::Fallback, fallback.as_ref(), &conversation)
            .await
        {
            Ok(result) => result,
            Err(err) => self.failure(ApiUsed::Fallback, err),
        }
    }

    async fn attempt(
        &self,
        api_used: ApiUsed,
        client: &dyn LlmClient,
        conversation: &[Message],
    ) -> Result<ChatResult, LlmError> {
        match client.complete(conversation).await {
            Ok(completion) => {
                tracing::info!(
                    spirit = self.id(),
                    api = %api_used,
                    tokens = completion.total_tokens,
                    "{} ({}): {} tokens",
                    self.name(),
                    api_used,
                    completion.total_tokens
                );
                Ok(ChatResult {
                    content: completion.content,
                    model: self.descriptor.model.to_string(),
                    tokens_used: completion.total_tokens,
                    api_used,
                    success: true,
                    error: None,
                })
            }
            Err(err) => {
                tracing::error!(spirit = self.id(), api = %api_used, "{} ({}): {}", self.name(), api_used, err);
                Err(err)
            }
        }
    }

    fn failure(&self, api_used: ApiUsed, err: LlmError) -> ChatResult {
        let content = match &err {
            LlmError::Api(_) => replies::FADES_INTO_DARKNESS,
            LlmError::Unexpected(_) => replies::CANNOT_MANIFEST,
        };
        ChatResult {
            content: content.to_string(),
            model: self.descriptor.model.to_string(),
            tokens_used: 0,
            api_used,
            success: false,
            error: Some(err.to_string()),
        }
    }

    /// 流式对话（从主客户端开始）
    pub fn stream_chat(self: &Arc<Self>, messages: Vec<Message>) -> SpiritStream {
        self.stream_chat_with(messages, false)
    }

    /// 流式对话：后台任务把上游分片写入 channel，最后发送 Done；
    /// 消费方丢弃 SpiritStream 后生产者随即停止读取上游
    pub fn stream_chat_with(self: &Arc<Self>, messages: Vec<Message>, use_fallback: bool) -> SpiritStream {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let conversation = with_system_prompt(self.descriptor.system_prompt, &messages);
        tokio::spawn(Arc::clone(self).produce(conversation, use_fallback, tx));
        SpiritStream::new(rx)
    }

    async fn produce(
        self: Arc<Self>,
        conversation: Vec<Message>,
        use_fallback: bool,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let (mut api_used, client) = self.clients.select(use_fallback);
        tracing::info!(spirit = self.id(), api = %api_used, "{} streaming ({})", self.name(), api_used);

        let mut outcome = pump(client.as_ref(), &conversation, &tx).await;

        // 只有在尚未输出任何分片时才切换，避免前端收到重复内容
        if let PumpOutcome::Failed { err, emitted: 0 } = &outcome {
            if let Some(fallback) = self.clients.fallback_after(api_used, err) {
                tracing::error!(spirit = self.id(), api = %api_used, "{} stream failed ({}): {}", self.name(), api_used, err);
                tracing::info!(spirit = self.id(), "{} trying fallback stream...", self.name());
                api_used = ApiUsed::Fallback;
                outcome = pump(fallback.as_ref(), &conversation, &tx).await;
            }
        }

        match outcome {
            PumpOutcome::Finished => {}
            PumpOutcome::ConsumerGone => {
                tracing::debug!(spirit = self.id(), "stream consumer went away");
                return;
            }
            PumpOutcome::Failed { err, emitted } => {
                tracing::error!(
                    spirit = self.id(),
                    api = %api_used,
                    emitted,
                    "{} stream failed ({}): {}",
                    self.name(),
                    api_used,
                    err
                );
                let text = match err {
                    LlmError::Api(_) => replies::VOICE_FADES,
                    LlmError::Unexpected(_) => replies::CONNECTION_SEVERED,
                };
                if tx.send(StreamEvent::Fragment(text.to_string())).await.is_err() {
                    return;
                }
            }
        }

        let _ = tx.send(StreamEvent::Done).await;
    }
}
