//! HTTP handlers：health / spirits / chat / stream
//!
//! 只做请求校验与结果映射；业务失败（灵体无法回应）仍返回 200，由 success 字段区分。

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::HeaderName;
use axum::http::HeaderValue;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::conversation::Message;
use crate::server::{ApiError, AppState};
use crate::spirits::{replies, ApiUsed, SpiritAgent, SpiritStream, StreamEvent};

/// SSE 终止哨兵
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub spirit_id: &'static str,
    pub spirit_name: &'static str,
    pub response: String,
    pub model: String,
    pub tokens_used: u32,
    pub api_used: ApiUsed,
    pub success: bool,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "alive",
        "service": state.service,
        "spirits": state.registry.ids(),
    }))
}

/// GET /spirits
pub async fn spirits(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "spirits": state.registry.infos() }))
}

/// POST /chat
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    let fields = parse_body(&body)?;

    let spirit_id = spirit_id(&fields).ok_or(ApiError::BadRequest("spirit_id is required"))?;
    let spirit = state.registry.get(spirit_id).ok_or_else(|| {
        tracing::warn!(spirit_id, "unknown spirit requested");
        ApiError::UnknownSpirit {
            available: state.registry.ids(),
        }
    })?;
    let messages = parse_messages(&fields)?;

    let result = spirit.chat(&messages).await;
    Ok(Json(ChatResponse {
        spirit_id: spirit.id(),
        spirit_name: spirit.name(),
        response: result.content,
        model: result.model,
        tokens_used: result.tokens_used,
        api_used: result.api_used,
        success: result.success,
    }))
}

/// POST /stream：每个分片一个 `data:` 事件，最后 `data: [DONE]`
pub async fn stream(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let fields = parse_body(&body)?;

    let spirit: &Arc<SpiritAgent> = spirit_id(&fields)
        .and_then(|id| state.registry.get(id))
        .ok_or(ApiError::BadRequest("invalid spirit_id"))?;
    let messages = parse_messages(&fields)?;

    let events = sse_events(spirit.stream_chat(messages)).map(Ok::<_, Infallible>);
    Ok((
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(events),
    ))
}

/// 未匹配路由
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

enum SseState {
    Open(SpiritStream),
    /// 生产者异常退出，补发哨兵
    Sentinel,
    Closed,
}

/// SpiritStream → SSE 事件；保证最后一个事件总是哨兵
fn sse_events(stream: SpiritStream) -> impl futures_util::Stream<Item = Event> + Send {
    stream::unfold(SseState::Open(stream), |state| async move {
        match state {
            SseState::Open(mut s) => match s.next().await {
                Some(StreamEvent::Fragment(text)) => Some((data_event(&text), SseState::Open(s))),
                Some(StreamEvent::Done) => Some((data_event(DONE_SENTINEL), SseState::Closed)),
                None => {
                    tracing::error!("streaming failed: producer ended without a terminal event");
                    Some((data_event(replies::VOICE_HAS_FADED), SseState::Sentinel))
                }
            },
            SseState::Sentinel => Some((data_event(DONE_SENTINEL), SseState::Closed)),
            SseState::Closed => None,
        }
    })
}

/// SSE 字段值不能含 '\r'；'\n' 由 axum 拆成多行 data
fn data_event(text: &str) -> Event {
    Event::default().data(text.replace('\r', ""))
}

fn parse_body(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) if !fields.is_empty() => Ok(fields),
        _ => Err(ApiError::BadRequest("No JSON body provided")),
    }
}

fn spirit_id(fields: &Map<String, Value>) -> Option<&str> {
    fields
        .get("spirit_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// messages 必须是非空数组，且每项都是 {role: 字符串, content: 字符串}；角色名不在此校验
fn parse_messages(fields: &Map<String, Value>) -> Result<Vec<Message>, ApiError> {
    const INVALID: ApiError = ApiError::BadRequest("messages must be a non-empty list");
    let Some(Value::Array(items)) = fields.get("messages") else {
        return Err(INVALID);
    };
    if items.is_empty() {
        return Err(INVALID);
    }
    items
        .iter()
        .map(|item| serde_json::from_value::<Message>(item.clone()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            tracing::warn!("malformed message in request: {}", e);
            INVALID
        })
}
