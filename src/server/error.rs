//! HTTP 错误：统一返回 `{error, ...}` JSON

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 请求校验失败（缺字段、格式错误）
    BadRequest(&'static str),
    /// spirit_id 不在注册表中
    UnknownSpirit { available: Vec<&'static str> },
    NotFound,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::UnknownSpirit { available } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "unknown spirit", "available": available })),
            )
                .into_response(),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "endpoint not found" })),
            )
                .into_response(),
            ApiError::Internal(msg) => {
                tracing::error!("internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
