//! Tantrik HTTP 服务
//!
//! 路由：
//! - `GET  /health`  存活检查
//! - `GET  /spirits` 人格列表
//! - `POST /chat`    同步对话
//! - `POST /stream`  SSE 流式对话
//!
//! 注册表在启动时构建一次，以 `Arc<AppState>` 注入；handler panic 时返回 500 JSON。

pub mod api;
pub mod error;

use std::any::Any;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::config::ServerSection;
use crate::core::TantrikError;
use crate::spirits::SpiritRegistry;

pub use error::ApiError;

pub const SERVICE_NAME: &str = "Tantrik AI";

/// 请求间共享的只读状态
pub struct AppState {
    pub service: &'static str,
    pub registry: SpiritRegistry,
}

impl AppState {
    pub fn new(registry: SpiritRegistry) -> Self {
        Self {
            service: SERVICE_NAME,
            registry,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/spirits", get(api::spirits))
        .route("/chat", post(api::chat))
        .route("/stream", post(api::stream))
        .fallback(api::not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    ApiError::Internal(detail).into_response()
}

/// 绑定端口并运行直到进程退出
pub async fn serve(server: &ServerSection, state: Arc<AppState>) -> Result<(), TantrikError> {
    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Starting Tantrik AI service");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
