//! Tantrik AI - 灵体对话服务
//!
//! 入口：加载 .env 与配置、初始化日志、构建灵体注册表并启动 HTTP 服务。
//! 缺少 OPENAI_API_KEY_PRIMARY 时直接退出。

use std::sync::Arc;

use anyhow::Context;
use tantrik::config::load_config;
use tantrik::core::Credentials;
use tantrik::observability;
use tantrik::server::{self, AppState};
use tantrik::spirits::SpiritRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let credentials = Credentials::from_env().inspect_err(|e| tracing::error!("{}", e))?;

    let registry = SpiritRegistry::from_credentials(&credentials, &cfg.llm.client_options());
    let state = Arc::new(AppState::new(registry));

    server::serve(&cfg.server, state)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
