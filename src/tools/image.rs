//! 图像生成：外部生成服务的最小契约
//!
//! 生成器只接收文本 prompt，结果总是 `ImageOutcome`（成功给 image_url，失败给 error_message），
//! 调用方不需要区分网络错误与服务端错误。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tools::registry::required_str;
use crate::tools::{Tool, ToolError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ImageOutcome {
    Success { image_url: String },
    Error { error_message: String },
}

impl ImageOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        ImageOutcome::Error {
            error_message: message.into(),
        }
    }
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> ImageOutcome;
}

/// 通过 HTTP POST `{prompt}` 调用生成服务，响应体即 ImageOutcome
pub struct HttpImageGenerator {
    client: Client,
    url: String,
}

impl HttpImageGenerator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            url: url.into(),
        }
    }

    async fn request(&self, prompt: &str) -> Result<ImageOutcome, ToolError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "prompt": prompt }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ToolError::Status {
                status: status.as_u16(),
                detail: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(resp.json::<ImageOutcome>().await?)
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(&self, prompt: &str) -> ImageOutcome {
        match self.request(prompt).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("image generation failed: {}", e);
                ImageOutcome::failed(e.to_string())
            }
        }
    }
}

/// 未配置生成服务时使用
pub struct UnconfiguredImageGenerator;

#[async_trait]
impl ImageGenerator for UnconfiguredImageGenerator {
    async fn generate(&self, _prompt: &str) -> ImageOutcome {
        ImageOutcome::failed("image generation service is not configured")
    }
}

/// generate_image(prompt)
pub struct ImageTool {
    generator: std::sync::Arc<dyn ImageGenerator>,
}

impl ImageTool {
    pub fn new(generator: std::sync::Arc<dyn ImageGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Tool for ImageTool {
    fn name(&self) -> &str {
        "generate_image"
    }

    fn description(&self) -> &str {
        "Generates an image from a text prompt. Returns status with image_url on success \
         or error_message on failure."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": { "type": "string", "description": "Description of the image to generate" }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let prompt = required_str(&args, "prompt")?;
        let outcome = self.generator.generate(prompt).await;
        serde_json::to_string(&outcome).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_stub;
    use axum::routing::post;
    use axum::{Json, Router};
    use reqwest::StatusCode;
    use std::sync::Arc;

    #[test]
    fn test_outcome_wire_format() {
        let ok: ImageOutcome =
            serde_json::from_value(json!({"status": "success", "image_url": "http://img/1.png"}))
                .unwrap();
        assert_eq!(
            ok,
            ImageOutcome::Success {
                image_url: "http://img/1.png".into()
            }
        );
        assert_eq!(
            serde_json::to_value(ImageOutcome::failed("quota")).unwrap(),
            json!({"status": "error", "error_message": "quota"})
        );
    }

    #[tokio::test]
    async fn test_http_generator_posts_prompt() {
        let base = spawn_stub(Router::new().route(
            "/generate",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "status": "success",
                    "image_url": format!("http://img/{}.png", body["prompt"].as_str().unwrap_or(""))
                }))
            }),
        ))
        .await;
        let generator = HttpImageGenerator::new(format!("{base}/generate"), Duration::from_secs(5));

        assert_eq!(
            generator.generate("paddy").await,
            ImageOutcome::Success {
                image_url: "http://img/paddy.png".into()
            }
        );
    }

    #[tokio::test]
    async fn test_http_generator_error_status() {
        let base = spawn_stub(Router::new().route(
            "/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        ))
        .await;
        let generator = HttpImageGenerator::new(format!("{base}/generate"), Duration::from_secs(5));

        match generator.generate("paddy").await {
            ImageOutcome::Error { error_message } => assert!(error_message.contains("500")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_image_tool_unconfigured() {
        let tool = ImageTool::new(Arc::new(UnconfiguredImageGenerator));
        let out: Value =
            serde_json::from_str(&tool.execute(json!({"prompt": "maize field"})).await.unwrap())
                .unwrap();
        assert_eq!(out["status"], "error");
        assert!(tool.execute(json!({})).await.is_err());
    }
}
