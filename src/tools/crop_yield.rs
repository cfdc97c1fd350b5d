//! 产量预测工具：调用外部预测服务，返回预测产量、地理坐标与作物需求（N/P/K、温湿度、pH、降雨）
//!
//! 固定超时，不重试；服务端失败编码为 `{status: "error", error_message}`。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::tools::registry::required_str;
use crate::tools::{Tool, ToolError};

pub struct CropYieldClient {
    client: Client,
    url: String,
}

impl CropYieldClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 预测服务的 200 响应原样返回（已包含 crop_requirements）
    pub async fn predict(&self, crop_name: &str, location_name: &str) -> Result<Value, ToolError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "crop_name": crop_name, "location_name": location_name }))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::OK {
            return Ok(resp.json::<Value>().await?);
        }

        let body = resp.bytes().await.unwrap_or_default();
        let detail = if body.is_empty() {
            "Service unavailable".to_string()
        } else {
            serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|v| v.get("detail").cloned())
                .map(|d| match d {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "Unknown error".to_string())
        };
        Err(ToolError::Status {
            status: status.as_u16(),
            detail,
        })
    }
}

/// get_crop_yield_prediction(crop_name, location_name)
pub struct CropYieldTool {
    client: CropYieldClient,
}

impl CropYieldTool {
    pub fn new(client: CropYieldClient) -> Self {
        Self { client }
    }

    fn error_payload(&self, err: &ToolError) -> Value {
        let message = match err {
            ToolError::Status { detail, .. } => format!("Prediction service error: {}", detail),
            ToolError::Connect(_) => format!(
                "Could not connect to prediction service at {}.",
                self.client.url()
            ),
            ToolError::Timeout => "Prediction request timed out.".to_string(),
            other => other.to_string(),
        };
        json!({ "status": "error", "error_message": message })
    }
}

#[async_trait]
impl Tool for CropYieldTool {
    fn name(&self) -> &str {
        "get_crop_yield_prediction"
    }

    fn description(&self) -> &str {
        "Calls the prediction service and returns yield prediction along with crop requirements. \
         Returns status, predicted_yield_tons_per_hectare, location_details, crop_name, \
         crop_requirements (N, P, K, temperature, humidity, ph, rainfall) and notes."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "crop_name": { "type": "string", "description": "Crop to predict, e.g. rice" },
                "location_name": { "type": "string", "description": "City, village or district" }
            },
            "required": ["crop_name", "location_name"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let crop_name = required_str(&args, "crop_name")?;
        let location_name = required_str(&args, "location_name")?;

        let output = match self.client.predict(crop_name, location_name).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(crop_name, location_name, "crop yield prediction failed: {}", e);
                self.error_payload(&e)
            }
        };
        Ok(output.to_string())
    }
}
