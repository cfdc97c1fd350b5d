//! 外部 HTTP 工具的错误

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    /// 非 2xx 响应；detail 取自响应体的 detail 字段
    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for ToolError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ToolError::Timeout
        } else if e.is_connect() {
            ToolError::Connect(e.to_string())
        } else if e.is_decode() {
            ToolError::Decode(e.to_string())
        } else {
            ToolError::Request(e.to_string())
        }
    }
}
