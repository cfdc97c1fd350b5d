//! 启动期错误
//!
//! 只有启动期错误会终止进程：缺少主 API Key、配置无法解析、端口无法绑定。
//! 请求期的失败都在业务层转成灵体的失败回复或 HTTP 错误体。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TantrikError {
    #[error("{0} is required")]
    MissingCredential(&'static str),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
