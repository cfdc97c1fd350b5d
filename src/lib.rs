//! Tantrik - 灵体对话服务与 Pungde 农业助手
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **conversation**: 对话消息与角色
//! - **core**: 启动期错误与凭据
//! - **farm**: Pungde 根 Agent 与子 Agent 描述、清单导出
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: tracing 日志初始化
//! - **server**: axum HTTP 服务（health / spirits / chat / stream）
//! - **spirits**: 灵体人格、主备切换的对话调用与流式输出
//! - **tools**: 农业函数工具（产量预测、农业气候、图像生成）
//! - **transform**: 回复文本后处理（图像标记替换）

pub mod config;
pub mod conversation;
pub mod core;
pub mod farm;
pub mod llm;
pub mod observability;
pub mod server;
pub mod spirits;
#[cfg(test)]
pub(crate) mod test_support;
pub mod tools;
pub mod transform;
