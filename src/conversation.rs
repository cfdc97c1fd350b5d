//! 对话消息
//!
//! 调用方每次请求都携带完整历史（服务端不保存会话），灵体在发送前于首位插入自己的 system prompt。

use serde::{Deserialize, Serialize};

/// 消息角色（与 OpenAI Chat API 一致，序列化为小写）
///
/// 其他角色名原样保留，交给上游客户端决定是否接受。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    System,
    User,
    Assistant,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Other(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        match name.as_str() {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Other(name),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 在对话前插入 system prompt，返回新的消息序列（不修改调用方的历史）
pub fn with_system_prompt(system_prompt: &str, messages: &[Message]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    out.push(Message::system(system_prompt));
    out.extend_from_slice(messages);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_unknown_role_is_kept() {
        let parsed: Message = serde_json::from_str(r#"{"role":"wizard","content":"boo"}"#).unwrap();
        assert_eq!(parsed.role, Role::Other("wizard".to_string()));
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"{"role":"wizard","content":"boo"}"#
        );
        assert!(serde_json::from_str::<Message>(r#"{"role":7,"content":"boo"}"#).is_err());
    }

    #[test]
    fn test_with_system_prompt_prepends() {
        let history = vec![Message::user("hi"), Message::assistant("Good evening.")];
        let out = with_system_prompt("You are Count Dracula.", &history);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], Message::system("You are Count Dracula."));
        assert_eq!(&out[1..], history.as_slice());
    }
}
