//! 灵体注册表：启动时构建一次，之后只读，通过 axum State 注入到各个 handler

use std::sync::Arc;

use serde::Serialize;

use crate::core::Credentials;
use crate::llm::OpenAiClientOptions;
use crate::spirits::{SpiritAgent, ALL_SPIRITS};

/// /spirits 列表项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpiritInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub emoji: &'static str,
}

/// 有序的只读人格表
pub struct SpiritRegistry {
    spirits: Vec<Arc<SpiritAgent>>,
}

impl SpiritRegistry {
    pub fn new(spirits: Vec<SpiritAgent>) -> Self {
        Self {
            spirits: spirits.into_iter().map(Arc::new).collect(),
        }
    }

    /// 用主/备 Key 初始化全部三个灵体，每个灵体独占自己的客户端对
    pub fn from_credentials(credentials: &Credentials, options: &OpenAiClientOptions) -> Self {
        let registry = Self::new(
            ALL_SPIRITS
                .iter()
                .map(|d| SpiritAgent::from_credentials(*d, credentials, options))
                .collect(),
        );
        tracing::info!(count = registry.spirits.len(), "Spirit agents initialized");
        registry
    }

    pub fn get(&self, id: &str) -> Option<&Arc<SpiritAgent>> {
        self.spirits.iter().find(|s| s.id() == id)
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.spirits.iter().map(|s| s.id()).collect()
    }

    pub fn infos(&self) -> Vec<SpiritInfo> {
        self.spirits
            .iter()
            .map(|s| {
                let d = s.descriptor();
                SpiritInfo {
                    id: d.id,
                    name: d.name,
                    emoji: d.emoji,
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.spirits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spirits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            primary: "sk-primary".into(),
            fallback: Some("sk-fallback".into()),
        }
    }

    #[test]
    fn test_from_credentials_builds_all_spirits() {
        let registry =
            SpiritRegistry::from_credentials(&credentials(), &OpenAiClientOptions::default());
        assert_eq!(registry.ids(), vec!["dracula", "reaper", "bloody_mary"]);
        assert_eq!(registry.get("reaper").map(|s| s.name()), Some("The Grim Reaper"));
        assert!(registry.get("wendigo").is_none());
    }

    #[test]
    fn test_infos_carry_emoji() {
        let registry =
            SpiritRegistry::from_credentials(&credentials(), &OpenAiClientOptions::default());
        assert_eq!(
            registry.infos()[0],
            SpiritInfo {
                id: "dracula",
                name: "Count Dracula",
                emoji: "🧛"
            }
        );
    }
}
