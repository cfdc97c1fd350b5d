//! 灵体人格：三位恐怖角色的静态描述、主/备客户端对话包装、流式输出与注册表
//!
//! - **agent**: SpiritAgent（同步对话，一次性主→备切换）
//! - **stream**: SpiritStream（基于 channel 的分片流，带显式结束信号）
//! - **registry**: 启动时构建一次的只读人格表

pub mod agent;
pub mod registry;
pub mod stream;

pub use agent::{ApiUsed, ChatResult, ClientPair, SpiritAgent};
pub use registry::{SpiritInfo, SpiritRegistry};
pub use stream::{SpiritStream, StreamEvent};

/// 失败回复（带角色色彩，作为正常业务结果返回给前端）
pub mod replies {
    /// 同步对话：上游服务错误（备用客户端也失败或未配置）
    pub const FADES_INTO_DARKNESS: &str = "*The spirit flickers and fades into darkness...*";
    /// 同步对话：本地意外错误
    pub const CANNOT_MANIFEST: &str = "*The spirit cannot manifest at this time...*";
    /// 流式对话：上游服务错误
    pub const VOICE_FADES: &str = "*The spirit's voice fades into the void...*";
    /// 流式对话：本地意外错误
    pub const CONNECTION_SEVERED: &str = "*The connection to the spirit realm has been severed...*";
    /// HTTP 层：流生产者未发出结束信号就退出
    pub const VOICE_HAS_FADED: &str = "*The spirit's voice has faded...*";
}

/// 人格静态描述：进程生命周期内不可变
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpiritDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub emoji: &'static str,
    pub system_prompt: &'static str,
    pub model: &'static str,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub const DRACULA: SpiritDescriptor = SpiritDescriptor {
    id: "dracula",
    name: "Count Dracula",
    emoji: "🧛",
    system_prompt: include_str!("prompts/dracula.md"),
    model: "gpt-4o-mini",
    temperature: 0.9,
    max_tokens: 500,
};

pub const REAPER: SpiritDescriptor = SpiritDescriptor {
    id: "reaper",
    name: "The Grim Reaper",
    emoji: "💀",
    system_prompt: include_str!("prompts/reaper.md"),
    model: "gpt-4o-mini",
    temperature: 0.7,
    max_tokens: 500,
};

pub const BLOODY_MARY: SpiritDescriptor = SpiritDescriptor {
    id: "bloody_mary",
    name: "Bloody Mary",
    emoji: "👻",
    system_prompt: include_str!("prompts/bloody_mary.md"),
    model: "gpt-4o-mini",
    temperature: 1.0,
    max_tokens: 500,
};

/// 全部人格，顺序即 /health 与 /spirits 的输出顺序
pub const ALL_SPIRITS: [SpiritDescriptor; 3] = [DRACULA, REAPER, BLOODY_MARY];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let mut ids: Vec<_> = ALL_SPIRITS.iter().map(|s| s.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), ALL_SPIRITS.len());
    }

    #[test]
    fn test_prompts_stay_in_character() {
        assert!(DRACULA.system_prompt.starts_with("You are Count Dracula"));
        assert!(REAPER.system_prompt.contains("Reaper"));
        assert!(BLOODY_MARY.system_prompt.contains("Bloody Mary"));
    }
}
