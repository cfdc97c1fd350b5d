//! Pungde 农业助手的 Agent 定义
//!
//! 本 crate 不执行 Agent 推理：根 Agent 与子 Agent 以 `AgentDescriptor` 描述（名称、说明、
//! 指令提示词、模型、输出键、工具），由 `manifest()` 导出为 JSON 交给托管运行时。
//! 函数工具（产量预测、农业气候、图像生成）在本地实现，可通过 `function_tools()` 直接调用。

mod agents;

use std::sync::Arc;

use serde_json::{json, Value};

use crate::tools::{Tool, ToolRegistry};

pub use agents::{build_pungde, image_generator, FarmToolkit, ROOT_AGENT_NAME};

/// Agent 可使用的工具
#[derive(Clone)]
pub enum ToolRef {
    /// 本地实现的函数工具
    Function(Arc<dyn Tool>),
    /// 作为工具暴露的子 Agent
    Agent(Arc<AgentDescriptor>),
    /// 运行时内置工具（如 google_search），只按名称引用
    Builtin(&'static str),
}

impl ToolRef {
    pub fn name(&self) -> &str {
        match self {
            ToolRef::Function(tool) => tool.name(),
            ToolRef::Agent(agent) => &agent.name,
            ToolRef::Builtin(name) => name,
        }
    }

    fn manifest(&self) -> Value {
        match self {
            ToolRef::Function(tool) => json!({
                "type": "function",
                "name": tool.name(),
                "description": tool.description(),
                "parameters": tool.parameters_schema(),
            }),
            ToolRef::Agent(agent) => json!({
                "type": "agent",
                "agent": agent.manifest(),
            }),
            ToolRef::Builtin(name) => json!({
                "type": "builtin",
                "name": name,
            }),
        }
    }
}

impl std::fmt::Debug for ToolRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolRef::Function(tool) => write!(f, "Function({})", tool.name()),
            ToolRef::Agent(agent) => write!(f, "Agent({})", agent.name),
            ToolRef::Builtin(name) => write!(f, "Builtin({name})"),
        }
    }
}

/// 静态 Agent 描述
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    pub name: String,
    pub description: String,
    pub instruction: &'static str,
    pub model: String,
    /// 运行时把最终回复写入会话状态的键
    pub output_key: Option<String>,
    pub tools: Vec<ToolRef>,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>, model: impl Into<String>, instruction: &'static str) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instruction,
            model: model.into(),
            output_key: None,
            tools: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn with_tool(mut self, tool: ToolRef) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn find_tool(&self, name: &str) -> Option<&ToolRef> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// 递归收集整棵树上的函数工具
    pub fn function_tools(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        self.collect_functions(&mut registry);
        registry
    }

    fn collect_functions(&self, registry: &mut ToolRegistry) {
        for tool in &self.tools {
            match tool {
                ToolRef::Function(f) => registry.register(Arc::clone(f)),
                ToolRef::Agent(agent) => agent.collect_functions(registry),
                ToolRef::Builtin(_) => {}
            }
        }
    }

    pub fn manifest(&self) -> Value {
        let mut m = json!({
            "name": self.name,
            "model": self.model,
            "description": self.description,
            "instruction": self.instruction,
            "tools": self.tools.iter().map(ToolRef::manifest).collect::<Vec<_>>(),
        });
        if let Some(key) = &self.output_key {
            m["output_key"] = json!(key);
        }
        m
    }
}
