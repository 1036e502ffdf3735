//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / schema / execute），由 ToolRegistry 按名注册与查找；
//! 每个 Agent 通过 subset 得到自己声明的工具集合。ToolExecutor 在调用时做参数校验、超时与审计日志。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::tools::{ArgSchema, Arguments, ToolResult};

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行
///
/// execute 必须「失败即关闭」：网络、解析、服务端错误都在工具内部转换为 ToolResult::Failure。
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（对应 tool call JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 可识别的参数与类型；默认无参数
    fn schema(&self) -> ArgSchema {
        ArgSchema::new()
    }

    async fn execute(&self, args: &Arguments) -> ToolResult;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>（BTreeMap 保证 prompt 中工具顺序稳定）
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "tool re-registered, previous implementation replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 取出指定名称的子集（Agent 的 enabled_tools）；不存在的名称记录警告后忽略
    pub fn subset(&self, names: &[String]) -> ToolRegistry {
        let mut out = ToolRegistry::new();
        for name in names {
            match self.tools.get(name) {
                Some(tool) => {
                    out.tools.insert(name.clone(), tool.clone());
                }
                None => tracing::warn!(tool = %name, "enabled tool is not registered, skipped"),
            }
        }
        out
    }

    /// 动态生成工具 schema JSON（与实际注册的工具一致），拼入 system prompt
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<serde_json::Value> = self
            .tools
            .iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.schema().to_json_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StaticTool;

    #[test]
    fn test_subset_skips_unknown_names() {
        let mut reg = ToolRegistry::new();
        reg.register(StaticTool::ok("a"));
        reg.register(StaticTool::ok("b"));

        let sub = reg.subset(&["b".to_string(), "missing".to_string()]);
        assert_eq!(sub.tool_names(), vec!["b".to_string()]);
        assert!(!sub.contains("a"));
    }

    #[test]
    fn test_schema_json_contains_parameters() {
        let mut reg = ToolRegistry::new();
        reg.register(StaticTool::ok("get_weather_data"));
        let s = reg.to_schema_json();
        assert!(s.contains("get_weather_data"));
        assert!(s.contains("\"parameters\""));
    }
}
