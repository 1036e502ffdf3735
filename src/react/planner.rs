//! Planner：推理函数边界与 Tool Call 解析
//!
//! Reasoner 是内核消费的不透明推理函数：think(transcript) -> FinalAnswer | ToolRequest。
//! LlmReasoner 用 LLM 实现它：拼 system prompt（Agent 专用提示 + 工具 Schema）后调用 LLM，
//! 再由 parse_llm_output 把回复解析为 ToolRequest 或最终回答。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::llm::{LlmClient, Message};
use crate::react::Transcript;
use crate::tools::{tool_call_schema_json, Arguments, ToolRegistry, ToolRequest};

/// 一次 Thinking 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningStep {
    FinalAnswer(String),
    /// raw 为推理函数的原始输出，迭代耗尽时作为 partial_text
    ToolRequest { request: ToolRequest, raw: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReasoningError {
    /// 推理函数不可达（网络、鉴权、超时等）
    #[error("Reasoning function unavailable: {0}")]
    Unavailable(String),

    /// 输出无法解析为合法的 tool call
    #[error("Malformed reasoning output: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn think(&self, transcript: &Transcript) -> Result<ReasoningStep, ReasoningError>;

    fn model_name(&self) -> &str {
        "unknown"
    }
}

/// LLM 返回的 Tool Call（简化 JSON：{"tool": "get_weather_data", "args": {"city": "..."}}）
#[derive(Debug, Deserialize)]
struct ToolCallJson {
    tool: String,
    #[serde(default)]
    args: Option<serde_json::Value>,
}

/// 解析 LLM 输出
///
/// - ```json 代码块：必须是合法 tool call，否则为 Malformed
/// - 以 `{` 开头的回复：同上
/// - 正文中夹带的 `{...}`：能解析为 tool call 才算，否则整段视为最终回答
/// - 其余文本：最终回答
pub fn parse_llm_output(output: &str) -> Result<ReasoningStep, ReasoningError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(ReasoningError::Malformed("empty output".to_string()));
    }

    let (json_str, strict) = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let block = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
        (block.trim(), true)
    } else if let Some(start) = trimmed.find('{') {
        match trimmed.rfind('}') {
            Some(end) if end > start => (&trimmed[start..=end], start == 0),
            _ if start == 0 => {
                return Err(ReasoningError::Malformed(format!(
                    "unterminated JSON object: {}",
                    trimmed
                )));
            }
            _ => return Ok(ReasoningStep::FinalAnswer(trimmed.to_string())),
        }
    } else {
        return Ok(ReasoningStep::FinalAnswer(trimmed.to_string()));
    };

    let parsed: ToolCallJson = match serde_json::from_str(json_str) {
        Ok(p) => p,
        Err(e) if strict => {
            return Err(ReasoningError::Malformed(format!("{}: {}", e, json_str)));
        }
        Err(_) => return Ok(ReasoningStep::FinalAnswer(trimmed.to_string())),
    };

    if parsed.tool.trim().is_empty() {
        return Ok(ReasoningStep::FinalAnswer(trimmed.to_string()));
    }

    let arguments: Arguments = match parsed.args {
        None | Some(serde_json::Value::Null) => Arguments::new(),
        Some(serde_json::Value::Object(map)) => map,
        Some(other) => {
            return Err(ReasoningError::Malformed(format!(
                "args for '{}' must be an object, got {}",
                parsed.tool, other
            )));
        }
    };

    Ok(ReasoningStep::ToolRequest {
        request: ToolRequest {
            tool_name: parsed.tool.trim().to_string(),
            arguments,
        },
        raw: trimmed.to_string(),
    })
}

/// 基于 LLM 的推理函数：持有 LLM 与完整 system prompt
pub struct LlmReasoner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl LlmReasoner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    /// Agent 专用提示 + 可用工具 Schema + tool call 格式说明
    pub fn for_tools(llm: Arc<dyn LlmClient>, agent_prompt: &str, tools: &ToolRegistry) -> Self {
        Self::new(llm, build_system_prompt(agent_prompt, tools))
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}

pub fn build_system_prompt(agent_prompt: &str, tools: &ToolRegistry) -> String {
    if tools.is_empty() {
        return agent_prompt.to_string();
    }
    format!(
        "{}\n\n## Available tools\n```json\n{}\n```\n\n\
         To call a tool, reply with ONLY one JSON object matching this schema:\n```json\n{}\n```\n\
         When you have the final answer, reply in plain text without JSON.",
        agent_prompt,
        tools.to_schema_json(),
        tool_call_schema_json()
    )
}

#[async_trait]
impl Reasoner for LlmReasoner {
    async fn think(&self, transcript: &Transcript) -> Result<ReasoningStep, ReasoningError> {
        let mut messages = vec![Message::system(self.system_prompt.clone())];
        messages.extend(transcript.to_messages());
        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| ReasoningError::Unavailable(e.to_string()))?;
        parse_llm_output(&output)
    }

    fn model_name(&self) -> &str {
        self.llm.model_name()
    }
}
