//! Transcript：一次会话内累积的原始查询、推理输出与工具结果
//!
//! 每轮 Thinking 都把完整 transcript 交给推理函数；工具失败与成功一样追加进来，
//! 推理函数可据此换工具或放弃。

use crate::llm::Message;
use crate::tools::{ToolRequest, ToolResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEntry {
    Query(String),
    /// 推理函数的原始输出
    Reasoning(String),
    ToolCall(ToolRequest),
    ToolOutput { tool: String, result: ToolResult },
    /// 恢复引擎注入的纠正提示
    Note(String),
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            entries: vec![TranscriptEntry::Query(query.into())],
        }
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn query(&self) -> Option<&str> {
        self.entries.iter().find_map(|e| match e {
            TranscriptEntry::Query(q) => Some(q.as_str()),
            _ => None,
        })
    }

    pub fn tool_outputs(&self) -> impl Iterator<Item = (&str, &ToolResult)> {
        self.entries.iter().filter_map(|e| match e {
            TranscriptEntry::ToolOutput { tool, result } => Some((tool.as_str(), result)),
            _ => None,
        })
    }

    pub fn failure_count(&self) -> usize {
        self.tool_outputs().filter(|(_, r)| !r.is_success()).count()
    }

    /// 渲染为 LLM 对话消息（不含 system）
    pub fn to_messages(&self) -> Vec<Message> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                TranscriptEntry::Query(q) => Some(Message::user(q.clone())),
                TranscriptEntry::Reasoning(r) => Some(Message::assistant(r.clone())),
                // 工具调用已包含在上一条 Reasoning 中
                TranscriptEntry::ToolCall(_) => None,
                TranscriptEntry::ToolOutput { tool, result } => Some(Message::user(format!(
                    "Observation from {}: {}",
                    tool,
                    result.render()
                ))),
                TranscriptEntry::Note(n) => Some(Message::user(n.clone())),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::llm::Role;

    #[test]
    fn test_messages_interleave_observations() {
        let mut t = Transcript::new("weather in Dhaka?");
        t.push(TranscriptEntry::Reasoning("{\"tool\":\"get_weather_data\"}".into()));
        t.push(TranscriptEntry::ToolCall(ToolRequest::new("get_weather_data")));
        t.push(TranscriptEntry::ToolOutput {
            tool: "get_weather_data".into(),
            result: ToolResult::failure(ErrorKind::ToolProvider, "HTTP 500"),
        });

        let msgs = t.to_messages();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1].role, Role::Assistant);
        assert!(msgs[2].content.contains("Observation from get_weather_data"));
        assert_eq!(t.failure_count(), 1);
        assert_eq!(t.query(), Some("weather in Dhaka?"));
    }
}
