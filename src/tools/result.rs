//! 工具请求与结果
//!
//! ToolResult 永远以值的形式返回（Success / Failure），不会以 panic 或 Err 穿越工具边界，
//! 推理循环据此决定重试、换工具或放弃。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::ErrorKind;

/// 工具参数：字符串键到 JSON 值
pub type Arguments = Map<String, Value>;

/// 推理函数产生的工具调用请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl ToolRequest {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments: Arguments::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { data: Map<String, Value> },
    Failure { kind: ErrorKind, message: String },
}

impl ToolResult {
    pub fn success(data: Map<String, Value>) -> Self {
        ToolResult::Success { data }
    }

    /// 便捷构造：data 必须是 JSON 对象，否则包成 {"value": ...}
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => ToolResult::Success { data: map },
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                ToolResult::Success { data: map }
            }
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        ToolResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::failure(ErrorKind::InvalidArguments, message)
    }

    pub fn provider_error(message: impl Into<String>) -> Self {
        Self::failure(ErrorKind::ToolProvider, message)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success { .. })
    }

    /// 写入 transcript / 日志的紧凑文本
    pub fn render(&self) -> String {
        match self {
            ToolResult::Success { data } => {
                serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string())
            }
            ToolResult::Failure { kind, message } => format!("Error ({}): {}", kind, message),
        }
    }
}
