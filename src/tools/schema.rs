//! 工具参数 Schema 与调用格式 Schema
//!
//! 每个工具声明可识别的参数名与期望的值类型；ToolExecutor 在调用前用 ArgSchema::validate 校验，
//! 未识别参数 / 缺少必填参数 / 类型不符直接返回 Failure{InvalidArguments}，不会发起任何外部请求。
//! tool_call_schema_json 用 schemars 生成「合法 tool call」的 JSON Schema，拼入 system prompt。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};
use serde_json::{json, Value};

use crate::tools::Arguments;

/// 参数值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ArgKind {
    fn json_type(&self) -> &'static str {
        match self {
            ArgKind::String => "string",
            ArgKind::Number => "number",
            ArgKind::Integer => "integer",
            ArgKind::Boolean => "boolean",
            ArgKind::Object => "object",
            ArgKind::Array => "array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ArgKind::String => value.is_string(),
            ArgKind::Number => value.is_number(),
            ArgKind::Integer => value.is_i64() || value.is_u64(),
            ArgKind::Boolean => value.is_boolean(),
            ArgKind::Object => value.is_object(),
            ArgKind::Array => value.is_array(),
        }
    }
}

/// 单个参数声明
#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: String,
    pub kind: ArgKind,
    pub required: bool,
    pub description: String,
}

/// 工具参数 Schema
#[derive(Debug, Clone, Default)]
pub struct ArgSchema {
    args: Vec<ArgSpec>,
}

impl ArgSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &str, kind: ArgKind, description: &str) -> Self {
        self.args.push(ArgSpec {
            name: name.to_string(),
            kind,
            required: true,
            description: description.to_string(),
        });
        self
    }

    pub fn optional(mut self, name: &str, kind: ArgKind, description: &str) -> Self {
        self.args.push(ArgSpec {
            name: name.to_string(),
            kind,
            required: false,
            description: description.to_string(),
        });
        self
    }

    pub fn specs(&self) -> &[ArgSpec] {
        &self.args
    }

    /// 校验参数：先拒绝未识别的参数，再检查必填与类型
    pub fn validate(&self, args: &Arguments) -> Result<(), String> {
        for key in args.keys() {
            if !self.args.iter().any(|a| &a.name == key) {
                return Err(format!("Unknown argument '{}'", key));
            }
        }
        for spec in &self.args {
            match args.get(&spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(format!("Missing required argument '{}'", spec.name));
                }
                Some(v) if !v.is_null() && !spec.kind.matches(v) => {
                    return Err(format!(
                        "Argument '{}' must be of type {}",
                        spec.name,
                        spec.kind.json_type()
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// 转为 JSON Schema（object），供 LLM 生成正确的参数
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for spec in &self.args {
            properties.insert(
                spec.name.clone(),
                json!({ "type": spec.kind.json_type(), "description": spec.description }),
            );
        }
        let required: Vec<&str> = self
            .args
            .iter()
            .filter(|a| a.required)
            .map(|a| a.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }
}

/// 工具调用请求格式：与 parse_llm_output 解析的 `{"tool": "...", "args": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，如 get_weather_data、search_city_info
    pub tool: String,
    /// 工具参数，字段依工具而定
    pub args: HashMap<String, Value>,
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
