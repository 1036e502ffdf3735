//! 会话过程事件：用于 verbose 输出与 HTTP 接口展示思考、工具调用与观察

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// 第几轮工具往返（从 1 开始）
    Iteration { iteration: usize, max_iterations: usize },
    Thinking,
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation { tool: String, ok: bool, preview: String },
    /// 恢复动作（如格式错误后重试）
    Recovery { detail: String },
    Finished { status: String },
}

impl SessionEvent {
    /// 一行可读描述，供 CLI verbose 与 QueryResponse.steps 使用
    pub fn describe(&self) -> String {
        match self {
            SessionEvent::Iteration {
                iteration,
                max_iterations,
            } => format!("iteration {}/{}", iteration, max_iterations),
            SessionEvent::Thinking => "thinking".to_string(),
            SessionEvent::ToolCall { tool, args } => format!("call {} {}", tool, args),
            SessionEvent::Observation { tool, ok, preview } => {
                format!("{} {}: {}", tool, if *ok { "ok" } else { "failed" }, preview)
            }
            SessionEvent::Recovery { detail } => format!("recovery: {}", detail),
            SessionEvent::Finished { status } => format!("finished: {}", status),
        }
    }
}
