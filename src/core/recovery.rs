//! 错误恢复引擎
//!
//! 针对 Thinking 步骤的故障给出动作：格式错误时注入纠正提示重试（连续次数有上限），
//! 推理函数不可达或重试用尽时终止会话。工具故障不经过这里，它们作为 ToolResult 回灌 transcript。

use crate::core::ErrorKind;
use crate::react::ReasoningError;

/// 连续格式错误的默认重试上限
pub const DEFAULT_FORMAT_RETRIES: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 将提示注入 transcript，让推理函数重试
    RetryWithPrompt(String),
    /// 终止会话，Outcome::Failed{kind}
    Abort(ErrorKind),
}

#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    max_format_retries: usize,
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecoveryEngine {
    pub fn new() -> Self {
        Self {
            max_format_retries: DEFAULT_FORMAT_RETRIES,
        }
    }

    pub fn with_max_format_retries(mut self, retries: usize) -> Self {
        self.max_format_retries = retries;
        self
    }

    /// consecutive_failures：本次之前已连续出现的格式错误次数
    pub fn handle(&self, err: &ReasoningError, consecutive_failures: usize) -> RecoveryAction {
        match err {
            ReasoningError::Unavailable(_) => RecoveryAction::Abort(ErrorKind::ReasoningUnavailable),
            ReasoningError::Malformed(_) if consecutive_failures >= self.max_format_retries => {
                RecoveryAction::Abort(ErrorKind::InvalidArguments)
            }
            ReasoningError::Malformed(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous output could not be parsed ({raw}). \
                 To call a tool, output ONLY one JSON object: {{\"tool\": \"<name>\", \"args\": {{...}}}}. \
                 Example: {{\"tool\": \"get_weather_data\", \"args\": {{\"city\": \"Dhaka\"}}}}. \
                 Otherwise answer in plain text."
            )),
        }
    }
}
