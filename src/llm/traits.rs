//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / Mock）实现 LlmClient。推理内核只把它当作不透明的
//! 「文本进、文本出」函数：可能很慢，也可能失败。

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::llm::Message;

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Request build failed: {0}")]
    Request(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("Empty completion")]
    EmptyResponse,
}

/// 累计 token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 模型名（用于 capabilities 展示）
    fn model_name(&self) -> &str {
        "unknown"
    }

    /// 不统计用量的后端（Mock）返回全 0
    fn token_usage(&self) -> TokenUsage {
        TokenUsage::default()
    }
}
