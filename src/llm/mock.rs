//! Mock LLM 客户端（无 API Key 时使用，便于本地跑通编排流程）
//!
//! 取最后一条 User 消息，直接给出最终回答（不调用工具）。

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message, Role};

#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!(
            "[mock] No language model is configured. You asked: {}",
            last_user
        ))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_answers_last_user_message() {
        let out = MockLlmClient
            .complete(&[Message::system("sys"), Message::user("weather in Dhaka?")])
            .await
            .unwrap();
        assert!(out.contains("weather in Dhaka?"));
        assert!(!out.contains('{'));
    }
}
