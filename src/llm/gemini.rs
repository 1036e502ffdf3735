//! Gemini 客户端（走 Google 提供的 OpenAI 兼容端点）
//!
//! - Base URL: https://generativelanguage.googleapis.com/v1beta/openai/
//! - 默认模型: gemini-2.5-flash-lite
//! - API Key: 环境变量 `GOOGLE_API_KEY`

use crate::llm::OpenAiClient;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const GEMINI_FLASH_LITE: &str = "gemini-2.5-flash-lite";

/// 创建 Gemini 客户端；model 为空时使用 GEMINI_MODEL 环境变量或默认模型
pub fn create_gemini_client(
    model: Option<&str>,
    temperature: f32,
    max_tokens: Option<u32>,
    request_timeout_secs: u64,
) -> OpenAiClient {
    let api_key = std::env::var("GOOGLE_API_KEY").ok();

    let model = model
        .map(String::from)
        .or_else(|| std::env::var("GEMINI_MODEL").ok())
        .unwrap_or_else(|| GEMINI_FLASH_LITE.to_string());

    OpenAiClient::new(Some(GEMINI_BASE_URL), &model, api_key.as_deref())
        .with_temperature(temperature)
        .with_max_tokens(max_tokens)
        .with_request_timeout(request_timeout_secs)
}
