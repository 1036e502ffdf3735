//! search_city_info：城市信息搜索
//!
//! 请求 DuckDuckGo HTML 端点（GET ?q=...），带超时与 User-Agent；
//! HTML 响应用 html2text 提取可读文本，超过 max_result_chars 时截断并追加 ...[truncated]。
//! 网络与服务端错误一律转为 Failure{tool_provider}。

use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use serde_json::json;

use crate::config::SearchSection;
use crate::tools::{ArgKind, ArgSchema, Arguments, Tool, ToolResult};

pub const SEARCH_TOOL: &str = "search_city_info";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub struct CitySearchTool {
    client: Client,
    base_url: String,
    max_result_chars: usize,
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.contains('<') && (s.contains("</") || s.contains("<head") || s.contains("<title")))
}

fn truncate(body: String, max_chars: usize) -> String {
    if body.chars().count() > max_chars {
        body.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        body
    }
}

impl CitySearchTool {
    pub fn new(base_url: &str, timeout_secs: u64, max_result_chars: usize) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.to_string(),
            max_result_chars,
        }
    }

    pub fn from_config(cfg: &SearchSection) -> Self {
        Self::new(&cfg.base_url, cfg.timeout_secs, cfg.max_result_chars)
    }

    fn html_to_text(html: &str) -> String {
        match from_read(html.as_bytes(), 120) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => strip_html_tags(html),
        }
    }

    async fn fetch(&self, query: &str) -> Result<String, String> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| format!("Search request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("Search provider returned HTTP {}", resp.status()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| format!("Read body: {}", e))?;
        let body = body.trim_start_matches('\u{FEFF}');

        let text = if looks_like_html(body) {
            Self::html_to_text(body)
        } else {
            body.to_string()
        };
        Ok(truncate(text, self.max_result_chars))
    }
}

#[async_trait]
impl Tool for CitySearchTool {
    fn name(&self) -> &str {
        SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Search the web for general information about a city (population, landmarks, capital, history). Args: {\"query\": \"...\"}."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::new().required("query", ArgKind::String, "Search query")
    }

    async fn execute(&self, args: &Arguments) -> ToolResult {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if query.is_empty() {
            return ToolResult::invalid_arguments("Invalid query parameter");
        }
        tracing::info!(query = %query, "searching city information");
        match self.fetch(query).await {
            Ok(text) => ToolResult::from_value(json!({
                "query": query,
                "source": "duckduckgo",
                "results": text,
            })),
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "city search failed");
                ToolResult::provider_error(e)
            }
        }
    }
}
