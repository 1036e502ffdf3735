//! get_weather_data：城市当前天气
//!
//! Weatherstack 风格接口：GET {base_url}?access_key=...&query={city}。
//! 未配置 API Key 时不发请求直接返回 Failure；服务端 `error` 对象、网络错误、非预期格式都转为 Failure{tool_provider}。
//! 成功时整理为 location / current_weather 两段，并附带扁平的 temperature 与 condition 字段。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::WeatherSection;
use crate::core::ErrorKind;
use crate::tools::{ArgKind, ArgSchema, Arguments, Tool, ToolResult};

pub const WEATHER_TOOL: &str = "get_weather_data";

pub struct WeatherTool {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl WeatherTool {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn from_config(cfg: &WeatherSection) -> Self {
        Self::new(&cfg.base_url, cfg.resolved_api_key(), cfg.timeout_secs)
    }

    async fn fetch(&self, city: &str, api_key: &str) -> Result<Value, String> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("access_key", api_key), ("query", city)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "Weather API request timed out".to_string()
                } else {
                    // 请求 URL 带 access_key，错误信息里不能出现
                    format!("Weather API request failed: {}", e.without_url())
                }
            })?;
        if !resp.status().is_success() {
            return Err(format!("Weather API returned HTTP {}", resp.status()));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| format!("Weather API returned invalid JSON: {}", e.without_url()))
    }
}

/// 服务端错误信息（{"error": {"info": "..."}}）
fn provider_error(data: &Value) -> Option<String> {
    let err = data.get("error")?;
    Some(
        err.get("info")
            .and_then(Value::as_str)
            .unwrap_or("Unknown API error")
            .to_string(),
    )
}

/// 把原始响应整理为 location / current_weather；缺少这两段时返回 None
pub fn format_weather(data: &Value) -> Option<Value> {
    let current = data.get("current")?;
    let location = data.get("location")?;
    let description = current
        .get("weather_descriptions")
        .and_then(|d| d.get(0))
        .cloned()
        .unwrap_or(Value::Null);

    Some(json!({
        "location": {
            "name": location.get("name"),
            "region": location.get("region"),
            "country": location.get("country"),
            "coordinates": {
                "latitude": location.get("lat"),
                "longitude": location.get("lon"),
            },
        },
        "current_weather": {
            "temperature": current.get("temperature"),
            "feels_like": current.get("feelslike"),
            "weather_description": description,
            "humidity": current.get("humidity"),
            "wind_speed": current.get("wind_speed"),
            "wind_direction": current.get("wind_dir"),
            "pressure": current.get("pressure"),
            "visibility": current.get("visibility"),
            "uv_index": current.get("uv_index"),
            "observation_time": current.get("observation_time"),
        },
        "temperature": current.get("temperature"),
        "condition": description,
        "source": "weatherstack",
    }))
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        WEATHER_TOOL
    }

    fn description(&self) -> &str {
        "Fetch current weather data for a given city. Args: {\"city\": \"Dhaka\"}."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::new().required("city", ArgKind::String, "City name, e.g. Dhaka")
    }

    async fn execute(&self, args: &Arguments) -> ToolResult {
        let city = args
            .get("city")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        if city.is_empty() {
            return ToolResult::invalid_arguments("Missing city");
        }
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::error!("weather API key not configured");
            return ToolResult::failure(
                ErrorKind::ToolProvider,
                "Weather API key not configured (set WEATHER_API_KEY)",
            );
        };

        tracing::info!(city = %city, "fetching weather data");
        let data = match self.fetch(city, api_key).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(city = %city, error = %e, "weather request failed");
                return ToolResult::provider_error(e);
            }
        };

        if let Some(info) = provider_error(&data) {
            tracing::warn!(city = %city, error = %info, "weather API error");
            return ToolResult::provider_error(format!("Weather API error: {}", info));
        }
        match format_weather(&data) {
            Some(formatted) => ToolResult::from_value(formatted),
            None => ToolResult::provider_error("Invalid response format from weather API"),
        }
    }
}
