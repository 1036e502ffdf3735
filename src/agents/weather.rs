//! 天气 Agent：城市天气与气候查询
//!
//! 意图识别：天气关键词、城市词 + 天气上下文、典型句式，以及「首都」类查询（通常接着问天气）。
//! 预处理：首都类查询若未提到天气，追加「再查询当前天气」的提示。

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::agents::{Agent, AgentCapabilities, AgentRuntime, ExecutionContext, KeywordSet};
use crate::core::{Outcome, Query};

pub const WEATHER_AGENT: &str = "weather";

pub const DEFAULT_TOOLS: &[&str] = &["get_weather_data", "search_city_info"];

const DESCRIPTION: &str =
    "Specialized agent for weather-related queries and city climate information";

pub const WEATHER_PROMPT: &str = "You are a Weather Agent providing accurate, real-time weather \
information for cities around the world. Use get_weather_data for current conditions and \
search_city_info for general city facts. For questions about a capital, find the capital first, \
then get its weather. Report temperature, conditions, humidity, wind and pressure when available. \
If weather data is unavailable, say so and suggest alternatives.";

const CAPITAL_WEATHER_HINT: &str = " and then find its current weather condition";

const WEATHER_KEYWORDS: &[&str] = &[
    "weather",
    "temperature",
    "climate",
    "rain",
    "snow",
    "storm",
    "sunny",
    "cloudy",
    "humidity",
    "wind",
    "forecast",
    "hot",
    "cold",
    "warm",
    "cool",
    "precipitation",
    "atmospheric",
    "meteorological",
    "conditions",
];

const CITY_KEYWORDS: &[&str] = &[
    "capital",
    "city",
    "town",
    "metropolis",
    "urban",
    "municipal",
    "district",
];

fn weather_keywords() -> &'static KeywordSet {
    static SET: OnceLock<KeywordSet> = OnceLock::new();
    SET.get_or_init(|| KeywordSet::new(WEATHER_KEYWORDS))
}

fn city_keywords() -> &'static KeywordSet {
    static SET: OnceLock<KeywordSet> = OnceLock::new();
    SET.get_or_init(|| KeywordSet::new(CITY_KEYWORDS))
}

fn capital_keyword() -> &'static KeywordSet {
    static SET: OnceLock<KeywordSet> = OnceLock::new();
    SET.get_or_init(|| KeywordSet::new(&["capital"]))
}

fn intent_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"weather\s+in\s+\w+",
            r"temperature\s+in\s+\w+",
            r"climate\s+of\s+\w+",
            r"how\s+is\s+the\s+weather",
            r"what\s+is\s+the\s+weather",
            r"weather\s+condition",
            r"current\s+weather",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn city_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)weather\s+in\s+([A-Za-z\s]+?)(?:\s|$|,|\?|!)",
            r"(?i)temperature\s+in\s+([A-Za-z\s]+?)(?:\s|$|,|\?|!)",
            r"(?i)climate\s+of\s+([A-Za-z\s]+?)(?:\s|$|,|\?|!)",
            r"(?i)capital\s+of\s+([A-Za-z\s]+?)(?:\s|$|,|\?|!)",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// 从查询中提取可能的城市名（仅用于诊断日志）
pub fn extract_cities(text: &str) -> Vec<String> {
    city_patterns()
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

pub struct WeatherAgent {
    description: String,
    runtime: AgentRuntime,
}

impl WeatherAgent {
    pub fn new(runtime: AgentRuntime, description: Option<String>) -> Self {
        Self {
            description: description.unwrap_or_else(|| DESCRIPTION.to_string()),
            runtime,
        }
    }
}

#[async_trait]
impl Agent for WeatherAgent {
    fn name(&self) -> &str {
        WEATHER_AGENT
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn can_handle(&self, query: &Query) -> bool {
        let q = query.lowercase();
        let has_weather_keyword = weather_keywords().matches(&q);
        let has_city_keyword = city_keywords().matches(&q);
        let weather_context = q.contains("weather") || q.contains("temperature");
        let has_pattern = intent_patterns().iter().any(|re| re.is_match(&q));

        has_weather_keyword
            || (has_city_keyword && weather_context)
            || has_pattern
            || capital_keyword().matches(&q)
    }

    fn preprocess(&self, query: &Query) -> String {
        let cities = extract_cities(&query.text);
        if !cities.is_empty() {
            tracing::info!(cities = ?cities, "detected cities in query");
        }

        let q = query.lowercase();
        if q.contains("capital") && !q.contains("weather") {
            format!("{}{}", query.text, CAPITAL_WEATHER_HINT)
        } else {
            query.text.clone()
        }
    }

    fn capabilities(&self) -> AgentCapabilities {
        AgentCapabilities {
            name: WEATHER_AGENT.to_string(),
            description: self.description.clone(),
            tools: self.runtime.tool_names(),
            model: self.runtime.model_name().to_string(),
            max_iterations: self.runtime.limits().max_iterations,
            timeout_secs: self.runtime.limits().timeout.as_secs(),
        }
    }

    async fn execute(&self, query: &Query, ctx: &ExecutionContext) -> Outcome {
        let text = self.preprocess(query);
        self.runtime.run(&text, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::mock_runtime;

    fn agent() -> WeatherAgent {
        WeatherAgent::new(mock_runtime(DEFAULT_TOOLS), None)
    }

    #[test]
    fn test_can_handle_weather_queries() {
        let a = agent();
        assert!(a.can_handle(&Query::new("What's the weather like in Dhaka?")));
        assert!(a.can_handle(&Query::new("Is it going to rain in London")));
        assert!(a.can_handle(&Query::new("What is the capital of Bangladesh?")));
        assert!(a.can_handle(&Query::new("CLIMATE OF PERU")));
    }

    #[test]
    fn test_rejects_unrelated_queries() {
        let a = agent();
        assert!(!a.can_handle(&Query::new("tell me a joke")));
        assert!(!a.can_handle(&Query::new("population of Tokyo")));
        assert!(!a.can_handle(&Query::new("What is the population of Ukraine?")));
        assert!(!a.can_handle(&Query::new("best hotel near the museum")));
    }

    #[test]
    fn test_keyword_variants_still_match() {
        let a = agent();
        assert!(a.can_handle(&Query::new("will it rain tomorrow")));
        assert!(a.can_handle(&Query::new("Is it raining in Oslo?")));
        assert!(a.can_handle(&Query::new("windy in Chicago today?")));
    }

    #[test]
    fn test_preprocess_capital_query_adds_weather_hint() {
        let a = agent();
        let out = a.preprocess(&Query::new("What is the capital of Bangladesh?"));
        assert!(out.ends_with("and then find its current weather condition"));

        let unchanged = a.preprocess(&Query::new("weather in the capital of Japan"));
        assert_eq!(unchanged, "weather in the capital of Japan");
    }

    #[test]
    fn test_extract_cities() {
        assert_eq!(extract_cities("What's the weather in Dhaka?"), vec!["Dhaka"]);
        assert_eq!(
            extract_cities("capital of Bangladesh, then its temperature in Dhaka!"),
            vec!["Dhaka", "Bangladesh"]
        );
        assert!(extract_cities("tell me a joke").is_empty());
    }

    #[test]
    fn test_capabilities_report_tools() {
        let caps = agent().capabilities();
        assert_eq!(caps.name, "weather");
        assert_eq!(
            caps.tools,
            vec!["get_weather_data".to_string(), "search_city_info".to_string()]
        );
        assert_eq!(caps.max_iterations, 10);
    }
}
