//! 通用城市信息 Agent：人口、地标、历史等；默认作为未匹配查询的回退 Agent

use std::sync::OnceLock;

use async_trait::async_trait;

use crate::agents::{Agent, AgentCapabilities, AgentRuntime, ExecutionContext, KeywordSet};
use crate::core::{Outcome, Query};

pub const GENERAL_AGENT: &str = "general";

pub const DEFAULT_TOOLS: &[&str] = &["search_city_info"];

const DESCRIPTION: &str = "General agent for city information: population, landmarks, history and culture";

pub const GENERAL_PROMPT: &str = "You are a helpful assistant answering questions about cities: \
population, landmarks, history, culture, economy and travel. Use search_city_info when you need \
facts you are not sure about, and answer concisely. If the question is not about a city, answer \
briefly and helpfully.";

const CITY_INFO_KEYWORDS: &[&str] = &[
    "population",
    "landmark",
    "history",
    "historical",
    "culture",
    "tourist",
    "attraction",
    "famous",
    "located",
    "economy",
    "language",
    "museum",
    "city",
    "cities",
];

fn city_info_keywords() -> &'static KeywordSet {
    static SET: OnceLock<KeywordSet> = OnceLock::new();
    SET.get_or_init(|| KeywordSet::new(CITY_INFO_KEYWORDS))
}

pub struct GeneralAgent {
    description: String,
    runtime: AgentRuntime,
}

impl GeneralAgent {
    pub fn new(runtime: AgentRuntime, description: Option<String>) -> Self {
        Self {
            description: description.unwrap_or_else(|| DESCRIPTION.to_string()),
            runtime,
        }
    }
}

#[async_trait]
impl Agent for GeneralAgent {
    fn name(&self) -> &str {
        GENERAL_AGENT
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn can_handle(&self, query: &Query) -> bool {
        city_info_keywords().matches(&query.text)
    }

    fn capabilities(&self) -> AgentCapabilities {
        AgentCapabilities {
            name: GENERAL_AGENT.to_string(),
            description: self.description.clone(),
            tools: self.runtime.tool_names(),
            model: self.runtime.model_name().to_string(),
            max_iterations: self.runtime.limits().max_iterations,
            timeout_secs: self.runtime.limits().timeout.as_secs(),
        }
    }

    async fn execute(&self, query: &Query, ctx: &ExecutionContext) -> Outcome {
        self.runtime.run(&query.text, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::mock_runtime;

    #[test]
    fn test_can_handle_city_info() {
        let a = GeneralAgent::new(mock_runtime(DEFAULT_TOOLS), None);
        assert!(a.can_handle(&Query::new("What is the population of Tokyo?")));
        assert!(a.can_handle(&Query::new("Famous landmarks in Paris")));
        assert!(a.can_handle(&Query::new("What is the population of Ukraine?")));
        assert!(!a.can_handle(&Query::new("unpopulated islands")));
        assert!(!a.can_handle(&Query::new("tell me a joke")));
    }

    #[tokio::test]
    async fn test_execute_with_mock_answers() {
        let a = GeneralAgent::new(mock_runtime(DEFAULT_TOOLS), Some("custom".into()));
        assert_eq!(a.description(), "custom");
        let outcome = a
            .execute(&Query::new("history of Rome"), &ExecutionContext::default())
            .await;
        assert!(matches!(outcome, Outcome::Answered { iterations_used: 1, .. }));
    }
}
