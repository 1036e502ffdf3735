//! AgentRuntime：Agent 执行所需的推理函数、工具执行器与会话限制
//!
//! 具体 Agent 组合一个 AgentRuntime 并在 execute 中调用 run，只负责自己的意图识别与预处理。

use std::sync::Arc;
use std::time::Duration;

use crate::config::AgentSection;
use crate::core::{Outcome, RecoveryEngine};
use crate::llm::LlmClient;
use crate::observability::Monitor;
use crate::react::{LlmReasoner, ReasoningSession, Reasoner, SessionLimits};
use crate::tools::{ToolExecutor, ToolRegistry};

use super::ExecutionContext;

pub struct AgentRuntime {
    reasoner: Arc<dyn Reasoner>,
    executor: ToolExecutor,
    recovery: RecoveryEngine,
    limits: SessionLimits,
    verbose: bool,
}

impl AgentRuntime {
    pub fn new(reasoner: Arc<dyn Reasoner>, executor: ToolExecutor) -> Self {
        Self {
            reasoner,
            executor,
            recovery: RecoveryEngine::new(),
            limits: SessionLimits::default(),
            verbose: false,
        }
    }

    /// 应用 [agents.<name>] 中的迭代上限、超时与 verbose
    pub fn with_settings(mut self, settings: &AgentSection) -> Self {
        self.limits = SessionLimits::new(
            settings.max_iterations,
            Duration::from_secs(settings.timeout_secs),
        );
        self.verbose = settings.verbose;
        self
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.executor.tool_names()
    }

    pub fn model_name(&self) -> &str {
        self.reasoner.model_name()
    }

    pub async fn run(&self, text: &str, ctx: &ExecutionContext) -> Outcome {
        let mut session = ReasoningSession::new(
            self.reasoner.as_ref(),
            &self.executor,
            &self.recovery,
            ctx.cancel_token.clone(),
        )
        .with_limits(self.limits)
        .with_verbose(self.verbose);
        if let Some(tx) = ctx.events.as_ref() {
            session = session.with_event_tx(tx);
        }
        session.run(text).await
    }
}

/// 构造 Agent 的共享材料：LLM、全部可用工具、单次工具超时
#[derive(Clone)]
pub struct AgentToolkit {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    tool_timeout: Duration,
    monitor: Option<Arc<Monitor>>,
}

impl AgentToolkit {
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry, tool_timeout: Duration) -> Self {
        Self {
            llm,
            tools,
            tool_timeout,
            monitor: None,
        }
    }

    /// 各 Agent 的工具调用计入该 Monitor
    pub fn with_monitor(mut self, monitor: Arc<Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// enabled_tools 为空时使用 default_tools
    pub fn runtime(
        &self,
        prompt: &str,
        default_tools: &[&str],
        settings: &AgentSection,
    ) -> AgentRuntime {
        let names: Vec<String> = if settings.enabled_tools.is_empty() {
            default_tools.iter().map(|s| s.to_string()).collect()
        } else {
            settings.enabled_tools.clone()
        };
        let tools = self.tools.subset(&names);
        let reasoner = LlmReasoner::for_tools(Arc::clone(&self.llm), prompt, &tools);
        let mut executor = ToolExecutor::with_timeout(tools, self.tool_timeout);
        if let Some(monitor) = &self.monitor {
            executor = executor.with_monitor(Arc::clone(monitor));
        }
        AgentRuntime::new(Arc::new(reasoner), executor).with_settings(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::test_support::StaticTool;

    fn toolkit() -> AgentToolkit {
        let mut tools = ToolRegistry::new();
        tools.register(StaticTool::ok("get_weather_data"));
        tools.register(StaticTool::ok("search_city_info"));
        AgentToolkit::new(Arc::new(MockLlmClient), tools, Duration::from_secs(5))
    }

    #[test]
    fn test_runtime_uses_default_tools_when_unset() {
        let rt = toolkit().runtime("p", &["search_city_info"], &AgentSection::default());
        assert_eq!(rt.tool_names(), vec!["search_city_info".to_string()]);
        assert_eq!(rt.limits().max_iterations, 10);
        assert_eq!(rt.model_name(), "mock");
    }

    #[test]
    fn test_runtime_respects_enabled_tools_and_limits() {
        let settings = AgentSection {
            enabled_tools: vec!["get_weather_data".into()],
            max_iterations: 3,
            timeout_secs: 7,
            ..AgentSection::default()
        };
        let rt = toolkit().runtime("p", &["search_city_info"], &settings);
        assert_eq!(rt.tool_names(), vec!["get_weather_data".to_string()]);
        assert_eq!(
            rt.limits(),
            SessionLimits::new(3, Duration::from_secs(7))
        );
    }

    #[tokio::test]
    async fn test_runtime_runs_session_with_mock() {
        let rt = toolkit().runtime("p", &[], &AgentSection::default());
        let outcome = rt.run("hello", &ExecutionContext::default()).await;
        assert!(outcome.is_answered());
    }
}
