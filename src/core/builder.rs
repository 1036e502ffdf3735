//! Orchestrator 构建器：统一的初始化逻辑
//!
//! 按配置选择 LLM 后端、构建内置工具、依 app.agent_order 注册 Agent 并封存注册表。
//! CLI 与 HTTP 服务共用同一套构建流程。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::agents::{
    general, weather, Agent, AgentDescriptor, AgentRegistry, AgentToolkit, GeneralAgent,
    WeatherAgent, GENERAL_AGENT, WEATHER_AGENT,
};
use crate::config::{AgentSection, AppConfig, LlmSection};
use crate::core::{FallbackPolicy, KernelError, Orchestrator, SessionSupervisor};
use crate::llm::{create_gemini_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::observability::{Monitor, ResourceThresholds};
use crate::tools::{builtin_registry, ToolRegistry};

/// 根据配置与环境变量选择 LLM 后端（Gemini / OpenAI 兼容 / Mock）
pub fn create_llm(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = cfg.provider.to_lowercase();
    let has_key = |var: &str| std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false);

    match provider.as_str() {
        "gemini" if has_key("GOOGLE_API_KEY") => {
            tracing::info!("Using Gemini LLM ({})", cfg.model_name);
            Arc::new(create_gemini_client(
                Some(&cfg.model_name),
                cfg.temperature,
                cfg.max_tokens,
                cfg.request_timeout_secs,
            ))
        }
        "openai" if has_key("OPENAI_API_KEY") => {
            tracing::info!("Using OpenAI-compatible LLM ({})", cfg.model_name);
            Arc::new(
                OpenAiClient::new(cfg.base_url.as_deref(), &cfg.model_name, None)
                    .with_temperature(cfg.temperature)
                    .with_max_tokens(cfg.max_tokens)
                    .with_request_timeout(cfg.request_timeout_secs),
            )
        }
        "mock" => Arc::new(MockLlmClient),
        other => {
            tracing::warn!(provider = %other, "No API key set or provider unknown, using Mock LLM");
            Arc::new(MockLlmClient)
        }
    }
}

/// 内置 Agent 的注册项
pub fn builtin_descriptor(
    name: &str,
    settings: AgentSection,
    toolkit: &AgentToolkit,
) -> Result<AgentDescriptor, KernelError> {
    let kit = toolkit.clone();
    match name {
        WEATHER_AGENT => Ok(AgentDescriptor::new(name, settings, move |s| {
            let runtime = kit.runtime(weather::WEATHER_PROMPT, weather::DEFAULT_TOOLS, s);
            Arc::new(WeatherAgent::new(runtime, s.description.clone())) as Arc<dyn Agent>
        })),
        GENERAL_AGENT => Ok(AgentDescriptor::new(name, settings, move |s| {
            let runtime = kit.runtime(general::GENERAL_PROMPT, general::DEFAULT_TOOLS, s);
            Arc::new(GeneralAgent::new(runtime, s.description.clone())) as Arc<dyn Agent>
        })),
        other => Err(KernelError::Config(format!(
            "no built-in agent named '{}'",
            other
        ))),
    }
}

pub struct OrchestratorBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    tools: Option<ToolRegistry>,
    shutdown_token: Option<CancellationToken>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            tools: None,
            shutdown_token: None,
        }
    }

    /// 覆盖 LLM（测试或嵌入方使用）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 覆盖工具集合
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    /// 进程关闭时取消的根 token
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = Some(token);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn build(self) -> Result<Orchestrator, KernelError> {
        let cfg = self.config;
        cfg.validate()?;

        let llm = self.llm.unwrap_or_else(|| create_llm(&cfg.llm));
        let tools = self.tools.unwrap_or_else(|| builtin_registry(&cfg));
        let monitor =
            Arc::new(Monitor::new().with_thresholds(ResourceThresholds::from_config(&cfg.monitor)));
        let toolkit = AgentToolkit::new(
            Arc::clone(&llm),
            tools,
            Duration::from_secs(cfg.tools.tool_timeout_secs),
        )
        .with_monitor(Arc::clone(&monitor));

        let registry =
            AgentRegistry::new().with_late_registration(cfg.app.allow_late_registration);
        for name in &cfg.app.agent_order {
            registry.register(builtin_descriptor(name, cfg.agent(name), &toolkit)?)?;
        }
        for name in cfg.agents.keys() {
            if !cfg.app.agent_order.contains(name) {
                tracing::warn!(agent = %name, "configured agent not listed in app.agent_order, skipped");
            }
        }

        Ok(Orchestrator::new(
            Arc::new(registry),
            monitor,
            FallbackPolicy::from_config(&cfg.app),
            SessionSupervisor::new(self.shutdown_token.unwrap_or_default()),
        )
        .with_llm(llm))
    }
}
