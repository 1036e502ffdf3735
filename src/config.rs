//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CITYFUSION__*` 覆盖（双下划线表示嵌套，如 `CITYFUSION__LLM__PROVIDER=openai`）。
//! 启动时加载一次，Orchestrator 接受第一个查询前完成校验；运行期间只读。

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::KernelError;

/// 各类超时与采样间隔的上限（一天）
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub weather: WeatherSection,
    pub search: SearchSection,
    pub tools: ToolsSection,
    pub monitor: MonitorSection,
    /// [agents.<name>] 段；注册顺序由 app.agent_order 决定
    #[serde(default = "default_agents")]
    pub agents: BTreeMap<String, AgentSection>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            weather: WeatherSection::default(),
            search: SearchSection::default(),
            tools: ToolsSection::default(),
            monitor: MonitorSection::default(),
            agents: default_agents(),
        }
    }
}

/// 未匹配任何 Agent 时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// 派发给 app.default_agent
    DefaultAgent,
    /// 直接失败（no_route）
    Reject,
}

/// [app] 段：应用名、日志级别、路由顺序与回退策略
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// tracing EnvFilter 默认指令，RUST_LOG 优先
    pub log_level: String,
    /// 注册顺序即路由优先级（first-match）
    pub agent_order: Vec<String>,
    pub default_agent: Option<String>,
    pub fallback: FallbackMode,
    /// 允许注册表封存后继续注册
    pub allow_late_registration: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "CityFusion".to_string(),
            log_level: "info".to_string(),
            agent_order: vec!["weather".to_string(), "general".to_string()],
            default_agent: Some("general".to_string()),
            fallback: FallbackMode::DefaultAgent,
            allow_late_registration: false,
        }
    }
}

/// [llm] 段：推理后端
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmSection {
    /// gemini / openai / mock；缺少对应 API Key 时退回 mock
    pub provider: String,
    pub model_name: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model_name: crate::llm::GEMINI_FLASH_LITE.to_string(),
            base_url: None,
            temperature: 0.1,
            max_tokens: Some(1000),
            request_timeout_secs: 60,
        }
    }
}

/// [weather] 段：Weatherstack 风格接口
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeatherSection {
    pub base_url: String,
    /// 不写入 `config` 输出
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for WeatherSection {
    fn default() -> Self {
        Self {
            base_url: "http://api.weatherstack.com/current".to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl WeatherSection {
    /// 配置中的 key 优先，其次环境变量 WEATHER_API_KEY
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("WEATHER_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// [search] 段：城市信息搜索
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchSection {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_result_chars: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            base_url: "https://html.duckduckgo.com/html/".to_string(),
            timeout_secs: 15,
            max_result_chars: 4000,
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
        }
    }
}

/// [monitor] 段：主机资源采样与告警阈值（百分比）
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorSection {
    pub system_sampling: bool,
    pub sample_interval_secs: u64,
    pub cpu_warn_percent: f32,
    pub memory_warn_percent: f32,
    pub disk_warn_percent: f32,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            system_sampling: true,
            sample_interval_secs: 60,
            cpu_warn_percent: 80.0,
            memory_warn_percent: 85.0,
            disk_warn_percent: 90.0,
        }
    }
}

/// [agents.<name>] 段：单个 Agent 的迭代上限、超时、工具集合
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentSection {
    pub description: Option<String>,
    pub max_iterations: usize,
    pub timeout_secs: u64,
    /// 为空时使用 Agent 自带的默认工具
    pub enabled_tools: Vec<String>,
    pub verbose: bool,
    /// 跨查询复用同一实例
    pub cache_instance: bool,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            description: None,
            max_iterations: 10,
            timeout_secs: 120,
            enabled_tools: Vec::new(),
            verbose: false,
            cache_instance: false,
        }
    }
}

fn default_agents() -> BTreeMap<String, AgentSection> {
    let mut agents = BTreeMap::new();
    agents.insert(
        "weather".to_string(),
        AgentSection {
            enabled_tools: vec!["get_weather_data".into(), "search_city_info".into()],
            ..AgentSection::default()
        },
    );
    agents.insert(
        "general".to_string(),
        AgentSection {
            enabled_tools: vec!["search_city_info".into()],
            ..AgentSection::default()
        },
    );
    agents
}

impl AppConfig {
    /// 某个 Agent 的配置；未配置时用默认值
    pub fn agent(&self, name: &str) -> AgentSection {
        self.agents.get(name).cloned().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        if self.app.fallback == FallbackMode::DefaultAgent {
            match self.app.default_agent.as_deref().map(str::trim) {
                None | Some("") => {
                    return Err(KernelError::Config(
                        "fallback = \"default_agent\" requires app.default_agent".to_string(),
                    ));
                }
                Some(name) if !self.app.agent_order.iter().any(|a| a == name) => {
                    return Err(KernelError::Config(format!(
                        "default agent '{}' is not listed in app.agent_order",
                        name
                    )));
                }
                Some(_) => {}
            }
        }
        for (name, section) in &self.agents {
            if section.max_iterations == 0 {
                return Err(KernelError::Config(format!(
                    "agents.{}.max_iterations must be at least 1",
                    name
                )));
            }
            if section.timeout_secs == 0 || section.timeout_secs > MAX_TIMEOUT_SECS {
                return Err(KernelError::Config(format!(
                    "agents.{}.timeout_secs must be between 1 and {}",
                    name, MAX_TIMEOUT_SECS
                )));
            }
        }
        for (key, secs) in [
            ("tools.tool_timeout_secs", self.tools.tool_timeout_secs),
            ("llm.request_timeout_secs", self.llm.request_timeout_secs),
            ("monitor.sample_interval_secs", self.monitor.sample_interval_secs),
        ] {
            if secs == 0 || secs > MAX_TIMEOUT_SECS {
                return Err(KernelError::Config(format!(
                    "{} must be between 1 and {}",
                    key, MAX_TIMEOUT_SECS
                )));
            }
        }
        Ok(())
    }

    /// 当前生效配置（TOML，不含密钥）
    pub fn to_toml(&self) -> Result<String, KernelError> {
        toml::to_string_pretty(self).map_err(|e| KernelError::Config(e.to_string()))
    }
}

/// 从 config 目录加载配置，环境变量 CITYFUSION__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CITYFUSION__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignored");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CITYFUSION")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.agent("weather").max_iterations, 10);
        assert_eq!(cfg.app.default_agent.as_deref(), Some("general"));
    }

    #[test]
    fn test_validate_rejects_fallback_without_default() {
        let mut cfg = AppConfig::default();
        cfg.app.default_agent = None;
        assert!(matches!(cfg.validate(), Err(KernelError::Config(_))));

        cfg.app.fallback = FallbackMode::Reject;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut cfg = AppConfig::default();
        cfg.agents.get_mut("weather").unwrap().max_iterations = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.agents.get_mut("general").unwrap().timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_timeouts() {
        let mut cfg = AppConfig::default();
        cfg.agents.get_mut("weather").unwrap().timeout_secs = u64::MAX;
        assert!(matches!(cfg.validate(), Err(KernelError::Config(_))));

        let mut cfg = AppConfig::default();
        cfg.agents.get_mut("weather").unwrap().timeout_secs = MAX_TIMEOUT_SECS;
        assert!(cfg.validate().is_ok());

        let mut cfg = AppConfig::default();
        cfg.tools.tool_timeout_secs = MAX_TIMEOUT_SECS + 1;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.monitor.sample_interval_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[app]
fallback = "reject"

[llm]
provider = "mock"

[agents.weather]
max_iterations = 3
verbose = true
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.app.fallback, FallbackMode::Reject);
        assert_eq!(cfg.llm.provider, "mock");
        let weather = cfg.agent("weather");
        assert_eq!(weather.max_iterations, 3);
        assert!(weather.verbose);
    }

    #[test]
    fn test_to_toml_omits_api_key() {
        let mut cfg = AppConfig::default();
        cfg.weather.api_key = Some("secret".into());
        let out = cfg.to_toml().unwrap();
        assert!(out.contains("[app]"));
        assert!(!out.contains("secret"));
    }
}
