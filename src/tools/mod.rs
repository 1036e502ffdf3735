//! 工具层：调用契约、参数 Schema、注册表、执行器与具体工具（天气、城市搜索）

pub mod executor;
pub mod registry;
pub mod result;
pub mod schema;
pub mod search;
pub mod weather;

pub use executor::ToolExecutor;
pub use registry::{Tool, ToolRegistry};
pub use result::{Arguments, ToolRequest, ToolResult};
pub use schema::{tool_call_schema_json, ArgKind, ArgSchema, ArgSpec};
pub use search::{CitySearchTool, SEARCH_TOOL};
pub use weather::{WeatherTool, WEATHER_TOOL};

use crate::config::AppConfig;

/// 按配置构建全部内置工具；各 Agent 再按 enabled_tools 取子集
pub fn builtin_registry(cfg: &AppConfig) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(WeatherTool::from_config(&cfg.weather));
    tools.register(CitySearchTool::from_config(&cfg.search));
    tools
}
