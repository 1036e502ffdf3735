//! CityFusion - 城市信息多智能体编排内核
//!
//! 模块划分：
//! - **agents**: Agent 契约、注册表、能力路由、天气 / 通用 Agent
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 查询与结果、错误分类、恢复、会话监管、Orchestrator
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）
//! - **observability**: tracing 初始化与运行监控（Monitor）
//! - **react**: Transcript、推理函数边界、ReasoningSession 状态机
//! - **tools**: 工具契约、参数 Schema、执行器、天气与城市搜索工具

pub mod agents;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod react;
pub mod tools;

#[cfg(test)]
mod test_support;

pub use crate::core::{Orchestrator, OrchestratorBuilder, Outcome, Query, QueryResponse};
