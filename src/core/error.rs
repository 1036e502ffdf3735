//! 错误分类与内核错误
//!
//! ErrorKind 是对外稳定的错误类别（序列化为 snake_case 字符串，出现在 Outcome / 监控统计 / 调用方响应中）；
//! KernelError 是注册表、路由与配置阶段的错误，直接返回给调用方或运维，不做自动重试。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 稳定错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownAgent,
    DuplicateName,
    NoRoute,
    UnknownTool,
    InvalidArguments,
    ReasoningUnavailable,
    Timeout,
    Cancelled,
    /// 工具下游（天气 / 搜索服务）的不透明错误
    ToolProvider,
    /// 配置或注册表生命周期错误（如注册表已封存）
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownAgent => "unknown_agent",
            ErrorKind::DuplicateName => "duplicate_name",
            ErrorKind::NoRoute => "no_route",
            ErrorKind::UnknownTool => "unknown_tool",
            ErrorKind::InvalidArguments => "invalid_arguments",
            ErrorKind::ReasoningUnavailable => "reasoning_unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::ToolProvider => "tool_provider",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 注册 / 分发 / 配置阶段的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Agent already registered: {0}")]
    DuplicateName(String),

    #[error("No registered agent can handle the query")]
    NoRoute,

    #[error("Agent registry is sealed, cannot register: {0}")]
    RegistrySealed(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl KernelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::UnknownAgent(_) => ErrorKind::UnknownAgent,
            KernelError::DuplicateName(_) => ErrorKind::DuplicateName,
            KernelError::NoRoute => ErrorKind::NoRoute,
            KernelError::RegistrySealed(_) | KernelError::Config(_) => ErrorKind::Configuration,
        }
    }
}
