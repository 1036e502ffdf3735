//! 可观测性：tracing 初始化、运行监控与主机资源采样

pub mod monitor;
pub mod system;

pub use monitor::{
    AgentStats, HealthReport, HealthStatus, MetricsSnapshot, Monitor, QueryRecord, ToolCallStats,
};
pub use system::{spawn_sampler, ResourceThresholds, SystemSample, SystemSampler};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// RUST_LOG 优先；未设置时使用配置中的默认级别
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}
