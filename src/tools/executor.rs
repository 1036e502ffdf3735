//! 工具执行器
//!
//! 持有某个 Agent 的 ToolRegistry 与单次调用超时：
//! 调用前按 ArgSchema 校验参数，调用中施加超时并捕获 panic，任何故障都转为 ToolResult::Failure；
//! 每次调用输出结构化审计日志（JSON），并在挂接 Monitor 时计入该工具的调用次数。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::time::timeout;

use crate::core::ErrorKind;
use crate::observability::Monitor;
use crate::tools::{ToolRegistry, ToolRequest, ToolResult};

pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    monitor: Option<Arc<Monitor>>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self::with_timeout(registry, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(registry: ToolRegistry, timeout: Duration) -> Self {
        Self {
            registry,
            timeout,
            monitor: None,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn contains(&self, tool_name: &str) -> bool {
        self.registry.contains(tool_name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    /// 执行工具请求；永远返回 ToolResult，不会 panic 或返回 Err
    pub async fn execute(&self, request: &ToolRequest) -> ToolResult {
        let start = Instant::now();
        let result = self.execute_inner(request).await;

        let outcome = match &result {
            ToolResult::Success { .. } => "ok",
            ToolResult::Failure { kind, .. } => kind.as_str(),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": request.tool_name,
            "ok": result.is_success(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&request.arguments),
        });
        tracing::info!(audit = %audit, "tool");
        if let Some(monitor) = &self.monitor {
            monitor.record_tool_call(&request.tool_name, result.is_success());
        }

        result
    }

    async fn execute_inner(&self, request: &ToolRequest) -> ToolResult {
        let Some(tool) = self.registry.get(&request.tool_name) else {
            return ToolResult::failure(
                ErrorKind::UnknownTool,
                format!("Unknown tool: {}", request.tool_name),
            );
        };

        if let Err(reason) = tool.schema().validate(&request.arguments) {
            return ToolResult::invalid_arguments(format!("{}: {}", request.tool_name, reason));
        }

        let call = AssertUnwindSafe(tool.execute(&request.arguments)).catch_unwind();
        match timeout(self.timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                tracing::error!(tool = %request.tool_name, "tool panicked");
                ToolResult::provider_error(format!("{} failed unexpectedly", request.tool_name))
            }
            Err(_) => ToolResult::failure(
                ErrorKind::Timeout,
                format!(
                    "{} timed out after {}ms",
                    request.tool_name,
                    self.timeout.as_millis()
                ),
            ),
        }
    }
}

fn args_preview(args: &crate::tools::Arguments) -> String {
    let s = serde_json::to_string(args).unwrap_or_default();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
