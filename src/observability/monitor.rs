//! Monitor：进程级查询计数、耗时与健康报告
//!
//! 所有计数在同一把锁内一次性更新，快照在同一把锁内整体复制，读方不会看到半更新的状态。
//! Exhausted 单独计数，既不算成功也不算失败。
//! 另记录每个工具的调用 / 失败次数，以及后台采样的最新主机资源读数。

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{ErrorKind, Outcome, ResponseStatus};
use crate::observability::{ResourceThresholds, SystemSample};

/// 保留的最近查询记录条数
pub const RECENT_QUERY_CAPACITY: usize = 100;

/// 失败率超过该比例时健康状态为 warning
pub const FAILURE_RATE_WARNING: f64 = 0.10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRecord {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentStats {
    pub queries: u64,
    pub successes: u64,
    pub exhausted: u64,
    pub failures: u64,
    pub avg_latency_ms: f64,
    #[serde(skip)]
    total_latency_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ToolCallStats {
    pub calls: u64,
    pub failures: u64,
}

/// 只读快照（副本）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub successes: u64,
    pub exhausted: u64,
    pub failures_total: u64,
    pub failures_by_kind: BTreeMap<ErrorKind, u64>,
    pub avg_latency_ms: f64,
    pub per_agent_counts: BTreeMap<String, u64>,
    pub per_agent: BTreeMap<String, AgentStats>,
    /// 未匹配而派发给默认 Agent 的次数
    pub fallback_dispatches: u64,
    pub uptime_secs: u64,
    pub recent: Vec<QueryRecord>,
    pub tool_calls: BTreeMap<String, ToolCallStats>,
    /// 尚未采样时为 None
    pub system: Option<SystemSample>,
}

impl MetricsSnapshot {
    pub fn success_rate(&self) -> f64 {
        ratio(self.successes, self.total_queries)
    }

    pub fn failure_rate(&self) -> f64 {
        ratio(self.failures_total, self.total_queries)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub warnings: Vec<String>,
    pub uptime_secs: u64,
    pub total_queries: u64,
    pub failures_total: u64,
    pub system: Option<SystemSample>,
}

#[derive(Debug, Default)]
struct MonitorState {
    total_queries: u64,
    successes: u64,
    exhausted: u64,
    failures_total: u64,
    failures_by_kind: BTreeMap<ErrorKind, u64>,
    total_latency_ms: u64,
    per_agent: BTreeMap<String, AgentStats>,
    fallback_dispatches: u64,
    recent: VecDeque<QueryRecord>,
    tool_calls: BTreeMap<String, ToolCallStats>,
    system: Option<SystemSample>,
}

#[derive(Debug)]
pub struct Monitor {
    state: Mutex<MonitorState>,
    started: Instant,
    thresholds: ResourceThresholds,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MonitorState::default()),
            started: Instant::now(),
            thresholds: ResourceThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: ResourceThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, outcome: &Outcome, agent: &str, elapsed: Duration) {
        let latency_ms = elapsed.as_millis() as u64;
        let mut s = self.lock();

        s.total_queries += 1;
        s.total_latency_ms += latency_ms;
        match outcome {
            Outcome::Answered { .. } => s.successes += 1,
            Outcome::Exhausted { .. } => s.exhausted += 1,
            Outcome::Failed { kind, .. } => {
                s.failures_total += 1;
                *s.failures_by_kind.entry(*kind).or_insert(0) += 1;
            }
        }

        let stats = s.per_agent.entry(agent.to_string()).or_default();
        stats.queries += 1;
        stats.total_latency_ms += latency_ms;
        stats.avg_latency_ms = stats.total_latency_ms as f64 / stats.queries as f64;
        match outcome {
            Outcome::Answered { .. } => stats.successes += 1,
            Outcome::Exhausted { .. } => stats.exhausted += 1,
            Outcome::Failed { .. } => stats.failures += 1,
        }

        if s.recent.len() == RECENT_QUERY_CAPACITY {
            s.recent.pop_front();
        }
        s.recent.push_back(QueryRecord {
            timestamp: Utc::now(),
            agent: agent.to_string(),
            status: outcome.status(),
            error_kind: outcome.failure_kind(),
            latency_ms,
        });
    }

    pub fn record_fallback(&self) {
        self.lock().fallback_dispatches += 1;
    }

    pub fn record_tool_call(&self, tool: &str, ok: bool) {
        let mut s = self.lock();
        let stats = s.tool_calls.entry(tool.to_string()).or_default();
        stats.calls += 1;
        if !ok {
            stats.failures += 1;
        }
    }

    pub fn record_system(&self, sample: SystemSample) {
        self.lock().system = Some(sample);
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let s = self.lock();
        MetricsSnapshot {
            total_queries: s.total_queries,
            successes: s.successes,
            exhausted: s.exhausted,
            failures_total: s.failures_total,
            failures_by_kind: s.failures_by_kind.clone(),
            avg_latency_ms: ratio(s.total_latency_ms, s.total_queries),
            per_agent_counts: s
                .per_agent
                .iter()
                .map(|(name, stats)| (name.clone(), stats.queries))
                .collect(),
            per_agent: s.per_agent.clone(),
            fallback_dispatches: s.fallback_dispatches,
            uptime_secs: self.uptime().as_secs(),
            recent: s.recent.iter().cloned().collect(),
            tool_calls: s.tool_calls.clone(),
            system: s.system.clone(),
        }
    }

    pub fn health(&self) -> HealthReport {
        let snap = self.snapshot();
        let mut warnings = snap
            .system
            .as_ref()
            .map(|sample| self.thresholds.warnings(sample))
            .unwrap_or_default();
        let failure_rate = snap.failure_rate();
        if failure_rate > FAILURE_RATE_WARNING {
            warnings.push(format!("High error rate: {:.1}%", failure_rate * 100.0));
        }
        HealthReport {
            status: if warnings.is_empty() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Warning
            },
            warnings,
            uptime_secs: snap.uptime_secs,
            total_queries: snap.total_queries,
            failures_total: snap.failures_total,
            system: snap.system,
        }
    }
}
