//! Orchestrator：查询的唯一入口
//!
//! 流程：路由 -> 未匹配时按回退策略处理 -> 获取 Agent 实例 -> 执行（ReasoningSession）-> 记录监控 -> 返回。
//! 每个查询在所有退出路径上恰好记录一次：RecordGuard 在正常结束时显式记录，
//! 若 handle 的 future 被中途 drop（调用方断开），guard 的 Drop 以 Cancelled 补记。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::Instrument;

use crate::agents::{AgentCapabilities, AgentRegistry, CapabilityRouter, ExecutionContext, Selection};
use crate::config::{AppSection, FallbackMode};
use crate::core::{ErrorKind, KernelError, Outcome, Query, QueryResponse, SessionSupervisor};
use crate::llm::{LlmClient, TokenUsage};
use crate::observability::{HealthReport, MetricsSnapshot, Monitor};
use crate::react::SessionEvent;

/// 未选出任何 Agent 时在响应与监控中使用的名称
pub const NO_AGENT: &str = "none";

/// 未匹配查询的处理方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackPolicy {
    DefaultAgent(String),
    Reject,
}

impl FallbackPolicy {
    pub fn from_config(app: &AppSection) -> Self {
        match (app.fallback, app.default_agent.as_deref()) {
            (FallbackMode::DefaultAgent, Some(name)) if !name.trim().is_empty() => {
                FallbackPolicy::DefaultAgent(name.trim().to_string())
            }
            _ => FallbackPolicy::Reject,
        }
    }
}

/// 一次分发的结果
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub outcome: Outcome,
    pub agent_used: String,
    pub elapsed: Duration,
}

struct RecordGuard<'a> {
    monitor: &'a Monitor,
    agent: String,
    started: Instant,
    recorded: bool,
}

impl<'a> RecordGuard<'a> {
    fn new(monitor: &'a Monitor) -> Self {
        Self {
            monitor,
            agent: NO_AGENT.to_string(),
            started: Instant::now(),
            recorded: false,
        }
    }

    fn finish(mut self, outcome: &Outcome) -> Duration {
        let elapsed = self.started.elapsed();
        self.monitor.record(outcome, &self.agent, elapsed);
        self.recorded = true;
        elapsed
    }
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            tracing::warn!(agent = %self.agent, "query dropped before completion");
            self.monitor.record(
                &Outcome::failed(ErrorKind::Cancelled, "Query abandoned by caller"),
                &self.agent,
                self.started.elapsed(),
            );
        }
    }
}

pub struct Orchestrator {
    router: CapabilityRouter,
    monitor: Arc<Monitor>,
    fallback: FallbackPolicy,
    supervisor: SessionSupervisor,
    llm: Option<Arc<dyn LlmClient>>,
}

impl Orchestrator {
    /// 进入服务阶段：注册表在此封存
    pub fn new(
        registry: Arc<AgentRegistry>,
        monitor: Arc<Monitor>,
        fallback: FallbackPolicy,
        supervisor: SessionSupervisor,
    ) -> Self {
        registry.seal();
        Self {
            router: CapabilityRouter::new(registry),
            monitor,
            fallback,
            supervisor,
            llm: None,
        }
    }

    /// Agent 共用的 LLM，用于报告累计 token 用量
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn token_usage(&self) -> TokenUsage {
        self.llm
            .as_ref()
            .map(|llm| llm.token_usage())
            .unwrap_or_default()
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        self.router.registry()
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    pub fn fallback(&self) -> &FallbackPolicy {
        &self.fallback
    }

    pub fn supervisor(&self) -> &SessionSupervisor {
        &self.supervisor
    }

    pub async fn handle(&self, query: Query) -> Outcome {
        self.dispatch(query, None).await.outcome
    }

    /// events 非空时，推理过程事件实时写入该通道
    pub async fn dispatch(
        &self,
        query: Query,
        events: Option<mpsc::UnboundedSender<SessionEvent>>,
    ) -> Dispatch {
        let mut guard = RecordGuard::new(&self.monitor);
        let session = self.supervisor.begin();

        let outcome = match self.select(&query) {
            Err(err) => {
                tracing::warn!(query_id = %query.id, error = %err, "dispatch failed");
                Outcome::failed(err.kind(), err.to_string())
            }
            Ok(Selection { name, agent }) => {
                guard.agent = name.clone();
                let mut ctx = ExecutionContext::new(session.token());
                if let Some(tx) = events {
                    ctx = ctx.with_events(tx);
                }
                let span = tracing::info_span!("query", id = %query.id, agent = %name);
                agent.execute(&query, &ctx).instrument(span).await
            }
        };

        let agent_used = guard.agent.clone();
        let elapsed = guard.finish(&outcome);
        tracing::info!(
            query_id = %query.id,
            agent = %agent_used,
            status = outcome.status().as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "query completed"
        );
        Dispatch {
            outcome,
            agent_used,
            elapsed,
        }
    }

    /// 调用方接口：文本进，结构化响应出；verbose 时附带推理步骤
    pub async fn respond(&self, text: &str, verbose: bool) -> QueryResponse {
        let query = Query::new(text);
        if !verbose {
            let d = self.dispatch(query, None).await;
            return QueryResponse::from_outcome(&d.outcome, d.agent_used, d.elapsed.as_millis() as u64);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let d = self.dispatch(query, Some(tx)).await;
        let mut steps = Vec::new();
        while let Ok(event) = rx.try_recv() {
            steps.push(event.describe());
        }
        QueryResponse::from_outcome(&d.outcome, d.agent_used, d.elapsed.as_millis() as u64)
            .with_steps(steps)
    }

    fn select(&self, query: &Query) -> Result<Selection, KernelError> {
        if let Some(selection) = self.router.select(query) {
            return Ok(selection);
        }
        match &self.fallback {
            FallbackPolicy::Reject => Err(KernelError::NoRoute),
            FallbackPolicy::DefaultAgent(name) => {
                let agent = self.registry().get(name)?;
                self.monitor.record_fallback();
                tracing::info!(query_id = %query.id, agent = %name, "no agent matched, using default agent");
                Ok(Selection {
                    name: name.clone(),
                    agent,
                })
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.monitor.snapshot()
    }

    pub fn health(&self) -> HealthReport {
        self.monitor.health()
    }

    /// 注册顺序的 Agent 能力列表
    pub fn capabilities(&self) -> Vec<AgentCapabilities> {
        self.registry()
            .snapshot()
            .iter()
            .map(|d| d.instantiate().capabilities())
            .collect()
    }
}
