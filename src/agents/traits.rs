//! Agent 契约：能力判定（can_handle）与执行（execute）
//!
//! can_handle 必须是纯函数式的快速判定（关键词 / 模式匹配），不得调用工具或推理函数；
//! 推理与工具调用只发生在 execute 中。

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::{Outcome, Query};
use crate::react::SessionEvent;

/// Agent 自我描述，供 `agents` 列表与 GET /agents 使用
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentCapabilities {
    pub name: String,
    pub description: String,
    pub tools: Vec<String>,
    pub model: String,
    pub max_iterations: usize,
    pub timeout_secs: u64,
}

/// 单次执行的上下文：取消令牌与可选的过程事件通道
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub cancel_token: CancellationToken,
    pub events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl ExecutionContext {
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self {
            cancel_token,
            events: None,
        }
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(tx);
        self
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 是否认领该查询（无副作用）
    fn can_handle(&self, query: &Query) -> bool;

    /// 执行前改写查询文本；默认原样返回
    fn preprocess(&self, query: &Query) -> String {
        query.text.clone()
    }

    fn capabilities(&self) -> AgentCapabilities;

    async fn execute(&self, query: &Query, ctx: &ExecutionContext) -> Outcome;
}
