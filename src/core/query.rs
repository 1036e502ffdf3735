//! 查询与结果：Query（不可变输入）、Outcome（每个查询恰好一个终态）、RoutingDecision、调用方响应

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::ErrorKind;

/// 用户提交的一条查询；创建后不再修改，响应生成后即丢弃
#[derive(Debug, Clone)]
pub struct Query {
    pub id: Uuid,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    /// 小写形式，供 can_handle 做关键词匹配
    pub fn lowercase(&self) -> String {
        self.text.to_lowercase()
    }
}

/// 一次推理会话的终态
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Answered { text: String, iterations_used: usize },
    /// 迭代预算耗尽；partial_text 为最后一次推理输出
    Exhausted { partial_text: Option<String> },
    Failed { kind: ErrorKind, message: String },
}

impl Outcome {
    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        Outcome::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn status(&self) -> ResponseStatus {
        match self {
            Outcome::Answered { .. } => ResponseStatus::Answered,
            Outcome::Exhausted { .. } => ResponseStatus::Exhausted,
            Outcome::Failed { .. } => ResponseStatus::Failed,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, Outcome::Answered { .. })
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// 路由结果：matched=false 表示没有已注册 Agent 认领该查询
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub agent_name: Option<String>,
    pub matched: bool,
}

impl RoutingDecision {
    pub fn matched(name: impl Into<String>) -> Self {
        Self {
            agent_name: Some(name.into()),
            matched: true,
        }
    }

    pub fn unmatched() -> Self {
        Self {
            agent_name: None,
            matched: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Answered,
    Exhausted,
    Failed,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Answered => "answered",
            ResponseStatus::Exhausted => "exhausted",
            ResponseStatus::Failed => "failed",
        }
    }
}

/// 调用方可见的响应（CLI / HTTP）；失败时带稳定的 error_kind 与可读的 error，不暴露内部故障
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: ResponseStatus,
    pub text: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub agent_used: String,
    pub elapsed_ms: u64,
    /// 仅在 verbose 时填充：每一步的简要描述
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
}

impl QueryResponse {
    pub fn from_outcome(outcome: &Outcome, agent_used: impl Into<String>, elapsed_ms: u64) -> Self {
        let (text, error_kind, error) = match outcome {
            Outcome::Answered { text, .. } => (Some(text.clone()), None, None),
            Outcome::Exhausted { partial_text } => (
                partial_text.clone(),
                None,
                Some("Iteration limit reached before a final answer".to_string()),
            ),
            Outcome::Failed { kind, message } => (None, Some(*kind), Some(message.clone())),
        };
        Self {
            status: outcome.status(),
            text,
            error_kind,
            error,
            agent_used: agent_used.into(),
            elapsed_ms,
            steps: Vec::new(),
        }
    }

    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = steps;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_from_failed_outcome() {
        let outcome = Outcome::failed(ErrorKind::NoRoute, "no agent");
        let resp = QueryResponse::from_outcome(&outcome, "orchestrator", 3);
        assert_eq!(resp.status, ResponseStatus::Failed);
        assert_eq!(resp.error_kind, Some(ErrorKind::NoRoute));
        assert!(resp.text.is_none());

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_kind"], "no_route");
        assert!(json.get("steps").is_none());
    }

    #[test]
    fn test_response_keeps_partial_text_when_exhausted() {
        let outcome = Outcome::Exhausted {
            partial_text: Some("still looking".into()),
        };
        let resp = QueryResponse::from_outcome(&outcome, "weather", 10);
        assert_eq!(resp.status, ResponseStatus::Exhausted);
        assert_eq!(resp.text.as_deref(), Some("still looking"));
        assert!(resp.error_kind.is_none());
    }
}
