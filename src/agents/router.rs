//! CapabilityRouter：按注册顺序 first-match 选择 Agent
//!
//! 对注册表的一致性快照逐个实例化并调用 can_handle，第一个返回 true 的胜出；
//! 注册顺序即优先级。can_handle 只做关键词判定，路由本身不会挂起。

use std::sync::Arc;

use crate::agents::{Agent, AgentRegistry};
use crate::core::{Query, RoutingDecision};

/// 路由选中的 Agent（名称 + 本次调用使用的实例）
pub struct Selection {
    pub name: String,
    pub agent: Arc<dyn Agent>,
}

pub struct CapabilityRouter {
    registry: Arc<AgentRegistry>,
}

impl CapabilityRouter {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn route(&self, query: &Query) -> RoutingDecision {
        match self.select(query) {
            Some(sel) => RoutingDecision::matched(sel.name),
            None => RoutingDecision::unmatched(),
        }
    }

    /// 与 route 相同的判定，同时交出已构造的实例，避免二次实例化
    pub fn select(&self, query: &Query) -> Option<Selection> {
        for descriptor in self.registry.snapshot() {
            let agent = descriptor.instantiate();
            let claimed = agent.can_handle(query);
            tracing::debug!(agent = %descriptor.name(), claimed, "can_handle");
            if claimed {
                return Some(Selection {
                    name: descriptor.name().to_string(),
                    agent,
                });
            }
        }
        None
    }
}
