//! AgentRegistry：Agent 名称到构造器的进程级目录
//!
//! 两阶段生命周期：启动时注册（写阶段），seal 之后只读服务。
//! 封存后默认拒绝注册；允许迟到注册时，写操作在写锁内整体完成，Router 不会看到半更新的列表。
//! 名称唯一：register 遇到重名返回 DuplicateName，replace 显式覆盖并保留原注册位置。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::agents::Agent;
use crate::config::AgentSection;
use crate::core::KernelError;

pub type AgentConstructor = Arc<dyn Fn(&AgentSection) -> Arc<dyn Agent> + Send + Sync>;

/// 单个注册项：名称、构造器、该 Agent 的配置；注册后不可变
pub struct AgentDescriptor {
    name: String,
    constructor: AgentConstructor,
    settings: AgentSection,
    cached: OnceLock<Arc<dyn Agent>>,
}

impl AgentDescriptor {
    pub fn new<F>(name: impl Into<String>, settings: AgentSection, constructor: F) -> Self
    where
        F: Fn(&AgentSection) -> Arc<dyn Agent> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            constructor: Arc::new(constructor),
            settings,
            cached: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &AgentSection {
        &self.settings
    }

    /// 获取实例：cache_instance 时首次构造后复用，否则每次新建
    pub fn instantiate(&self) -> Arc<dyn Agent> {
        if self.settings.cache_instance {
            Arc::clone(
                self.cached
                    .get_or_init(|| (self.constructor)(&self.settings)),
            )
        } else {
            (self.constructor)(&self.settings)
        }
    }
}

impl std::fmt::Debug for AgentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDescriptor")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct AgentRegistry {
    entries: RwLock<Vec<Arc<AgentDescriptor>>>,
    sealed: AtomicBool,
    allow_late_registration: bool,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_late_registration(mut self, allow: bool) -> Self {
        self.allow_late_registration = allow;
        self
    }

    pub fn register(&self, descriptor: AgentDescriptor) -> Result<(), KernelError> {
        self.check_writable(descriptor.name())?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|d| d.name() == descriptor.name()) {
            return Err(KernelError::DuplicateName(descriptor.name().to_string()));
        }
        tracing::info!(agent = %descriptor.name(), position = entries.len(), "agent registered");
        entries.push(Arc::new(descriptor));
        Ok(())
    }

    /// 显式覆盖：同名项原位替换（保留路由优先级），不存在时追加
    pub fn replace(&self, descriptor: AgentDescriptor) -> Result<(), KernelError> {
        self.check_writable(descriptor.name())?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let descriptor = Arc::new(descriptor);
        match entries.iter().position(|d| d.name() == descriptor.name()) {
            Some(idx) => {
                tracing::warn!(agent = %descriptor.name(), "agent replaced");
                entries[idx] = descriptor;
            }
            None => entries.push(descriptor),
        }
        Ok(())
    }

    fn check_writable(&self, name: &str) -> Result<(), KernelError> {
        if self.is_sealed() && !self.allow_late_registration {
            return Err(KernelError::RegistrySealed(name.to_string()));
        }
        Ok(())
    }

    /// 进入只读服务阶段
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Agent>, KernelError> {
        self.descriptor(name)
            .map(|d| d.instantiate())
            .ok_or_else(|| KernelError::UnknownAgent(name.to_string()))
    }

    pub fn descriptor(&self, name: &str) -> Option<Arc<AgentDescriptor>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|d| d.name() == name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptor(name).is_some()
    }

    /// 一致性快照（注册顺序）
    pub fn snapshot(&self) -> Vec<Arc<AgentDescriptor>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 按注册顺序的名称序列；每次调用基于新快照，可重复遍历
    pub fn list_names(&self) -> impl Iterator<Item = String> {
        self.snapshot().into_iter().map(|d| d.name().to_string())
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
