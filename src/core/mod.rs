//! 核心编排层：错误分类与恢复、查询与结果、会话监管、关闭处理、Orchestrator 与构建器

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod query;
pub mod recovery;
pub mod session_supervisor;
pub mod shutdown;

pub use builder::{builtin_descriptor, create_llm, OrchestratorBuilder};
pub use error::{ErrorKind, KernelError};
pub use orchestrator::{Dispatch, FallbackPolicy, Orchestrator, NO_AGENT};
pub use query::{Outcome, Query, QueryResponse, ResponseStatus, RoutingDecision};
pub use recovery::{RecoveryAction, RecoveryEngine, DEFAULT_FORMAT_RETRIES};
pub use session_supervisor::{SessionGuard, SessionSupervisor};
pub use shutdown::{run_with_graceful_shutdown, ShutdownManager, ShutdownReason};
