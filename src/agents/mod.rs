//! Agent 层：契约、注册表、能力路由与具体 Agent
//!
//! - **traits**: Agent 契约（can_handle / execute / capabilities）
//! - **registry**: 名称 -> 构造器目录（注册顺序、封存、实例缓存）
//! - **router**: first-match 能力路由
//! - **runtime**: Agent 共用的推理 + 工具执行组合
//! - **weather** / **general**: 具体 Agent
//! - **keywords**: 意图识别用的整词匹配

pub mod general;
pub mod keywords;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod traits;
pub mod weather;

pub use general::{GeneralAgent, GENERAL_AGENT};
pub use keywords::KeywordSet;
pub use registry::{AgentConstructor, AgentDescriptor, AgentRegistry};
pub use router::{CapabilityRouter, Selection};
pub use runtime::{AgentRuntime, AgentToolkit};
pub use traits::{Agent, AgentCapabilities, ExecutionContext};
pub use weather::{WeatherAgent, WEATHER_AGENT};
