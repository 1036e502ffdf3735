//! 推理层：Transcript、推理函数边界（Reasoner / LlmReasoner）、ReasoningSession 状态机、过程事件

pub mod events;
pub mod planner;
pub mod session;
pub mod transcript;

pub use events::SessionEvent;
pub use planner::{
    build_system_prompt, parse_llm_output, LlmReasoner, Reasoner, ReasoningError, ReasoningStep,
};
pub use session::{ReasoningSession, SessionLimits, SessionReport, DEFAULT_MAX_ITERATIONS};
pub use transcript::{Transcript, TranscriptEntry};
