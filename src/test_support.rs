//! 单元测试共用的替身：固定返回的工具、脚本化推理函数、关键词 Agent

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agents::{
    Agent, AgentCapabilities, AgentDescriptor, AgentRuntime, AgentToolkit, ExecutionContext,
};
use crate::config::AgentSection;
use crate::core::{ErrorKind, Outcome, Query};
use crate::llm::MockLlmClient;
use crate::react::{ReasoningError, ReasoningStep, Reasoner, Transcript};
use crate::tools::{ArgKind, ArgSchema, Arguments, Tool, ToolRegistry, ToolRequest, ToolResult};

#[derive(Clone)]
enum Behavior {
    Return(Value),
    Fail(ErrorKind, String),
    Panic,
}

/// 固定行为的工具；接受可选的 city / query 参数
#[derive(Clone)]
pub struct StaticTool {
    name: String,
    behavior: Behavior,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StaticTool {
    fn with_behavior(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn ok(name: &str) -> Self {
        Self::returning(name, json!({"temperature": 29, "condition": "Clear"}))
    }

    pub fn returning(name: &str, data: Value) -> Self {
        Self::with_behavior(name, Behavior::Return(data))
    }

    pub fn failing(name: &str, kind: ErrorKind, message: &str) -> Self {
        Self::with_behavior(name, Behavior::Fail(kind, message.to_string()))
    }

    pub fn panicking(name: &str) -> Self {
        Self::with_behavior(name, Behavior::Panic)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "static test tool"
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::new()
            .optional("city", ArgKind::String, "City name")
            .optional("query", ArgKind::String, "Search query")
    }

    async fn execute(&self, _args: &Arguments) -> ToolResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.behavior {
            Behavior::Return(data) => ToolResult::from_value(data.clone()),
            Behavior::Fail(kind, message) => ToolResult::failure(*kind, message.clone()),
            Behavior::Panic => panic!("static tool exploded"),
        }
    }
}

type Step = Result<ReasoningStep, ReasoningError>;

/// 按脚本依次返回；脚本用完后重复最后一步
pub struct ScriptedReasoner {
    steps: Vec<Step>,
    cursor: Mutex<usize>,
    calls: AtomicUsize,
}

impl ScriptedReasoner {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            cursor: Mutex::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new(vec![step])
    }

    pub fn tool(name: &str, args: Value) -> Step {
        let arguments = match args {
            Value::Object(map) => map,
            _ => Arguments::new(),
        };
        let raw = json!({"tool": name, "args": arguments}).to_string();
        Ok(ReasoningStep::ToolRequest {
            request: ToolRequest {
                tool_name: name.to_string(),
                arguments,
            },
            raw,
        })
    }

    pub fn answer(text: &str) -> Step {
        Ok(ReasoningStep::FinalAnswer(text.to_string()))
    }

    pub fn think_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn think(&self, _transcript: &Transcript) -> Step {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut cursor = self.cursor.lock().unwrap();
        let idx = (*cursor).min(self.steps.len().saturating_sub(1));
        *cursor += 1;
        self.steps
            .get(idx)
            .cloned()
            .unwrap_or_else(|| Err(ReasoningError::Unavailable("empty script".into())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// 查询包含 keyword 即认领；execute 返回固定回答，可加延迟（延迟期间响应取消）
pub struct KeywordAgent {
    name: String,
    keyword: String,
    delay: Option<Duration>,
}

impl KeywordAgent {
    pub fn new(name: &str, keyword: &str) -> Self {
        Self {
            name: name.to_string(),
            keyword: keyword.to_lowercase(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Agent for KeywordAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "keyword test agent"
    }

    fn can_handle(&self, query: &Query) -> bool {
        query.lowercase().contains(&self.keyword)
    }

    fn capabilities(&self) -> AgentCapabilities {
        AgentCapabilities {
            name: self.name.clone(),
            description: self.description().to_string(),
            tools: Vec::new(),
            model: "scripted".to_string(),
            max_iterations: 10,
            timeout_secs: 120,
        }
    }

    async fn execute(&self, query: &Query, ctx: &ExecutionContext) -> Outcome {
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = ctx.cancel_token.cancelled() => {
                    return Outcome::failed(ErrorKind::Cancelled, "cancelled");
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
        Outcome::Answered {
            text: format!("{} handled: {}", self.name, query.text),
            iterations_used: 1,
        }
    }
}

/// 构造次数可观测的注册项
pub fn counting_descriptor(
    name: &str,
    keyword: &str,
    cache_instance: bool,
) -> (AgentDescriptor, Arc<AtomicUsize>) {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let (agent_name, keyword) = (name.to_string(), keyword.to_string());
    let settings = AgentSection {
        cache_instance,
        ..AgentSection::default()
    };
    let descriptor = AgentDescriptor::new(name, settings, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Arc::new(KeywordAgent::new(&agent_name, &keyword)) as Arc<dyn Agent>
    });
    (descriptor, built)
}

/// Mock LLM + 指定名称的 StaticTool
pub fn mock_runtime(tools: &[&str]) -> AgentRuntime {
    let mut registry = ToolRegistry::new();
    for name in tools {
        registry.register(StaticTool::ok(name));
    }
    AgentToolkit::new(Arc::new(MockLlmClient), registry, Duration::from_secs(5)).runtime(
        "test prompt",
        tools,
        &AgentSection::default(),
    )
}

/// 本地一次性 HTTP 服务：接受一个连接，返回固定响应；返回其 URL
pub async fn serve_once(status: &str, content_type: &str, body: &str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    );
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });
    format!("http://{}/", addr)
}
