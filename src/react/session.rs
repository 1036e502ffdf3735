//! ReasoningSession：单个 Agent 对单条查询的有界迭代循环
//!
//! 显式状态机：Thinking -> (ToolCall <-> Thinking)* -> Done(Answered | Exhausted | Failed)。
//! - 迭代计数：每完成一次 Thinking -> ToolCall 往返加一；直接回答计为第 1 轮。
//!   往返次数达到 max_iterations 后不再调用推理函数，返回 Exhausted（partial_text 为最后一次推理输出）。
//! - 超时：从会话开始计的墙钟时间；取消：外部 CancellationToken。二者都只在挂起点（推理调用、工具调用）生效，
//!   挂起中的 future 被 drop，迟到的工具结果随之丢弃。
//! - 工具失败不终止会话，与成功结果一样写入 transcript。

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::{ErrorKind, Outcome, RecoveryAction, RecoveryEngine};
use crate::react::{Reasoner, ReasoningStep, SessionEvent, Transcript, TranscriptEntry};
use crate::tools::{ToolExecutor, ToolRequest};

/// 观察结果预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 默认迭代上限
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_iterations: usize,
    pub timeout: Duration,
}

impl SessionLimits {
    /// max_iterations 至少为 1
    pub fn new(max_iterations: usize, timeout: Duration) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            timeout,
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS, Duration::from_secs(120))
    }
}

/// 会话结束后的完整记录
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: Outcome,
    pub transcript: Transcript,
    /// 完成的 Thinking -> ToolCall 往返次数
    pub round_trips: usize,
}

enum State {
    Thinking,
    ToolCall(ToolRequest),
    Done(Outcome),
}

enum Interrupt {
    Cancelled,
    TimedOut,
}

pub struct ReasoningSession<'a> {
    reasoner: &'a dyn Reasoner,
    executor: &'a ToolExecutor,
    recovery: &'a RecoveryEngine,
    cancel_token: CancellationToken,
    limits: SessionLimits,
    event_tx: Option<&'a mpsc::UnboundedSender<SessionEvent>>,
    verbose: bool,
}

impl<'a> ReasoningSession<'a> {
    pub fn new(
        reasoner: &'a dyn Reasoner,
        executor: &'a ToolExecutor,
        recovery: &'a RecoveryEngine,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            reasoner,
            executor,
            recovery,
            cancel_token,
            limits: SessionLimits::default(),
            event_tx: None,
            verbose: false,
        }
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_event_tx(mut self, tx: &'a mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// verbose 时过程事件以 info 级别记录，否则 debug
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub async fn run(&self, query: &str) -> Outcome {
        self.run_with_report(query).await.outcome
    }

    pub async fn run_with_report(&self, query: &str) -> SessionReport {
        // 超出 Instant 表示范围的超时视为不设截止时间
        let deadline = Instant::now().checked_add(self.limits.timeout);
        let max = self.limits.max_iterations;
        let mut transcript = Transcript::new(query);
        let mut round_trips = 0usize;
        let mut consecutive_malformed = 0usize;
        let mut last_output: Option<String> = None;
        let mut state = State::Thinking;

        loop {
            state = match state {
                State::Thinking if round_trips >= max => State::Done(Outcome::Exhausted {
                    partial_text: last_output.clone(),
                }),
                State::Thinking => {
                    self.emit(SessionEvent::Thinking);
                    match self.suspend(self.reasoner.think(&transcript), deadline).await {
                        Err(interrupt) => State::Done(self.interrupted(interrupt)),
                        Ok(Ok(ReasoningStep::FinalAnswer(text))) => {
                            transcript.push(TranscriptEntry::Reasoning(text.clone()));
                            State::Done(Outcome::Answered {
                                text,
                                iterations_used: round_trips.max(1),
                            })
                        }
                        Ok(Ok(ReasoningStep::ToolRequest { request, raw })) => {
                            consecutive_malformed = 0;
                            last_output = Some(raw.clone());
                            transcript.push(TranscriptEntry::Reasoning(raw));
                            State::ToolCall(request)
                        }
                        Ok(Err(err)) => match self.recovery.handle(&err, consecutive_malformed) {
                            RecoveryAction::RetryWithPrompt(prompt) => {
                                consecutive_malformed += 1;
                                self.emit(SessionEvent::Recovery {
                                    detail: err.to_string(),
                                });
                                transcript.push(TranscriptEntry::Note(prompt));
                                State::Thinking
                            }
                            RecoveryAction::Abort(kind) => {
                                State::Done(Outcome::failed(kind, err.to_string()))
                            }
                        },
                    }
                }
                State::ToolCall(request) => {
                    if !self.executor.contains(&request.tool_name) {
                        State::Done(Outcome::failed(
                            ErrorKind::UnknownTool,
                            format!(
                                "Tool '{}' is not available to this agent (available: {})",
                                request.tool_name,
                                self.executor.tool_names().join(", ")
                            ),
                        ))
                    } else {
                        round_trips += 1;
                        self.emit(SessionEvent::Iteration {
                            iteration: round_trips,
                            max_iterations: max,
                        });
                        self.emit(SessionEvent::ToolCall {
                            tool: request.tool_name.clone(),
                            args: serde_json::Value::Object(request.arguments.clone()),
                        });
                        transcript.push(TranscriptEntry::ToolCall(request.clone()));

                        match self.suspend(self.executor.execute(&request), deadline).await {
                            Err(interrupt) => State::Done(self.interrupted(interrupt)),
                            Ok(result) => {
                                self.emit(SessionEvent::Observation {
                                    tool: request.tool_name.clone(),
                                    ok: result.is_success(),
                                    preview: preview(&result.render()),
                                });
                                transcript.push(TranscriptEntry::ToolOutput {
                                    tool: request.tool_name,
                                    result,
                                });
                                State::Thinking
                            }
                        }
                    }
                }
                State::Done(outcome) => {
                    self.emit(SessionEvent::Finished {
                        status: outcome.status().as_str().to_string(),
                    });
                    return SessionReport {
                        outcome,
                        transcript,
                        round_trips,
                    };
                }
            };
        }
    }

    /// 挂起点：取消优先，其次超时，最后才是业务 future
    async fn suspend<F: Future>(
        &self,
        fut: F,
        deadline: Option<Instant>,
    ) -> Result<F::Output, Interrupt> {
        let expiry = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => Err(Interrupt::Cancelled),
            _ = expiry => Err(Interrupt::TimedOut),
            out = fut => Ok(out),
        }
    }

    fn interrupted(&self, interrupt: Interrupt) -> Outcome {
        match interrupt {
            Interrupt::Cancelled => Outcome::failed(ErrorKind::Cancelled, "Session cancelled"),
            Interrupt::TimedOut => Outcome::failed(
                ErrorKind::Timeout,
                format!(
                    "Session exceeded its {}ms time budget",
                    self.limits.timeout.as_millis()
                ),
            ),
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.verbose {
            tracing::info!(step = %event.describe(), "session");
        } else {
            tracing::debug!(step = %event.describe(), "session");
        }
        if let Some(tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!(
            "{}...",
            s.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>()
        )
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::react::ReasoningError;
    use crate::test_support::{ScriptedReasoner, StaticTool};
    use crate::tools::{ToolRegistry, ToolResult};
    use serde_json::json;

    fn executor(tools: Vec<StaticTool>) -> ToolExecutor {
        let mut reg = ToolRegistry::new();
        for t in tools {
            reg.register(t);
        }
        ToolExecutor::with_timeout(reg, Duration::from_secs(5))
    }

    fn limits(n: usize) -> SessionLimits {
        SessionLimits::new(n, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_weather_scenario_answers_in_one_iteration() {
        let weather = StaticTool::returning(
            "get_weather_data",
            json!({"temperature": 29, "condition": "Clear"}),
        );
        let exec = executor(vec![weather]);
        let reasoner = ScriptedReasoner::new(vec![
            ScriptedReasoner::tool("get_weather_data", json!({"city": "Dhaka"})),
            ScriptedReasoner::answer("It is 29°C and clear in Dhaka."),
        ]);
        let recovery = RecoveryEngine::new();

        let report = ReasoningSession::new(&reasoner, &exec, &recovery, CancellationToken::new())
            .with_limits(limits(10))
            .run_with_report("What's the weather like in Dhaka?")
            .await;

        assert_eq!(
            report.outcome,
            Outcome::Answered {
                text: "It is 29°C and clear in Dhaka.".into(),
                iterations_used: 1
            }
        );
        let (_, result) = report.transcript.tool_outputs().next().unwrap();
        match result {
            ToolResult::Success { data } => assert_eq!(data["temperature"], 29),
            other => panic!("Expected Success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_runs_without_deadline() {
        let exec = executor(vec![StaticTool::ok("get_weather_data")]);
        let reasoner = ScriptedReasoner::new(vec![
            ScriptedReasoner::tool("get_weather_data", json!({"city": "Dhaka"})),
            ScriptedReasoner::answer("done"),
        ]);
        let recovery = RecoveryEngine::new();
        let outcome = ReasoningSession::new(&reasoner, &exec, &recovery, CancellationToken::new())
            .with_limits(SessionLimits::new(10, Duration::from_secs(u64::MAX)))
            .run("q")
            .await;
        assert!(outcome.is_answered());
    }

    #[tokio::test]
    async fn test_direct_answer_counts_as_iteration_one() {
        let exec = executor(vec![]);
        let reasoner = ScriptedReasoner::new(vec![ScriptedReasoner::answer("hi")]);
        let recovery = RecoveryEngine::new();
        let outcome = ReasoningSession::new(&reasoner, &exec, &recovery, CancellationToken::new())
            .run("hello")
            .await;
        assert_eq!(
            outcome,
            Outcome::Answered {
                text: "hi".into(),
                iterations_used: 1
            }
        );
    }

    #[tokio::test]
    async fn test_exhausted_after_exactly_n_round_trips() {
        let tool = StaticTool::ok("search_city_info");
        let calls = tool.calls();
        let exec = executor(vec![tool]);
        let reasoner = ScriptedReasoner::always(ScriptedReasoner::tool(
            "search_city_info",
            json!({"query": "Dhaka"}),
        ));
        let recovery = RecoveryEngine::new();

        let report = ReasoningSession::new(&reasoner, &exec, &recovery, CancellationToken::new())
            .with_limits(limits(4))
            .run_with_report("loop forever")
            .await;

        assert!(matches!(
            &report.outcome,
            Outcome::Exhausted { partial_text: Some(t) } if t.contains("search_city_info")
        ));
        assert_eq!(report.round_trips, 4);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 4);
        assert_eq!(reasoner.think_count(), 4);
    }

    #[tokio::test]
    async fn test_failing_tool_never_crashes_session() {
        let exec = executor(vec![StaticTool::failing(
            "get_weather_data",
            ErrorKind::ToolProvider,
            "HTTP 503",
        )]);
        let reasoner = ScriptedReasoner::always(ScriptedReasoner::tool(
            "get_weather_data",
            json!({"city": "Dhaka"}),
        ));
        let recovery = RecoveryEngine::new();

        let report = ReasoningSession::new(&reasoner, &exec, &recovery, CancellationToken::new())
            .with_limits(limits(3))
            .run_with_report("weather?")
            .await;

        assert!(matches!(report.outcome, Outcome::Exhausted { .. }));
        assert_eq!(report.transcript.failure_count(), 3);
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_on_first_call() {
        let exec = executor(vec![StaticTool::ok("get_weather_data")]);
        let reasoner = ScriptedReasoner::always(ScriptedReasoner::tool("teleport", json!({})));
        let recovery = RecoveryEngine::new();

        let report = ReasoningSession::new(&reasoner, &exec, &recovery, CancellationToken::new())
            .run_with_report("beam me up")
            .await;

        assert_eq!(report.outcome.failure_kind(), Some(ErrorKind::UnknownTool));
        assert_eq!(report.round_trips, 0);
        assert_eq!(reasoner.think_count(), 1);
    }

    #[tokio::test]
    async fn test_reasoning_unavailable_fails() {
        let exec = executor(vec![]);
        let reasoner = ScriptedReasoner::new(vec![Err(ReasoningError::Unavailable(
            "connection refused".into(),
        ))]);
        let recovery = RecoveryEngine::new();
        let outcome = ReasoningSession::new(&reasoner, &exec, &recovery, CancellationToken::new())
            .run("weather?")
            .await;
        assert_eq!(outcome.failure_kind(), Some(ErrorKind::ReasoningUnavailable));
    }

    #[tokio::test]
    async fn test_malformed_output_retried_then_answered() {
        let exec = executor(vec![]);
        let reasoner = ScriptedReasoner::new(vec![
            Err(ReasoningError::Malformed("{bad".into())),
            ScriptedReasoner::answer("recovered"),
        ]);
        let recovery = RecoveryEngine::new();
        let report = ReasoningSession::new(&reasoner, &exec, &recovery, CancellationToken::new())
            .run_with_report("q")
            .await;
        assert!(report.outcome.is_answered());
        assert!(report
            .transcript
            .entries()
            .iter()
            .any(|e| matches!(e, TranscriptEntry::Note(_))));
    }

    #[tokio::test]
    async fn test_persistent_malformed_output_fails_invalid_arguments() {
        let exec = executor(vec![]);
        let reasoner = ScriptedReasoner::always(Err(ReasoningError::Malformed("{bad".into())));
        let recovery = RecoveryEngine::new();
        let outcome = ReasoningSession::new(&reasoner, &exec, &recovery, CancellationToken::new())
            .run("q")
            .await;
        assert_eq!(outcome.failure_kind(), Some(ErrorKind::InvalidArguments));
        assert_eq!(reasoner.think_count(), 3);
    }

    #[tokio::test]
    async fn test_timeout_mid_tool_call() {
        let exec = executor(vec![
            StaticTool::ok("get_weather_data").with_delay(Duration::from_secs(2))
        ]);
        let reasoner = ScriptedReasoner::always(ScriptedReasoner::tool(
            "get_weather_data",
            json!({"city": "Dhaka"}),
        ));
        let recovery = RecoveryEngine::new();
        let outcome = ReasoningSession::new(&reasoner, &exec, &recovery, CancellationToken::new())
            .with_limits(SessionLimits::new(10, Duration::from_millis(50)))
            .run("weather?")
            .await;
        assert_eq!(outcome.failure_kind(), Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_at_next_suspension_point() {
        let exec = executor(vec![
            StaticTool::ok("get_weather_data").with_delay(Duration::from_secs(2))
        ]);
        let reasoner = ScriptedReasoner::always(ScriptedReasoner::tool(
            "get_weather_data",
            json!({"city": "Dhaka"}),
        ));
        let recovery = RecoveryEngine::new();
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let outcome = ReasoningSession::new(&reasoner, &exec, &recovery, token)
            .run("weather?")
            .await;
        assert_eq!(outcome.failure_kind(), Some(ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn test_events_are_streamed() {
        let exec = executor(vec![StaticTool::ok("get_weather_data")]);
        let reasoner = ScriptedReasoner::new(vec![
            ScriptedReasoner::tool("get_weather_data", json!({"city": "Dhaka"})),
            ScriptedReasoner::answer("done"),
        ]);
        let recovery = RecoveryEngine::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        ReasoningSession::new(&reasoner, &exec, &recovery, CancellationToken::new())
            .with_event_tx(&tx)
            .run("weather?")
            .await;
        drop(tx);

        let mut kinds = Vec::new();
        while let Some(ev) = rx.recv().await {
            kinds.push(ev.describe());
        }
        assert!(kinds.iter().any(|k| k.starts_with("iteration 1/")));
        assert!(kinds.iter().any(|k| k.starts_with("call get_weather_data")));
        assert_eq!(kinds.last().map(String::as_str), Some("finished: answered"));
    }
}
