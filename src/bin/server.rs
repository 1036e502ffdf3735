//! CityFusion HTTP 服务
//!
//! POST /query   {"query": "...", "verbose": false} -> QueryResponse
//! GET  /health  健康状态、指标快照、主机资源与 token 用量
//! GET  /agents  已注册 Agent 的能力描述
//!
//! Ctrl+C / SIGTERM 时取消所有进行中的会话并停止接收新连接。

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};

use cityfusion::agents::AgentCapabilities;
use cityfusion::config::load_config;
use cityfusion::core::ShutdownManager;
use cityfusion::llm::TokenUsage;
use cityfusion::observability::{self, spawn_sampler, HealthReport, MetricsSnapshot};
use cityfusion::{Orchestrator, OrchestratorBuilder, QueryResponse};

#[derive(Parser)]
#[command(name = "cityfusion-server")]
#[command(version, about = "CityFusion HTTP query service")]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: SocketAddr,
}

struct AppState {
    orchestrator: Orchestrator,
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    verbose: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    health: HealthReport,
    metrics: MetricsSnapshot,
    tokens: TokenUsage,
}

async fn api_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    if req.query.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "query is required".to_string()));
    }
    let response = state.orchestrator.respond(&req.query, req.verbose).await;
    Ok(Json(response))
}

async fn api_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        health: state.orchestrator.health(),
        metrics: state.orchestrator.snapshot(),
        tokens: state.orchestrator.token_usage(),
    })
}

async fn api_agents(State(state): State<Arc<AppState>>) -> Json<Vec<AgentCapabilities>> {
    Json(state.orchestrator.capabilities())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = load_config(args.config).context("Failed to load configuration")?;
    observability::init(&cfg.app.log_level);

    let manager = Arc::new(ShutdownManager::new());
    manager.install_signal_handlers();

    let monitor_cfg = cfg.monitor.clone();
    let orchestrator = OrchestratorBuilder::new(cfg)
        .with_shutdown_token(manager.token())
        .build()
        .context("Failed to build orchestrator")?;
    if monitor_cfg.system_sampling {
        spawn_sampler(
            Arc::clone(orchestrator.monitor()),
            Duration::from_secs(monitor_cfg.sample_interval_secs),
            manager.token(),
        );
    }
    let state = Arc::new(AppState { orchestrator });

    let app = Router::new()
        .route("/query", post(api_query))
        .route("/health", get(api_health))
        .route("/agents", get(api_agents))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    tracing::info!("CityFusion server listening on http://{}", args.addr);

    let shutdown = Arc::clone(&manager);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait_for_shutdown().await })
        .await?;
    manager
        .drain(state.orchestrator.supervisor(), Duration::from_secs(10))
        .await;

    let snap = state.orchestrator.snapshot();
    tracing::info!(
        total = snap.total_queries,
        failures = snap.failures_total,
        "server stopped"
    );
    Ok(())
}
