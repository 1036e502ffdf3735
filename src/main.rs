//! CityFusion 命令行入口
//!
//! 子命令：query（单次查询）、interactive（交互式 REPL）、status、agents、config。
//! 日志级别取自配置 app.log_level，可用 RUST_LOG 覆盖。

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use cityfusion::config::{load_config, AppConfig};
use cityfusion::core::{run_with_graceful_shutdown, ShutdownManager};
use cityfusion::observability::{self, spawn_sampler, HealthStatus, SystemSampler};
use cityfusion::{Orchestrator, OrchestratorBuilder, QueryResponse};

#[derive(Parser)]
#[command(name = "cityfusion")]
#[command(version, about = "CityFusion - multi-agent city information assistant")]
struct Cli {
    /// 配置文件路径（默认 config/default.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single query and print the response
    Query {
        /// Query text
        text: Vec<String>,
        /// Print each reasoning step
        #[arg(short, long)]
        verbose: bool,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive session (help / status / agents / quit)
    Interactive {
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show health and metrics
    Status,
    /// List registered agents and their capabilities
    Agents,
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = load_config(cli.config.clone()).context("Failed to load configuration")?;
    observability::init(&cfg.app.log_level);

    if let Command::Config = cli.command {
        println!("{}", cfg.to_toml()?);
        return Ok(());
    }

    let monitor_cfg = cfg.monitor.clone();
    let manager = Arc::new(ShutdownManager::new());
    let orchestrator = build(cfg, &manager)?;

    match cli.command {
        Command::Query {
            text,
            verbose,
            json,
        } => {
            let text = text.join(" ");
            if text.trim().is_empty() {
                anyhow::bail!("query text is empty");
            }
            let response = orchestrator.respond(&text, verbose).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_response(&response, verbose);
            }
        }
        Command::Interactive { verbose } => {
            if monitor_cfg.system_sampling {
                spawn_sampler(
                    Arc::clone(orchestrator.monitor()),
                    Duration::from_secs(monitor_cfg.sample_interval_secs),
                    manager.token(),
                );
            }
            let app = interactive(&orchestrator, verbose);
            run_with_graceful_shutdown(Arc::clone(&manager), async {
                if let Err(e) = app.await {
                    tracing::error!("interactive session failed: {}", e);
                }
            })
            .await;
            manager.drain(orchestrator.supervisor(), SHUTDOWN_GRACE).await;
        }
        Command::Status => {
            if monitor_cfg.system_sampling {
                sample_once(&orchestrator).await;
            }
            print_status(&orchestrator);
            println!();
            println!("(counters cover this process only; use `interactive` or the server for live totals)");
        }
        Command::Agents => print_agents(&orchestrator),
        Command::Config => {}
    }
    Ok(())
}

fn build(cfg: AppConfig, manager: &ShutdownManager) -> anyhow::Result<Orchestrator> {
    OrchestratorBuilder::new(cfg)
        .with_shutdown_token(manager.token())
        .build()
        .context("Failed to build orchestrator")
}

/// status 子命令没有后台采样任务，取一次即时读数
async fn sample_once(orchestrator: &Orchestrator) {
    match tokio::task::spawn_blocking(|| SystemSampler::new().sample()).await {
        Ok(sample) => orchestrator.monitor().record_system(sample),
        Err(e) => tracing::warn!(error = %e, "system sample failed"),
    }
}

fn print_response(response: &QueryResponse, verbose: bool) {
    if verbose {
        for step in &response.steps {
            println!("  · {}", step);
        }
    }
    match (&response.text, &response.error) {
        (Some(text), None) => println!("{}", text),
        (Some(text), Some(err)) => println!("{}\n({})", text, err),
        (None, Some(err)) => {
            let kind = response.error_kind.map(|k| k.as_str()).unwrap_or("error");
            println!("[{}] {}", kind, err);
        }
        (None, None) => println!("(no answer)"),
    }
    println!(
        "-- {} by {} in {} ms",
        response.status.as_str(),
        response.agent_used,
        response.elapsed_ms
    );
}

fn print_status(orchestrator: &Orchestrator) {
    let health = orchestrator.health();
    let snap = orchestrator.snapshot();
    let status = match health.status {
        HealthStatus::Healthy => "healthy",
        HealthStatus::Warning => "warning",
    };
    println!("status:        {}", status);
    for w in &health.warnings {
        println!("  warning:     {}", w);
    }
    println!("uptime:        {}s", snap.uptime_secs);
    println!("queries:       {}", snap.total_queries);
    println!("success rate:  {:.1}%", snap.success_rate() * 100.0);
    println!("exhausted:     {}", snap.exhausted);
    println!("failures:      {}", snap.failures_total);
    for (kind, n) in &snap.failures_by_kind {
        println!("  {:<18} {}", kind.as_str(), n);
    }
    println!("avg latency:   {:.1} ms", snap.avg_latency_ms);
    println!("fallbacks:     {}", snap.fallback_dispatches);
    for (agent, n) in &snap.per_agent_counts {
        println!("  {:<18} {}", agent, n);
    }
    println!("tool calls:    {}", snap.tool_calls.values().map(|t| t.calls).sum::<u64>());
    for (tool, stats) in &snap.tool_calls {
        println!("  {:<18} {} ({} failed)", tool, stats.calls, stats.failures);
    }
    let tokens = orchestrator.token_usage();
    println!(
        "tokens:        {} (prompt {}, completion {})",
        tokens.total_tokens, tokens.prompt_tokens, tokens.completion_tokens
    );
    match &snap.system {
        Some(sys) => println!(
            "system:        cpu {:.1}%, memory {:.1}% ({:.0} MB), disk {:.1}%",
            sys.cpu_percent, sys.memory_percent, sys.memory_mb, sys.disk_percent
        ),
        None => println!("system:        not sampled"),
    }
}

fn print_agents(orchestrator: &Orchestrator) {
    for caps in orchestrator.capabilities() {
        println!("{} ({})", caps.name, caps.model);
        println!("  {}", caps.description);
        println!("  tools: {}", caps.tools.join(", "));
        println!(
            "  limits: {} iterations, {}s",
            caps.max_iterations, caps.timeout_secs
        );
    }
}

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const HELP: &str = "Commands: help, status, agents, quit. Anything else is sent as a query.";

/// 在独立线程上按行读取输入
///
/// tokio 的 stdin 占用阻塞线程池，运行时退出时会一直等到下一行输入；
/// 普通线程不参与运行时关闭，Ctrl+C 后进程可以直接退出。
fn spawn_line_reader<R>(reader: R) -> mpsc::Receiver<std::io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        for line in reader.lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn interactive(orchestrator: &Orchestrator, verbose: bool) -> anyhow::Result<()> {
    let mut lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    let mut stdout = tokio::io::stdout();
    println!("CityFusion interactive mode. {}", HELP);

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.recv().await else {
            break;
        };
        let line = line?;
        match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "help" => println!("{}", HELP),
            "status" => print_status(orchestrator),
            "agents" => print_agents(orchestrator),
            text => {
                let response = orchestrator.respond(text, verbose).await;
                print_response(&response, verbose);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use std::time::Instant;

    #[tokio::test]
    async fn test_line_reader_yields_lines_then_closes() {
        let mut rx = spawn_line_reader(Cursor::new("status\nquit\n"));
        assert_eq!(rx.recv().await.unwrap().unwrap(), "status");
        assert_eq!(rx.recv().await.unwrap().unwrap(), "quit");
        assert!(rx.recv().await.is_none());
    }

    /// 永远等不到输入的终端
    struct SilentTerminal;

    impl Read for SilentTerminal {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_secs(3600));
            Ok(0)
        }
    }

    #[test]
    fn test_pending_read_does_not_block_runtime_shutdown() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut rx = spawn_line_reader(std::io::BufReader::new(SilentTerminal));
            let waited = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
            assert!(waited.is_err());
        });

        let started = Instant::now();
        drop(rt);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
