//! 优雅关闭
//!
//! ShutdownManager 持有进程级根 token；Orchestrator 的每个查询令牌都是它的子令牌。
//! 收到 Ctrl+C / SIGTERM 或用户退出时取消根 token，在途会话在下一个挂起点以 Cancelled 结束，
//! Monitor 仍然记录这些查询；随后 drain 等待在途会话归零。

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::SessionSupervisor;

const DRAIN_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C 或 quit 命令
    UserInitiated,
    /// SIGTERM
    Signal,
}

#[derive(Debug, Default)]
pub struct ShutdownManager {
    root: CancellationToken,
    reason: Mutex<Option<ShutdownReason>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 根 token，交给 OrchestratorBuilder::with_shutdown_token
    pub fn token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// 只记录第一次的原因；重复调用无副作用
    pub fn shutdown(&self, reason: ShutdownReason) {
        {
            let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(reason);
                tracing::info!(?reason, "shutting down, cancelling in-flight sessions");
            }
        }
        self.root.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.root.is_cancelled()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.reason.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn wait_for_shutdown(&self) {
        self.root.cancelled().await;
    }

    /// 等待在途会话结束；超过 grace 仍未归零时返回 false
    pub async fn drain(&self, supervisor: &SessionSupervisor, grace: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let active = supervisor.active_sessions();
            if active == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(active, "sessions still running after shutdown grace period");
                return false;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
    }

    /// Ctrl+C 与 SIGTERM 都转为 shutdown
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    if sigterm.recv().await.is_some() {
                        manager.shutdown(ShutdownReason::Signal);
                    }
                }
            });
        }
    }
}

/// 运行 app 直到其结束或收到关闭信号，之后取消根 token
pub async fn run_with_graceful_shutdown<F>(manager: Arc<ShutdownManager>, app: F)
where
    F: Future<Output = ()>,
{
    manager.install_signal_handlers();
    tokio::select! {
        _ = app => tracing::debug!("application finished"),
        _ = manager.wait_for_shutdown() => {}
    }
    manager.shutdown(ShutdownReason::UserInitiated);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reason_wins() {
        let manager = ShutdownManager::new();
        let token = manager.token();
        assert!(!manager.is_shutdown());
        assert_eq!(manager.reason(), None);

        manager.shutdown(ShutdownReason::Signal);
        manager.shutdown(ShutdownReason::UserInitiated);
        assert!(token.is_cancelled());
        assert_eq!(manager.reason(), Some(ShutdownReason::Signal));
    }

    #[tokio::test]
    async fn test_drain_waits_for_sessions() {
        let manager = ShutdownManager::new();
        let supervisor = SessionSupervisor::new(manager.token());
        let guard = supervisor.begin();

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });
        assert!(manager.drain(&supervisor, Duration::from_secs(2)).await);
        release.await.unwrap();
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_grace() {
        let manager = ShutdownManager::new();
        let supervisor = SessionSupervisor::new(manager.token());
        let _guard = supervisor.begin();
        assert!(!manager.drain(&supervisor, Duration::from_millis(30)).await);
    }

    #[tokio::test]
    async fn test_finished_app_cancels_root() {
        let manager = Arc::new(ShutdownManager::new());
        run_with_graceful_shutdown(Arc::clone(&manager), async {}).await;
        assert!(manager.is_shutdown());
        assert_eq!(manager.reason(), Some(ShutdownReason::UserInitiated));
    }
}
