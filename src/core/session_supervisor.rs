//! 会话监管：每个查询一个子取消令牌
//!
//! 根令牌来自 ShutdownManager；进程关闭时所有在途会话在下一个挂起点以 Cancelled 结束。
//! SessionGuard 存活期间计入 active_sessions，drop 时自动减一。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SessionSupervisor {
    root: CancellationToken,
    active: Arc<AtomicUsize>,
}

impl SessionSupervisor {
    pub fn new(root: CancellationToken) -> Self {
        Self {
            root,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 为一个查询开启会话：子 token + 在途计数
    pub fn begin(&self) -> SessionGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        SessionGuard {
            token: self.root.child_token(),
            active: Arc::clone(&self.active),
        }
    }

    /// 取消全部在途会话（关闭时）
    pub fn cancel_all(&self) {
        self.root.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.root.is_cancelled()
    }

    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

#[derive(Debug)]
pub struct SessionGuard {
    token: CancellationToken,
    active: Arc<AtomicUsize>,
}

impl SessionGuard {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 只取消本查询
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
