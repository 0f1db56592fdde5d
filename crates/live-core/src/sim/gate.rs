//! Open/closed latch for holding a simulated step mid-flight

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Async latch holding operations pending until it is opened
///
/// Clones share the same latch.
#[derive(Debug, Clone)]
pub struct Gate {
    open: Arc<watch::Sender<bool>>,
    waiting: Arc<AtomicUsize>,
}

struct Waiting<'a>(&'a AtomicUsize);

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Gate {
    /// A gate that holds everyone
    pub fn closed() -> Self {
        Self::with_state(false)
    }

    /// A gate that lets everyone pass
    pub fn opened() -> Self {
        Self::with_state(true)
    }

    fn with_state(open: bool) -> Self {
        let (tx, _) = watch::channel(open);
        Self {
            open: Arc::new(tx),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Release current and future waiters
    pub fn open(&self) {
        self.open.send_replace(true);
    }

    /// Hold future waiters again
    pub fn close(&self) {
        self.open.send_replace(false);
    }

    /// Whether the gate is open
    pub fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    /// Wait until the gate is open
    pub async fn pass(&self) {
        let mut rx = self.open.subscribe();
        if *rx.borrow() {
            return;
        }

        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _waiting = Waiting(&self.waiting);
        let _ = rx.wait_for(|open| *open).await;
    }

    /// Number of tasks currently held
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` tasks are held
    pub async fn until_waiting(&self, count: usize) {
        while self.waiting() < count {
            tokio::task::yield_now().await;
        }
    }
}
