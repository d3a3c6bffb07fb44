use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Lifetime of every task a facade spawns. Cancelled exactly once, at
/// teardown; tasks register through [`TaskScope::spawn`].
#[derive(Debug, Clone, Default)]
pub struct TaskScope {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl TaskScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `future` on the current runtime. The future is dropped as soon
    /// as the scope is cancelled.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            tracing::trace!(task = name, "scope.spawn: skipped (cancelled)");
            return;
        }
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::trace!(task = name, "scope task cancelled");
                }
                _ = future => {}
            }
        });
    }

    /// Token cancelled either by the caller or by the scope.
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub fn cancel(&self) {
        self.tracker.close();
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Waits until every spawned task has finished. Only meaningful after
    /// [`TaskScope::cancel`].
    pub async fn join(&self) {
        self.tracker.wait().await;
    }

    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }
}

/// Monotonic session id source. Ids start at 1; 0 means "no session yet".
#[derive(Debug, Default, Clone)]
pub struct SessionClock {
    last: Arc<AtomicU64>,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    pub fn latest(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }

    pub fn is_latest(&self, session: u64) -> bool {
        self.latest() == session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_session_clock_is_monotonic() {
        let clock = SessionClock::new();
        assert_eq!(clock.latest(), 0);
        assert_eq!(clock.next(), 1);
        assert_eq!(clock.next(), 2);
        assert!(clock.is_latest(2));
        assert!(!clock.is_latest(1));
    }

    #[tokio::test]
    async fn test_cancel_stops_spawned_tasks() {
        let scope = TaskScope::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        scope.spawn("forever", async move {
            let _keep = tx;
            std::future::pending::<()>().await;
        });
        assert_eq!(scope.active_tasks(), 1);

        scope.cancel();
        tokio::time::timeout(Duration::from_secs(1), scope.join())
            .await
            .expect("scope tasks did not finish");
        // The sender was dropped together with the cancelled future.
        assert!(rx.await.is_err());
        assert_eq!(scope.active_tasks(), 0);
    }

    #[tokio::test]
    async fn test_spawn_after_cancel_is_ignored() {
        let scope = TaskScope::new();
        scope.cancel();
        scope.spawn("late", async {});
        assert_eq!(scope.active_tasks(), 0);
        assert!(scope.child_token().is_cancelled());
    }
}
