//! Single-flight refresh of the repository for the selected filter.
//!
//! Every filter accepted by [`RefreshCoordinator`] opens a session with a new
//! id from a [`SessionClock`]. Starting a session cancels the token of the one
//! before it, which drops its refresh future. [`RefreshStatus::finish`] only
//! lets the latest session touch `loading`/`error_notice`, so a result that
//! slips past cancellation is still discarded.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::filter_state::FilterChanges;
use crate::core::observable::{Observable, ObservableView};
use crate::core::scope::{SessionClock, TaskScope};
use crate::domain::model::FilterValue;
use crate::domain::ports::{refresh_filter, PlantRepository};
use crate::utils::error::RefreshError;

/// What to do when the filter is set to the value it already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameFilterPolicy {
    /// Ignore the repeated value; no session is started.
    #[default]
    Coalesce,
    /// Supersede the current session and refresh again.
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Failed,
    /// A newer session had started; nothing was published.
    Discarded,
}

/// Loading flag and error notice, written only by the latest session.
pub struct RefreshStatus {
    clock: SessionClock,
    active: Mutex<Option<u64>>,
    loading: Observable<bool>,
    error_notice: Observable<Option<String>>,
    handled: Observable<u64>,
}

impl RefreshStatus {
    pub fn new() -> Self {
        Self {
            clock: SessionClock::new(),
            active: Mutex::new(None),
            loading: Observable::new(false),
            error_notice: Observable::new(None),
            handled: Observable::new(0),
        }
    }

    /// Opens a session for `filter` and marks loading. The returned id is the
    /// only one allowed to finish until the next `begin`.
    pub fn begin(&self, filter: FilterValue) -> u64 {
        let session = {
            let mut active = self.active.lock();
            let session = self.clock.next();
            if let Some(stale) = active.replace(session) {
                tracing::debug!(stale, session, %filter, "refresh session superseded");
            }
            self.loading.stage_if_changed(true);
            session
        };
        self.loading.flush();
        tracing::debug!(session, %filter, "refresh session started");
        session
    }

    /// Publishes the outcome of `session` if it is still the latest one.
    ///
    /// The decision and the new values are staged under the session lock, so
    /// two sessions can never interleave their writes. Observer callbacks
    /// run after the lock is released.
    pub fn finish(
        &self,
        session: u64,
        filter: FilterValue,
        result: std::result::Result<(), RefreshError>,
    ) -> SessionOutcome {
        let outcome = {
            let mut active = self.active.lock();
            if !self.clock.is_latest(session) || *active != Some(session) {
                tracing::debug!(session, %filter, "discarding result of stale refresh session");
                return SessionOutcome::Discarded;
            }
            *active = None;
            self.loading.stage_if_changed(false);
            match result {
                Ok(()) => {
                    tracing::info!(session, %filter, "refresh completed");
                    SessionOutcome::Completed
                }
                Err(err) => {
                    tracing::warn!(session, %filter, "refresh failed: {}", err);
                    self.error_notice.stage(Some(err.to_string()));
                    SessionOutcome::Failed
                }
            }
        };
        self.loading.flush();
        self.error_notice.flush();
        outcome
    }

    /// Clears the pending error notice. Idempotent, and safe to call from an
    /// `error_notice` callback.
    pub fn acknowledge_error(&self) {
        self.error_notice.set_if_changed(None);
    }

    /// Records that one more filter value reached the coordinator.
    pub fn mark_handled(&self) {
        let handled = self.handled.get();
        self.handled.set(handled + 1);
    }

    pub fn close(&self) {
        let _active = self.active.lock();
        self.loading.close();
        self.error_notice.close();
        self.handled.close();
    }

    pub fn loading(&self) -> ObservableView<bool> {
        self.loading.view()
    }

    pub fn error_notice(&self) -> ObservableView<Option<String>> {
        self.error_notice.view()
    }

    pub fn handled(&self) -> ObservableView<u64> {
        self.handled.view()
    }

    #[cfg(test)]
    pub(crate) fn active_session(&self) -> Option<u64> {
        *self.active.lock()
    }

    pub fn sessions_started(&self) -> u64 {
        self.clock.latest()
    }
}

impl Default for RefreshStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Restarts the repository refresh whenever the filter changes.
pub struct RefreshCoordinator<R: ?Sized> {
    repo: Arc<R>,
    status: Arc<RefreshStatus>,
    scope: TaskScope,
    policy: SameFilterPolicy,
    timeout: Option<Duration>,
}

impl<R: PlantRepository + ?Sized> RefreshCoordinator<R> {
    pub fn new(repo: Arc<R>, status: Arc<RefreshStatus>, scope: TaskScope) -> Self {
        Self {
            repo,
            status,
            scope,
            policy: SameFilterPolicy::default(),
            timeout: None,
        }
    }

    pub fn with_policy(mut self, policy: SameFilterPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run(self, mut filters: FilterChanges) {
        let mut last_accepted: Option<FilterValue> = None;
        let mut in_flight: Option<CancellationToken> = None;

        while let Some(filter) = filters.next().await {
            if self.policy == SameFilterPolicy::Coalesce && last_accepted == Some(filter) {
                tracing::debug!(%filter, "filter unchanged, refresh coalesced");
                self.status.mark_handled();
                continue;
            }
            last_accepted = Some(filter);

            if let Some(stale) = in_flight.take() {
                stale.cancel();
            }
            let session = self.status.begin(filter);
            in_flight = Some(self.launch(session, filter));
            self.status.mark_handled();
        }

        if let Some(stale) = in_flight.take() {
            stale.cancel();
        }
        tracing::debug!("refresh coordinator stopped");
    }

    fn launch(&self, session: u64, filter: FilterValue) -> CancellationToken {
        let cancel = self.scope.child_token();
        let token = cancel.clone();
        let repo = Arc::clone(&self.repo);
        let status = Arc::clone(&self.status);
        let timeout = self.timeout;

        self.scope.spawn("refresh-session", async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!(session, %filter, "refresh session cancelled");
                    return;
                }
                result = refresh_with_timeout(&*repo, filter, timeout) => result,
            };
            status.finish(session, filter, result);
        });
        cancel
    }
}

async fn refresh_with_timeout<R: PlantRepository + ?Sized>(
    repo: &R,
    filter: FilterValue,
    timeout: Option<Duration>,
) -> std::result::Result<(), RefreshError> {
    match timeout {
        None => refresh_filter(repo, filter).await,
        Some(limit) => tokio::time::timeout(limit, refresh_filter(repo, filter))
            .await
            .unwrap_or_else(|_| Err(timed_out(limit))),
    }
}

fn timed_out(limit: Duration) -> RefreshError {
    RefreshError::TimedOut {
        after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
    }
}
