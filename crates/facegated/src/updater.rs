//! Deployment update notifier.
//!
//! Polls the worker script and raises `need_refresh` once its content
//! differs from the version that was active at start-up.

use crate::config::Config;
use crate::fetch::{CacheMode, Connectivity, Fetcher};
use crate::schedule::ScheduledTask;
use sha2::{Digest, Sha256};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

#[derive(Default)]
struct UpdateState {
    /// Digest of the worker script currently in use.
    active: Option<String>,
    /// Newer digest seen on the server, not yet adopted.
    waiting: Option<String>,
    offline_ready: bool,
    need_refresh: bool,
    task: Option<ScheduledTask>,
}

struct UpdaterInner {
    url: String,
    period: Option<Duration>,
    fetcher: Arc<dyn Fetcher>,
    connectivity: Arc<dyn Connectivity>,
    state: Mutex<UpdateState>,
}

/// Clone-safe handle to the update notifier.
#[derive(Clone)]
pub struct Updater {
    inner: Arc<UpdaterInner>,
}

impl Updater {
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>, connectivity: Arc<dyn Connectivity>) -> Self {
        Self {
            inner: Arc::new(UpdaterInner {
                url: config.worker_url(),
                period: config.update_period,
                fetcher,
                connectivity,
                state: Mutex::new(UpdateState::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, UpdateState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the baseline digest and start periodic checks.
    pub async fn activate(&self) {
        self.check().await;
        let Some(period) = self.inner.period else {
            tracing::info!("update checks disabled");
            return;
        };

        let weak = Arc::downgrade(&self.inner);
        let task = ScheduledTask::every("update-check", period, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => {
                        Updater { inner }.check().await;
                        ControlFlow::Continue(())
                    }
                    None => ControlFlow::Break(()),
                }
            }
        });
        self.state().task = Some(task);
        tracing::info!(url = %self.inner.url, period_ms = period.as_millis() as u64, "update checks started");
    }

    /// Poll the worker script once. Returns whether a refresh is pending.
    pub async fn check(&self) -> bool {
        if !self.inner.connectivity.is_online() {
            tracing::trace!("offline; update check skipped");
            return self.state().need_refresh;
        }

        let resp = match self.inner.fetcher.get(&self.inner.url, CacheMode::NoStore).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!(error = %e, "update check failed");
                return self.state().need_refresh;
            }
        };
        if !resp.is_ok() {
            tracing::debug!(status = resp.status, "update check skipped");
            return self.state().need_refresh;
        }

        let latest = digest(&resp.body);
        let mut guard = self.state();
        let state = &mut *guard;
        match &state.active {
            None => {
                tracing::debug!(digest = %latest, "worker baseline recorded");
                state.active = Some(latest);
            }
            Some(active) if *active == latest => {}
            // Already announced.
            Some(_) if state.waiting.as_ref() == Some(&latest) => {}
            Some(_) => {
                tracing::info!(digest = %latest, "new content available");
                state.waiting = Some(latest);
                state.need_refresh = true;
            }
        }
        state.need_refresh
    }

    pub fn mark_offline_ready(&self) {
        let mut state = self.state();
        if !state.offline_ready {
            state.offline_ready = true;
            tracing::info!("ready to work offline");
        }
    }

    /// `(offline_ready, need_refresh)`.
    pub fn flags(&self) -> (bool, bool) {
        let state = self.state();
        (state.offline_ready, state.need_refresh)
    }

    /// Make the waiting version the active one.
    pub fn adopt(&self) {
        let mut state = self.state();
        if let Some(waiting) = state.waiting.take() {
            tracing::info!(digest = %waiting, "new worker version adopted");
            state.active = Some(waiting);
        }
        state.need_refresh = false;
        state.offline_ready = false;
    }

    /// Clear both flags without adopting anything.
    pub fn dismiss(&self) {
        let mut state = self.state();
        state.offline_ready = false;
        state.need_refresh = false;
    }

    pub fn stop(&self) {
        self.state().task = None;
    }
}
