// src/session.rs
//! Search session: owns one `SearchState`, runs fetch cycles against the
//! intelligence client and keeps the repeating refresh timer.
//!
//! States are Idle and Loading. At most one fetch is in flight per session:
//! `submit_query`/`refresh` are refused with `Busy` while Loading, and the
//! timer is only armed while the session is live, idle and has a query.
//! The timer task watches those three inputs and restarts its countdown
//! whenever any of them changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::feed::{merge_results, MergeStats, SearchState, SessionSnapshot, DEFAULT_CAPACITY};
use crate::intel::{query_fingerprint, DynIntelClient};

/// Message shown to the user after a failed fetch.
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch live updates. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("query is empty")]
    EmptyQuery,
    #[error("no query to refresh")]
    NoQuery,
    #[error("a fetch is already in flight")]
    Busy,
    #[error("session is closed")]
    Closed,
}

/// What a completed cycle did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Merged(MergeStats),
    /// Fetch failed; results were kept and the state carries an error message.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Submit,
    Refresh,
    Timer,
}

impl Trigger {
    fn as_str(self) -> &'static str {
        match self {
            Trigger::Submit => "submit",
            Trigger::Refresh => "refresh",
            Trigger::Timer => "timer",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&FeedConfig> for SessionSettings {
    fn from(cfg: &FeedConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(cfg.poll_interval_secs.max(1)),
            capacity: cfg.capacity.max(1),
        }
    }
}

/// Inputs governing the refresh timer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollInputs {
    pub live: bool,
    pub query: String,
    pub loading: bool,
}

impl PollInputs {
    pub fn armed(&self) -> bool {
        self.live && !self.loading && !self.query.is_empty()
    }
}

#[derive(Debug, Default)]
struct Inner {
    search: SearchState,
    last_updated: Option<DateTime<Utc>>,
    live: bool,
}

impl Inner {
    fn poll_inputs(&self) -> PollInputs {
        PollInputs {
            live: self.live,
            query: self.search.query.clone(),
            loading: self.search.is_loading,
        }
    }
}

struct Shared {
    client: DynIntelClient,
    settings: SessionSettings,
    state: RwLock<Inner>,
    inputs: watch::Sender<PollInputs>,
    closed: AtomicBool,
}

impl Shared {
    fn publish(&self, inner: &Inner) {
        let next = inner.poll_inputs();
        self.inputs.send_if_modified(|cur| {
            if *cur == next {
                false
            } else {
                *cur = next;
                true
            }
        });
    }

    async fn run_cycle(
        &self,
        query: String,
        trigger: Trigger,
    ) -> Result<CycleOutcome, SessionError> {
        {
            let mut st = self.state.write().expect("session state poisoned");
            if self.closed.load(Ordering::SeqCst) {
                return Err(SessionError::Closed);
            }
            if st.search.is_loading {
                return Err(SessionError::Busy);
            }
            st.search.query = query.clone();
            st.search.is_loading = true;
            st.search.error = None;
            self.publish(&st);
        }

        counter!("pulse_fetch_total", "trigger" => trigger.as_str()).increment(1);
        let fp = query_fingerprint(&query);
        debug!(query = %fp, trigger = trigger.as_str(), client = self.client.name(), "fetch start");

        let fetched = self.client.fetch(&query).await;

        let mut st = self.state.write().expect("session state poisoned");
        if self.closed.load(Ordering::SeqCst) {
            debug!(query = %fp, "fetch finished after teardown; dropped");
            return Err(SessionError::Closed);
        }
        st.search.is_loading = false;

        let outcome = match fetched {
            Ok(items) => {
                let fetched_len = items.len();
                let held = std::mem::take(&mut st.search.results);
                let (merged, stats) = merge_results(held, items, self.settings.capacity);
                st.search.results = merged;
                st.last_updated = Some(Utc::now());
                st.live = true;

                counter!("pulse_items_new_total").increment(stats.added as u64);
                info!(
                    query = %fp,
                    trigger = trigger.as_str(),
                    fetched = fetched_len,
                    added = stats.added,
                    duplicates = stats.duplicates,
                    truncated = stats.truncated,
                    held = st.search.results.len(),
                    "fetch merged"
                );
                CycleOutcome::Merged(stats)
            }
            Err(e) => {
                counter!("pulse_fetch_errors_total").increment(1);
                warn!(query = %fp, trigger = trigger.as_str(), error = %e, "fetch failed");
                st.search.error = Some(FETCH_FAILED_MESSAGE.to_string());
                CycleOutcome::Failed(e.to_string())
            }
        };

        self.publish(&st);
        Ok(outcome)
    }
}

/// One search session. Must be created inside a Tokio runtime.
pub struct Session {
    shared: Arc<Shared>,
    poller: Mutex<Option<JoinHandle<()>>>,
    /// Last time a client looked at or drove this session. Timer cycles don't count.
    last_access: Mutex<Instant>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(client: DynIntelClient, settings: SessionSettings) -> Self {
        let (tx, rx) = watch::channel(PollInputs::default());
        let shared = Arc::new(Shared {
            client,
            settings,
            state: RwLock::new(Inner::default()),
            inputs: tx,
            closed: AtomicBool::new(false),
        });
        let poller = tokio::spawn(poll_loop(shared.clone(), rx));
        Self {
            shared,
            poller: Mutex::new(Some(poller)),
            last_access: Mutex::new(Instant::now()),
        }
    }

    /// Start a fetch cycle for `query` and wait for it to finish.
    ///
    /// The cycle runs on its own task, so dropping this future does not leave
    /// the session stuck in Loading.
    pub async fn submit_query(&self, query: &str) -> Result<CycleOutcome, SessionError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SessionError::EmptyQuery);
        }
        self.spawn_cycle(query.to_string(), Trigger::Submit).await
    }

    /// Re-run the current query. Refused while Loading or with no query set.
    pub async fn refresh(&self) -> Result<CycleOutcome, SessionError> {
        let query = {
            let st = self.shared.state.read().expect("session state poisoned");
            if st.search.is_loading {
                return Err(SessionError::Busy);
            }
            st.search.query.clone()
        };
        if query.is_empty() {
            return Err(SessionError::NoQuery);
        }
        self.spawn_cycle(query, Trigger::Refresh).await
    }

    async fn spawn_cycle(
        &self,
        query: String,
        trigger: Trigger,
    ) -> Result<CycleOutcome, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let shared = self.shared.clone();
        tokio::spawn(async move { shared.run_cycle(query, trigger).await })
            .await
            .unwrap_or(Err(SessionError::Closed))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let st = self.shared.state.read().expect("session state poisoned");
        SessionSnapshot {
            state: st.search.clone(),
            last_updated: st.last_updated,
            live: st.live,
        }
    }

    pub fn poll_inputs(&self) -> PollInputs {
        self.shared.inputs.borrow().clone()
    }

    pub fn settings(&self) -> SessionSettings {
        self.shared.settings
    }

    /// Mark the session as in use by a client.
    pub fn touch(&self) {
        *self.last_access.lock().expect("last access poisoned") = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_access
            .lock()
            .expect("last access poisoned")
            .elapsed()
    }

    /// Tear down: stop the timer; a fetch still in flight will be ignored.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.poller.lock().expect("poller mutex poisoned").take() {
            handle.abort();
        }
        debug!("session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

async fn poll_loop(shared: Arc<Shared>, mut rx: watch::Receiver<PollInputs>) {
    loop {
        let inputs = rx.borrow_and_update().clone();
        if !inputs.armed() {
            if rx.changed().await.is_err() {
                return;
            }
            continue;
        }

        tokio::select! {
            _ = tokio::time::sleep(shared.settings.poll_interval) => {
                counter!("pulse_poll_ticks_total").increment(1);
                match shared.run_cycle(inputs.query.clone(), Trigger::Timer).await {
                    Ok(_) => {}
                    Err(SessionError::Closed) => return,
                    Err(e) => debug!(error = %e, "timer tick skipped"),
                }
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_is_armed_only_when_live_idle_and_queried() {
        let mut p = PollInputs {
            live: true,
            query: "q".into(),
            loading: false,
        };
        assert!(p.armed());
        p.loading = true;
        assert!(!p.armed());
        p.loading = false;
        p.query.clear();
        assert!(!p.armed());
        p.query = "q".into();
        p.live = false;
        assert!(!p.armed());
    }

    #[test]
    fn settings_from_feed_config_clamp_zero() {
        let cfg = FeedConfig {
            poll_interval_secs: 0,
            capacity: 0,
            ..FeedConfig::default()
        };
        let s = SessionSettings::from(&cfg);
        assert_eq!(s.poll_interval, Duration::from_secs(1));
        assert_eq!(s.capacity, 1);
    }
}
