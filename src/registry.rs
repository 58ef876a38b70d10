// src/registry.rs
//! Live sessions keyed by opaque id. Removing a session tears it down.
//!
//! Clients can walk away without a `DELETE`, so sessions nobody touched for
//! `idle_ttl` are swept by a background reaper, and `max_sessions` bounds
//! the map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::task::JoinHandle;

use crate::config::FeedConfig;
use crate::intel::{query_fingerprint, DynIntelClient};
use crate::session::{Session, SessionSettings};

#[derive(Debug, Clone, Copy)]
pub struct RegistryLimits {
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self::from(&FeedConfig::default())
    }
}

impl From<&FeedConfig> for RegistryLimits {
    fn from(cfg: &FeedConfig) -> Self {
        Self {
            idle_ttl: Duration::from_secs(cfg.idle_ttl_secs.max(1)),
            max_sessions: cfg.max_sessions.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("session limit reached ({0} open)")]
    Full(usize),
}

pub struct SessionRegistry {
    client: DynIntelClient,
    settings: SessionSettings,
    limits: RegistryLimits,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    next: AtomicU64,
}

impl SessionRegistry {
    pub fn new(client: DynIntelClient, settings: SessionSettings, limits: RegistryLimits) -> Self {
        Self {
            client,
            settings,
            limits,
            sessions: RwLock::new(HashMap::new()),
            next: AtomicU64::new(1),
        }
    }

    /// Open a fresh session with an empty query.
    ///
    /// At the limit, idle sessions are swept first; if none can go the
    /// request is refused.
    pub fn create(&self) -> Result<(String, Arc<Session>), RegistryError> {
        if self.len() >= self.limits.max_sessions {
            self.sweep_idle();
        }

        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let id = format!("s{n}-{}", query_fingerprint(&format!("{n}:{nanos}")));

        let mut map = self.sessions.write().expect("registry poisoned");
        if map.len() >= self.limits.max_sessions {
            tracing::warn!(open = map.len(), "session limit reached");
            return Err(RegistryError::Full(map.len()));
        }
        let session = Arc::new(Session::new(self.client.clone(), self.settings));
        map.insert(id.clone(), session.clone());
        gauge!("pulse_sessions_active").set(map.len() as f64);
        tracing::info!(session = %id, "session opened");
        Ok((id, session))
    }

    /// Look a session up on behalf of a client; counts as activity.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self
            .sessions
            .read()
            .expect("registry poisoned")
            .get(id)
            .cloned()?;
        session.touch();
        Some(session)
    }

    /// Tear down and forget a session. Returns false for unknown ids.
    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut map = self.sessions.write().expect("registry poisoned");
            let s = map.remove(id);
            gauge!("pulse_sessions_active").set(map.len() as f64);
            s
        };
        match removed {
            Some(s) => {
                s.close();
                tracing::info!(session = %id, "session closed");
                true
            }
            None => false,
        }
    }

    /// Close every session idle for at least `idle_ttl`. Returns how many went.
    pub fn sweep_idle(&self) -> usize {
        let ttl = self.limits.idle_ttl;
        let stale: Vec<String> = self
            .sessions
            .read()
            .expect("registry poisoned")
            .iter()
            .filter(|(_, s)| s.idle_for() >= ttl)
            .map(|(id, _)| id.clone())
            .collect();

        let reaped = stale.iter().filter(|id| self.remove(id)).count();
        if reaped > 0 {
            counter!("pulse_sessions_reaped_total").increment(reaped as u64);
            tracing::info!(reaped, open = self.len(), "idle sessions closed");
        }
        reaped
    }

    /// Sweep idle sessions on a fixed cadence until the registry is dropped.
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let every = (self.limits.idle_ttl / 4).max(Duration::from_secs(1));
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // first tick is immediate
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(reg) = weak.upgrade() else {
                    return;
                };
                reg.sweep_idle();
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.read().expect("registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intel::ScriptedClient;

    fn registry(max_sessions: usize) -> SessionRegistry {
        SessionRegistry::new(
            Arc::new(ScriptedClient::default()),
            SessionSettings::default(),
            RegistryLimits {
                idle_ttl: Duration::from_secs(300),
                max_sessions,
            },
        )
    }

    #[tokio::test]
    async fn create_get_remove() {
        let reg = registry(8);
        let (a, _) = reg.create().unwrap();
        let (b, sb) = reg.create().unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
        assert!(reg.get(&a).is_some());

        assert!(reg.remove(&b));
        assert!(sb.is_closed());
        assert!(!reg.remove(&b));
        assert!(reg.get(&b).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_registry_makes_room_only_from_idle_sessions() {
        let reg = registry(2);
        let (a, sa) = reg.create().unwrap();
        reg.create().unwrap();
        assert_eq!(reg.create().unwrap_err(), RegistryError::Full(2));

        tokio::time::advance(Duration::from_secs(301)).await;
        reg.get(&a);
        reg.create().unwrap();
        assert_eq!(reg.len(), 2);
        assert!(!sa.is_closed());
    }
}
