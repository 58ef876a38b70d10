// src/access.rs
//! Access gate in front of every session operation.
//!
//! Access is granted when a paid credential is configured, or to a caller
//! holding a free-access pass (issuing one never consults the credential
//! source).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::pulse::api_key_from_env;
use crate::intel::query_fingerprint;

#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Whether a paid credential is currently configured.
    async fn has_selected_key(&self) -> bool;
    /// Run the credential-selection flow.
    async fn open_select_key(&self) -> Result<()>;
}

/// Credentials from config or the process environment.
///
/// The selection flow re-reads `.env`, so a key added there while the
/// service runs is picked up.
pub struct EnvCredentials {
    configured: Option<String>,
}

impl EnvCredentials {
    pub fn new(configured_key: &str) -> Self {
        let k = configured_key.trim();
        Self {
            configured: (!k.is_empty()).then(|| k.to_string()),
        }
    }
}

#[async_trait]
impl CredentialSource for EnvCredentials {
    async fn has_selected_key(&self) -> bool {
        self.configured.is_some() || api_key_from_env().is_some()
    }

    async fn open_select_key(&self) -> Result<()> {
        match dotenvy::dotenv_override() {
            Ok(path) => tracing::info!(path = %path.display(), "reloaded credentials file"),
            Err(e) if e.not_found() => tracing::debug!("no .env file to reload"),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// In-memory credential source for tests and embedding.
#[derive(Default)]
pub struct StaticCredentials {
    has_key: AtomicBool,
    /// Whether running the selection flow actually yields a key.
    selection_succeeds: bool,
    selections: AtomicUsize,
}

impl StaticCredentials {
    pub fn new(has_key: bool, selection_succeeds: bool) -> Self {
        Self {
            has_key: AtomicBool::new(has_key),
            selection_succeeds,
            selections: AtomicUsize::new(0),
        }
    }

    pub fn selections(&self) -> usize {
        self.selections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn has_selected_key(&self) -> bool {
        self.has_key.load(Ordering::SeqCst)
    }

    async fn open_select_key(&self) -> Result<()> {
        self.selections.fetch_add(1, Ordering::SeqCst);
        if self.selection_succeeds {
            self.has_key.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
    /// Not checked yet.
    Unknown,
    /// A paid credential is configured.
    Granted,
    /// This caller holds a free-access pass; the gate is bypassed for it.
    FreeAccess,
    /// No credential and free access not chosen.
    Blocked,
}

impl AccessState {
    pub fn allows_use(self) -> bool {
        matches!(self, AccessState::Granted | AccessState::FreeAccess)
    }
}

/// Issued by [`AccessGate::use_free_access`]; the holder may use the service
/// without a paid credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreePass(pub String);

const MAX_FREE_PASSES: usize = 4096;

/// Gate in front of session operations.
///
/// The paid credential is server-wide. Free access is a per-client choice:
/// each caller that opts in gets its own pass, which lapses after `pass_ttl`
/// without use.
pub struct AccessGate {
    source: Arc<dyn CredentialSource>,
    key_state: RwLock<AccessState>,
    passes: Mutex<HashMap<String, Instant>>,
    pass_ttl: Duration,
    next_pass: AtomicU64,
}

impl AccessGate {
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        Self::with_pass_ttl(source, Duration::from_secs(900))
    }

    pub fn with_pass_ttl(source: Arc<dyn CredentialSource>, pass_ttl: Duration) -> Self {
        Self {
            source,
            key_state: RwLock::new(AccessState::Unknown),
            passes: Mutex::new(HashMap::new()),
            pass_ttl,
            next_pass: AtomicU64::new(1),
        }
    }

    /// Credential state only: Unknown, Granted or Blocked.
    pub fn state(&self) -> AccessState {
        *self.key_state.read().expect("access state poisoned")
    }

    fn set(&self, next: AccessState) {
        *self.key_state.write().expect("access state poisoned") = next;
    }

    /// Resolve the credential state, asking the source until a key is found.
    pub async fn check(&self) -> AccessState {
        if self.state() == AccessState::Granted {
            return AccessState::Granted;
        }
        let next = if self.source.has_selected_key().await {
            AccessState::Granted
        } else {
            AccessState::Blocked
        };
        self.set(next);
        next
    }

    /// State as seen by one caller, who may present a free pass.
    pub async fn check_for(&self, pass: Option<&str>) -> AccessState {
        match self.check().await {
            AccessState::Granted => AccessState::Granted,
            _ if pass.is_some_and(|p| self.redeem(p)) => AccessState::FreeAccess,
            other => other,
        }
    }

    /// Run the selection flow, then verify a key is really present.
    pub async fn connect(&self) -> Result<AccessState> {
        self.source.open_select_key().await?;
        let granted = self.source.has_selected_key().await;
        self.set(if granted {
            AccessState::Granted
        } else {
            AccessState::Blocked
        });
        tracing::info!(granted, "credential selection finished");
        Ok(self.state())
    }

    /// Opt one caller into free access.
    pub fn use_free_access(&self) -> FreePass {
        let n = self.next_pass.fetch_add(1, Ordering::SeqCst);
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let token = format!("fp{n}-{}", query_fingerprint(&format!("free:{n}:{nanos}")));

        let now = Instant::now();
        let mut passes = self.passes.lock().expect("free passes poisoned");
        passes.retain(|_, seen| now.duration_since(*seen) < self.pass_ttl);
        if passes.len() >= MAX_FREE_PASSES {
            if let Some(oldest) = passes
                .iter()
                .min_by_key(|(_, seen)| **seen)
                .map(|(k, _)| k.clone())
            {
                passes.remove(&oldest);
            }
        }
        passes.insert(token.clone(), now);
        tracing::info!(open_passes = passes.len(), "free access pass issued");
        FreePass(token)
    }

    /// Valid passes are refreshed on use; lapsed ones are forgotten.
    fn redeem(&self, pass: &str) -> bool {
        let now = Instant::now();
        let mut passes = self.passes.lock().expect("free passes poisoned");
        match passes.get_mut(pass) {
            Some(seen) if now.duration_since(*seen) < self.pass_ttl => {
                *seen = now;
                true
            }
            Some(_) => {
                passes.remove(pass);
                false
            }
            None => false,
        }
    }
}
