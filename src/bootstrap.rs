// src/bootstrap.rs
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::access::{AccessGate, EnvCredentials};
use crate::api::{self, AppState};
use crate::config::PulseConfig;
use crate::intel::{build_client_from_config, DynIntelClient};

/// Everything the service needs, built from one config.
pub struct PulseRuntime {
    pub cfg: PulseConfig,
    pub client: DynIntelClient,
}

impl PulseRuntime {
    pub fn from_config(cfg: PulseConfig) -> anyhow::Result<Self> {
        // Safe diagnostics: provider + model + key presence only
        info!(
            provider = %cfg.intel.provider,
            model = %cfg.intel.model,
            enabled = cfg.intel.enabled,
            has_key = cfg.has_api_key(),
            poll_secs = cfg.feed.poll_interval_secs,
            "pulse config loaded"
        );
        let client = build_client_from_config(&cfg)?;
        Ok(Self { cfg, client })
    }

    pub fn load_default() -> anyhow::Result<Self> {
        Self::from_config(PulseConfig::load_default()?)
    }

    pub fn app_state(&self) -> AppState {
        // free passes live as long as an idle session would
        let gate = AccessGate::with_pass_ttl(
            Arc::new(EnvCredentials::new(&self.cfg.intel.api_key)),
            Duration::from_secs(self.cfg.feed.idle_ttl_secs),
        );
        AppState::new(&self.cfg, self.client.clone(), gate)
    }
}

/// Build the full router from the default config locations.
pub async fn app() -> anyhow::Result<axum::Router> {
    let rt = PulseRuntime::load_default()?;
    let state = rt.app_state();
    let access = state.gate.check().await;
    info!(access = ?access, "initial access check");
    Ok(api::router(state))
}
