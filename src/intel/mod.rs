// src/intel/mod.rs
//! Remote intelligence client: provider abstraction over the hosted model.
//!
//! A client turns a query into a batch of `ResultItem`s. Transport and HTTP
//! failures are `RequestError`s; an unreadable model answer is *not* an error
//! and degrades to an empty batch (see `parse`).

pub mod gemini;
pub mod mock;
pub mod parse;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::config::PulseConfig;
use crate::feed::ResultItem;

pub use gemini::GeminiClient;
pub use mock::{MockClient, ScriptedClient};

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("intelligence client is disabled")]
    Disabled,
    #[error("no API key configured")]
    MissingKey,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response envelope: {0}")]
    Envelope(String),
}

#[async_trait]
pub trait IntelClient: Send + Sync {
    async fn fetch(&self, query: &str) -> Result<Vec<ResultItem>, RequestError>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynIntelClient = Arc<dyn IntelClient>;

/// Always fails; used when the client is switched off in config.
pub struct DisabledClient;

#[async_trait]
impl IntelClient for DisabledClient {
    async fn fetch(&self, _query: &str) -> Result<Vec<ResultItem>, RequestError> {
        Err(RequestError::Disabled)
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Factory: build a client according to config.
///
/// * provider `mock` (also forced by `PULSE_TEST_MODE=mock`) → deterministic mock.
/// * `enabled == false` → disabled client.
/// * otherwise the Gemini HTTP client.
pub fn build_client_from_config(cfg: &PulseConfig) -> anyhow::Result<DynIntelClient> {
    if cfg.intel.provider == "mock" {
        return Ok(Arc::new(MockClient::new(cfg.intel.min_items as usize)));
    }
    if !cfg.intel.enabled {
        return Ok(Arc::new(DisabledClient));
    }
    match cfg.intel.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiClient::from_config(&cfg.intel)?)),
        other => anyhow::bail!("Unsupported intel provider in config: {other}"),
    }
}

/// Short stable fingerprint of a query; logs carry this instead of raw text.
pub fn query_fingerprint(query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_short_and_stable() {
        let a = query_fingerprint("Kerala floods");
        assert_eq!(a.len(), 12);
        assert_eq!(a, query_fingerprint("Kerala floods"));
        assert_ne!(a, query_fingerprint("kerala floods"));
    }

    #[tokio::test]
    async fn disabled_client_fails_every_fetch() {
        let res = DisabledClient.fetch("anything").await;
        assert!(matches!(res, Err(RequestError::Disabled)));
    }

    #[test]
    fn mock_provider_is_selected_by_config() {
        let mut cfg = PulseConfig::default();
        cfg.intel.provider = "mock".into();
        let client = build_client_from_config(&cfg).unwrap();
        assert_eq!(client.name(), "mock");

        cfg.intel.provider = "nope".into();
        assert!(build_client_from_config(&cfg).is_err());
    }
}
