// src/config/pulse.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

pub const ENV_CONFIG_PATH: &str = "PULSE_CONFIG_PATH";
pub const ENV_TEST_MODE: &str = "PULSE_TEST_MODE";
pub const ENV_POLL_INTERVAL: &str = "PULSE_POLL_INTERVAL_SECS";
/// Credential variables, checked in this order.
pub const ENV_API_KEYS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

pub const DEFAULT_CONFIG_TOML: &str = "config/pulse.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/pulse.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub intel: IntelConfig,
    pub feed: FeedConfig,
    pub map: MapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelConfig {
    pub enabled: bool,
    /// "gemini" | "mock" (case-insensitive)
    pub provider: String,
    pub model: String,
    pub api_base: String,
    /// "ENV" (or empty) means: read from API_KEY, then GEMINI_API_KEY.
    pub api_key: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub min_items: u32,
    /// Attach the Google Search grounding tool to every request.
    pub google_search: bool,
}

impl Default for IntelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "gemini".into(),
            model: "gemini-3-flash-preview".into(),
            api_base: "https://generativelanguage.googleapis.com".into(),
            api_key: "ENV".into(),
            timeout_secs: 30,
            connect_timeout_secs: 5,
            min_items: 8,
            google_search: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub poll_interval_secs: u64,
    pub capacity: usize,
    /// Sessions untouched by any client for this long are torn down.
    pub idle_ttl_secs: u64,
    /// Upper bound on concurrently open sessions.
    pub max_sessions: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            capacity: crate::feed::DEFAULT_CAPACITY,
            idle_ttl_secs: 900,
            max_sessions: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub tile_url: String,
    pub attribution: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".into(),
            attribution: "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors".into(),
        }
    }
}

impl PulseConfig {
    /// Load from an explicit path. TOML or JSON, picked by extension.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading pulse config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: PulseConfig = match ext.as_str() {
            "json" => serde_json::from_str(&data).context("parsing pulse config json")?,
            _ => toml::from_str(&data).context("parsing pulse config toml")?,
        };
        Ok(cfg.finalize())
    }

    /// Load using env var + fallbacks:
    /// 1) $PULSE_CONFIG_PATH
    /// 2) config/pulse.toml
    /// 3) config/pulse.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        for candidate in [DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_JSON] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
        }
        Ok(Self::default().finalize())
    }

    /// Normalize values and apply env overrides.
    fn finalize(mut self) -> Self {
        self.intel.provider = self.intel.provider.trim().to_ascii_lowercase();
        if env::var(ENV_TEST_MODE).map(|v| v == "mock").unwrap_or(false) {
            self.intel.provider = "mock".into();
        }

        let key = self.intel.api_key.trim();
        if key.is_empty() || key.eq_ignore_ascii_case("env") {
            self.intel.api_key = api_key_from_env().unwrap_or_default();
        }

        if let Some(secs) = env::var(ENV_POLL_INTERVAL)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.feed.poll_interval_secs = secs;
        }
        self.feed.poll_interval_secs = self.feed.poll_interval_secs.max(1);
        self.feed.capacity = self.feed.capacity.max(1);
        self.feed.idle_ttl_secs = self.feed.idle_ttl_secs.max(1);
        self.feed.max_sessions = self.feed.max_sessions.max(1);
        self.intel.min_items = self.intel.min_items.max(1);
        self.intel.api_base = self.intel.api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.intel.api_key.is_empty()
    }
}

/// First non-empty credential from the environment.
pub fn api_key_from_env() -> Option<String> {
    ENV_API_KEYS
        .iter()
        .filter_map(|k| env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard() {
        let cfg = PulseConfig::default();
        assert_eq!(cfg.feed.poll_interval_secs, 60);
        assert_eq!(cfg.feed.capacity, 24);
        assert_eq!(cfg.intel.min_items, 8);
        assert_eq!(cfg.feed.idle_ttl_secs, 900);
        assert_eq!(cfg.feed.max_sessions, 256);
        assert_eq!(cfg.intel.model, "gemini-3-flash-preview");
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg: PulseConfig = toml::from_str(
            r#"
[feed]
capacity = 12
"#,
        )
        .unwrap();
        assert_eq!(cfg.feed.capacity, 12);
        assert_eq!(cfg.feed.poll_interval_secs, 60);
        assert!(cfg.intel.google_search);
    }
}
