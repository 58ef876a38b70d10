// src/intel/gemini.rs
//! Gemini `generateContent` client with structured JSON output.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::IntelConfig;
use crate::feed::ResultItem;
use crate::intel::parse::parse_items;
use crate::intel::prompt::{build_prompt, response_schema};
use crate::intel::{query_fingerprint, IntelClient, RequestError};

pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    min_items: u32,
    google_search: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate; empty when there is none.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl GeminiClient {
    pub fn from_config(cfg: &IntelConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pulse-portal/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            min_items: cfg.min_items,
            google_search: cfg.google_search,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }

    async fn generate(&self, query: &str) -> Result<String, RequestError> {
        if self.api_key.is_empty() {
            return Err(RequestError::MissingKey);
        }

        let prompt = build_prompt(query, Utc::now(), self.min_items);
        let req = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: &prompt }],
            }],
            tools: if self.google_search {
                vec![serde_json::json!({ "google_search": {} })]
            } else {
                Vec::new()
            },
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        };

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RequestError::Status {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| RequestError::Envelope(e.to_string()))?;
        Ok(body.text())
    }
}

#[async_trait]
impl IntelClient for GeminiClient {
    async fn fetch(&self, query: &str) -> Result<Vec<ResultItem>, RequestError> {
        let t0 = Instant::now();
        let text = self.generate(query).await;
        histogram!("pulse_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let text = text.inspect_err(|e| {
            tracing::warn!(
                error = %e,
                query = %query_fingerprint(query),
                model = %self.model,
                "gemini fetch failed"
            );
        })?;

        let batch = parse_items(&text);
        if batch.degraded {
            counter!("pulse_parse_degraded_total").increment(1);
        }
        if batch.rejected > 0 {
            counter!("pulse_items_rejected_total").increment(batch.rejected as u64);
        }
        tracing::debug!(
            query = %query_fingerprint(query),
            items = batch.items.len(),
            rejected = batch.rejected,
            degraded = batch.degraded,
            "gemini fetch done"
        );
        Ok(batch.items)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
