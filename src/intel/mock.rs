// src/intel/mock.rs
//! Offline clients: a deterministic mock for local runs and a scripted one for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::feed::normalize::placeholder_image_url;
use crate::feed::{Location, ResultItem};
use crate::intel::{query_fingerprint, IntelClient, RequestError};

const CITIES: [(&str, f64, f64); 6] = [
    ("Kochi, India", 9.9312, 76.2673),
    ("New Delhi, India", 28.6139, 77.2090),
    ("London, UK", 51.5072, -0.1276),
    ("New York, USA", 40.7128, -74.0060),
    ("Nairobi, Kenya", -1.2921, 36.8219),
    ("Tokyo, Japan", 35.6762, 139.6503),
];

/// Deterministic stand-in for the hosted model.
///
/// Every call returns `per_call` items; half of them overlap with the previous
/// call, so polling shows a mix of new and already-held entries.
pub struct MockClient {
    per_call: usize,
    calls: AtomicUsize,
}

impl MockClient {
    pub fn new(per_call: usize) -> Self {
        Self {
            per_call: per_call.max(1),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IntelClient for MockClient {
    async fn fetch(&self, query: &str) -> Result<Vec<ResultItem>, RequestError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let fp = query_fingerprint(query);
        let step = (self.per_call / 2).max(1);
        let start = call * step;

        let keywords: Vec<String> = query
            .split_whitespace()
            .take(2)
            .map(|w| w.to_lowercase())
            .chain(std::iter::once("live".to_string()))
            .collect();

        let items = (start..start + self.per_call)
            .rev()
            .map(|n| {
                let (city, lat, lng) = CITIES[n % CITIES.len()];
                let id = format!("mock-{fp}-{n}");
                ResultItem {
                    title: format!("{query}: update #{n}"),
                    description: format!("Mock report {n} about {query} from {city}."),
                    source: "Mock Wire".into(),
                    published_at: if n == start + self.per_call - 1 {
                        "Just now".into()
                    } else {
                        format!("{}m ago", start + self.per_call - n)
                    },
                    url: format!("https://example.com/{id}"),
                    image_url: Some(placeholder_image_url(&id)),
                    keywords: keywords.clone(),
                    location: Some(Location {
                        name: city.into(),
                        latitude: lat,
                        longitude: lng,
                    }),
                    fact_check: None,
                    is_new: false,
                    id,
                }
            })
            .collect();
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Scripted {
    Items(Vec<ResultItem>),
    /// Fails the fetch with the given HTTP status.
    Fail(u16),
}

/// Replays a queue of answers; an exhausted queue answers with zero items.
///
/// `gated()` builds a client whose fetches wait for `release()` permits, which
/// lets tests hold a fetch in flight.
#[derive(Clone, Default)]
pub struct ScriptedClient {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<String>>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedClient {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            ..Self::default()
        }
    }

    pub fn gated(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new(script)
        }
    }

    pub fn push(&self, answer: Scripted) {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .push_back(answer);
    }

    /// Let `n` gated fetches complete.
    pub fn release(&self, n: usize) {
        if let Some(g) = &self.gate {
            g.add_permits(n);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries mutex poisoned").clone()
    }
}

#[async_trait]
impl IntelClient for ScriptedClient {
    async fn fetch(&self, query: &str) -> Result<Vec<ResultItem>, RequestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .expect("queries mutex poisoned")
            .push(query.to_string());

        if let Some(g) = &self.gate {
            if let Ok(permit) = g.acquire().await {
                permit.forget();
            }
        }

        let next = self
            .script
            .lock()
            .expect("script mutex poisoned")
            .pop_front();
        match next {
            Some(Scripted::Items(items)) => Ok(items),
            Some(Scripted::Fail(status)) => Err(RequestError::Status {
                status,
                body: "scripted failure".into(),
            }),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_batches_overlap_by_half() {
        let m = MockClient::new(8);
        let a = m.fetch("Kerala rain").await.unwrap();
        let b = m.fetch("Kerala rain").await.unwrap();
        assert_eq!(a.len(), 8);
        let overlap = b.iter().filter(|x| a.iter().any(|y| y.id == x.id)).count();
        assert_eq!(overlap, 4);
        assert!(a.iter().all(|i| i.location.is_some()));
        assert_eq!(a[0].keywords, vec!["kerala", "rain", "live"]);
    }

    #[tokio::test]
    async fn scripted_replays_in_order() {
        let c = ScriptedClient::new([Scripted::Fail(500), Scripted::Items(vec![])]);
        assert!(c.fetch("q").await.is_err());
        assert!(c.fetch("q").await.unwrap().is_empty());
        assert!(c.fetch("q").await.unwrap().is_empty());
        assert_eq!(c.calls(), 3);
        assert_eq!(c.queries(), vec!["q", "q", "q"]);
    }
}
