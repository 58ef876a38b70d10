// src/lib.rs
// Public library surface for the server binary, the watcher and integration tests.

pub mod access;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod feed;
pub mod intel;
pub mod metrics;
pub mod registry;
pub mod session;
pub mod telemetry;
pub mod views;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::bootstrap::{app, PulseRuntime};
pub use crate::feed::{ResultItem, SearchState, SessionSnapshot};
pub use crate::intel::{IntelClient, RequestError};
pub use crate::session::{CycleOutcome, Session, SessionError, SessionSettings};
