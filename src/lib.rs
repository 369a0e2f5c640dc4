//! Heimdall - admission control and result caching for scraping actors
//!
//! Long-running scraping jobs are expensive and the upstream actor platform
//! only tolerates so many at once. Heimdall puts a [`Gate`] in front of
//! them: identical requests are served from a [`ResultCache`] without
//! touching capacity, and everything else must win one of a fixed number
//! of global slots or is turned away immediately with an advisory wait.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use heimdall::providers::HttpActorInvoker;
//! use heimdall::{AdmissionConfig, Gate, HolderId, LocalAdmission};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> heimdall::Result<()> {
//!     let gate = Gate::builder()
//!         .admission(Arc::new(LocalAdmission::spawn(AdmissionConfig::new())))
//!         .invoker(Arc::new(HttpActorInvoker::new("apify_api_token")?))
//!         .build()?;
//!
//!     let holder = HolderId::generate("session-42")?;
//!     let params = json!({"startUrls": [{"url": "https://example.com"}]});
//!
//!     match gate.run(&holder, "apify/web-scraper", &params).await {
//!         Ok(response) => println!("{} ({:?})", response.payload, response.source),
//!         Err(e) if e.is_user_visible() => println!("{e}"),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Sharing capacity across processes
//!
//! [`LocalAdmission`] counts slots for one process. When several processes
//! serve requests, run `heimdalld` once and give every gate a
//! [`RemoteAdmission`](client::RemoteAdmission) instead; the daemon is then
//! the single authority for the global count.

pub mod admission;
pub mod cache;
pub mod client;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod server;
pub mod telemetry;
pub mod types;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types at crate root
pub use admission::{
    AdmissionConfig, AdmissionControl, DEFAULT_CAPACITY, DEFAULT_STALE_AFTER, LocalAdmission,
    WaitEstimate,
};
pub use cache::{CacheBackend, CacheConfig, CacheKey, MemoryBackend, ResultCache, fingerprint};
pub use error::{HeimdallError, Result};
pub use gateway::{DEFAULT_INVOKE_TIMEOUT, Gate, GateBuilder, GateResponse, Source};
pub use providers::{ActorInvoker, UsageLedger};

// Re-export all types
pub use types::{
    AdmissionResult, AdmissionStatus, HolderId, Payload, UsageEvent, UsageOutcome,
};
