//! External collaborators: the actor invoker and the usage ledger.
//!
//! The traits live in [`traits`]. [`HttpActorInvoker`] talks to an
//! Apify-style actor API over HTTP; the ledgers in [`ledger`] cover logging
//! and no-op metering.

pub mod ledger;
pub mod traits;

#[cfg(feature = "http-invoker")]
pub mod http;

pub use ledger::{NoopLedger, TracingLedger};
pub use traits::{ActorInvoker, UsageLedger};

#[cfg(feature = "http-invoker")]
pub use http::HttpActorInvoker;
