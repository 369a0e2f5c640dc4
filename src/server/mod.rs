//! Admission daemon: configuration, wire protocol and TCP service.
//!
//! `heimdalld` runs one [`LocalAdmission`](crate::LocalAdmission) and serves
//! it through [`AdmissionService`]. Request-handling processes reach it with
//! [`RemoteAdmission`](crate::client::RemoteAdmission), which gives every
//! process the same global count.

pub mod config;
pub mod protocol;
pub mod service;

pub use config::Config;
pub use protocol::{ErrorCode, Request, Response};
pub use service::AdmissionService;
