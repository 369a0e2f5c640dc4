//! Client library for connecting to heimdalld.
//!
//! Provides [`RemoteAdmission`], which implements
//! [`AdmissionControl`](crate::AdmissionControl) by forwarding calls to a
//! remote heimdalld instance over the line protocol in
//! [`server::protocol`](crate::server::protocol).

mod remote;

pub use remote::{DEFAULT_IO_TIMEOUT, RemoteAdmission};
