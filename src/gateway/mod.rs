//! Gate implementation and its builder

mod builder;
mod gate;
mod lease;

pub use builder::{DEFAULT_INVOKE_TIMEOUT, GateBuilder};
pub use gate::{Gate, GateResponse, Source};
