//! fomodbox core - shared types between the launcher, its CLI and its tests.
//!
//! This crate contains the failure taxonomy, the transport selection rules
//! and the constants both sides of the host/helper boundary agree on.

pub mod constants;
pub mod errors;
pub mod transport;

pub use errors::{FailureKind, FomodboxError, FomodboxResult};
pub use transport::{PipeName, TransportKind};
