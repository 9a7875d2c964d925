//! Subprocess-based helper management.
//!
//! [`HelperLauncher`] starts `ModInstallerIPC.exe` either inside an isolation
//! boundary or unconfined, watches it, and reports its exit through the
//! request's callbacks.

mod launcher;
mod log_stream;
pub mod outcome;
mod request;
mod resolve;
mod session;
mod spawn;

pub use launcher::{HelperLauncher, LaunchedHelper};
pub use outcome::{ExitCondition, classify};
pub use request::{ExitCallback, LaunchRequest, OutputCallback, OutputStream};
pub use session::Session;
