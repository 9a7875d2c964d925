//! Platform-specific isolation backends.
//!
//! This module provides a trait-based abstraction over platform-specific
//! isolation mechanisms, so the launcher never branches on the OS.
//!
//! # Architecture
//!
//! ```text
//! IsolationBackend (trait)
//!     ├── BwrapBackend        → bubblewrap namespaces (Linux)
//!     ├── SeatbeltBackend     → sandbox-exec (macOS)
//!     └── UnsupportedBackend  → everything else, never available
//! ```

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub mod macos;

mod unsupported;

pub use unsupported::UnsupportedBackend;

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use super::error::IsolationError;
use super::grant::{AccessRights, GrantTarget};

/// Platform-agnostic isolation interface.
///
/// A boundary is created, collects grants, and is then used to wrap the
/// helper's command line. Deleting an absent boundary must succeed.
pub trait IsolationBackend: Send + Sync {
    /// Backend name for logging/debugging.
    fn name(&self) -> &'static str;

    /// Check if this backend can isolate processes on this host.
    fn is_available(&self) -> bool;

    /// Delete a boundary. Absence is not an error.
    fn delete_boundary(&self, name: &str) -> Result<(), IsolationError>;

    /// Create a boundary with no grants. Fails if it already exists.
    fn create_boundary(
        &self,
        name: &str,
        display_name: &str,
        description: &str,
    ) -> Result<(), IsolationError>;

    /// Grant `rights` on `target` to processes run in the boundary.
    fn grant(
        &self,
        boundary: &str,
        target: &GrantTarget,
        rights: AccessRights,
    ) -> Result<(), IsolationError>;

    /// Build the command that runs `helper` inside the boundary.
    fn command(&self, boundary: &str, helper: &HelperCommand) -> Result<Command, IsolationError>;
}

/// What to run inside a boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelperCommand {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl HelperCommand {
    pub fn new(executable: impl Into<PathBuf>, args: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args,
            working_dir: working_dir.into(),
        }
    }

    /// Single-line rendering for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.executable.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ============================================================================
// Current Platform
// ============================================================================

/// Get the current platform's backend, keeping boundary state in `state_dir`.
#[cfg(target_os = "linux")]
pub fn current(state_dir: &Path) -> Arc<dyn IsolationBackend> {
    Arc::new(linux::BwrapBackend::new(state_dir))
}

#[cfg(target_os = "macos")]
pub fn current(state_dir: &Path) -> Arc<dyn IsolationBackend> {
    Arc::new(macos::SeatbeltBackend::new(state_dir))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn current(_state_dir: &Path) -> Arc<dyn IsolationBackend> {
    Arc::new(UnsupportedBackend)
}
