//! macOS isolation backend using sandbox-exec (Seatbelt).
//!
//! macOS has no namespaces, so the boundary's grants are rendered into a
//! deny-default SBPL profile and the helper is spawned through
//! `sandbox-exec -p <profile>`:
//!
//! - granted files: `file-read*` on the path (`subpath` for directories)
//! - granted pipes: read/write plus `network-outbound` on the socket path
//! - the helper executable: `process-exec`
//!
//! ## Debugging Sandbox Violations
//!
//! ```bash
//! log show --predicate 'subsystem == "com.apple.sandbox"' --last 5m
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::jailer::boundary::{BoundaryManifest, BoundaryStore};
use crate::jailer::error::IsolationError;
use crate::jailer::grant::{AccessRights, GrantTarget};
use crate::jailer::platform::{HelperCommand, IsolationBackend};

/// Hardcoded path to sandbox-exec to prevent PATH injection attacks.
pub const SANDBOX_EXEC_PATH: &str = "/usr/bin/sandbox-exec";

/// Deny-default base policy: process ops, sysctls, minimal system reads.
const SEATBELT_BASE_POLICY: &str = include_str!("seatbelt_base_policy.sbpl");

pub struct SeatbeltBackend {
    store: BoundaryStore,
}

impl SeatbeltBackend {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            store: BoundaryStore::new(state_dir),
        }
    }

    /// Render the complete profile for a boundary.
    pub fn policy(&self, boundary: &str, helper: &HelperCommand) -> Result<String, IsolationError> {
        let manifest = self.store.load(boundary)?;
        Ok(build_policy(&manifest, &helper.executable))
    }
}

impl IsolationBackend for SeatbeltBackend {
    fn name(&self) -> &'static str {
        "macOS"
    }

    fn is_available(&self) -> bool {
        Path::new(SANDBOX_EXEC_PATH).exists()
    }

    fn delete_boundary(&self, name: &str) -> Result<(), IsolationError> {
        self.store.delete(name)
    }

    fn create_boundary(
        &self,
        name: &str,
        display_name: &str,
        description: &str,
    ) -> Result<(), IsolationError> {
        self.store.create(name, display_name, description)
    }

    fn grant(
        &self,
        boundary: &str,
        target: &GrantTarget,
        rights: AccessRights,
    ) -> Result<(), IsolationError> {
        self.store.grant(boundary, target, rights)
    }

    fn command(&self, boundary: &str, helper: &HelperCommand) -> Result<Command, IsolationError> {
        let policy = self.policy(boundary, helper)?;
        tracing::debug!(boundary = %boundary, "Building sandbox-exec isolated helper command");

        let temp_dir = std::env::temp_dir();
        let mut cmd = Command::new(SANDBOX_EXEC_PATH);
        cmd.arg("-p")
            .arg(policy)
            .arg(&helper.executable)
            .args(&helper.args)
            .current_dir(&helper.working_dir)
            .env_clear()
            .env("PATH", "/usr/bin:/bin")
            .env("HOME", &temp_dir)
            .env("TMPDIR", &temp_dir);
        Ok(cmd)
    }
}

fn build_policy(manifest: &BoundaryManifest, executable: &Path) -> String {
    let mut policy = String::new();
    policy.push_str(&format!("; fomodbox boundary {}\n", manifest.name));
    policy.push_str(SEATBELT_BASE_POLICY);
    policy.push('\n');

    policy.push_str(&format!(
        "(allow process-exec (literal {}))\n",
        quote(&canonicalize_or_original(executable))
    ));

    let mut reads = String::new();
    let mut pipes = String::new();
    for grant in &manifest.grants {
        let path = canonicalize_or_original(&grant.target.path());
        match &grant.target {
            GrantTarget::File(_) if grant.rights.is_read_only() => {
                let filter = if path.is_dir() { "subpath" } else { "literal" };
                reads.push_str(&format!("    ({} {})\n", filter, quote(&path)));
            }
            _ => pipes.push_str(&format!("    (literal {})\n", quote(&path))),
        }
    }

    if !reads.is_empty() {
        policy.push_str("(allow file-read*\n");
        policy.push_str(&reads);
        policy.push_str(")\n");
    }
    if !pipes.is_empty() {
        policy.push_str("(allow file-read* file-write* network-outbound\n");
        policy.push_str(&pipes);
        policy.push_str(")\n");
    }

    policy
}

/// SBPL string literal for a path.
fn quote(path: &Path) -> String {
    let escaped = path
        .to_string_lossy()
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Resolve `/var` to `/private/var` and similar; Seatbelt matches real paths.
fn canonicalize_or_original(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
