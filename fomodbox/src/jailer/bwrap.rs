//! Bubblewrap (bwrap) command builder for Linux isolation.
//!
//! ## What Bubblewrap Provides
//!
//! - Namespace isolation (user, mount, pid, ipc, uts, net)
//! - A fresh root containing only what is bound into it
//! - Environment sanitization (--clearenv)
//! - Die-with-parent behavior

// Allow dead_code on non-Linux platforms where bwrap is not available
#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

/// Check if bubblewrap (bwrap) can create a sandbox on this system.
///
/// A present binary is not enough: user namespaces may be disabled or
/// blocked by an LSM, so the check builds a minimal sandbox and runs `true`
/// in it. The check runs once per process.
pub fn is_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        let usable = Command::new("bwrap")
            .args(sandbox_check_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);
        if !usable {
            tracing::debug!("bwrap cannot create a sandbox here");
        }
        usable
    })
}

/// Arguments of the availability check.
fn sandbox_check_args() -> Vec<String> {
    BwrapCommand::new()
        .with_all_namespaces()
        .with_die_with_parent()
        .ro_bind("/", "/")
        .args()
        .iter()
        .cloned()
        .chain(["--".to_string(), "true".to_string()])
        .collect()
}

/// Builder for constructing bwrap command arguments.
#[derive(Debug, Clone, Default)]
pub struct BwrapCommand {
    args: Vec<String>,
}

impl BwrapCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Isolate every namespace, network included.
    ///
    /// The helper only talks to the host through pipe sockets bound into
    /// the sandbox, which work across network namespaces. bwrap always
    /// creates a mount namespace and has no flag for it.
    pub fn with_all_namespaces(mut self) -> Self {
        self.args.push("--unshare-user".to_string());
        self.args.push("--unshare-cgroup-try".to_string());
        self.args.push("--unshare-pid".to_string());
        self.args.push("--unshare-ipc".to_string());
        self.args.push("--unshare-uts".to_string());
        self.args.push("--unshare-net".to_string());
        self
    }

    /// Enable die-with-parent behavior (helper dies when the host dies).
    pub fn with_die_with_parent(mut self) -> Self {
        self.args.push("--die-with-parent".to_string());
        self
    }

    /// Add a new session to prevent terminal injection attacks.
    pub fn with_new_session(mut self) -> Self {
        self.args.push("--new-session".to_string());
        self
    }

    /// Add read-only bind mount.
    pub fn ro_bind(self, src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Self {
        self.mount("--ro-bind", src, dest)
    }

    /// Add read-only bind mount if source exists.
    pub fn ro_bind_if_exists(self, src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Self {
        if src.as_ref().exists() {
            self.ro_bind(src, dest)
        } else {
            self
        }
    }

    /// Add read-write bind mount, skipped by bwrap if the source is missing.
    ///
    /// Used for pipe sockets, which the host may create after the grant.
    pub fn bind_try(self, src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Self {
        self.mount("--bind-try", src, dest)
    }

    fn mount(mut self, flag: &str, src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Self {
        self.args.push(flag.to_string());
        self.args.push(src.as_ref().to_string_lossy().to_string());
        self.args.push(dest.as_ref().to_string_lossy().to_string());
        self
    }

    /// Mount /dev with default devices.
    pub fn with_dev(mut self) -> Self {
        self.args.push("--dev".to_string());
        self.args.push("/dev".to_string());
        self
    }

    /// Mount /proc.
    pub fn with_proc(mut self) -> Self {
        self.args.push("--proc".to_string());
        self.args.push("/proc".to_string());
        self
    }

    /// Mount tmpfs at path.
    pub fn tmpfs(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push("--tmpfs".to_string());
        self.args.push(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Clear all environment variables.
    pub fn with_clearenv(mut self) -> Self {
        self.args.push("--clearenv".to_string());
        self
    }

    /// Set an environment variable.
    pub fn setenv(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push("--setenv".to_string());
        self.args.push(key.into());
        self.args.push(value.into());
        self
    }

    /// Set the working directory inside the sandbox.
    pub fn chdir(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push("--chdir".to_string());
        self.args.push(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Build the command with the specified executable and arguments.
    pub fn build(self, executable: impl AsRef<Path>, args: &[String]) -> Command {
        let mut cmd = Command::new("bwrap");
        cmd.args(&self.args);
        cmd.arg("--");
        cmd.arg(executable.as_ref());
        cmd.args(args);
        cmd
    }

    /// Get the arguments as a vector (for testing/debugging).
    pub fn args(&self) -> &[String] {
        &self.args
    }
}
