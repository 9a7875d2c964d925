//! Test support for fomodbox: a recording isolation backend and helper
//! fixtures backed by shell scripts.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use fomodbox::jailer::boundary::BoundaryStore;
use fomodbox::jailer::{AccessRights, GrantEntry, GrantTarget, HelperCommand, IsolationBackend, IsolationError};
use fomodbox::{ExitCondition, LaunchOptions};
use fomodbox_shared::constants::helper::EXECUTABLE_NAME;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::oneshot;

/// Program used when a `command` call is told to fail; spawning it fails.
pub const MISSING_PROGRAM: &str = "/nonexistent/fomodbox-test-utils/missing-helper";

/// Message written by a command told to exit early.
pub const EARLY_EXIT_MESSAGE: &str = "sandbox setup failed";

/// One call made against [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendCall {
    Delete(String),
    Create(String),
    Grant {
        boundary: String,
        target: GrantTarget,
        rights: AccessRights,
    },
    Command(String),
}

/// Isolation backend that keeps real manifests but runs helpers directly.
///
/// Grants can be made to fail for paths under a prefix, and the first
/// `command` calls can be made to produce a command that cannot spawn or
/// one that exits with code 1 right away, like a sandbox wrapper whose
/// setup failed.
pub struct RecordingBackend {
    store: BoundaryStore,
    calls: Mutex<Vec<BackendCall>>,
    deny_grants_under: Mutex<Vec<PathBuf>>,
    failing_commands: AtomicU32,
    exiting_commands: AtomicU32,
    available: bool,
}

impl RecordingBackend {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: BoundaryStore::new(state_dir),
            calls: Mutex::new(Vec::new()),
            deny_grants_under: Mutex::new(Vec::new()),
            failing_commands: AtomicU32::new(0),
            exiting_commands: AtomicU32::new(0),
            available: true,
        }
    }

    /// Report the backend as unavailable, forcing unconfined launches.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Fail file grants on anything under `prefix`.
    pub fn deny_grants_under(self, prefix: impl Into<PathBuf>) -> Self {
        self.deny_grants_under.lock().push(prefix.into());
        self
    }

    /// Make the next `count` commands unspawnable.
    pub fn fail_commands(self, count: u32) -> Self {
        self.failing_commands.store(count, Ordering::SeqCst);
        self
    }

    /// Make the next `count` commands exit with code 1 after writing
    /// [`EARLY_EXIT_MESSAGE`] to stderr.
    pub fn exit_early(self, count: u32) -> Self {
        self.exiting_commands.store(count, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn command_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, BackendCall::Command(_)))
            .count()
    }

    /// Grants currently recorded in the boundary's manifest.
    pub fn grants(&self, boundary: &str) -> Vec<GrantEntry> {
        self.store
            .load(boundary)
            .map(|m| m.grants)
            .unwrap_or_default()
    }

    pub fn store(&self) -> &BoundaryStore {
        &self.store
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }
}

impl IsolationBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "Recording"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn delete_boundary(&self, name: &str) -> Result<(), IsolationError> {
        self.record(BackendCall::Delete(name.to_string()));
        self.store.delete(name)
    }

    fn create_boundary(
        &self,
        name: &str,
        display_name: &str,
        description: &str,
    ) -> Result<(), IsolationError> {
        self.record(BackendCall::Create(name.to_string()));
        self.store.create(name, display_name, description)
    }

    fn grant(
        &self,
        boundary: &str,
        target: &GrantTarget,
        rights: AccessRights,
    ) -> Result<(), IsolationError> {
        self.record(BackendCall::Grant {
            boundary: boundary.to_string(),
            target: target.clone(),
            rights,
        });

        if let GrantTarget::File(path) = target {
            let denied = self
                .deny_grants_under
                .lock()
                .iter()
                .any(|prefix| path.starts_with(prefix));
            if denied {
                return Err(IsolationError::grant(
                    target.to_string(),
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "file is in use"),
                ));
            }
        }
        self.store.grant(boundary, target, rights)
    }

    fn command(&self, boundary: &str, helper: &HelperCommand) -> Result<Command, IsolationError> {
        self.record(BackendCall::Command(boundary.to_string()));
        self.store.load(boundary)?;

        let mut cmd = if take_one(&self.failing_commands) {
            let mut cmd = Command::new(MISSING_PROGRAM);
            cmd.args(&helper.args);
            cmd
        } else if take_one(&self.exiting_commands) {
            let mut cmd = Command::new("/bin/sh");
            cmd.arg("-c").arg(format!("echo '{EARLY_EXIT_MESSAGE}' >&2; exit 1"));
            cmd
        } else {
            let mut cmd = Command::new(&helper.executable);
            cmd.args(&helper.args);
            cmd
        };
        cmd.current_dir(&helper.working_dir);
        Ok(cmd)
    }
}

/// Decrement `counter` if it is positive.
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// A helper directory whose executable is a `/bin/sh` script.
pub struct HelperFixture {
    temp: TempDir,
    dist: PathBuf,
}

impl HelperFixture {
    /// Create `dist/ModInstallerIPC.exe` running `body`, plus a nested library.
    pub fn new(body: &str) -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let dist = temp.path().join("dist");
        std::fs::create_dir_all(dist.join("lib")).expect("create dist");
        std::fs::write(dist.join("lib").join("Scripting.dll"), b"dll").expect("write dll");

        let fixture = Self { temp, dist };
        fixture.write_helper(body);
        fixture
    }

    /// Replace the helper script.
    pub fn write_helper(&self, body: &str) {
        let path = self.executable();
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write helper");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("chmod helper");
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn dist(&self) -> &Path {
        &self.dist
    }

    pub fn executable(&self) -> PathBuf {
        self.dist.join(EXECUTABLE_NAME)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.temp.path().join("state")
    }

    pub fn fallback_root(&self) -> PathBuf {
        self.temp.path().join("fallback")
    }

    /// Options pointing at this fixture, with short delays.
    pub fn options(&self) -> LaunchOptions {
        LaunchOptions::new(&self.dist)
            .with_state_dir(self.state_dir())
            .with_fallback_root(self.fallback_root())
            .with_start_confirm_delay(Duration::from_millis(200))
            .with_start_retry_delay(Duration::from_millis(50))
    }
}

/// Collects the exit condition delivered to a launch's exit callback.
pub struct ExitRecorder {
    rx: oneshot::Receiver<ExitCondition>,
}

impl ExitRecorder {
    /// A recorder and the callback to pass to `LaunchRequest::on_exit`.
    pub fn new() -> (Self, impl FnOnce(ExitCondition) + Send + 'static) {
        let (tx, rx) = oneshot::channel();
        let callback = move |exit: ExitCondition| {
            let _ = tx.send(exit);
        };
        (Self { rx }, callback)
    }

    /// Wait for the exit callback, failing the test after `timeout`.
    pub async fn wait(self, timeout: Duration) -> ExitCondition {
        tokio::time::timeout(timeout, self.rx)
            .await
            .expect("exit callback not called in time")
            .expect("exit callback dropped")
    }
}
