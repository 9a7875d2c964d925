//! Helper launcher: isolated and unconfined start strategies.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use fomodbox_shared::constants::timing::ISOLATED_START_ATTEMPTS;
use fomodbox_shared::errors::{FomodboxError, FomodboxResult};
use fomodbox_shared::TransportKind;
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::Child;

use super::log_stream::LogStreamHandler;
use super::outcome::{ExitCondition, classify};
use super::request::{ExitCallback, LaunchRequest};
use super::resolve::ResolveOnce;
use super::session::Session;
use super::spawn::spawn_helper;
use crate::jailer::{HelperCommand, IsolationBackend, Jailer, platform};
use crate::runtime::options::LaunchOptions;
use crate::util::is_process_alive;

type Resolution = FomodboxResult<u32>;

/// Bytes of stderr kept from a failed isolated start.
const FAILURE_STDERR_LIMIT: u64 = 4096;

/// A helper process that started successfully.
#[derive(Clone, Debug)]
pub struct LaunchedHelper {
    pid: u32,
    session: Session,
}

impl LaunchedHelper {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether the helper process still exists.
    pub fn is_alive(&self) -> bool {
        is_process_alive(self.pid)
    }
}

/// Starts installer helpers, isolated when the platform allows it.
///
/// Lifecycle events after a successful start are delivered through the
/// request's callbacks from tasks on the current tokio runtime.
pub struct HelperLauncher {
    options: LaunchOptions,
    backend: Arc<dyn IsolationBackend>,
    active_boundaries: Arc<Mutex<HashSet<String>>>,
}

impl HelperLauncher {
    /// Launcher using the current platform's isolation backend.
    pub fn new(options: LaunchOptions) -> Self {
        let backend = platform::current(&options.state_dir);
        Self {
            options,
            backend,
            active_boundaries: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Replace the isolation backend.
    pub fn with_backend(mut self, backend: Arc<dyn IsolationBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    pub fn backend(&self) -> &Arc<dyn IsolationBackend> {
        &self.backend
    }

    /// Start the helper for `request`.
    ///
    /// Returns once the helper is known to be running, or with the failure
    /// that prevented it. Exactly one of the two is produced per launch.
    pub async fn launch(&self, request: LaunchRequest) -> FomodboxResult<LaunchedHelper> {
        let LaunchRequest {
            session_id,
            use_pipe,
            boundary,
            on_exit,
            on_output,
        } = request;

        if session_id.is_empty() {
            return Err(FomodboxError::InvalidArgument(
                "session id must not be empty".to_string(),
            ));
        }

        let transport = TransportKind::select(use_pipe);
        let args = transport.build_args(&session_id);
        let mut session = Session::new(&session_id, transport, boundary.clone());

        let boundary = match boundary {
            Some(name) if self.backend.is_available() => Some(name),
            Some(name) => {
                tracing::warn!(
                    session_id = %session_id,
                    boundary = %name,
                    backend = self.backend.name(),
                    "Isolation unavailable, starting fomod installer unconfined"
                );
                None
            }
            None => None,
        };
        session.set_boundary(boundary.clone());

        let lease = match &boundary {
            Some(name) => Some(BoundaryLease::acquire(&self.active_boundaries, name)?),
            None => None,
        };

        let watch = Watch {
            session_id: session_id.clone(),
            executable: self.options.executable_path(),
            on_exit,
            on_output,
            lease,
        };

        let pid = match boundary {
            Some(name) => self.start_isolated(&name, args, watch).await?,
            None => self.start_unconfined(args, watch).await?,
        };

        tracing::info!(
            session_id = %session_id,
            pid,
            isolated = session.boundary().is_some(),
            "fomod installer started"
        );
        Ok(LaunchedHelper { pid, session })
    }

    async fn start_isolated(&self, boundary: &str, args: Vec<String>, watch: Watch) -> Resolution {
        let jailer = Jailer::new(Arc::clone(&self.backend), boundary)
            .with_executable_name(&self.options.executable_name)
            .with_fallback_root(&self.options.fallback_root);
        let dir = jailer
            .prepare(&self.options.helper_dir, &watch.session_id)
            .map_err(|e| e.into_provisioning(boundary))?;

        let helper = HelperCommand::new(&dir.executable, args, &dir.working_dir);
        tracing::debug!(
            session_id = %watch.session_id,
            boundary = %boundary,
            command = %helper.command_line(),
            "Starting fomod installer in boundary"
        );

        let mut attempt = 1;
        let (child, pid) = loop {
            match self.confirm_isolated(boundary, &helper).await {
                Ok(started) => break started,
                Err(message) if attempt < ISOLATED_START_ATTEMPTS => {
                    tracing::warn!(
                        session_id = %watch.session_id,
                        boundary = %boundary,
                        attempt,
                        error = %message,
                        "Isolated start failed, retrying"
                    );
                    tokio::time::sleep(self.options.start_retry_delay()).await;
                    attempt += 1;
                }
                Err(message) => {
                    return Err(FomodboxError::TransientStart {
                        attempts: attempt,
                        message,
                    });
                }
            }
        };

        let (resolver, rx) = ResolveOnce::new();
        resolver.resolve(Ok(pid));
        watch.spawn(child, Arc::new(resolver), self.options.output_drain_timeout());
        await_resolution(rx).await
    }

    /// One isolated start attempt.
    ///
    /// Sandbox setup errors surface as an early failing exit of the wrapper,
    /// so the helper must survive the confirm delay (or exit cleanly within
    /// it) to count as started.
    async fn confirm_isolated(
        &self,
        boundary: &str,
        helper: &HelperCommand,
    ) -> Result<(Child, u32), String> {
        let cmd = self.backend.command(boundary, helper).map_err(|e| e.to_string())?;
        let mut child = spawn_helper(cmd).map_err(|e| e.to_string())?;
        let pid = child_pid(&child).map_err(|e| e.to_string())?;

        match tokio::time::timeout(self.options.start_confirm_delay(), child.wait()).await {
            Err(_) => Ok((child, pid)),
            Ok(Ok(status)) => match classify(&ExitCondition::from(status)) {
                None => Ok((child, pid)),
                Some(err) => {
                    let stderr = read_stderr(&mut child, self.options.output_drain_timeout()).await;
                    if stderr.is_empty() {
                        Err(err.to_string())
                    } else {
                        Err(format!("{}: {}", err, stderr))
                    }
                }
            },
            Ok(Err(e)) => Err(e.to_string()),
        }
    }

    async fn start_unconfined(&self, args: Vec<String>, watch: Watch) -> Resolution {
        let executable = self.options.executable_path();
        let mut cmd = std::process::Command::new(&executable);
        cmd.args(&args).current_dir(&self.options.helper_dir);

        tracing::debug!(
            session_id = %watch.session_id,
            executable = %executable.display(),
            "Starting fomod installer unconfined"
        );

        let child = spawn_helper(cmd).map_err(|source| FomodboxError::Spawn {
            path: executable.clone(),
            source,
        })?;
        let pid = child_pid(&child)?;

        let (resolver, rx) = ResolveOnce::new();
        let resolver = Arc::new(resolver);
        watch.spawn(child, Arc::clone(&resolver), self.options.output_drain_timeout());

        let confirm_delay = self.options.start_confirm_delay();
        tokio::spawn(async move {
            tokio::time::sleep(confirm_delay).await;
            resolver.resolve(Ok(pid));
        });

        await_resolution(rx).await
    }
}

fn child_pid(child: &Child) -> FomodboxResult<u32> {
    child
        .id()
        .ok_or_else(|| FomodboxError::Internal("helper exited before its pid was read".into()))
}

/// Remaining stderr of an exited child, bounded in size and time.
async fn read_stderr(child: &mut Child, timeout: Duration) -> String {
    let Some(stderr) = child.stderr.take() else {
        return String::new();
    };
    let mut buf = Vec::new();
    let mut stderr = stderr.take(FAILURE_STDERR_LIMIT);
    let _ = tokio::time::timeout(timeout, stderr.read_to_end(&mut buf)).await;
    String::from_utf8_lossy(&buf).trim().to_string()
}

async fn await_resolution(rx: tokio::sync::oneshot::Receiver<Resolution>) -> Resolution {
    rx.await
        .map_err(|_| FomodboxError::Internal("launch was never resolved".into()))?
}

/// Observers attached to a running helper.
struct Watch {
    session_id: String,
    executable: PathBuf,
    on_exit: Option<ExitCallback>,
    on_output: Option<super::request::OutputCallback>,
    lease: Option<BoundaryLease>,
}

impl Watch {
    fn spawn(self, mut child: Child, resolver: Arc<ResolveOnce<Resolution>>, drain_timeout: Duration) {
        let streams = LogStreamHandler::new(
            child.stdout.take(),
            child.stderr.take(),
            self.on_output.clone(),
        );

        tokio::spawn(async move {
            let result = child.wait().await;
            self.finish(result, streams, &resolver, drain_timeout).await;
        });
    }

    /// Deliver the helper's exit. The boundary is released before the exit
    /// callback runs.
    async fn finish(
        self,
        result: io::Result<ExitStatus>,
        streams: LogStreamHandler,
        resolver: &ResolveOnce<Resolution>,
        drain_timeout: Duration,
    ) {
        let Watch {
            session_id,
            executable,
            on_exit,
            lease,
            ..
        } = self;

        let exit = match result {
            Ok(status) => {
                let exit = ExitCondition::from(status);
                tracing::info!(
                    session_id = %session_id,
                    code = ?exit.code,
                    signal = ?exit.signal,
                    "fomod installer exited"
                );
                if let Some(err) = classify(&exit) {
                    resolver.resolve(Err(err));
                }
                streams.shutdown(drain_timeout).await;
                exit
            }
            Err(source) => {
                tracing::error!(
                    session_id = %session_id,
                    error = %source,
                    "Failed to wait for fomod installer"
                );
                resolver.resolve(Err(FomodboxError::Spawn {
                    path: executable,
                    source,
                }));
                streams.abort();
                // code and signal are unknown
                ExitCondition::default()
            }
        };

        drop(lease);
        if let Some(on_exit) = on_exit {
            on_exit(exit);
        }
    }
}

/// Marks a boundary name as held by a live session until dropped.
struct BoundaryLease {
    name: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl BoundaryLease {
    fn acquire(active: &Arc<Mutex<HashSet<String>>>, name: &str) -> FomodboxResult<Self> {
        if !active.lock().insert(name.to_string()) {
            return Err(FomodboxError::InvalidArgument(format!(
                "boundary '{}' is already in use by a running helper",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            active: Arc::clone(active),
        })
    }
}

impl Drop for BoundaryLease {
    fn drop(&mut self) {
        self.active.lock().remove(&self.name);
    }
}
