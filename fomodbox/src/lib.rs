//! fomodbox - launches the fomod installer helper, sandboxed where the
//! platform allows it.
//!
//! ```ignore
//! use fomodbox::{HelperLauncher, LaunchOptions, LaunchRequest};
//!
//! let launcher = HelperLauncher::new(LaunchOptions::from_env()?);
//! let helper = launcher
//!     .launch(
//!         LaunchRequest::new("abc123")
//!             .with_pipe(true)
//!             .with_boundary("fomod_abc123")
//!             .on_exit(|exit| tracing::info!(?exit, "installer exited")),
//!     )
//!     .await?;
//! println!("helper running as pid {}", helper.pid());
//! ```

pub mod controller;
pub mod jailer;
pub mod runtime;
pub mod util;

pub use controller::{
    ExitCondition, HelperLauncher, LaunchRequest, LaunchedHelper, OutputStream, Session,
};
pub use fomodbox_shared::{FailureKind, FomodboxError, FomodboxResult, PipeName, TransportKind};
pub use jailer::{IsolationBackend, Jailer, ProvisionedDir};
pub use runtime::options::LaunchOptions;
