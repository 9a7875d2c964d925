//! Translation of helper exits into launch failures.

use std::process::ExitStatus;

use fomodbox_shared::errors::FomodboxError;
use serde::{Deserialize, Serialize};

/// How the helper ended: an exit code, or the signal that killed it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitCondition {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitCondition {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signaled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitCondition {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Map an exit to the failure it represents, `None` for a clean exit.
pub fn classify(exit: &ExitCondition) -> Option<FomodboxError> {
    match (exit.code, exit.signal) {
        (Some(0), _) => None,
        (Some(code), _) if FomodboxError::is_incompatible_runtime_code(code) => {
            Some(FomodboxError::MissingRuntimeDependency)
        }
        (Some(code), _) => Some(FomodboxError::HelperProcessFailure { code }),
        (None, Some(signal)) => Some(FomodboxError::HelperProcessTerminated {
            signal: signal_name(signal),
        }),
        (None, None) => None,
    }
}

/// `SIGTERM` style name of a signal number, or the number itself.
pub fn signal_name(signal: i32) -> String {
    #[cfg(unix)]
    {
        match nix::sys::signal::Signal::try_from(signal) {
            Ok(sig) => sig.as_str().to_string(),
            Err(_) => signal.to_string(),
        }
    }

    #[cfg(not(unix))]
    {
        signal.to_string()
    }
}
