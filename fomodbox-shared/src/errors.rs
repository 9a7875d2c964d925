//! Error types shared by every fomodbox crate.
//!
//! Launch failures carry one [`FailureKind`] each. The remaining variants
//! cover misuse and environment problems that happen before a launch is
//! attempted.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::constants::helper::INCOMPATIBLE_RUNTIME_EXIT_CODE;

/// Result alias used across the workspace.
pub type FomodboxResult<T> = Result<T, FomodboxError>;

/// Classification of a failed launch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// Boundary creation or a grant failed, including after the fallback copy.
    ProvisioningFailure,
    /// The isolated start failed on the first try and on the retry.
    TransientStartFailure,
    /// The helper exited with the incompatible-runtime code.
    MissingRuntimeDependency,
    /// The helper exited non-zero for any other reason.
    HelperProcessFailure,
    /// The helper was ended by a signal.
    HelperProcessTerminated,
    /// The unconfined process could not be created.
    SpawnFailure,
}

#[derive(Debug, Error)]
pub enum FomodboxError {
    #[error("failed to provision isolation boundary '{boundary}': {message}")]
    Provisioning { boundary: String, message: String },

    #[error("fomod installer failed to start in its sandbox after {attempts} attempts: {message}")]
    TransientStart { attempts: u32, message: String },

    #[error("No compatible .Net Framework, you need .Net framework 4.6 or newer")]
    MissingRuntimeDependency,

    #[error("Failed to run fomod installer. Errorcode {}", hex_code(.code))]
    HelperProcessFailure { code: i32 },

    #[error("The fomod installer was terminated. Signal: {signal}")]
    HelperProcessTerminated { signal: String },

    #[error("Failed to spawn fomod installer at {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config: {0}")]
    Config(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl FomodboxError {
    /// Taxonomy kind of a launch failure, `None` for the non-launch variants.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Provisioning { .. } => Some(FailureKind::ProvisioningFailure),
            Self::TransientStart { .. } => Some(FailureKind::TransientStartFailure),
            Self::MissingRuntimeDependency => Some(FailureKind::MissingRuntimeDependency),
            Self::HelperProcessFailure { .. } => Some(FailureKind::HelperProcessFailure),
            Self::HelperProcessTerminated { .. } => Some(FailureKind::HelperProcessTerminated),
            Self::Spawn { .. } => Some(FailureKind::SpawnFailure),
            Self::InvalidArgument(_) | Self::Config(_) | Self::Storage(_) | Self::Internal(_) => {
                None
            }
        }
    }

    /// Whether `code` is the exit code of a helper that found no usable runtime.
    pub fn is_incompatible_runtime_code(code: i32) -> bool {
        code as u32 == INCOMPATIBLE_RUNTIME_EXIT_CODE
    }
}

/// Render an exit code the way Windows tools print HRESULTs: unsigned hex.
fn hex_code(code: &i32) -> String {
    format!("{:x}", *code as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        let err = FomodboxError::Provisioning {
            boundary: "fomod_1".into(),
            message: "denied".into(),
        };
        assert_eq!(err.kind(), Some(FailureKind::ProvisioningFailure));

        let err = FomodboxError::Spawn {
            path: PathBuf::from("/missing/ModInstallerIPC.exe"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(err.kind(), Some(FailureKind::SpawnFailure));

        assert_eq!(FomodboxError::Config("x".into()).kind(), None);
    }

    #[test]
    fn test_helper_failure_renders_hex() {
        let err = FomodboxError::HelperProcessFailure { code: 2 };
        assert_eq!(err.to_string(), "Failed to run fomod installer. Errorcode 2");

        let err = FomodboxError::HelperProcessFailure { code: 255 };
        assert!(err.to_string().ends_with("Errorcode ff"));

        let err = FomodboxError::HelperProcessFailure {
            code: 0x8013_1701_u32 as i32,
        };
        assert!(err.to_string().ends_with("Errorcode 80131701"));
    }

    #[test]
    fn test_incompatible_runtime_code() {
        assert!(FomodboxError::is_incompatible_runtime_code(
            0x8013_1700_u32 as i32
        ));
        assert!(!FomodboxError::is_incompatible_runtime_code(0x1700));
        assert!(!FomodboxError::is_incompatible_runtime_code(1));
    }

    #[test]
    fn test_missing_runtime_message_has_remediation() {
        let msg = FomodboxError::MissingRuntimeDependency.to_string();
        assert!(msg.contains("4.6 or newer"));
    }
}
