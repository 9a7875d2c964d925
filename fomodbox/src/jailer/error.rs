//! Error types for the jailer module.
//!
//! Errors are categorized by where provisioning stopped:
//! - boundary lifecycle (create/delete, unknown or duplicate names)
//! - grants (target not accessible, manifest problems)
//! - the fallback copy of the helper directory

use std::io;
use std::path::PathBuf;

use fomodbox_shared::errors::FomodboxError;
use thiserror::Error;

/// Errors that can occur while provisioning an isolation boundary.
#[derive(Debug, Error)]
pub enum IsolationError {
    /// Boundary name is empty or contains characters outside `[A-Za-z0-9._-]`.
    #[error("invalid boundary name '{0}'")]
    InvalidName(String),

    /// Boundary already exists (create without delete).
    #[error("boundary {0} already exists")]
    AlreadyExists(String),

    /// Boundary does not exist (grant or run before create).
    #[error("boundary {0} does not exist")]
    UnknownBoundary(String),

    /// Creating or deleting the boundary state failed.
    #[error("boundary {name}: {source}")]
    Boundary {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The target of a grant could not be opened with the requested rights.
    #[error("grant on {target}: {source}")]
    Grant {
        target: String,
        #[source]
        source: io::Error,
    },

    /// The helper directory could not be listed.
    #[error("list {}: {source}", .path.display())]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Copying the helper directory to the fallback location failed.
    #[error("copy {} -> {}: {source}", .from.display(), .to.display())]
    FallbackCopy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Boundary manifest could not be read or written.
    #[error("manifest for {name}: {source}")]
    Manifest {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Platform has no isolation backend.
    #[error("isolation not supported on this platform")]
    UnsupportedPlatform,
}

impl IsolationError {
    /// Create a boundary error.
    pub fn boundary(name: impl Into<String>, source: io::Error) -> Self {
        Self::Boundary {
            name: name.into(),
            source,
        }
    }

    /// Create a grant error.
    pub fn grant(target: impl Into<String>, source: io::Error) -> Self {
        Self::Grant {
            target: target.into(),
            source,
        }
    }

    /// Convert into the launcher's provisioning failure for `boundary`.
    pub fn into_provisioning(self, boundary: &str) -> FomodboxError {
        FomodboxError::Provisioning {
            boundary: boundary.to_string(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fomodbox_shared::FailureKind;

    #[test]
    fn test_error_display() {
        let err = IsolationError::grant(
            "/opt/dist/ModInstallerIPC.exe",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(
            err.to_string(),
            "grant on /opt/dist/ModInstallerIPC.exe: denied"
        );

        let err = IsolationError::InvalidName("../x".into());
        assert!(err.to_string().contains("../x"));
    }

    #[test]
    fn test_into_provisioning() {
        let err = IsolationError::UnknownBoundary("fomod_1".into()).into_provisioning("fomod_1");
        assert_eq!(err.kind(), Some(FailureKind::ProvisioningFailure));
        assert!(err.to_string().contains("fomod_1"));
    }
}
