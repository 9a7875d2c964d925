//! Backend for platforms without a supported sandbox.

use std::process::Command;

use super::{HelperCommand, IsolationBackend};
use crate::jailer::error::IsolationError;
use crate::jailer::grant::{AccessRights, GrantTarget};

/// Never available. Launches on this backend always run unconfined.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

impl IsolationBackend for UnsupportedBackend {
    fn name(&self) -> &'static str {
        "Unsupported"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn delete_boundary(&self, _name: &str) -> Result<(), IsolationError> {
        Err(IsolationError::UnsupportedPlatform)
    }

    fn create_boundary(
        &self,
        _name: &str,
        _display_name: &str,
        _description: &str,
    ) -> Result<(), IsolationError> {
        Err(IsolationError::UnsupportedPlatform)
    }

    fn grant(
        &self,
        _boundary: &str,
        _target: &GrantTarget,
        _rights: AccessRights,
    ) -> Result<(), IsolationError> {
        Err(IsolationError::UnsupportedPlatform)
    }

    fn command(&self, _boundary: &str, _helper: &HelperCommand) -> Result<Command, IsolationError> {
        Err(IsolationError::UnsupportedPlatform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_backend() {
        let backend = UnsupportedBackend;
        assert!(!backend.is_available());
        assert!(matches!(
            backend.create_boundary("b", "FOMOD", "d"),
            Err(IsolationError::UnsupportedPlatform)
        ));
    }
}
