//! Access grants recorded against an isolation boundary.

use std::path::{Path, PathBuf};

use bitflags::bitflags;
use fomodbox_shared::PipeName;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Rights a boundary holds on one resource.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct AccessRights: u8 {
        const GENERIC_READ = 1 << 0;
        const READ_EXTENDED_ATTRIBUTES = 1 << 1;
        const READ_ATTRIBUTES = 1 << 2;
        const LIST_DIRECTORY = 1 << 3;
        const ALL_ACCESS = 1 << 4;
    }
}

impl AccessRights {
    /// Rights given to every helper file.
    pub const READ_ONLY: Self = Self::GENERIC_READ
        .union(Self::READ_EXTENDED_ATTRIBUTES)
        .union(Self::READ_ATTRIBUTES);

    /// Rights given to a staged helper directory.
    pub const READ_DIRECTORY: Self = Self::READ_ONLY.union(Self::LIST_DIRECTORY);

    /// Whether these rights only allow reading.
    pub fn is_read_only(self) -> bool {
        !self.contains(Self::ALL_ACCESS)
    }
}

/// Resource a grant applies to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum GrantTarget {
    /// File or directory.
    File(PathBuf),
    /// Named pipe endpoint.
    NamedPipe(PipeName),
}

impl GrantTarget {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    pub fn pipe(name: PipeName) -> Self {
        Self::NamedPipe(name)
    }

    /// Path of the resource as seen by the sandbox.
    pub fn path(&self) -> PathBuf {
        match self {
            Self::File(path) => path.clone(),
            Self::NamedPipe(name) => name.endpoint_path(),
        }
    }
}

impl std::fmt::Display for GrantTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::NamedPipe(name) => write!(f, "pipe {}", name),
        }
    }
}

/// One (target, rights) pair of a boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantEntry {
    pub target: GrantTarget,
    pub rights: AccessRights,
}

impl GrantEntry {
    pub fn new(target: GrantTarget, rights: AccessRights) -> Self {
        Self { target, rights }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_subset() {
        assert!(AccessRights::READ_ONLY.is_read_only());
        assert!(AccessRights::READ_DIRECTORY.contains(AccessRights::LIST_DIRECTORY));
        assert!(!AccessRights::READ_ONLY.contains(AccessRights::LIST_DIRECTORY));
        assert!(!AccessRights::ALL_ACCESS.is_read_only());
    }

    #[test]
    fn test_entry_serde() {
        let entry = GrantEntry::new(GrantTarget::pipe(PipeName::reply("s1")), AccessRights::ALL_ACCESS);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("named_pipe"));
        assert!(json.contains("s1_reply"));
        let back: GrantEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
