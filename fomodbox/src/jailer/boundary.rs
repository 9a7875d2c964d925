//! On-disk state of isolation boundaries.
//!
//! Backends that wrap the helper at spawn time (bubblewrap, Seatbelt) have no
//! OS object to hold grants, so each boundary is a directory under the state
//! root with a `manifest.json` listing its grants:
//!
//! ```text
//! {state_dir}/
//! └── {boundary name}/
//!     └── manifest.json
//! ```

use std::fs::File;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::IsolationError;
use super::grant::{AccessRights, GrantEntry, GrantTarget};

const MANIFEST_FILE: &str = "manifest.json";

/// Validate a boundary name.
///
/// Names become directory names (state, fallback copy), so only
/// `[A-Za-z0-9._-]` is accepted and `.`/`..` are rejected.
pub fn validate_name(name: &str) -> Result<(), IsolationError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(IsolationError::InvalidName(name.to_string()))
    }
}

/// Persistent description of one boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryManifest {
    pub name: String,
    pub display_name: String,
    pub description: String,
    #[serde(default)]
    pub grants: Vec<GrantEntry>,
}

impl BoundaryManifest {
    /// Add a grant, merging rights when the target is already present.
    pub fn add_grant(&mut self, target: GrantTarget, rights: AccessRights) {
        if let Some(entry) = self.grants.iter_mut().find(|g| g.target == target) {
            entry.rights |= rights;
        } else {
            self.grants.push(GrantEntry::new(target, rights));
        }
    }
}

/// Directory-backed store of boundary manifests.
#[derive(Clone, Debug)]
pub struct BoundaryStore {
    root: PathBuf,
}

impl BoundaryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.dir(name).join(MANIFEST_FILE).exists()
    }

    /// Delete a boundary. A missing boundary is not an error.
    pub fn delete(&self, name: &str) -> Result<(), IsolationError> {
        validate_name(name)?;
        crate::util::fs::remove_dir_if_exists(&self.dir(name))
            .map_err(|e| IsolationError::boundary(name, e))
    }

    /// Create a boundary with no grants.
    pub fn create(
        &self,
        name: &str,
        display_name: &str,
        description: &str,
    ) -> Result<(), IsolationError> {
        validate_name(name)?;
        if self.exists(name) {
            return Err(IsolationError::AlreadyExists(name.to_string()));
        }

        std::fs::create_dir_all(self.dir(name)).map_err(|e| IsolationError::boundary(name, e))?;
        self.save(&BoundaryManifest {
            name: name.to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            grants: Vec::new(),
        })
    }

    pub fn load(&self, name: &str) -> Result<BoundaryManifest, IsolationError> {
        validate_name(name)?;
        let path = self.dir(name).join(MANIFEST_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(IsolationError::UnknownBoundary(name.to_string()));
            }
            Err(e) => return Err(IsolationError::boundary(name, e)),
        };
        serde_json::from_str(&content).map_err(|source| IsolationError::Manifest {
            name: name.to_string(),
            source,
        })
    }

    /// Write the manifest through a temp file so readers never see half of it.
    fn save(&self, manifest: &BoundaryManifest) -> Result<(), IsolationError> {
        let name = manifest.name.as_str();
        let json = serde_json::to_vec_pretty(manifest).map_err(|source| {
            IsolationError::Manifest {
                name: name.to_string(),
                source,
            }
        })?;

        let dir = self.dir(name);
        let tmp = dir.join(format!("{MANIFEST_FILE}.tmp"));
        std::fs::write(&tmp, json).map_err(|e| IsolationError::boundary(name, e))?;
        std::fs::rename(&tmp, dir.join(MANIFEST_FILE)).map_err(|e| IsolationError::boundary(name, e))
    }

    /// Record a grant after checking the target can be opened.
    pub fn grant(
        &self,
        name: &str,
        target: &GrantTarget,
        rights: AccessRights,
    ) -> Result<(), IsolationError> {
        let mut manifest = self.load(name)?;
        if let GrantTarget::File(path) = target {
            check_readable(path).map_err(|e| IsolationError::grant(target.to_string(), e))?;
        }
        manifest.add_grant(target.clone(), rights);
        self.save(&manifest)
    }
}

/// Open a file for reading, or list a directory, to prove the sandbox can.
///
/// Fails the same way the helper would if the file is locked or unreadable.
fn check_readable(path: &Path) -> io::Result<()> {
    if std::fs::metadata(path)?.is_dir() {
        std::fs::read_dir(path).map(|_| ())
    } else {
        File::open(path).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fomodbox_shared::PipeName;
    use tempfile::TempDir;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("fomod_abc-123.v2").is_ok());
        for bad in ["", ".", "..", "a/b", r"a\b", "with space"] {
            assert!(validate_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_create_twice_without_delete_fails() {
        let temp = TempDir::new().unwrap();
        let store = BoundaryStore::new(temp.path());

        store.create("b1", "FOMOD", "desc").unwrap();
        let err = store.create("b1", "FOMOD", "desc").unwrap_err();
        assert!(matches!(err, IsolationError::AlreadyExists(_)));

        store.delete("b1").unwrap();
        store.create("b1", "FOMOD", "desc").unwrap();
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let temp = TempDir::new().unwrap();
        let store = BoundaryStore::new(temp.path());
        assert!(store.delete("never-created").is_ok());
    }

    #[test]
    fn test_grant_merges_rights() {
        let temp = TempDir::new().unwrap();
        let store = BoundaryStore::new(temp.path().join("state"));
        let file = temp.path().join("helper.dll");
        std::fs::write(&file, b"x").unwrap();

        store.create("b1", "FOMOD", "desc").unwrap();
        store
            .grant("b1", &GrantTarget::file(&file), AccessRights::GENERIC_READ)
            .unwrap();
        store
            .grant("b1", &GrantTarget::file(&file), AccessRights::READ_ATTRIBUTES)
            .unwrap();

        let manifest = store.load("b1").unwrap();
        assert_eq!(manifest.grants.len(), 1);
        assert_eq!(
            manifest.grants[0].rights,
            AccessRights::GENERIC_READ | AccessRights::READ_ATTRIBUTES
        );
    }

    #[test]
    fn test_grant_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let store = BoundaryStore::new(temp.path());
        store.create("b1", "FOMOD", "desc").unwrap();

        let err = store
            .grant(
                "b1",
                &GrantTarget::file(temp.path().join("missing.exe")),
                AccessRights::READ_ONLY,
            )
            .unwrap_err();
        assert!(matches!(err, IsolationError::Grant { .. }));
    }

    #[test]
    fn test_grant_pipe_needs_no_endpoint() {
        let temp = TempDir::new().unwrap();
        let store = BoundaryStore::new(temp.path());
        store.create("b1", "FOMOD", "desc").unwrap();

        store
            .grant(
                "b1",
                &GrantTarget::pipe(PipeName::request("session-without-pipe")),
                AccessRights::ALL_ACCESS,
            )
            .unwrap();
    }

    #[test]
    fn test_grant_unknown_boundary() {
        let temp = TempDir::new().unwrap();
        let store = BoundaryStore::new(temp.path());
        let err = store
            .grant(
                "nope",
                &GrantTarget::pipe(PipeName::request("s")),
                AccessRights::ALL_ACCESS,
            )
            .unwrap_err();
        assert!(matches!(err, IsolationError::UnknownBoundary(_)));
    }
}
