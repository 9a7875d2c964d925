//! Jailer module: isolation boundaries for the installer helper.
//!
//! The helper runs scripts shipped inside mod archives, so it is confined to
//! a named boundary that can read its own directory and talk over its two
//! pipes, nothing else.
//!
//! # Architecture
//!
//! ```text
//! jailer/
//! ├── mod.rs          (Jailer: provisioning a boundary for one launch)
//! ├── boundary.rs     (on-disk boundary manifests)
//! ├── grant.rs        (AccessRights, GrantTarget)
//! ├── cleanup.rs      (process-exit boundary removal)
//! ├── error.rs        (IsolationError)
//! ├── bwrap.rs        (bubblewrap command builder)
//! └── platform/       (IsolationBackend trait)
//!     ├── linux/      (bubblewrap)
//!     └── macos/      (sandbox-exec/Seatbelt)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let jailer = Jailer::new(backend.clone(), "fomod_abc123")
//!     .with_fallback_root(&options.fallback_root);
//! let dir = jailer.prepare(&options.helper_dir, "abc123")?;
//! let cmd = backend.command("fomod_abc123", &HelperCommand::new(&dir.executable, args, &dir.working_dir))?;
//! ```

pub mod boundary;
mod bwrap;
pub mod cleanup;
mod error;
pub mod grant;
pub mod platform;

pub use error::IsolationError;
pub use grant::{AccessRights, GrantEntry, GrantTarget};
pub use platform::{HelperCommand, IsolationBackend, UnsupportedBackend};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use fomodbox_shared::PipeName;
use fomodbox_shared::constants::boundary::{DESCRIPTION, DISPLAY_NAME};
use fomodbox_shared::constants::helper::EXECUTABLE_NAME;
use parking_lot::Mutex;

use crate::util::fs::{copy_tree, list_dir, remove_dir_if_exists};

/// Copy locations per boundary name, removed by the boundary's exit action.
///
/// Jailers sharing a name may use different fallback roots, while only the
/// first exit action registered for the name runs.
static STAGED_COPIES: OnceLock<Mutex<BTreeMap<String, BTreeSet<PathBuf>>>> = OnceLock::new();

fn staged_copies() -> &'static Mutex<BTreeMap<String, BTreeSet<PathBuf>>> {
    STAGED_COPIES.get_or_init(|| Mutex::new(BTreeMap::new()))
}

/// Where the helper runs from once its boundary is provisioned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionedDir {
    /// Directory the helper is started in.
    pub working_dir: PathBuf,
    /// Helper executable, inside `working_dir`.
    pub executable: PathBuf,
    /// Whether the helper directory had to be staged to the fallback root.
    pub fallback_used: bool,
}

/// Provisions one named boundary for helper launches.
#[derive(Clone)]
pub struct Jailer {
    backend: Arc<dyn IsolationBackend>,
    boundary: String,
    executable_name: String,
    fallback_root: PathBuf,
}

impl Jailer {
    // ─────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────

    pub fn new(backend: Arc<dyn IsolationBackend>, boundary: impl Into<String>) -> Self {
        Self {
            backend,
            boundary: boundary.into(),
            executable_name: EXECUTABLE_NAME.to_string(),
            fallback_root: std::env::temp_dir(),
        }
    }

    pub fn with_executable_name(mut self, name: impl Into<String>) -> Self {
        self.executable_name = name.into();
        self
    }

    /// Set the directory that receives staged copies of the helper directory.
    pub fn with_fallback_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.fallback_root = root.into();
        self
    }

    // ─────────────────────────────────────────────────────────────────────
    // Getters
    // ─────────────────────────────────────────────────────────────────────

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Location of the staged copy for this boundary.
    pub fn fallback_dir(&self) -> PathBuf {
        self.fallback_root.join(&self.boundary)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Provisioning
    // ─────────────────────────────────────────────────────────────────────

    /// Recreate the boundary and grant it what the helper needs.
    ///
    /// Grants read-only access to every entry of `working_dir`. If any of
    /// those grants fails (typically another launch still holds the files),
    /// the directory is copied to [`Jailer::fallback_dir`] and the copy is
    /// granted instead. The request and reply pipes of `session_id` are
    /// granted full access either way.
    pub fn prepare(
        &self,
        working_dir: &Path,
        session_id: &str,
    ) -> Result<ProvisionedDir, IsolationError> {
        boundary::validate_name(&self.boundary)?;

        self.backend.delete_boundary(&self.boundary)?;
        self.backend
            .create_boundary(&self.boundary, DISPLAY_NAME, DESCRIPTION)?;
        self.register_cleanup();

        tracing::debug!(
            boundary = %self.boundary,
            backend = self.backend.name(),
            dir = %working_dir.display(),
            "Boundary created"
        );

        let (working_dir, fallback_used) = match self.grant_entries(working_dir) {
            Ok(()) => (working_dir.to_path_buf(), false),
            Err(e) => {
                tracing::warn!(
                    boundary = %self.boundary,
                    error = %e,
                    "Failed to grant access to helper directory, staging a copy"
                );
                (self.stage_fallback(working_dir)?, true)
            }
        };

        for pipe in PipeName::pair(session_id) {
            self.backend.grant(
                &self.boundary,
                &GrantTarget::pipe(pipe),
                AccessRights::ALL_ACCESS,
            )?;
        }

        let executable = working_dir.join(&self.executable_name);
        tracing::info!(
            boundary = %self.boundary,
            session_id = %session_id,
            fallback_used,
            "Boundary provisioned"
        );

        Ok(ProvisionedDir {
            working_dir,
            executable,
            fallback_used,
        })
    }

    fn grant_entries(&self, dir: &Path) -> Result<(), IsolationError> {
        let entries = list_dir(dir).map_err(|source| IsolationError::List {
            path: dir.to_path_buf(),
            source,
        })?;
        for entry in entries {
            self.backend
                .grant(&self.boundary, &GrantTarget::file(&entry), AccessRights::READ_ONLY)?;
        }
        Ok(())
    }

    fn stage_fallback(&self, working_dir: &Path) -> Result<PathBuf, IsolationError> {
        let copy = self.fallback_dir();
        if let Err(e) = remove_dir_if_exists(&copy) {
            tracing::warn!(
                dir = %copy.display(),
                error = %e,
                "Failed to remove stale helper copy"
            );
        }

        copy_tree(working_dir, &copy).map_err(|source| IsolationError::FallbackCopy {
            from: working_dir.to_path_buf(),
            to: copy.clone(),
            source,
        })?;

        self.backend.grant(
            &self.boundary,
            &GrantTarget::file(&copy),
            AccessRights::READ_DIRECTORY,
        )?;
        self.grant_entries(&copy)?;
        Ok(copy)
    }

    /// Remove the boundary and its staged copy when the host exits.
    fn register_cleanup(&self) {
        staged_copies()
            .lock()
            .entry(self.boundary.clone())
            .or_default()
            .insert(self.fallback_dir());

        let backend = Arc::clone(&self.backend);
        let name = self.boundary.clone();
        cleanup::register(&self.boundary, move || {
            if let Err(e) = backend.delete_boundary(&name) {
                tracing::warn!(boundary = %name, error = %e, "Failed to delete boundary");
            }
            let copies = staged_copies().lock().remove(&name).unwrap_or_default();
            for copy in copies {
                if let Err(e) = remove_dir_if_exists(&copy) {
                    tracing::warn!(dir = %copy.display(), error = %e, "Failed to remove helper copy");
                }
            }
        });
    }
}

impl std::fmt::Debug for Jailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jailer")
            .field("backend", &self.backend.name())
            .field("boundary", &self.boundary)
            .field("fallback_root", &self.fallback_root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jailer::boundary::BoundaryStore;
    use std::process::Command;
    use tempfile::TempDir;

    /// Store-backed backend that refuses grants on paths under `deny`.
    struct StoreBackend {
        store: BoundaryStore,
        deny: Option<PathBuf>,
    }

    impl IsolationBackend for StoreBackend {
        fn name(&self) -> &'static str {
            "store"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn delete_boundary(&self, name: &str) -> Result<(), IsolationError> {
            self.store.delete(name)
        }

        fn create_boundary(&self, name: &str, display: &str, desc: &str) -> Result<(), IsolationError> {
            self.store.create(name, display, desc)
        }

        fn grant(&self, boundary: &str, target: &GrantTarget, rights: AccessRights) -> Result<(), IsolationError> {
            if let (GrantTarget::File(path), Some(deny)) = (target, &self.deny) {
                if path.starts_with(deny) {
                    return Err(IsolationError::grant(
                        target.to_string(),
                        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "in use"),
                    ));
                }
            }
            self.store.grant(boundary, target, rights)
        }

        fn command(&self, _boundary: &str, helper: &HelperCommand) -> Result<Command, IsolationError> {
            Ok(Command::new(&helper.executable))
        }
    }

    fn helper_dir(temp: &TempDir) -> PathBuf {
        let dist = temp.path().join("dist");
        std::fs::create_dir_all(dist.join("lib")).unwrap();
        std::fs::write(dist.join(EXECUTABLE_NAME), b"exe").unwrap();
        std::fs::write(dist.join("lib/a.dll"), b"dll").unwrap();
        dist
    }

    #[test]
    fn test_prepare_grants_entries_and_pipes() {
        let temp = TempDir::new().unwrap();
        let dist = helper_dir(&temp);
        let store = BoundaryStore::new(temp.path().join("state"));
        let backend = Arc::new(StoreBackend { store: store.clone(), deny: None });

        let jailer = Jailer::new(backend, "jailer-test-grants")
            .with_fallback_root(temp.path().join("fallback"));
        let dir = jailer.prepare(&dist, "s1").unwrap();

        assert!(!dir.fallback_used);
        assert_eq!(dir.working_dir, dist);
        assert_eq!(dir.executable, dist.join(EXECUTABLE_NAME));

        let manifest = store.load("jailer-test-grants").unwrap();
        assert_eq!(manifest.display_name, "FOMOD");
        assert_eq!(manifest.grants.len(), 4);
        assert!(manifest.grants.contains(&GrantEntry::new(
            GrantTarget::pipe(PipeName::reply("s1")),
            AccessRights::ALL_ACCESS
        )));
        assert!(cleanup::run("jailer-test-grants"));
    }

    #[test]
    fn test_prepare_falls_back_to_copy() {
        let temp = TempDir::new().unwrap();
        let dist = helper_dir(&temp);
        let store = BoundaryStore::new(temp.path().join("state"));
        let backend = Arc::new(StoreBackend {
            store: store.clone(),
            deny: Some(dist.clone()),
        });

        let jailer = Jailer::new(backend, "jailer-test-fallback")
            .with_fallback_root(temp.path().join("fallback"));
        let dir = jailer.prepare(&dist, "s2").unwrap();

        let copy = temp.path().join("fallback/jailer-test-fallback");
        assert!(dir.fallback_used);
        assert_eq!(dir.working_dir, copy);
        assert_eq!(std::fs::read(copy.join(EXECUTABLE_NAME)).unwrap(), b"exe");

        let manifest = store.load("jailer-test-fallback").unwrap();
        assert!(manifest.grants.contains(&GrantEntry::new(
            GrantTarget::file(&copy),
            AccessRights::READ_DIRECTORY
        )));

        assert!(cleanup::run("jailer-test-fallback"));
        assert!(!copy.exists());
        assert!(!store.exists("jailer-test-fallback"));
    }

    #[test]
    fn test_cleanup_removes_copies_from_every_fallback_root() {
        let temp = TempDir::new().unwrap();
        let dist = helper_dir(&temp);
        let store = BoundaryStore::new(temp.path().join("state"));
        let backend = Arc::new(StoreBackend {
            store: store.clone(),
            deny: Some(dist.clone()),
        });

        let copies: Vec<PathBuf> = ["fallback-a", "fallback-b"]
            .iter()
            .map(|root| {
                Jailer::new(Arc::clone(&backend) as Arc<dyn IsolationBackend>, "jailer-test-roots")
                    .with_fallback_root(temp.path().join(root))
                    .prepare(&dist, "s3")
                    .unwrap()
                    .working_dir
            })
            .collect();
        assert!(copies.iter().all(|copy| copy.exists()));

        assert!(cleanup::run("jailer-test-roots"));
        assert!(copies.iter().all(|copy| !copy.exists()), "{copies:?}");
        assert!(!store.exists("jailer-test-roots"));
    }

    #[test]
    fn test_prepare_rejects_bad_name() {
        let temp = TempDir::new().unwrap();
        let backend = Arc::new(StoreBackend {
            store: BoundaryStore::new(temp.path()),
            deny: None,
        });
        let err = Jailer::new(backend, "../escape").prepare(temp.path(), "s").unwrap_err();
        assert!(matches!(err, IsolationError::InvalidName(_)));
    }
}
