//! Linux isolation backend built on bubblewrap.
//!
//! The boundary is a manifest of grants. Running the helper creates a new
//! user/mount/pid/ipc/uts/net namespace set whose root holds only:
//! - system library directories (read-only)
//! - a private `/dev`, `/proc` and `/tmp`
//! - every granted file (read-only) and pipe socket (read-write)

use std::path::Path;
use std::process::Command;

use crate::jailer::boundary::BoundaryStore;
use crate::jailer::bwrap::{self, BwrapCommand};
use crate::jailer::error::IsolationError;
use crate::jailer::grant::{AccessRights, GrantTarget};
use crate::jailer::platform::{HelperCommand, IsolationBackend};

/// System directories the helper's runtime loads from.
const SYSTEM_DIRS: &[&str] = &["/usr", "/lib", "/lib64", "/bin", "/sbin"];

pub struct BwrapBackend {
    store: BoundaryStore,
}

impl BwrapBackend {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            store: BoundaryStore::new(state_dir),
        }
    }

    /// Bubblewrap arguments for a boundary, without the helper itself.
    pub fn sandbox(&self, boundary: &str, helper: &HelperCommand) -> Result<BwrapCommand, IsolationError> {
        let manifest = self.store.load(boundary)?;

        let mut cmd = BwrapCommand::new()
            .with_all_namespaces()
            .with_die_with_parent()
            .with_new_session();
        for dir in SYSTEM_DIRS {
            cmd = cmd.ro_bind_if_exists(dir, dir);
        }
        cmd = cmd.with_dev().with_proc().tmpfs("/tmp");

        for grant in &manifest.grants {
            let path = grant.target.path();
            cmd = match (&grant.target, grant.rights.is_read_only()) {
                (GrantTarget::File(_), true) => cmd.ro_bind(&path, &path),
                _ => cmd.bind_try(&path, &path),
            };
        }

        let temp_dir = std::env::temp_dir();
        Ok(cmd
            .with_clearenv()
            .setenv("PATH", "/usr/bin:/bin")
            .setenv("HOME", temp_dir.to_string_lossy())
            .setenv("TMPDIR", temp_dir.to_string_lossy())
            .chdir(&helper.working_dir))
    }
}

impl IsolationBackend for BwrapBackend {
    fn name(&self) -> &'static str {
        "Linux"
    }

    fn is_available(&self) -> bool {
        bwrap::is_available()
    }

    fn delete_boundary(&self, name: &str) -> Result<(), IsolationError> {
        self.store.delete(name)
    }

    fn create_boundary(
        &self,
        name: &str,
        display_name: &str,
        description: &str,
    ) -> Result<(), IsolationError> {
        self.store.create(name, display_name, description)
    }

    fn grant(
        &self,
        boundary: &str,
        target: &GrantTarget,
        rights: AccessRights,
    ) -> Result<(), IsolationError> {
        self.store.grant(boundary, target, rights)
    }

    fn command(&self, boundary: &str, helper: &HelperCommand) -> Result<Command, IsolationError> {
        let sandbox = self.sandbox(boundary, helper)?;
        tracing::debug!(
            boundary = %boundary,
            bwrap_args = sandbox.args().len(),
            "Building bwrap-isolated helper command"
        );
        let mut cmd = sandbox.build(&helper.executable, &helper.args);
        cmd.current_dir(&helper.working_dir);
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fomodbox_shared::PipeName;
    use tempfile::TempDir;

    fn backend_with_helper() -> (TempDir, BwrapBackend, HelperCommand) {
        let temp = TempDir::new().unwrap();
        let dist = temp.path().join("dist");
        std::fs::create_dir_all(&dist).unwrap();
        std::fs::write(dist.join("ModInstallerIPC.exe"), b"exe").unwrap();

        let backend = BwrapBackend::new(&temp.path().join("state"));
        let helper = HelperCommand::new(
            dist.join("ModInstallerIPC.exe"),
            vec!["s1".into(), "--pipe".into()],
            &dist,
        );
        (temp, backend, helper)
    }

    #[test]
    fn test_grants_become_binds() {
        let (_temp, backend, helper) = backend_with_helper();
        backend.create_boundary("b1", "FOMOD", "desc").unwrap();
        backend
            .grant("b1", &GrantTarget::file(&helper.executable), AccessRights::READ_ONLY)
            .unwrap();
        backend
            .grant(
                "b1",
                &GrantTarget::pipe(PipeName::request("s1")),
                AccessRights::ALL_ACCESS,
            )
            .unwrap();

        let sandbox = backend.sandbox("b1", &helper).unwrap();
        let args = sandbox.args().join(" ");
        let exe = helper.executable.display().to_string();
        assert!(args.contains(&format!("--ro-bind {exe} {exe}")));

        let pipe = PipeName::request("s1").endpoint_path().display().to_string();
        assert!(args.contains(&format!("--bind-try {pipe} {pipe}")));
        assert!(args.contains("--unshare-net"));
        assert!(args.contains("--clearenv"));
    }

    #[test]
    fn test_command_wraps_helper() {
        let (_temp, backend, helper) = backend_with_helper();
        backend.create_boundary("b1", "FOMOD", "desc").unwrap();

        let cmd = backend.command("b1", &helper).unwrap();
        assert_eq!(cmd.get_program(), "bwrap");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        let separator = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(
            &args[separator + 1..],
            [helper.executable.display().to_string(), "s1".into(), "--pipe".into()]
        );
    }

    #[test]
    fn test_command_unknown_boundary() {
        let (_temp, backend, helper) = backend_with_helper();
        assert!(matches!(
            backend.command("missing", &helper),
            Err(IsolationError::UnknownBoundary(_))
        ));
    }
}
