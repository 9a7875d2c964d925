//! Subprocess spawning for the installer helper.

use std::io;
use std::process::Stdio;

use tokio::process::{Child, Command};

/// Spawns a prepared command with piped stdout and stderr for controlled logging.
///
/// # Arguments
/// * `command` - Helper command line, direct or wrapped by an isolation backend
///
/// # Returns
/// * `Ok(Child)` - Successfully spawned subprocess with piped stdio
/// * `Err(...)` - Failed to spawn subprocess
pub(super) fn spawn_helper(command: std::process::Command) -> io::Result<Child> {
    let mut cmd = Command::from(command);

    // Pass RUST_LOG to subprocess if set
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        cmd.env("RUST_LOG", rust_log);
    }

    // The helper never reads the host's stdin; pipe transport has its own channel
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    cmd.spawn()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let cmd = std::process::Command::new("/definitely/not/a/helper");
        let err = spawn_helper(cmd).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_spawn_pipes_output() {
        use tokio::io::AsyncReadExt;

        let mut cmd = std::process::Command::new("/bin/sh");
        cmd.args(["-c", "echo hello"]);
        let mut child = spawn_helper(cmd).unwrap();

        let mut out = String::new();
        child.stdout.take().unwrap().read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "hello\n");
        assert!(child.wait().await.unwrap().success());
    }
}
