use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fomodbox(state: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fomodbox"));
    cmd.timeout(Duration::from_secs(30));
    cmd.env_remove("FOMODBOX_HELPER_DIR");
    cmd.arg("--state-dir").arg(state.join("state"));
    cmd.arg("--fallback-dir").arg(state.join("fallback"));
    cmd
}

#[test]
fn test_help_lists_launch() {
    let temp = TempDir::new().unwrap();
    fomodbox(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("launch"));
}

#[test]
fn test_launch_requires_session() {
    let temp = TempDir::new().unwrap();
    fomodbox(temp.path())
        .args(["launch", "--helper-dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--session"));
}

#[test]
fn test_launch_missing_helper() {
    let temp = TempDir::new().unwrap();
    fomodbox(temp.path())
        .args(["launch", "--session", "cli-missing", "--helper-dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to spawn"));
}

#[test]
fn test_launch_searches_for_custom_executable() {
    let temp = TempDir::new().unwrap();
    fomodbox(temp.path())
        .args(["launch", "--session", "cli-custom", "--executable", "custom-helper.exe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("custom-helper.exe"));
}

#[cfg(unix)]
mod unix {
    use super::*;
    use fomodbox_test_utils::HelperFixture;

    #[test]
    fn test_launch_exits_with_helper_code() {
        let fixture = HelperFixture::new("echo \"started $1\"; sleep 0.5; exit 4");
        fomodbox(fixture.root())
            .args(["launch", "--session", "cli-exit", "--helper-dir"])
            .arg(fixture.dist())
            .assert()
            .code(4)
            .stdout(predicate::str::contains("started cli-exit"));
    }

    #[test]
    fn test_launch_reports_early_failure() {
        let fixture = HelperFixture::new("exit 2");
        fomodbox(fixture.root())
            .args(["launch", "--session", "cli-fail", "--helper-dir"])
            .arg(fixture.dist())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Errorcode 2"));
    }

    #[test]
    fn test_launch_prints_pid() {
        let fixture = HelperFixture::new("sleep 0.5");
        fomodbox(fixture.root())
            .args(["launch", "--session", "cli-pid", "--pipe", "--helper-dir"])
            .arg(fixture.dist())
            .assert()
            .success()
            .stdout(predicate::str::is_match(r"(?m)^\d+$").unwrap());
    }
}
