//! Configuration options for the helper launcher.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fomodbox_shared::constants::{boundary, helper, timing};
use fomodbox_shared::errors::{FomodboxError, FomodboxResult};
use serde::{Deserialize, Serialize};

use crate::util::find_helper_dir;

/// Options controlling where the helper lives and how it is started.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LaunchOptions {
    /// Directory containing the helper executable and its assemblies.
    ///
    /// Also the helper's working directory when it runs unconfined.
    pub helper_dir: PathBuf,

    /// File name of the helper inside `helper_dir`.
    #[serde(default = "default_executable_name")]
    pub executable_name: String,

    /// Where isolation backends keep per-boundary state.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Root under which a fallback copy of `helper_dir` is staged, one
    /// directory per boundary name.
    #[serde(default = "default_fallback_root")]
    pub fallback_root: PathBuf,

    /// Delay before an unconfined start is reported as successful.
    #[serde(default = "default_start_confirm_delay_ms")]
    pub start_confirm_delay_ms: u64,

    /// Delay before retrying a failed isolated start.
    #[serde(default = "default_start_retry_delay_ms")]
    pub start_retry_delay_ms: u64,

    /// How long output draining may continue after the helper exited.
    #[serde(default = "default_output_drain_timeout_ms")]
    pub output_drain_timeout_ms: u64,
}

impl LaunchOptions {
    /// Options for a helper shipped in `helper_dir`, everything else default.
    pub fn new(helper_dir: impl Into<PathBuf>) -> Self {
        Self {
            helper_dir: helper_dir.into(),
            executable_name: default_executable_name(),
            state_dir: default_state_dir(),
            fallback_root: default_fallback_root(),
            start_confirm_delay_ms: default_start_confirm_delay_ms(),
            start_retry_delay_ms: default_start_retry_delay_ms(),
            output_drain_timeout_ms: default_output_drain_timeout_ms(),
        }
    }

    /// Resolve options from the environment.
    ///
    /// The helper directory is located with [`find_helper_dir`];
    /// `FOMODBOX_STATE_DIR` and `FOMODBOX_FALLBACK_DIR` override the state and
    /// fallback locations.
    pub fn from_env() -> FomodboxResult<Self> {
        Self::from_env_for_executable(helper::EXECUTABLE_NAME)
    }

    /// Like [`from_env`](Self::from_env), for a helper installed under
    /// another file name.
    pub fn from_env_for_executable(executable_name: &str) -> FomodboxResult<Self> {
        let mut options =
            Self::new(find_helper_dir(executable_name)?).with_executable_name(executable_name);
        if let Ok(dir) = std::env::var(boundary::STATE_DIR_ENV) {
            options.state_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var(boundary::FALLBACK_DIR_ENV) {
            options.fallback_root = PathBuf::from(dir);
        }
        Ok(options)
    }

    /// Load options from a JSON file.
    pub fn from_file(path: &Path) -> FomodboxResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FomodboxError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            FomodboxError::Config(format!("invalid options in {}: {}", path.display(), e))
        })
    }

    pub fn with_executable_name(mut self, name: impl Into<String>) -> Self {
        self.executable_name = name.into();
        self
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    pub fn with_fallback_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_root = dir.into();
        self
    }

    pub fn with_start_confirm_delay(mut self, delay: Duration) -> Self {
        self.start_confirm_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_start_retry_delay(mut self, delay: Duration) -> Self {
        self.start_retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Full path of the helper executable.
    pub fn executable_path(&self) -> PathBuf {
        self.helper_dir.join(&self.executable_name)
    }

    pub fn start_confirm_delay(&self) -> Duration {
        Duration::from_millis(self.start_confirm_delay_ms)
    }

    pub fn start_retry_delay(&self) -> Duration {
        Duration::from_millis(self.start_retry_delay_ms)
    }

    pub fn output_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.output_drain_timeout_ms)
    }
}

fn default_executable_name() -> String {
    helper::EXECUTABLE_NAME.to_string()
}

fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("fomodbox")
        .join("boundaries")
}

fn default_fallback_root() -> PathBuf {
    std::env::temp_dir()
}

fn default_start_confirm_delay_ms() -> u64 {
    timing::START_CONFIRM_DELAY_MS
}

fn default_start_retry_delay_ms() -> u64 {
    timing::START_RETRY_DELAY_MS
}

fn default_output_drain_timeout_ms() -> u64 {
    timing::OUTPUT_DRAIN_TIMEOUT_MS
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = LaunchOptions::new("/opt/host/dist");
        assert_eq!(options.executable_name, "ModInstallerIPC.exe");
        assert_eq!(
            options.executable_path(),
            PathBuf::from("/opt/host/dist/ModInstallerIPC.exe")
        );
        assert_eq!(options.start_confirm_delay(), Duration::from_millis(100));
        assert_eq!(options.start_retry_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_from_file_applies_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("options.json");
        std::fs::write(
            &path,
            r#"{ "helper_dir": "/opt/host/dist", "start_retry_delay_ms": 250 }"#,
        )
        .unwrap();

        let options = LaunchOptions::from_file(&path).unwrap();
        assert_eq!(options.helper_dir, PathBuf::from("/opt/host/dist"));
        assert_eq!(options.start_retry_delay(), Duration::from_millis(250));
        assert_eq!(options.start_confirm_delay_ms, 100);
        assert_eq!(options.executable_name, "ModInstallerIPC.exe");
    }

    #[test]
    fn test_from_env_searches_for_named_executable() {
        let err = LaunchOptions::from_env_for_executable("fomodbox-absent-helper.exe").unwrap_err();
        assert!(matches!(err, FomodboxError::Config(_)));
        assert!(err.to_string().contains("fomodbox-absent-helper.exe"), "{err}");
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("options.json");
        std::fs::write(&path, "not json").unwrap();

        let err = LaunchOptions::from_file(&path).unwrap_err();
        assert!(matches!(err, FomodboxError::Config(_)));
    }
}
