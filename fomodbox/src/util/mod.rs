pub mod fs;
mod process;

pub use process::is_process_alive;

use std::path::{Path, PathBuf};

use fomodbox_shared::constants::helper::{DIST_DIR, HELPER_DIR_ENV};
use fomodbox_shared::errors::{FomodboxError, FomodboxResult};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Find the directory that ships the installer helper.
///
/// # Arguments
/// * `executable_name` - File name of the helper (e.g., "ModInstallerIPC.exe")
///
/// # Returns
/// * `Ok(PathBuf)` - Directory containing the helper
/// * `Err(...)` - Helper not found in any expected location
pub fn find_helper_dir(executable_name: &str) -> FomodboxResult<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(dir) = std::env::var(HELPER_DIR_ENV) {
        candidates.push(PathBuf::from(dir));
    }

    if let Ok(current_exe) = std::env::current_exe()
        && let Some(exe_dir) = current_exe.parent()
    {
        candidates.push(exe_dir.join(DIST_DIR));
    }

    for candidate in &candidates {
        tracing::debug!("Looking for {:?} in {:?}", executable_name, candidate);
        if candidate.join(executable_name).exists() {
            tracing::debug!(dir = %candidate.display(), "Found helper directory");
            return Ok(candidate.clone());
        }
    }

    let locations = candidates
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(FomodboxError::Config(format!(
        "Helper '{}' not found.\nSearched locations:\n{}",
        executable_name, locations
    )))
}

pub fn register_to_tracing(non_blocking: NonBlocking, env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false),
        )
        .try_init();
}

/// Route launcher logs to a daily-rotated file in `log_dir`.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Keep the returned
/// guard alive for as long as logs should be flushed.
pub fn init_logging(log_dir: &Path) -> FomodboxResult<WorkerGuard> {
    std::fs::create_dir_all(log_dir).map_err(|e| {
        FomodboxError::Storage(format!(
            "failed to create log dir {}: {}",
            log_dir.display(),
            e
        ))
    })?;

    let appender = tracing_appender::rolling::daily(log_dir, "fomodbox.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    register_to_tracing(non_blocking, env_filter);
    Ok(guard)
}
