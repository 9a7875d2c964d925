//! Shared constants between host and helper
//!
//! These constants must be identical on both sides of the host-helper boundary.

/// Helper executable constants
pub mod helper {
    /// File name of the installer helper. It carries the `.exe` suffix on
    /// every platform.
    pub const EXECUTABLE_NAME: &str = "ModInstallerIPC.exe";

    /// Directory next to the host binary that ships the helper and its
    /// assemblies.
    pub const DIST_DIR: &str = "dist";

    /// Environment variable overriding the helper directory.
    pub const HELPER_DIR_ENV: &str = "FOMODBOX_HELPER_DIR";

    /// Exit code the .NET host returns when no compatible runtime is installed.
    pub const INCOMPATIBLE_RUNTIME_EXIT_CODE: u32 = 0x8013_1700;
}

/// Transport constants
pub mod transport {
    /// Argument appended after the session id to request the duplex pipe.
    pub const PIPE_FLAG: &str = "--pipe";

    /// Suffix of the reply pipe name.
    pub const REPLY_PIPE_SUFFIX: &str = "_reply";

    /// Prefix the .NET runtime gives named pipe sockets on Unix.
    pub const UNIX_PIPE_PREFIX: &str = "CoreFxPipe_";
}

/// Isolation boundary constants
pub mod boundary {
    /// Display name given to every boundary.
    pub const DISPLAY_NAME: &str = "FOMOD";

    /// Description given to every boundary.
    pub const DESCRIPTION: &str = "Container for fomod installers";

    /// Environment variable overriding where boundary state is kept.
    pub const STATE_DIR_ENV: &str = "FOMODBOX_STATE_DIR";

    /// Environment variable overriding where fallback copies are staged.
    pub const FALLBACK_DIR_ENV: &str = "FOMODBOX_FALLBACK_DIR";
}

/// Launch timing defaults (milliseconds)
pub mod timing {
    /// Delay before a spawned helper is considered started.
    pub const START_CONFIRM_DELAY_MS: u64 = 100;

    /// Delay before the single retry of an isolated start.
    pub const START_RETRY_DELAY_MS: u64 = 1000;

    /// How long output draining may continue after the helper exited.
    pub const OUTPUT_DRAIN_TIMEOUT_MS: u64 = 1000;

    /// Number of isolated start attempts (first try plus one retry).
    pub const ISOLATED_START_ATTEMPTS: u32 = 2;
}
