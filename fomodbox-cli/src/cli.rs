use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fomodbox::LaunchOptions;
use fomodbox_shared::constants::boundary::{FALLBACK_DIR_ENV, STATE_DIR_ENV};

use crate::commands::launch::LaunchArgs;

#[derive(Parser, Debug)]
#[command(name = "fomodbox", version, about = "Launch the fomod installer helper in a sandbox")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the installer helper and wait for it to exit
    Launch(LaunchArgs),
}

#[derive(Args, Debug)]
pub struct GlobalFlags {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Directory holding isolation boundary state
    #[arg(long, global = true, env = STATE_DIR_ENV)]
    pub state_dir: Option<PathBuf>,

    /// Directory receiving staged copies of the helper
    #[arg(long, global = true, env = FALLBACK_DIR_ENV)]
    pub fallback_dir: Option<PathBuf>,
}

impl GlobalFlags {
    /// Apply the global directory overrides to `options`.
    pub fn apply(&self, mut options: LaunchOptions) -> LaunchOptions {
        if let Some(dir) = &self.state_dir {
            options = options.with_state_dir(dir);
        }
        if let Some(dir) = &self.fallback_dir {
            options = options.with_fallback_root(dir);
        }
        options
    }

    pub fn log_filter(&self) -> &'static str {
        if self.debug { "debug" } else { "warn" }
    }
}
