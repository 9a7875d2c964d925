use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use fomodbox::{ExitCondition, HelperLauncher, LaunchOptions, LaunchRequest, OutputStream};
use fomodbox_shared::constants::helper::{EXECUTABLE_NAME, HELPER_DIR_ENV};
use tokio::sync::oneshot;

#[derive(Args, Debug)]
pub struct LaunchArgs {
    /// Session id passed to the helper as its first argument
    #[arg(long)]
    pub session: String,

    /// Talk to the helper over named pipes instead of stdio
    #[arg(long)]
    pub pipe: bool,

    /// Run the helper inside this isolation boundary
    #[arg(long)]
    pub boundary: Option<String>,

    /// Directory containing the helper
    #[arg(long, env = HELPER_DIR_ENV)]
    pub helper_dir: Option<PathBuf>,

    /// File name of the helper executable
    #[arg(long, default_value = EXECUTABLE_NAME)]
    pub executable: String,

    /// Load launch options from a JSON file
    #[arg(long, conflicts_with = "helper_dir")]
    pub config: Option<PathBuf>,
}

/// Launch the helper, print its pid and return its exit code.
pub async fn execute(args: LaunchArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<i32> {
    let options = match (&args.config, &args.helper_dir) {
        (Some(path), _) => LaunchOptions::from_file(path)?,
        (None, Some(dir)) => LaunchOptions::new(dir),
        (None, None) => LaunchOptions::from_env_for_executable(&args.executable)?,
    };
    let options = global.apply(options).with_executable_name(&args.executable);
    let launcher = HelperLauncher::new(options);

    let (exit_tx, exit_rx) = oneshot::channel::<ExitCondition>();
    let mut request = LaunchRequest::new(&args.session)
        .with_pipe(args.pipe)
        .on_exit(move |exit| {
            let _ = exit_tx.send(exit);
        })
        .on_output(|stream, line| match stream {
            OutputStream::Stdout => println!("{}", line),
            OutputStream::Stderr => eprintln!("{}", line),
        });
    if let Some(boundary) = &args.boundary {
        request = request.with_boundary(boundary);
    }

    let helper = launcher.launch(request).await?;
    println!("{}", helper.pid());

    let exit = exit_rx
        .await
        .context("helper exit was never reported")?;
    tracing::info!(session_id = %args.session, ?exit, "fomod installer finished");

    Ok(exit_code(&exit))
}

/// Shell convention: the code itself, or 128 + signal.
fn exit_code(exit: &ExitCondition) -> i32 {
    match (exit.code, exit.signal) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}
