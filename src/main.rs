mod cli;

use hg_av::FfmpegLauncher;
use hg_core::SupervisorSettings;
use hlsgrab::{interrupt, session::SessionController};

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn capture(config: hg_core::CaptureConfig, settings: SupervisorSettings) -> Result<()> {
    let (handle, interrupts) = interrupt::channel();
    let cancel = CancellationToken::new();
    let signals = interrupt::forward_os_signals(handle, cancel.clone());

    tracing::info!("Press Ctrl+C to stop recording");

    let mut controller =
        SessionController::new(Arc::new(config), settings, FfmpegLauncher::new(), interrupts);
    let result = controller.run().await;

    cancel.cancel();
    let _ = signals.await;

    let summary = result?;
    tracing::debug!(
        "Session {} after {:?}",
        summary.stop,
        controller.history()
    );
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.capture_config()?;
    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }

    let mut settings = SupervisorSettings::load(cli.config.as_deref())?;
    if let Some(secs) = cli.stop_timeout {
        settings.stop_timeout = Duration::from_secs(secs);
    }
    settings.validate()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(capture(config, settings))
}

/// Map an error to the process exit code of the first [`hg_core::Error`] in
/// its chain.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|e| e.downcast_ref::<hg_core::Error>())
        .map(hg_core::Error::exit_code)
        .unwrap_or(hg_core::error::EXIT_INTERNAL)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "hlsgrab=debug,hg_av=debug,hg_core=debug".to_string()
        } else {
            "hlsgrab=info,hg_av=info,hg_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(exit_code(&e) as u8)
        }
    }
}
