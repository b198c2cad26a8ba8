//! ttytee: mirror one terminal device onto several pseudo-terminals
//!
//! Everything the TTY produces is copied to every PTY, and everything
//! written into any PTY is copied to the TTY. Consumers attach through
//! symlinks that keep pointing at a live PTY even after one of them
//! disconnects and its PTY is recreated.

pub mod buffer;
pub mod cli;
pub mod config;
pub mod engine;
pub mod probe;
pub mod signal;

pub use buffer::DirectionBuffer;
pub use config::TeeConfig;
pub use engine::{State, StepReport, Tee};

use std::path::PathBuf;

use nix::sys::signal::Signal;
use thiserror::Error;
use tracing::info;
use ttytee_pty::PtyError;

#[derive(Error, Debug)]
pub enum TeeError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Pty(#[from] PtyError),

    #[error("Could not install {:?} handler: {source}", .signal)]
    Signal {
        signal: Signal,
        #[source]
        source: nix::Error,
    },

    #[error("Could not recreate pty {} (slot {slot}): {source}", .path.display())]
    Recreate {
        slot: usize,
        path: PathBuf,
        #[source]
        source: PtyError,
    },
}

/// Tee `tty_path` onto `pty_paths` with default tunables until SIGINT or
/// SIGTERM arrives.
pub fn run<P: Into<PathBuf>>(
    tty_path: impl Into<PathBuf>,
    pty_paths: impl IntoIterator<Item = P>,
    overwrite: bool,
) -> Result<(), TeeError> {
    run_with_config(TeeConfig::new(tty_path, pty_paths).overwrite(overwrite))
}

/// Blocking entry point.
///
/// Returns `Ok` after a termination signal once every published PTY path
/// has been removed. Fatal errors also remove the published paths before
/// they are returned.
pub fn run_with_config(config: TeeConfig) -> Result<(), TeeError> {
    config.validate()?;
    let stop = signal::install()?;

    let mut tee = Tee::new(&config)?;
    info!(
        "Mirroring {} onto {} pty(s)",
        config.tty_path.display(),
        config.pty_paths.len()
    );

    let result = tee.run_until(stop);
    cleanup(&mut tee);
    result
}

/// Remove every still-published PTY path. Safe to call more than once.
pub fn cleanup(tee: &mut Tee) {
    let failed = tee.cleanup();
    if failed > 0 {
        tracing::warn!("{} pty path(s) could not be removed", failed);
    }
    info!("Exiting.");
}
