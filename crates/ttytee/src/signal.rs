//! Termination signals
//!
//! SIGINT and SIGTERM only raise a flag. The handlers are installed
//! without `SA_RESTART`, so a blocked poll returns `EINTR` and the loop
//! sees the flag on its next check.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::libc;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::debug;

use crate::TeeError;

static TERMINATE: AtomicBool = AtomicBool::new(false);

extern "C" fn on_terminate(_: libc::c_int) {
    // Only async-signal-safe work here
    TERMINATE.store(true, Ordering::SeqCst);
}

/// Install the handlers and return the flag they raise.
///
/// The flag is cleared first so a previous run's signal does not stop
/// this one.
pub fn install() -> Result<&'static AtomicBool, TeeError> {
    TERMINATE.store(false, Ordering::SeqCst);

    let action = SigAction::new(
        SigHandler::Handler(on_terminate),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only stores to an atomic
        unsafe { signal::sigaction(sig, &action) }
            .map_err(|source| TeeError::Signal { signal: sig, source })?;
    }

    debug!("Termination handlers installed");
    Ok(&TERMINATE)
}

/// The flag raised by SIGINT/SIGTERM
pub fn termination_flag() -> &'static AtomicBool {
    &TERMINATE
}

pub fn termination_requested() -> bool {
    TERMINATE.load(Ordering::SeqCst)
}
