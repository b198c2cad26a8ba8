//! Single-PTY probe for exercising a mirror by hand
//!
//! Publishes one PTY, prints whatever a consumer writes into it, and
//! sends a heartbeat line once per interval.

use std::io;
use std::os::unix::io::AsFd;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{error, info, warn};
use ttytee_pty::create_mirror;
use ttytee_time::Interval;

use crate::TeeError;

pub const HEARTBEAT: &[u8] = b"pouet\n";

/// Run the probe at `path` until `stop` is raised
pub fn run_probe(path: &Path, every: Duration, stop: &AtomicBool) -> Result<(), TeeError> {
    let mut pty = create_mirror(path, true)?;
    info!("You can now open pty at {}", path.display());

    let every = Interval::from(every);
    let mut next_send = Interval::now().unwrap_or(Interval::ZERO);
    let mut buf = [0u8; 1024];

    let result = loop {
        if stop.load(Ordering::SeqCst) {
            break Ok(());
        }

        let revents = {
            let mut fds = [PollFd::new(pty.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::from(1000u16)) {
                Ok(_) | Err(Errno::EINTR) => fds[0].revents().unwrap_or(PollFlags::empty()),
                Err(e) => {
                    error!("poll failed: {}", e);
                    PollFlags::empty()
                }
            }
        };

        if revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL) {
            info!("PTY closed, reopening...");
            if let Err(e) = pty.recreate() {
                break Err(TeeError::Recreate {
                    slot: 0,
                    path: path.to_path_buf(),
                    source: e,
                });
            }
            continue;
        }

        if revents.contains(PollFlags::POLLIN) {
            match pty.read(&mut buf) {
                Ok(n) => info!("Received from pty: {}", String::from_utf8_lossy(&buf[..n])),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => error!("Could not read pty: {}", e),
            }
        }

        let now = match Interval::now() {
            Ok(now) => now,
            Err(e) => {
                warn!("Could not read the monotonic clock: {}", e);
                continue;
            }
        };
        if now.is_after(&next_send) {
            next_send = now + every;
            if let Err(e) = pty.write(HEARTBEAT) {
                warn!("Could not write heartbeat: {}", e);
            }
        }
    };

    if let Err(e) = pty.unpublish() {
        warn!("Probe pty was not removed: {}", e);
    }
    result
}
