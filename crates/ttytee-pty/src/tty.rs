//! The real terminal being mirrored

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::fcntl::OFlag;
use tracing::debug;

use crate::{Endpoint, PtyError, PtyResult};

/// Open the TTY at `path` as the Source endpoint.
///
/// The device is opened read-write and non-blocking, with synchronous
/// writes, and without becoming the controlling terminal of this process.
pub fn open_source(path: impl AsRef<Path>) -> PtyResult<Endpoint> {
    let path = path.as_ref();
    debug!("Opening TTY {}...", path.display());

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags((OFlag::O_NOCTTY | OFlag::O_SYNC | OFlag::O_NONBLOCK).bits())
        .open(path)
        .map_err(|source| PtyError::OpenSource {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(Endpoint::source(file, path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_tty_fails() {
        let err = open_source("/nonexistent/ttytee-tty").unwrap_err();
        assert!(matches!(err, PtyError::OpenSource { .. }));
        assert!(err.to_string().contains("/nonexistent/ttytee-tty"));
    }
}
