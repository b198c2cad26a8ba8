//! Engine configuration

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::TeeError;

/// Bytes buffered per direction per loop iteration
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Minimum time between two loop iterations
pub const DEFAULT_PACING_FLOOR: Duration = Duration::from_millis(10);

/// Upper bound on a single readiness wait
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Resolved settings for one tee run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeeConfig {
    /// The real terminal to mirror
    pub tty_path: PathBuf,

    /// Where to publish each PTY; order fixes each mirror's slot
    pub pty_paths: Vec<PathBuf>,

    /// Replace whatever already exists at a PTY path
    pub overwrite: bool,

    /// Capacity of each direction buffer. Bytes beyond it in one
    /// iteration are left unread until the next one, or dropped when
    /// several PTYs flood at once.
    pub buffer_size: usize,

    pub pacing_floor: Duration,

    /// Zero makes every wait return immediately
    pub poll_timeout: Duration,
}

impl TeeConfig {
    pub fn new<P: Into<PathBuf>>(
        tty_path: impl Into<PathBuf>,
        pty_paths: impl IntoIterator<Item = P>,
    ) -> Self {
        Self {
            tty_path: tty_path.into(),
            pty_paths: pty_paths.into_iter().map(Into::into).collect(),
            overwrite: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            pacing_floor: DEFAULT_PACING_FLOOR,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }

    pub fn pacing_floor(mut self, floor: Duration) -> Self {
        self.pacing_floor = floor;
        self
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Poll timeout in whole milliseconds
    pub fn poll_timeout_ms(&self) -> Result<u16, TeeError> {
        u16::try_from(self.poll_timeout.as_millis()).map_err(|_| {
            TeeError::Config(format!(
                "poll timeout {:?} exceeds {} ms",
                self.poll_timeout,
                u16::MAX
            ))
        })
    }

    pub fn validate(&self) -> Result<(), TeeError> {
        if self.pty_paths.is_empty() {
            return Err(TeeError::Config("no pty given to create".into()));
        }
        if self.buffer_size == 0 {
            return Err(TeeError::Config("buffer size must be at least 1 byte".into()));
        }
        self.poll_timeout_ms()?;

        let mut seen = HashSet::new();
        for path in &self.pty_paths {
            if path == &self.tty_path {
                return Err(TeeError::Config(format!(
                    "pty {} is the tty being mirrored",
                    path.display()
                )));
            }
            if !seen.insert(path) {
                return Err(TeeError::Config(format!(
                    "pty {} given more than once",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TeeConfig::new("/dev/ttyUSB0", ["/tmp/a"]);
        assert!(!config.overwrite);
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.pacing_floor, Duration::from_millis(10));
        assert_eq!(config.poll_timeout_ms().unwrap(), 1000);
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_no_ptys() {
        let config = TeeConfig::new("/dev/ttyUSB0", Vec::<PathBuf>::new());
        assert!(matches!(config.validate(), Err(TeeError::Config(_))));
    }

    #[test]
    fn test_rejects_duplicates() {
        let config = TeeConfig::new("/dev/ttyUSB0", ["/tmp/a", "/tmp/b", "/tmp/a"]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("/tmp/a"));
    }

    #[test]
    fn test_rejects_tty_as_pty() {
        let config = TeeConfig::new("/dev/ttyUSB0", ["/dev/ttyUSB0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_buffer_and_huge_timeout() {
        let config = TeeConfig::new("/dev/ttyUSB0", ["/tmp/a"]).buffer_size(0);
        assert!(config.validate().is_err());

        let config =
            TeeConfig::new("/dev/ttyUSB0", ["/tmp/a"]).poll_timeout(Duration::from_secs(3600));
        assert!(config.validate().is_err());
    }
}
