use anyhow::{Context, Result};
use nix::fcntl::OFlag;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::pty::{grantpt, posix_openpt, unlockpt};
use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsFd, FromRawFd, IntoRawFd};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Stand-in for a serial line: a raw PTY pair whose slave plays the TTY.
///
/// The test holds the master, so bytes written here arrive as input on
/// the TTY, and whatever is written to the TTY can be read back here.
pub struct FakeTty {
    master: File,
    slave_path: PathBuf,
}

impl FakeTty {
    pub fn new() -> Result<Self> {
        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).context("posix_openpt")?;
        grantpt(&master).context("grantpt")?;
        unlockpt(&master).context("unlockpt")?;
        let slave_path = PathBuf::from(nix::pty::ptsname_r(&master).context("ptsname_r")?);

        let master = unsafe { File::from_raw_fd(master.into_raw_fd()) };

        let mut termios = tcgetattr(&master).context("tcgetattr")?;
        cfmakeraw(&mut termios);
        tcsetattr(&master, SetArg::TCSANOW, &termios).context("tcsetattr")?;

        Ok(Self { master, slave_path })
    }

    /// Device path to hand to the engine as its TTY
    pub fn path(&self) -> &Path {
        &self.slave_path
    }

    /// Emit bytes from the "device" side
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = &self.master;
        writer.write_all(bytes)?;
        Ok(())
    }

    /// Wait until `want` bytes written to the TTY have arrived
    pub fn recv(&self, want: usize, timeout: Duration) -> Vec<u8> {
        read_until(&self.master, want, timeout)
    }

    /// Collect everything written to the TTY during `window`
    pub fn recv_for(&self, window: Duration) -> Vec<u8> {
        read_for(&self.master, window)
    }
}

/// A process attached to a published PTY path
pub struct Consumer {
    file: File,
    path: PathBuf,
}

impl Consumer {
    /// Open the slave device behind `path`
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags((OFlag::O_NOCTTY | OFlag::O_NONBLOCK).bits())
            .open(path)
            .with_context(|| format!("Failed to open consumer side {}", path.display()))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = &self.file;
        writer.write_all(bytes)?;
        Ok(())
    }

    pub fn recv(&self, want: usize, timeout: Duration) -> Vec<u8> {
        read_until(&self.file, want, timeout)
    }

    pub fn recv_for(&self, window: Duration) -> Vec<u8> {
        read_for(&self.file, window)
    }

    /// Close the slave side, which hangs up the master
    pub fn disconnect(self) {
        drop(self.file);
    }
}

/// Read until at least `want` bytes arrived or `timeout` passed
pub fn read_until(file: &File, want: usize, timeout: Duration) -> Vec<u8> {
    let deadline = Instant::now() + timeout;
    let mut out = Vec::new();
    while out.len() < want && Instant::now() < deadline {
        if !read_once(file, &mut out) {
            break;
        }
    }
    out
}

/// Read whatever arrives within `window`
pub fn read_for(file: &File, window: Duration) -> Vec<u8> {
    let deadline = Instant::now() + window;
    let mut out = Vec::new();
    while Instant::now() < deadline {
        if !read_once(file, &mut out) {
            break;
        }
    }
    out
}

/// Poll briefly and append what is readable. Returns false on EOF or error.
fn read_once(file: &File, out: &mut Vec<u8>) -> bool {
    let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLIN)];
    match poll(&mut fds, PollTimeout::from(10u16)) {
        Ok(n) if n > 0 => {}
        Ok(_) | Err(nix::errno::Errno::EINTR) => return true,
        Err(_) => return false,
    }

    let readable = fds[0]
        .revents()
        .is_some_and(|r| r.contains(PollFlags::POLLIN));
    if !readable {
        // Hangup with nothing to read; don't spin
        std::thread::sleep(Duration::from_millis(10));
        return true;
    }

    let mut buf = [0u8; 1024];
    let mut reader = file;
    match reader.read(&mut buf) {
        Ok(0) => false,
        Ok(n) => {
            out.extend_from_slice(&buf[..n]);
            true
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => true,
        Err(e) if e.kind() == io::ErrorKind::Interrupted => true,
        Err(_) => false,
    }
}
