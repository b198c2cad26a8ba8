//! PTY allocation and symlink publication
//!
//! Each mirror is a PTY master held by this process. Its slave side is
//! exposed to consumers through a symlink at a caller-chosen path.

use std::fs::{self, File};
use std::os::unix::fs::symlink;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd};
use std::path::{Path, PathBuf};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::pty::{grantpt, posix_openpt, unlockpt, PtyMaster};
use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg};
use tracing::{debug, error, info};

use crate::{Endpoint, PtyError, PtyResult};

/// Create a PTY and publish its slave at `path`.
///
/// An existing entry at `path` (file or symlink, dangling or not) is
/// removed first when `overwrite` is set; otherwise its presence is an
/// error.
pub fn create_mirror(path: impl AsRef<Path>, overwrite: bool) -> PtyResult<Endpoint> {
    let path = path.as_ref();
    let (file, slave) = publish(path, overwrite)?;
    Ok(Endpoint::mirror(file, path.to_path_buf(), slave))
}

/// Delete the symlink published at `path`.
///
/// Failure is logged and returned; callers doing shutdown keep going.
pub fn remove_mirror(path: impl AsRef<Path>) -> PtyResult<()> {
    let path = path.as_ref();
    debug!("Removing PTY {}...", path.display());
    fs::remove_file(path).map_err(|source| {
        let err = PtyError::Remove {
            path: path.to_path_buf(),
            source,
        };
        error!("{}", err);
        err
    })
}

/// Allocate a raw-mode PTY master and link `path` to its slave.
///
/// Returns the master and the kernel-assigned slave device name.
pub(crate) fn publish(path: &Path, overwrite: bool) -> PtyResult<(File, PathBuf)> {
    clear_path(path, overwrite)?;

    debug!("Creating PTY {}...", path.display());

    let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(|source| {
        PtyError::OpenMaster {
            path: path.to_path_buf(),
            source,
        }
    })?;

    grantpt(&master).map_err(|source| PtyError::Grant {
        path: path.to_path_buf(),
        source,
    })?;
    unlockpt(&master).map_err(|source| PtyError::Unlock {
        path: path.to_path_buf(),
        source,
    })?;

    let slave = slave_name(&master).map_err(|source| PtyError::SlaveName {
        path: path.to_path_buf(),
        source,
    })?;

    // SAFETY: into_raw_fd hands over sole ownership of the open master
    let file = unsafe { File::from_raw_fd(master.into_raw_fd()) };

    set_nonblocking(&file).map_err(|source| PtyError::OpenMaster {
        path: path.to_path_buf(),
        source,
    })?;
    make_raw(&file, path)?;

    symlink(&slave, path).map_err(|source| PtyError::Symlink {
        path: path.to_path_buf(),
        source,
    })?;

    info!("PTY {} -> {}", path.display(), slave.display());
    Ok((file, slave))
}

/// Make room for the symlink at `path`
fn clear_path(path: &Path, overwrite: bool) -> PtyResult<()> {
    // symlink_metadata does not follow, so dangling links count as present
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }
    if !overwrite {
        return Err(PtyError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }

    debug!("Wiping existing file for PTY {}...", path.display());
    fs::remove_file(path).map_err(|source| PtyError::RemoveExisting {
        path: path.to_path_buf(),
        source,
    })
}

fn set_nonblocking(file: &File) -> nix::Result<()> {
    let fd = file.as_raw_fd();
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// Pass bytes through unmodified: no echo, no line editing, no signals
fn make_raw(file: &File, path: &Path) -> PtyResult<()> {
    let mut termios = tcgetattr(file).map_err(|source| PtyError::GetAttributes {
        path: path.to_path_buf(),
        source,
    })?;

    termios.local_flags.remove(
        LocalFlags::ECHO
            | LocalFlags::ECHONL
            | LocalFlags::ICANON
            | LocalFlags::ISIG
            | LocalFlags::IEXTEN,
    );

    tcsetattr(file, SetArg::TCSANOW, &termios).map_err(|source| PtyError::SetAttributes {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(target_os = "linux")]
fn slave_name(master: &PtyMaster) -> nix::Result<PathBuf> {
    nix::pty::ptsname_r(master).map(PathBuf::from)
}

#[cfg(not(target_os = "linux"))]
fn slave_name(master: &PtyMaster) -> nix::Result<PathBuf> {
    // SAFETY: the engine is single-threaded, nothing else calls ptsname
    unsafe { nix::pty::ptsname(master) }.map(PathBuf::from)
}
