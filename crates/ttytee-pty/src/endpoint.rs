//! Endpoints and the fixed-order endpoint set

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::pty::{create_mirror, publish, remove_mirror};
use crate::tty::open_source;
use crate::{PtyError, PtyResult};

/// Which side of the tee an endpoint sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The real TTY
    Source,
    /// A PTY whose slave is published for a consumer
    Mirror,
}

/// An open descriptor plus the path that identifies it
#[derive(Debug)]
pub struct Endpoint {
    file: File,
    path: PathBuf,
    role: Role,
    /// Kernel-assigned slave device, for mirrors
    slave: Option<PathBuf>,
    /// Whether the symlink at `path` is still ours to remove
    published: bool,
    generation: u64,
}

impl Endpoint {
    pub(crate) fn source(file: File, path: PathBuf) -> Self {
        Self {
            file,
            path,
            role: Role::Source,
            slave: None,
            published: false,
            generation: 0,
        }
    }

    pub(crate) fn mirror(file: File, path: PathBuf, slave: PathBuf) -> Self {
        Self {
            file,
            path,
            role: Role::Mirror,
            slave: Some(slave),
            published: true,
            generation: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The slave device the published path currently resolves to
    pub fn slave(&self) -> Option<&Path> {
        self.slave.as_deref()
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Number of times this mirror has been recreated
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The underlying master or TTY file
    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.file).read(buf)
    }

    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        (&self.file).write(buf)
    }

    /// Replace this mirror's PTY with a fresh one at the same path.
    ///
    /// The new master is installed before the old one is closed, and the
    /// symlink is re-pointed at the new slave.
    pub fn recreate(&mut self) -> PtyResult<()> {
        if self.role != Role::Mirror {
            return Err(PtyError::NotAMirror {
                path: self.path.clone(),
            });
        }

        let (file, slave) = publish(&self.path, true)?;
        let stale = std::mem::replace(&mut self.file, file);
        drop(stale);

        self.slave = Some(slave);
        self.published = true;
        self.generation += 1;
        info!(
            "pty {} recreated (generation {})",
            self.path.display(),
            self.generation
        );
        Ok(())
    }

    /// Remove the published symlink, once.
    ///
    /// A failed removal is not retried on later calls.
    pub fn unpublish(&mut self) -> PtyResult<()> {
        if !self.published {
            return Ok(());
        }
        self.published = false;
        remove_mirror(&self.path)
    }
}

impl AsFd for Endpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for Endpoint {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

/// The Source plus its mirrors, in start-up order.
///
/// Slot `i` always names the mirror created from the `i`th PTY path,
/// across any number of recreations. Published paths are removed on
/// [`EndpointSet::cleanup`] or when the set is dropped.
#[derive(Debug)]
pub struct EndpointSet {
    source: Endpoint,
    mirrors: Vec<Endpoint>,
}

impl EndpointSet {
    /// Open the TTY, then create one mirror per path in order.
    ///
    /// If any mirror fails, the ones already published are removed before
    /// the error is returned.
    pub fn open<P: AsRef<Path>>(tty: impl AsRef<Path>, ptys: &[P], overwrite: bool) -> PtyResult<Self> {
        let source = open_source(tty)?;
        let mut set = Self {
            source,
            mirrors: Vec::with_capacity(ptys.len()),
        };

        for path in ptys {
            // On error `set` is dropped, which unpublishes what exists so far
            let mirror = create_mirror(path, overwrite)?;
            debug!("pty slot {}: {}", set.mirrors.len(), mirror.path().display());
            set.mirrors.push(mirror);
        }

        Ok(set)
    }

    pub fn source(&self) -> &Endpoint {
        &self.source
    }

    pub fn mirrors(&self) -> &[Endpoint] {
        &self.mirrors
    }

    pub fn mirror(&self, slot: usize) -> Option<&Endpoint> {
        self.mirrors.get(slot)
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// Borrow the Source and the mirrors at the same time
    pub fn split_mut(&mut self) -> (&Endpoint, &mut [Endpoint]) {
        (&self.source, &mut self.mirrors)
    }

    /// Remove every still-published mirror path.
    ///
    /// Each failure is logged on its own and does not stop the others.
    /// Returns the number of removals that failed. Calling this again is a
    /// no-op.
    pub fn cleanup(&mut self) -> usize {
        self.mirrors
            .iter_mut()
            .filter_map(|mirror| mirror.unpublish().err())
            .count()
    }
}

impl Drop for EndpointSet {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recreate_rejects_source() {
        let dir = tempfile::tempdir().unwrap();
        let tty = dir.path().join("tty");
        let (_master, slave) = publish(&tty, false).unwrap();

        let mut source = open_source(&slave).unwrap();
        assert_eq!(source.role(), Role::Source);
        assert!(matches!(
            source.recreate(),
            Err(PtyError::NotAMirror { .. })
        ));
    }

    #[test]
    fn test_unpublish_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pty0");
        let mut mirror = create_mirror(&path, false).unwrap();

        mirror.unpublish().unwrap();
        assert!(!mirror.is_published());
        assert!(std::fs::symlink_metadata(&path).is_err());
        mirror.unpublish().unwrap();
    }
}
