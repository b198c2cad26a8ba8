//! TTY and PTY endpoints for ttytee
//!
//! Opens the real terminal device, allocates pseudo-terminals that mirror
//! it, and publishes each PTY's slave side at a stable symlink path that
//! survives recreation of the PTY.

pub mod endpoint;
pub mod pty;
pub mod tty;

pub use endpoint::{Endpoint, EndpointSet, Role};
pub use pty::{create_mirror, remove_mirror};
pub use tty::open_source;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Could not open the tty {}: {source}", .path.display())]
    OpenSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to replace existing file at {} (overwrite disabled)", .path.display())]
    AlreadyExists { path: PathBuf },

    #[error("Could not overwrite the pty {}: {source}", .path.display())]
    RemoveExisting {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not open master PTY for {}: {source}", .path.display())]
    OpenMaster {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("Could not get PTY settings for {}: {source}", .path.display())]
    GetAttributes {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("Could not set PTY settings for {}: {source}", .path.display())]
    SetAttributes {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("Could not set permissions of slave PTY for {}: {source}", .path.display())]
    Grant {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("Could not unlock slave PTY for {}: {source}", .path.display())]
    Unlock {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("Could not get the name of the slave PTY for {}: {source}", .path.display())]
    SlaveName {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("Could not create the pty symlink {}: {source}", .path.display())]
    Symlink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not remove the pty {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is the tty, not a pty", .path.display())]
    NotAMirror { path: PathBuf },
}

pub type PtyResult<T> = Result<T, PtyError>;
