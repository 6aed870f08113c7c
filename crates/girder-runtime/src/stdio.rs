//! Standard descriptor plumbing performed before the message loop starts.
//!
//! The host speaks frames on the descriptors the process inherits as stdin
//! and stdout. Plugin code must not be able to scribble on the message
//! channel, so on entry the runtime:
//!
//! 1. duplicates the inherited stdin for the message input and repoints
//!    descriptor 0 at `/dev/null`, so accidental console reads fail
//!    immediately;
//! 2. duplicates the inherited stdout for the message output and redirects
//!    descriptor 1 onto stderr, so `println!`-style output becomes
//!    free-form text on the diagnostic channel.
//!
//! Message writes are flushed frame by frame; the duplicated descriptor is
//! otherwise unbuffered.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd};

use crate::error::RuntimeError;

/// The claimed message pipes.
pub(crate) struct HostPipes {
    /// Framed host-to-plugin messages (the original stdin).
    pub(crate) input: File,
    /// Framed plugin-to-host messages (the original stdout).
    pub(crate) output: File,
}

/// Duplicates the message descriptors and redirects the standard ones.
pub(crate) fn claim_host_pipes() -> Result<HostPipes, RuntimeError> {
    let input = duplicate(libc::STDIN_FILENO)?;
    let output = duplicate(libc::STDOUT_FILENO)?;

    let devnull = File::open("/dev/null")
        .map_err(RuntimeError::Stdio)?;
    redirect(devnull.as_raw_fd(), libc::STDIN_FILENO)?;
    redirect(libc::STDERR_FILENO, libc::STDOUT_FILENO)?;

    Ok(HostPipes { input, output })
}

fn duplicate(fd: libc::c_int) -> Result<File, RuntimeError> {
    // SAFETY: dup(2) either returns a fresh descriptor we take ownership of
    // or -1; the source descriptor is inherited from the host and valid for
    // the life of the process.
    let duplicated = unsafe { libc::dup(fd) };
    if duplicated < 0 {
        return Err(RuntimeError::Stdio(io::Error::last_os_error()));
    }
    // SAFETY: `duplicated` is a freshly created descriptor owned by no one
    // else.
    Ok(unsafe { File::from_raw_fd(duplicated) })
}

fn redirect(source: libc::c_int, target: libc::c_int) -> Result<(), RuntimeError> {
    // SAFETY: dup2(2) atomically replaces `target`; both descriptors remain
    // owned by their existing handles.
    let result = unsafe { libc::dup2(source, target) };
    if result < 0 {
        return Err(RuntimeError::Stdio(io::Error::last_os_error()));
    }
    Ok(())
}
