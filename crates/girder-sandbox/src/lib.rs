//! Sandboxing utilities for Girder plugin subprocesses.
//!
//! The `girder-sandbox` crate wraps the [`birdcage`] library with the policy
//! the plugin host requires: no network access, and filesystem writes
//! confined to the directories the invocation explicitly grants (the
//! per-invocation work directory and the plugin cache directory). Standard
//! library locations are whitelisted read-only so dynamically linked plugin
//! executables keep working without exposing the wider filesystem.
//!
//! Unlike a zero-trust container, the plugin inherits the host environment:
//! plugins legitimately consult `PATH`, locale, and toolchain variables. The
//! profile instead names the variables that must *not* leak - the host's
//! internal coordination names - and those are scrubbed before exec.
//!
//! On platforms without a native sandbox facility the profile can be built
//! with [`SandboxMode::Disabled`], which spawns the command unconfined.
//! Callers that do this are expected to say so loudly; the plugin host
//! treats it as an explicit opt-out.
//!
//! ```rust,no_run
//! use std::process::Stdio;
//! use girder_sandbox::{Sandbox, SandboxCommand, SandboxProfile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let profile = SandboxProfile::new()
//!     .allow_executable("/usr/bin/true")
//!     .allow_writable_path("/tmp/girder-work")
//!     .scrub_environment_variable("GIRDER_PLUGIN_INCREMENTAL_DIR");
//!
//! let mut command = SandboxCommand::new("/usr/bin/true");
//! command.stdout(Stdio::piped());
//!
//! let sandbox = Sandbox::new(profile);
//! let mut child = sandbox.spawn(command)?;
//! child.wait()?;
//! # Ok(()) }
//! ```

mod error;
mod profile;
mod runtime;
mod sandbox;

pub use error::SandboxError;
pub use profile::{SandboxMode, SandboxProfile};
pub use sandbox::{Sandbox, SandboxChild, SandboxCommand};

#[cfg(test)]
mod tests;
