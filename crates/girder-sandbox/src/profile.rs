//! Sandbox policy definition and builder helpers.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::runtime::platform_runtime_roots;

/// Whether the sandbox is actually applied when spawning.
///
/// [`SandboxMode::Disabled`] exists for platforms without a native sandbox
/// facility. A disabled sandbox spawns the command unconfined; the profile's
/// environment scrub list is still honoured.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SandboxMode {
    /// Apply the full confinement policy.
    #[default]
    Enabled,
    /// Spawn without confinement.
    Disabled,
}

/// Declarative description of what a plugin subprocess may touch.
///
/// The default profile denies networking, allows reads of the platform
/// runtime library roots, and allows writes nowhere. Callers add the
/// executable, the writable directories of the invocation, and the
/// environment variables to scrub.
#[derive(Debug, Clone)]
pub struct SandboxProfile {
    read_only_paths: Vec<PathBuf>,
    writable_paths: Vec<PathBuf>,
    executable_paths: Vec<PathBuf>,
    scrubbed_env: BTreeSet<String>,
    mode: SandboxMode,
}

impl SandboxProfile {
    /// Creates a profile with platform runtime library paths whitelisted for
    /// read-only access and everything else denied.
    #[must_use]
    pub fn new() -> Self {
        Self {
            read_only_paths: platform_runtime_roots(),
            writable_paths: Vec::new(),
            executable_paths: Vec::new(),
            scrubbed_env: BTreeSet::new(),
            mode: SandboxMode::Enabled,
        }
    }

    /// Grants execute and read access to the provided path.
    #[must_use]
    pub fn allow_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_paths.push(path.into());
        self
    }

    /// Grants read-only access to the provided path.
    #[must_use]
    pub fn allow_read_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.read_only_paths.push(path.into());
        self
    }

    /// Grants read-write access to the provided path.
    #[must_use]
    pub fn allow_writable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.writable_paths.push(path.into());
        self
    }

    /// Removes the named environment variable before exec.
    #[must_use]
    pub fn scrub_environment_variable(mut self, name: impl Into<String>) -> Self {
        let _ = self.scrubbed_env.insert(name.into());
        self
    }

    /// Disables confinement while keeping the environment scrub list.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.mode = SandboxMode::Disabled;
        self
    }

    /// Returns the configured mode.
    #[must_use]
    pub const fn mode(&self) -> SandboxMode {
        self.mode
    }

    pub(crate) fn read_only_paths(&self) -> &[PathBuf] {
        &self.read_only_paths
    }

    pub(crate) fn writable_paths(&self) -> &[PathBuf] {
        &self.writable_paths
    }

    pub(crate) fn executable_paths(&self) -> &[PathBuf] {
        &self.executable_paths
    }

    pub(crate) fn scrubbed_env(&self) -> &BTreeSet<String> {
        &self.scrubbed_env
    }
}

impl Default for SandboxProfile {
    fn default() -> Self {
        Self::new()
    }
}
