//! Sandbox orchestration built on top of `birdcage`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use birdcage::process::{Child, Command};
use birdcage::{Birdcage, Exception, Sandbox as BirdcageTrait};

use crate::error::SandboxError;
use crate::profile::{SandboxMode, SandboxProfile};

/// Builder for sandboxed commands.
pub type SandboxCommand = Command;
/// Handle to a running sandboxed process.
pub type SandboxChild = Child;

/// Launches commands inside a restrictive sandbox.
#[derive(Debug)]
pub struct Sandbox {
    profile: SandboxProfile,
}

impl Sandbox {
    /// Creates a sandbox with the supplied profile.
    #[must_use]
    pub fn new(profile: SandboxProfile) -> Self {
        Self { profile }
    }

    /// Returns the profile this sandbox applies.
    #[must_use]
    pub const fn profile(&self) -> &SandboxProfile {
        &self.profile
    }

    /// Spawns the provided command inside the configured sandbox.
    ///
    /// The command's program path must be absolute and whitelisted on the
    /// profile. Scrubbed environment variables are removed from the child
    /// regardless of mode. Networking exceptions are never added: the child
    /// has no network access while confinement is enabled.
    pub fn spawn(&self, mut command: SandboxCommand) -> Result<SandboxChild, SandboxError> {
        let program = Self::canonical_program(Path::new(command.get_program()))?;
        self.ensure_program_whitelisted(&program)?;

        for name in self.profile.scrubbed_env() {
            command.env_remove(name);
        }

        if self.profile.mode() == SandboxMode::Disabled {
            return command.spawn().map_err(SandboxError::Spawn);
        }

        let mut cage = Birdcage::new();
        for exception in self.collect_exceptions(&program)? {
            cage.add_exception(exception)?;
        }
        Ok(cage.spawn(command)?)
    }

    fn ensure_program_whitelisted(&self, program: &Path) -> Result<(), SandboxError> {
        let authorised = canonicalised_set(self.profile.executable_paths())?;
        if authorised.contains(program) {
            return Ok(());
        }
        Err(SandboxError::ExecutableNotAuthorised {
            program: program.to_path_buf(),
        })
    }

    fn collect_exceptions(&self, program: &Path) -> Result<Vec<Exception>, SandboxError> {
        let mut exceptions = Vec::new();

        for path in canonicalised_set(self.profile.read_only_paths())? {
            exceptions.push(Exception::Read(path));
        }
        for path in canonicalised_set(self.profile.writable_paths())? {
            exceptions.push(Exception::WriteAndRead(path));
        }
        for path in canonicalised_set(self.profile.executable_paths())? {
            exceptions.push(Exception::ExecuteAndRead(path));
        }
        exceptions.push(Exception::ExecuteAndRead(program.to_path_buf()));

        // The plugin sees the host environment minus the scrub list, which
        // was already removed from the command itself.
        exceptions.push(Exception::FullEnvironment);

        Ok(exceptions)
    }

    fn canonical_program(program: &Path) -> Result<PathBuf, SandboxError> {
        if !program.is_absolute() {
            return Err(SandboxError::ProgramNotAbsolute(program.to_path_buf()));
        }
        canonicalise(program)
    }
}

fn canonicalised_set(paths: &[PathBuf]) -> Result<BTreeSet<PathBuf>, SandboxError> {
    let mut set = BTreeSet::new();
    for path in paths {
        let _ = set.insert(canonicalise(path)?);
    }
    Ok(set)
}

fn canonicalise(path: &Path) -> Result<PathBuf, SandboxError> {
    if !path.exists() {
        return Err(SandboxError::MissingPath {
            path: path.to_path_buf(),
        });
    }

    fs::canonicalize(path).map_err(|source| SandboxError::CanonicalisationFailed {
        path: path.to_path_buf(),
        source,
    })
}
