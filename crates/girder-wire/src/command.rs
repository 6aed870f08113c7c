//! Command records contributed by build-tool plugins.
//!
//! Paths inside command records are opaque strings on the wire; the host
//! promotes them to absolute paths when folding commands into the build
//! plan.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The invocation shared by build and prebuild commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandConfiguration {
    /// Short human-readable label shown in build logs.
    pub display_name: String,
    /// Executable to run.
    pub executable: String,
    /// Arguments in order.
    pub arguments: Vec<String>,
    /// Environment applied on top of the build environment.
    pub environment: BTreeMap<String, String>,
    /// Working directory, absent to inherit the build's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

impl CommandConfiguration {
    /// Creates a configuration with no arguments, environment, or working
    /// directory.
    #[must_use]
    pub fn new(display_name: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            executable: executable.into(),
            arguments: Vec::new(),
            environment: BTreeMap::new(),
            working_directory: None,
        }
    }

    /// Replaces the argument list.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Replaces the environment.
    #[must_use]
    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }
}

/// An incremental build command with declared inputs and outputs.
///
/// The build engine runs the command when any input is newer than any
/// output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCommand {
    /// The invocation.
    pub config: CommandConfiguration,
    /// Paths the command reads.
    pub inputs: Vec<String>,
    /// Paths the command writes.
    pub outputs: Vec<String>,
}

/// A command run before the build plan is computed.
///
/// Outputs land in `output_files_directory` and are fed back into planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuildCommand {
    /// The invocation.
    pub config: CommandConfiguration,
    /// Directory whose contents become build inputs.
    pub output_files_directory: String,
}
