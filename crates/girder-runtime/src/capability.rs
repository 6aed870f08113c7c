//! Capability traits implemented by user plugin types.

use girder_wire::{BuildCommand, CommandConfiguration, PluginToHostMessage, PrebuildCommand};

use crate::context::{PluginContext, TargetView};
use crate::error::PluginFailure;

/// A command a build-tool plugin contributes to the build plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// An incremental command with declared inputs and outputs.
    Build(BuildCommand),
    /// A command run before planning whose outputs feed back into it.
    Prebuild(PrebuildCommand),
}

impl Command {
    /// Creates an incremental build command.
    #[must_use]
    pub fn build(
        config: CommandConfiguration,
        inputs: Vec<String>,
        outputs: Vec<String>,
    ) -> Self {
        Self::Build(BuildCommand {
            config,
            inputs,
            outputs,
        })
    }

    /// Creates a prebuild command.
    #[must_use]
    pub fn prebuild(config: CommandConfiguration, output_files_directory: impl Into<String>) -> Self {
        Self::Prebuild(PrebuildCommand {
            config,
            output_files_directory: output_files_directory.into(),
        })
    }

    pub(crate) fn into_message(self) -> PluginToHostMessage {
        match self {
            Self::Build(command) => PluginToHostMessage::DefineBuildCommand {
                config: command.config,
                inputs: command.inputs,
                outputs: command.outputs,
            },
            Self::Prebuild(command) => PluginToHostMessage::DefinePrebuildCommand {
                config: command.config,
                output_files_directory: command.output_files_directory,
            },
        }
    }
}

/// Capability of plugins that contribute commands while a target is being
/// planned.
pub trait BuildToolPlugin {
    /// Returns the commands to fold into the build plan, in order.
    ///
    /// # Errors
    ///
    /// Returning a [`PluginFailure`] ends the invocation with exit code 1.
    fn create_build_commands(
        &self,
        context: &PluginContext<'_>,
        target: &TargetView<'_>,
    ) -> Result<Vec<Command>, PluginFailure>;
}

/// Capability of plugins the user invokes directly.
///
/// A command plugin performs its work by side effect (writing under the
/// work directory, running tools); it contributes no build commands.
pub trait CommandPlugin {
    /// Performs the user-invoked operation.
    ///
    /// # Errors
    ///
    /// Returning a [`PluginFailure`] ends the invocation with exit code 1.
    fn perform_command(
        &self,
        context: &PluginContext<'_>,
        targets: &[TargetView<'_>],
        arguments: &[String],
    ) -> Result<(), PluginFailure>;
}

/// The user plugin with its declared capability.
///
/// The capability tag is verified against the requested action; a mismatch
/// is reported as malformed input and the plugin exits with code 1.
pub enum PluginHandle {
    /// A build-tool plugin.
    BuildTool(Box<dyn BuildToolPlugin>),
    /// A user-command plugin.
    Command(Box<dyn CommandPlugin>),
}
