//! Message envelopes exchanged over the framed pipes.
//!
//! The host speaks first: it sends [`HostToPluginMessage::PerformAction`]
//! and then only ever answers plugin-initiated requests. The plugin streams
//! commands and diagnostics in emission order and finishes the conversation
//! with [`PluginToHostMessage::ActionComplete`]. Unknown discriminators on
//! either side are a protocol violation and fail decoding.

use serde::{Deserialize, Serialize};

use crate::command::CommandConfiguration;
use crate::diagnostic::Diagnostic;
use crate::input::{PluginInput, TargetId};

/// Messages sent from the host to the plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HostToPluginMessage {
    /// Deliver the input and ask the plugin to perform the contained action.
    #[serde(rename_all = "camelCase")]
    PerformAction {
        /// The flattened graph and action request.
        input: PluginInput,
    },
    /// Answer to a plugin-initiated request the host could not serve.
    #[serde(rename_all = "camelCase")]
    ErrorResponse {
        /// Description of why the request failed.
        error: String,
    },
}

/// Messages sent from the plugin to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PluginToHostMessage {
    /// A diagnostic authored by plugin code.
    #[serde(rename_all = "camelCase")]
    EmitDiagnostic {
        /// The diagnostic record.
        #[serde(flatten)]
        diagnostic: Diagnostic,
    },
    /// A build command to fold into the build plan.
    #[serde(rename_all = "camelCase")]
    DefineBuildCommand {
        /// The invocation.
        config: CommandConfiguration,
        /// Paths the command reads.
        inputs: Vec<String>,
        /// Paths the command writes.
        outputs: Vec<String>,
    },
    /// A command to run before planning.
    #[serde(rename_all = "camelCase")]
    DefinePrebuildCommand {
        /// The invocation.
        config: CommandConfiguration,
        /// Directory whose contents become build inputs.
        output_files_directory: String,
    },
    /// Request for the symbol graph of a target.
    ///
    /// The plugin blocks on its next read for the matching response; a host
    /// without symbol graph support answers
    /// [`HostToPluginMessage::ErrorResponse`].
    #[serde(rename_all = "camelCase")]
    SymbolGraphRequest {
        /// Target whose symbol graph is requested.
        target: TargetId,
    },
    /// Terminal message: the action finished.
    ///
    /// Strictly the last message the host will observe from the plugin.
    #[serde(rename_all = "camelCase")]
    ActionComplete {
        /// Whether the plugin considers the action to have succeeded.
        success: bool,
    },
}
