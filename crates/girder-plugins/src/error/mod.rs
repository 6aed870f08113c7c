//! Error taxonomy surfaced to callers of the plugin subsystem.
//!
//! Infrastructure errors abort the invocation they occur in and are never
//! folded into the invocation's diagnostics. Variants that describe a
//! subprocess failure carry the full command line and the captured stderr so
//! the failure can be reproduced outside the host.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use girder_wire::FrameError;

use crate::compiler::{CompilationResult, CompilerError};
use crate::serializer::SerializationError;

/// Errors arising from plugin compilation, invocation, and result handling.
#[derive(Debug, Error)]
pub enum PluginHostError {
    /// The per-invocation work directory could not be created.
    #[error("could not create plugin work directory {path}: {source}")]
    WorkDirectoryCreationFailed {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The compiler ran but the plugin did not build.
    #[error("plugin compilation failed; diagnostics at {}", .result.diagnostics_file.display())]
    CompilationFailed {
        /// The full compilation result, including raw compiler output.
        result: CompilationResult,
    },

    /// The plugin capability does not match the requested action.
    #[error("plugin '{plugin}' declares the {declared} capability but the action requires {required}")]
    CapabilityMismatch {
        /// Plugin target name.
        plugin: String,
        /// Capability the plugin declares.
        declared: &'static str,
        /// Capability the action requires.
        required: &'static str,
    },

    /// The plugin subprocess could not be started.
    #[error("plugin subprocess did not start: {message}")]
    SubprocessDidNotStart {
        /// Description of the spawn failure.
        message: String,
        /// Command line that was attempted.
        command: Vec<String>,
    },

    /// The plugin subprocess exited abnormally.
    #[error("plugin subprocess failed ({exit}); stderr:\n{stderr}")]
    SubprocessFailed {
        /// How the subprocess exited.
        exit: ExitStatus,
        /// Command line that was run.
        command: Vec<String>,
        /// Everything the subprocess wrote to stderr.
        stderr: String,
    },

    /// The subprocess exited cleanly without sending a terminal message.
    #[error("plugin exited without delivering its output: {message}")]
    MissingPluginOutput {
        /// Description of what was missing.
        message: String,
        /// Command line that was run.
        command: Vec<String>,
        /// Everything the subprocess wrote to stderr.
        stderr: String,
    },

    /// The invocation was cancelled by the host.
    #[error("plugin invocation was cancelled")]
    Cancelled {
        /// Command line that was run.
        command: Vec<String>,
    },

    /// A frame-level protocol violation on the plugin's pipes.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A structurally valid frame carried a payload the host could not
    /// decode.
    #[error("could not decode plugin output: {source}")]
    DecodingPluginOutputFailed {
        /// The offending payload, lossily decoded for display.
        payload: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The package graph could not be flattened for the wire.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// The compiler could not be launched at all.
    #[error(transparent)]
    Compiler(#[from] CompilerError),

    /// A plugin's accessible tools could not be resolved.
    #[error(transparent)]
    ToolResolution(#[from] crate::tools::ToolResolutionError),
}
