//! Failures reported by plugin code and by the runtime itself.

use thiserror::Error;

use girder_wire::FrameError;

/// Failures a plugin (or the context it calls into) can report.
///
/// Returning one of these from a capability ends the invocation: the
/// runtime writes a single line to stderr and the process exits with
/// code 1, which the host reports as a subprocess failure.
#[derive(Debug, Error)]
pub enum PluginFailure {
    /// The plugin asked for a tool the host did not provide.
    #[error("tool '{0}' is not available to this plugin")]
    ToolNotFound(String),

    /// The wire input could not be decoded, or the action does not match
    /// the plugin's capability.
    #[error("malformed plugin input: {0}")]
    MalformedInputJson(String),

    /// The host refused a plugin-initiated request.
    #[error("the host refused the request: {0}")]
    RequestRefused(String),

    /// A plugin-specific failure.
    #[error("{0}")]
    Other(String),
}

impl From<String> for PluginFailure {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

impl From<&str> for PluginFailure {
    fn from(message: &str) -> Self {
        Self::Other(message.to_owned())
    }
}

/// Internal runtime failures that terminate the plugin process.
#[derive(Debug, Error)]
pub(crate) enum RuntimeError {
    /// A standard descriptor could not be duplicated or redirected.
    #[error("failed to set up plugin stdio: {0}")]
    Stdio(std::io::Error),

    /// A frame-level failure on the host pipes.
    #[error("host connection failed: {0}")]
    Frame(#[from] FrameError),

    /// The host violated the message protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Plugin code reported a failure.
    #[error("{0}")]
    Plugin(#[from] PluginFailure),
}
