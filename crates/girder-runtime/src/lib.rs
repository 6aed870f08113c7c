//! Runtime linked into every compiled Girder plugin executable.
//!
//! A plugin is an ordinary program whose `main` hands its plugin type to
//! [`run_plugin`]. The runtime claims the framed message pipes, redirects
//! the standard descriptors so stray prints become free-form diagnostics,
//! and then serves host messages until the host closes the pipe:
//!
//! ```no_run
//! use std::process::ExitCode;
//!
//! use girder_runtime::{
//!     BuildToolPlugin, Command, CommandConfiguration, PluginContext, PluginFailure,
//!     PluginHandle, TargetView, run_plugin,
//! };
//!
//! struct GenPlugin;
//!
//! impl BuildToolPlugin for GenPlugin {
//!     fn create_build_commands(
//!         &self,
//!         context: &PluginContext<'_>,
//!         target: &TargetView<'_>,
//!     ) -> Result<Vec<Command>, PluginFailure> {
//!         let tool = context.tool("protogen")?;
//!         let out = context.work_dir().join("generated.rs");
//!         Ok(vec![Command::build(
//!             CommandConfiguration::new(
//!                 format!("Generating sources for {}", target.name()),
//!                 tool.display().to_string(),
//!             ),
//!             vec![],
//!             vec![out.display().to_string()],
//!         )])
//!     }
//! }
//!
//! fn main() -> ExitCode {
//!     run_plugin(PluginHandle::BuildTool(Box::new(GenPlugin)))
//! }
//! ```
//!
//! The host decides success from the exit code and the terminal message;
//! the runtime exits 0 only when every action completed without error.

mod capability;
mod context;
mod error;
mod session;
mod stdio;

use std::io::BufReader;
use std::process::ExitCode;

pub use capability::{BuildToolPlugin, Command, CommandPlugin, PluginHandle};
pub use context::{InputView, PackageView, PluginContext, ProductView, TargetView};
pub use error::PluginFailure;

// Plugins are compiled with the runtime as their only extern crate, so the
// wire vocabulary they need is re-exported here.
pub use girder_wire::{
    BuildCommand, CommandConfiguration, Diagnostic, DiagnosticSeverity, PrebuildCommand,
    WireDependency, WireFileKind, WireTargetInfo,
};

/// Serves host messages with the given plugin until the host closes the
/// pipe.
///
/// Returns the process exit code: success when every dispatched action
/// completed, failure after any internal or plugin-reported error. Errors
/// are written as a single line to stderr for the host to capture.
#[must_use]
pub fn run_plugin(handle: PluginHandle) -> ExitCode {
    let pipes = match stdio::claim_host_pipes() {
        Ok(pipes) => pipes,
        Err(error) => {
            eprintln!("girder plugin runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    let mut reader = BufReader::new(pipes.input);
    let mut writer = pipes.output;
    match session::run_message_loop(&handle, &mut reader, &mut writer) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("girder plugin runtime: {error}");
            ExitCode::FAILURE
        }
    }
}
