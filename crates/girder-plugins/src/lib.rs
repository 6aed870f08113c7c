//! Host-side plugin subsystem for the Girder build system.
//!
//! The `girder-plugins` crate is what the build system calls when a target
//! has plugin dependencies. For each (plugin, target) pair the
//! [`PluginSession`] orchestrator:
//!
//! 1. flattens the package graph into the ID-based wire input via the
//!    [`serializer`],
//! 2. obtains a per-plugin executable from the cache-aware
//!    [`compiler::PluginCompiler`],
//! 3. runs it under a sandbox through the [`runner`], exchanging framed
//!    JSON messages on dedicated pipes, and
//! 4. folds the returned command and diagnostic records into build-plan
//!    records.
//!
//! Each invocation exclusively owns its subprocess and pipes. Invocations of
//! independent (plugin, target) pairs may be overlapped by the caller; the
//! session is the unit of parallelism.
//!
//! Infrastructure failures (compilation, spawn, framing, decoding) surface
//! as [`PluginHostError`] and abort the invocation. Plugin-authored
//! diagnostics ride inside [`session::PluginInvocationResult`] and never
//! fail an invocation by themselves; the plugin's exit code does.

pub mod compiler;
pub mod error;
pub mod runner;
pub mod serializer;
pub mod session;
pub mod tools;

pub use compiler::{
    CompilationResult, CompilerError, PluginApiLibrary, PluginBuilder, PluginCompiler,
    ToolsVersion,
};
pub use error::PluginHostError;
pub use runner::{
    CancellationToken, InvocationOutcome, PluginInvoker, SandboxedPluginRunner, TextSink,
};
pub use serializer::{ActionRequest, SerializationError, serialize_input};
pub use session::{
    PluginInvocationResult, PluginSession, ResolvedBuildCommand, ResolvedCommand,
    ResolvedPrebuildCommand, SessionConfig,
};
pub use tools::{AccessibleTool, ToolResolutionError};
