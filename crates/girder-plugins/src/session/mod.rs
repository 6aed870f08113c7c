//! Per-(plugin, target) session orchestration.
//!
//! The session is the entry point the build system calls: it walks the
//! reachable graph, finds targets with plugin dependencies, and runs each
//! plugin through the serialize-compile-invoke pipeline. Every invocation
//! gets its own work directory
//! (`<output_dir>/<package identity>/<target>/<plugin>`) and its own
//! subprocess; independent invocations may be overlapped by callers that
//! run sessions on parallel workers.
//!
//! Plugin-authored diagnostics stay inside each
//! [`PluginInvocationResult`] rather than flowing into the host's top-level
//! diagnostics; an error-severity diagnostic does not fail the invocation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use girder_graph::{Package, PackageIdentity, PluginCapabilityKind, Target, TargetDependency};
use girder_wire::Diagnostic;

use crate::compiler::{PluginBuilder, ToolsVersion};
use crate::error::PluginHostError;
use crate::runner::{CancellationToken, PluginInvoker};
use crate::serializer::{ActionRequest, serialize_input};
use crate::tools;

/// Tracing target for session orchestration.
const SESSION_TARGET: &str = "girder_plugins::session";

/// Paths and toolchain facts one session operates under.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Root under which per-invocation work directories are created.
    pub output_dir: PathBuf,
    /// Directory where built products land.
    pub built_products_dir: PathBuf,
    /// Root of the plugin compilation cache.
    pub cache_dir: PathBuf,
    /// Tools version of the package being built.
    pub tools_version: ToolsVersion,
    /// Host triple used to select vended tool variants.
    pub host_triple: String,
}

/// A command invocation with paths promoted to absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    /// Short human-readable label.
    pub display_name: String,
    /// Absolute path of the executable.
    pub executable: PathBuf,
    /// Arguments in order.
    pub arguments: Vec<String>,
    /// Environment applied on top of the build environment.
    pub environment: BTreeMap<String, String>,
    /// Working directory, absent to inherit the build's.
    pub working_directory: Option<PathBuf>,
}

/// A build command ready for the build plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBuildCommand {
    /// The invocation.
    pub command: ResolvedCommand,
    /// Absolute input paths.
    pub inputs: Vec<PathBuf>,
    /// Absolute output paths.
    pub outputs: Vec<PathBuf>,
}

/// A prebuild command ready for the build plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrebuildCommand {
    /// The invocation.
    pub command: ResolvedCommand,
    /// Absolute directory whose contents become build inputs.
    pub output_files_directory: PathBuf,
}

/// Everything one plugin invocation produced.
#[derive(Debug, Clone)]
pub struct PluginInvocationResult {
    /// Name of the plugin target that ran.
    pub plugin_name: String,
    /// The `success` flag of the plugin's terminal message.
    pub succeeded: bool,
    /// Build commands in emission order.
    pub build_commands: Vec<ResolvedBuildCommand>,
    /// Prebuild commands in emission order.
    pub prebuild_commands: Vec<ResolvedPrebuildCommand>,
    /// Plugin-authored diagnostics in emission order.
    pub diagnostics: Vec<Diagnostic>,
    /// Free-form text the plugin wrote to stderr.
    pub text_output: String,
}

/// Orchestrates plugin invocations over a resolved package graph.
#[derive(Debug)]
pub struct PluginSession<B, I> {
    config: SessionConfig,
    builder: B,
    invoker: I,
}

impl<B, I> PluginSession<B, I> {
    /// Creates a session with the given compile and invoke implementations.
    #[must_use]
    pub const fn new(config: SessionConfig, builder: B, invoker: I) -> Self {
        Self {
            config,
            builder,
            invoker,
        }
    }
}

impl<B: PluginBuilder, I: PluginInvoker> PluginSession<B, I> {
    /// Runs every build-tool plugin of every reachable target.
    ///
    /// The result is keyed by `(package identity, target name)`: target
    /// names are only unique within a package, and two packages may both
    /// declare, say, a `Generated` target. Targets are visited in key
    /// order; a target's plugins run in declaration order. Targets without
    /// plugin dependencies do not appear in the result.
    ///
    /// # Errors
    ///
    /// Returns the first [`PluginHostError`] an invocation hits.
    pub fn create_build_tool_commands(
        &self,
        root: &Arc<Package>,
    ) -> Result<BTreeMap<(PackageIdentity, String), Vec<PluginInvocationResult>>, PluginHostError>
    {
        let mut by_target: BTreeMap<(PackageIdentity, String), (Arc<Package>, Arc<Target>)> =
            BTreeMap::new();
        for package in reachable_packages(root) {
            for target in package.targets() {
                let key = (package.identity().clone(), target.name().to_owned());
                let _ = by_target.insert(key, (Arc::clone(&package), Arc::clone(target)));
            }
        }

        let mut results = BTreeMap::new();
        for (key, (package, target)) in &by_target {
            let plugins = plugin_dependencies(target);
            if plugins.is_empty() {
                continue;
            }
            debug!(
                target: SESSION_TARGET,
                package = key.0.as_str(),
                build_target = key.1.as_str(),
                plugins = plugins.len(),
                "running build-tool plugins"
            );

            let mut invocations = Vec::new();
            for plugin in plugins {
                require_capability(&plugin, PluginCapabilityKind::BuildTool)?;
                let action = ActionRequest::CreateBuildToolCommands {
                    target: Arc::clone(target),
                };
                invocations.push(self.invoke_plugin(root, package, &key.1, &plugin, &action)?);
            }
            let _ = results.insert(key.clone(), invocations);
        }
        Ok(results)
    }

    /// Runs a command plugin for a user-invoked operation.
    ///
    /// # Errors
    ///
    /// Returns [`PluginHostError::CapabilityMismatch`] when the plugin does
    /// not declare the command capability, or any invocation error.
    pub fn perform_user_command(
        &self,
        root: &Arc<Package>,
        plugin: &Arc<Target>,
        targets: &[Arc<Target>],
        arguments: Vec<String>,
    ) -> Result<PluginInvocationResult, PluginHostError> {
        require_capability(plugin, PluginCapabilityKind::Command)?;
        let package = owning_package(root, plugin);
        let subject = targets
            .first()
            .map_or_else(|| plugin.name().to_owned(), |t| t.name().to_owned());
        let action = ActionRequest::PerformUserCommand {
            targets: targets.to_vec(),
            arguments,
        };
        self.invoke_plugin(root, &package, &subject, plugin, &action)
    }

    /// One full serialize-compile-invoke round for one plugin.
    fn invoke_plugin(
        &self,
        root: &Arc<Package>,
        package: &Arc<Package>,
        subject_name: &str,
        plugin: &Arc<Target>,
        action: &ActionRequest,
    ) -> Result<PluginInvocationResult, PluginHostError> {
        let work_dir = self
            .config
            .output_dir
            .join(package.identity().as_str())
            .join(subject_name)
            .join(plugin.name());
        std::fs::create_dir_all(&work_dir).map_err(|source| {
            PluginHostError::WorkDirectoryCreationFailed {
                path: work_dir.clone(),
                source,
            }
        })?;

        let mut tool_paths = BTreeMap::new();
        for tool in tools::accessible_tools(
            plugin,
            &self.config.built_products_dir,
            &self.config.host_triple,
        )? {
            let _ = tool_paths.insert(tool.name, tool.path);
        }

        let input = serialize_input(
            root,
            &work_dir,
            &self.config.built_products_dir,
            &tool_paths,
            action,
        )?;

        let girder_graph::TargetInfo::Plugin { sources, .. } = plugin.info() else {
            unreachable!("invoke_plugin is only called with plugin targets");
        };
        let compilation = self.builder.build(
            plugin.name(),
            sources,
            self.config.tools_version,
            &self.config.cache_dir,
        )?;
        let Some(executable) = compilation.executable.clone() else {
            return Err(PluginHostError::CompilationFailed {
                result: compilation,
            });
        };

        let text_buffer = Arc::new(Mutex::new(String::new()));
        let sink_buffer = Arc::clone(&text_buffer);
        let token = CancellationToken::new();
        let outcome = self.invoker.invoke(
            &executable,
            &compilation.cache_dir,
            &[work_dir.clone()],
            &input,
            Box::new(move |chunk: &str| {
                sink_buffer
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push_str(chunk);
            }),
            &token,
        )?;

        let text_output = text_buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        Ok(PluginInvocationResult {
            plugin_name: plugin.name().to_owned(),
            succeeded: outcome.success,
            build_commands: outcome
                .build_commands
                .into_iter()
                .map(|c| ResolvedBuildCommand {
                    command: resolve_command(c.config, &work_dir),
                    inputs: c.inputs.iter().map(|p| absolute(p, &work_dir)).collect(),
                    outputs: c.outputs.iter().map(|p| absolute(p, &work_dir)).collect(),
                })
                .collect(),
            prebuild_commands: outcome
                .prebuild_commands
                .into_iter()
                .map(|c| ResolvedPrebuildCommand {
                    command: resolve_command(c.config, &work_dir),
                    output_files_directory: absolute(&c.output_files_directory, &work_dir),
                })
                .collect(),
            diagnostics: outcome.diagnostics,
            text_output,
        })
    }
}

/// Collects the plugin targets a target depends on, in declaration order.
///
/// Plugins are reached directly through target edges or through plugin
/// products of other packages.
fn plugin_dependencies(target: &Target) -> Vec<Arc<Target>> {
    let mut plugins = Vec::new();
    for dependency in target.dependencies() {
        match dependency {
            TargetDependency::Target(dep) => {
                if dep.is_plugin() {
                    plugins.push(Arc::clone(dep));
                }
            }
            TargetDependency::Product(product) => {
                for member in product.targets() {
                    if member.is_plugin() {
                        plugins.push(Arc::clone(member));
                    }
                }
            }
        }
    }
    plugins
}

fn require_capability(
    plugin: &Arc<Target>,
    required: PluginCapabilityKind,
) -> Result<(), PluginHostError> {
    let declared = plugin.plugin_capability();
    if declared == Some(required) {
        return Ok(());
    }
    Err(PluginHostError::CapabilityMismatch {
        plugin: plugin.name().to_owned(),
        declared: match declared {
            Some(PluginCapabilityKind::BuildTool) => "build-tool",
            Some(PluginCapabilityKind::Command) => "command",
            None => "none",
        },
        required: match required {
            PluginCapabilityKind::BuildTool => "build-tool",
            PluginCapabilityKind::Command => "command",
        },
    })
}

/// All packages reachable from the root, root first, deduplicated.
fn reachable_packages(root: &Arc<Package>) -> Vec<Arc<Package>> {
    let mut seen = std::collections::HashSet::new();
    let mut ordered = Vec::new();
    let mut stack = vec![Arc::clone(root)];
    while let Some(package) = stack.pop() {
        if !seen.insert(Arc::as_ptr(&package) as usize) {
            continue;
        }
        for dependency in package.dependencies() {
            stack.push(Arc::clone(dependency));
        }
        ordered.push(package);
    }
    ordered
}

/// Finds the package whose targets contain the plugin, defaulting to the
/// root.
fn owning_package(root: &Arc<Package>, plugin: &Arc<Target>) -> Arc<Package> {
    reachable_packages(root)
        .into_iter()
        .find(|package| {
            package
                .targets()
                .iter()
                .any(|target| Arc::ptr_eq(target, plugin))
        })
        .unwrap_or_else(|| Arc::clone(root))
}

fn resolve_command(
    config: girder_wire::CommandConfiguration,
    work_dir: &Path,
) -> ResolvedCommand {
    ResolvedCommand {
        executable: absolute(&config.executable, work_dir),
        display_name: config.display_name,
        arguments: config.arguments,
        environment: config.environment,
        working_directory: config.working_directory.map(|dir| absolute(&dir, work_dir)),
    }
}

/// Promotes a wire path string to an absolute path, resolving relative
/// strings against the invocation's work directory.
fn absolute(path: &str, work_dir: &Path) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        work_dir.join(candidate)
    }
}
