//! Target nodes and their typed dependency edges.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::product::Product;

/// The role a source-module target plays when built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// A library module linked into dependents.
    Library,
    /// A module producing an executable entry point.
    Executable,
    /// A test module.
    Test,
}

/// The declared capability of a plugin target.
///
/// The capability must match the action the host requests: a build-tool
/// plugin contributes build and prebuild commands, a command plugin performs
/// a user-invoked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginCapabilityKind {
    /// Contributes build commands during planning.
    BuildTool,
    /// Performs a user-invoked command.
    Command,
}

/// Kind-specific payload of a [`Target`].
#[derive(Debug, Clone)]
pub enum TargetInfo {
    /// A module compiled from sources.
    SourceModule {
        /// Role of the module when built.
        module_kind: ModuleKind,
        /// Name under which dependents import the module.
        module_name: String,
        /// Directory of public headers, when the module vends any.
        public_headers_dir: Option<PathBuf>,
        /// Compiled source files (absolute paths).
        sources: Vec<PathBuf>,
        /// Resource files bundled with the module.
        resources: Vec<PathBuf>,
        /// Files that are neither sources nor resources.
        other_files: Vec<PathBuf>,
    },
    /// A plugin target, compiled and run by the plugin subsystem rather than
    /// linked into the build.
    Plugin {
        /// Declared capability, checked against the requested action.
        capability: PluginCapabilityKind,
        /// Plugin source files (absolute paths).
        sources: Vec<PathBuf>,
    },
    /// A prebuilt binary vended as an artifact archive.
    Binary {
        /// Absolute path to the artifact archive directory.
        artifact_path: PathBuf,
    },
    /// A system-installed library located via its headers.
    System {
        /// Directory containing the public headers.
        public_headers_dir: PathBuf,
    },
}

impl TargetInfo {
    /// Creates an empty source-module payload; populate files with the
    /// `with_*` builders.
    #[must_use]
    pub fn source_module(module_kind: ModuleKind, module_name: impl Into<String>) -> Self {
        Self::SourceModule {
            module_kind,
            module_name: module_name.into(),
            public_headers_dir: None,
            sources: Vec::new(),
            resources: Vec::new(),
            other_files: Vec::new(),
        }
    }

    /// Sets the source files of a source-module payload.
    ///
    /// # Panics
    ///
    /// Panics when called on a non-source-module payload.
    #[must_use]
    pub fn with_sources(mut self, files: Vec<PathBuf>) -> Self {
        match &mut self {
            Self::SourceModule { sources, .. } => *sources = files,
            _ => panic!("with_sources applies to source modules only"),
        }
        self
    }

    /// Sets the resource files of a source-module payload.
    ///
    /// # Panics
    ///
    /// Panics when called on a non-source-module payload.
    #[must_use]
    pub fn with_resources(mut self, files: Vec<PathBuf>) -> Self {
        match &mut self {
            Self::SourceModule { resources, .. } => *resources = files,
            _ => panic!("with_resources applies to source modules only"),
        }
        self
    }

    /// Sets the public headers directory of a source-module payload.
    ///
    /// # Panics
    ///
    /// Panics when called on a non-source-module payload.
    #[must_use]
    pub fn with_public_headers_dir(mut self, dir: PathBuf) -> Self {
        match &mut self {
            Self::SourceModule {
                public_headers_dir, ..
            } => *public_headers_dir = Some(dir),
            _ => panic!("with_public_headers_dir applies to source modules only"),
        }
        self
    }
}

/// A typed dependency edge from a target.
#[derive(Debug, Clone)]
pub enum TargetDependency {
    /// Direct dependency on another target.
    Target(Arc<Target>),
    /// Dependency on a product, typically from another package.
    Product(Arc<Product>),
}

/// A node in the package graph representing a buildable or special-purpose
/// target.
#[derive(Debug)]
pub struct Target {
    name: String,
    directory: PathBuf,
    dependencies: Vec<TargetDependency>,
    info: TargetInfo,
}

impl Target {
    /// Creates a target with no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>, directory: PathBuf, info: TargetInfo) -> Self {
        Self {
            name: name.into(),
            directory,
            dependencies: Vec::new(),
            info,
        }
    }

    /// Replaces the dependency edges, preserving their order.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<TargetDependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Returns the target name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the directory containing the target.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the dependency edges in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[TargetDependency] {
        &self.dependencies
    }

    /// Returns the kind-specific payload.
    #[must_use]
    pub const fn info(&self) -> &TargetInfo {
        &self.info
    }

    /// Returns `true` when this is a plugin target.
    #[must_use]
    pub const fn is_plugin(&self) -> bool {
        matches!(self.info, TargetInfo::Plugin { .. })
    }

    /// Returns the plugin capability, when this is a plugin target.
    #[must_use]
    pub const fn plugin_capability(&self) -> Option<PluginCapabilityKind> {
        match self.info {
            TargetInfo::Plugin { capability, .. } => Some(capability),
            _ => None,
        }
    }

    /// Returns `true` when this is an executable source module.
    #[must_use]
    pub const fn is_executable(&self) -> bool {
        matches!(
            self.info,
            TargetInfo::SourceModule {
                module_kind: ModuleKind::Executable,
                ..
            }
        )
    }
}
