//! Flattened, ID-based package graph records.
//!
//! The serializer on the host side walks the in-memory graph and produces a
//! [`PluginInput`]: flat arrays of path, target, product, and package records
//! whose cross-references are indices into those arrays. Records appear in
//! serialization order, so every reference points at an already-emitted
//! entry. The plugin runtime reconstructs its view of the graph from these
//! records alone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

macro_rules! wire_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a raw wire index.
            #[must_use]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Returns the index into the corresponding record array.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

wire_id! {
    /// Index into [`PluginInput::paths`].
    PathId
}
wire_id! {
    /// Index into [`PluginInput::targets`].
    TargetId
}
wire_id! {
    /// Index into [`PluginInput::products`].
    ProductId
}
wire_id! {
    /// Index into [`PluginInput::packages`].
    PackageId
}

/// A filesystem path stored as a parent reference plus one component.
///
/// A path whose `base` is absent is a child of the filesystem root. Shared
/// ancestors share records: the same absolute path always maps to the same
/// [`PathId`] within one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePath {
    /// Parent path record, absent for children of the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<PathId>,
    /// Final path component.
    pub subpath: String,
}

/// Classification of a file belonging to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireFileKind {
    /// A compiled source file.
    Source,
    /// A public header.
    Header,
    /// A bundled resource.
    Resource,
    /// Anything else the target carries.
    Unknown,
}

/// A file record inside a target's source module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFile {
    /// Directory containing the file.
    pub base: PathId,
    /// File name within `base`.
    pub name: String,
    /// Role of the file.
    pub kind: WireFileKind,
}

/// A typed dependency edge of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WireDependency {
    /// Dependency on another serialized target.
    #[serde(rename_all = "camelCase")]
    Target {
        /// The depended-upon target.
        target_id: TargetId,
    },
    /// Dependency on a serialized product.
    #[serde(rename_all = "camelCase")]
    Product {
        /// The depended-upon product.
        product_id: ProductId,
    },
}

/// Kind-specific payload of a target record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WireTargetInfo {
    /// A module compiled from the listed files.
    #[serde(rename_all = "camelCase")]
    SourceModule {
        /// Name under which dependents import the module.
        module_name: String,
        /// Public headers directory, when vended.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        public_headers_dir: Option<PathId>,
        /// Sources, resources, and other files, in that order.
        files: Vec<WireFile>,
    },
    /// A prebuilt binary artifact.
    #[serde(rename_all = "camelCase")]
    BinaryLibrary {
        /// Location of the artifact archive.
        path: PathId,
    },
    /// A system-installed library.
    #[serde(rename_all = "camelCase")]
    SystemLibrary {
        /// Directory containing the public headers.
        public_headers_dir: PathId,
    },
}

/// A target record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTarget {
    /// Target name, unique within the graph.
    pub name: String,
    /// Directory containing the target.
    pub directory: PathId,
    /// Dependency edges in declaration order. Edges to targets that were not
    /// serialized are dropped, never faked.
    pub dependencies: Vec<WireDependency>,
    /// Kind-specific payload.
    pub info: WireTargetInfo,
}

/// Linkage of a library product record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LibraryKind {
    /// Always linked statically.
    Static,
    /// Always linked dynamically.
    Dynamic,
    /// Linkage chosen by the build system.
    Automatic,
}

/// Kind-specific payload of a product record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WireProductInfo {
    /// An executable product.
    #[serde(rename_all = "camelCase")]
    Executable {
        /// The single executable target providing the entry point.
        main_target: TargetId,
    },
    /// A library product.
    #[serde(rename_all = "camelCase")]
    Library {
        /// Library linkage.
        kind: LibraryKind,
    },
}

/// A product record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProduct {
    /// Product name.
    pub name: String,
    /// Member targets.
    pub targets: Vec<TargetId>,
    /// Kind-specific payload.
    pub info: WireProductInfo,
}

/// A package record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePackage {
    /// Manifest name.
    pub name: String,
    /// Package root directory.
    pub directory: PathId,
    /// Direct package dependencies.
    pub dependencies: Vec<PackageId>,
    /// Vended products.
    pub products: Vec<ProductId>,
    /// Serialized targets of the package.
    pub targets: Vec<TargetId>,
}

/// The action the host requests of the plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PluginAction {
    /// Ask a build-tool plugin for the commands it contributes to the given
    /// target.
    #[serde(rename_all = "camelCase")]
    CreateBuildToolCommands {
        /// The target being planned.
        target: TargetId,
    },
    /// Ask a command plugin to perform a user-invoked operation.
    #[serde(rename_all = "camelCase")]
    PerformUserCommand {
        /// Targets the user selected.
        targets: Vec<TargetId>,
        /// Arguments the user passed after the command name.
        arguments: Vec<String>,
    },
}

/// The complete input delivered to a plugin for one invocation.
///
/// Arrays are zero-indexed and self-referential by position. The tool map
/// uses a [`BTreeMap`] so repeated serializations of the same input are
/// byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInput {
    /// Deduplicated path records.
    pub paths: Vec<WirePath>,
    /// Serialized targets.
    pub targets: Vec<WireTarget>,
    /// Serialized products.
    pub products: Vec<WireProduct>,
    /// Serialized packages.
    pub packages: Vec<WirePackage>,
    /// The package the plugin belongs to.
    pub root_package_id: PackageId,
    /// Writable directory scoped to this (plugin, target) invocation.
    pub plugin_work_dir_id: PathId,
    /// Directory where built products land.
    pub built_products_dir_id: PathId,
    /// Tools the plugin may invoke, by name.
    pub tool_names_to_path_ids: BTreeMap<String, PathId>,
    /// The requested action.
    pub plugin_action: PluginAction,
}

#[cfg(test)]
mod tests;
