//! Flattening of the in-memory package graph into the wire input.
//!
//! The serializer walks the graph depth-first from the root package,
//! memoizing every node by `Arc` pointer identity so shared nodes serialize
//! exactly once. IDs are assigned in append order, which fixes them for a
//! given graph: the same input graph always produces the same IDs and the
//! same bytes.
//!
//! Plugin targets are deliberately not representable on the wire; they get
//! no ID, and dependency edges pointing at them are dropped rather than
//! faked. The same applies to plugin products.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use girder_graph::{
    LibraryLinking, Package, Product, ProductInfo, Target, TargetDependency, TargetInfo,
};
use girder_wire::{
    LibraryKind, PackageId, PathId, PluginAction, PluginInput, ProductId, TargetId, WireDependency,
    WireFile, WireFileKind, WirePackage, WirePath, WireProduct, WireProductInfo, WireTarget,
    WireTargetInfo,
};

/// Errors raised while flattening the graph.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// The graph contains a dependency cycle, which violates the DAG
    /// invariant of the resolved graph.
    #[error("dependency cycle detected through '{node}'")]
    DependencyCycle {
        /// Name of a node on the cycle.
        node: String,
    },

    /// An executable product does not have exactly one executable target.
    #[error(
        "executable product '{product}' must have exactly one executable target, found {count}"
    )]
    BrokenExecutableProduct {
        /// Product name.
        product: String,
        /// Number of executable targets found.
        count: usize,
    },

    /// The action references a target that has no wire representation.
    #[error("target '{name}' cannot be represented in the plugin input")]
    UnrepresentableTarget {
        /// Target name.
        name: String,
    },
}

/// The host-side action to translate into the wire action.
#[derive(Debug, Clone)]
pub enum ActionRequest {
    /// Ask a build-tool plugin for the commands it contributes to a target.
    CreateBuildToolCommands {
        /// The target being planned.
        target: Arc<Target>,
    },
    /// Ask a command plugin to perform a user-invoked operation.
    PerformUserCommand {
        /// Targets the user selected.
        targets: Vec<Arc<Target>>,
        /// Arguments the user passed.
        arguments: Vec<String>,
    },
}

/// Flattens the graph reachable from `root` into a [`PluginInput`].
///
/// # Errors
///
/// Returns a [`SerializationError`] when the graph violates a structural
/// invariant or the action references an unrepresentable target.
pub fn serialize_input(
    root: &Arc<Package>,
    work_dir: &Path,
    built_products_dir: &Path,
    tool_paths: &BTreeMap<String, PathBuf>,
    action: &ActionRequest,
) -> Result<PluginInput, SerializationError> {
    let mut state = SerializerState::default();

    let root_package_id = state.serialize_package(root)?;
    let plugin_work_dir_id = state.serialize_path(work_dir);
    let built_products_dir_id = state.serialize_path(built_products_dir);

    let mut tool_names_to_path_ids = BTreeMap::new();
    for (name, path) in tool_paths {
        let id = state.serialize_path(path);
        let _ = tool_names_to_path_ids.insert(name.clone(), id);
    }

    let plugin_action = state.translate_action(action)?;

    Ok(PluginInput {
        paths: state.paths,
        targets: state.targets,
        products: state.products,
        packages: state.packages,
        root_package_id,
        plugin_work_dir_id,
        built_products_dir_id,
        tool_names_to_path_ids,
        plugin_action,
    })
}

/// Arena of wire records plus identity-to-ID maps built during one walk.
#[derive(Default)]
struct SerializerState {
    paths: Vec<WirePath>,
    path_ids: HashMap<PathBuf, PathId>,
    targets: Vec<WireTarget>,
    target_ids: HashMap<usize, Option<TargetId>>,
    products: Vec<WireProduct>,
    product_ids: HashMap<usize, Option<ProductId>>,
    packages: Vec<WirePackage>,
    package_ids: HashMap<usize, PackageId>,
    in_progress: HashSet<usize>,
}

fn identity<T>(node: &Arc<T>) -> usize {
    Arc::as_ptr(node) as usize
}

impl SerializerState {
    /// Returns the ID for an absolute path, serializing its ancestors first
    /// so shared prefixes share records.
    fn serialize_path(&mut self, path: &Path) -> PathId {
        if let Some(id) = self.path_ids.get(path) {
            return *id;
        }

        let root = Path::new("/");
        let (base, subpath) = match path.parent() {
            Some(parent) if parent != root && !parent.as_os_str().is_empty() => {
                let base = self.serialize_path(parent);
                (Some(base), component_name(path))
            }
            Some(_) => (None, component_name(path)),
            None => (None, path.to_string_lossy().into_owned()),
        };

        let id = PathId::new(u32::try_from(self.paths.len()).expect("path count fits in u32"));
        self.paths.push(WirePath { base, subpath });
        let _ = self.path_ids.insert(path.to_path_buf(), id);
        id
    }

    /// Serializes a target, returning `None` for kinds that have no wire
    /// representation.
    fn serialize_target(
        &mut self,
        target: &Arc<Target>,
    ) -> Result<Option<TargetId>, SerializationError> {
        let key = identity(target);
        if let Some(id) = self.target_ids.get(&key) {
            return Ok(*id);
        }
        if !self.in_progress.insert(key) {
            return Err(SerializationError::DependencyCycle {
                node: target.name().to_owned(),
            });
        }

        let mut dependencies = Vec::new();
        for dependency in target.dependencies() {
            match dependency {
                TargetDependency::Target(dep) => {
                    if let Some(id) = self.serialize_target(dep)? {
                        dependencies.push(WireDependency::Target { target_id: id });
                    }
                }
                TargetDependency::Product(dep) => {
                    if let Some(id) = self.serialize_product(dep)? {
                        dependencies.push(WireDependency::Product { product_id: id });
                    }
                }
            }
        }

        let info = match target.info() {
            TargetInfo::SourceModule {
                module_name,
                public_headers_dir,
                sources,
                resources,
                other_files,
                ..
            } => {
                let mut files = Vec::new();
                self.serialize_files(sources, WireFileKind::Source, &mut files);
                self.serialize_files(resources, WireFileKind::Resource, &mut files);
                self.serialize_files(other_files, WireFileKind::Unknown, &mut files);
                let public_headers_dir = public_headers_dir
                    .as_deref()
                    .map(|dir| self.serialize_path(dir));
                Some(WireTargetInfo::SourceModule {
                    module_name: module_name.clone(),
                    public_headers_dir,
                    files,
                })
            }
            TargetInfo::Binary { artifact_path } => Some(WireTargetInfo::BinaryLibrary {
                path: self.serialize_path(artifact_path),
            }),
            TargetInfo::System { public_headers_dir } => Some(WireTargetInfo::SystemLibrary {
                public_headers_dir: self.serialize_path(public_headers_dir),
            }),
            TargetInfo::Plugin { .. } => None,
        };

        let assigned = match info {
            Some(info) => {
                let directory = self.serialize_path(target.directory());
                let id =
                    TargetId::new(u32::try_from(self.targets.len()).expect("target count fits"));
                self.targets.push(WireTarget {
                    name: target.name().to_owned(),
                    directory,
                    dependencies,
                    info,
                });
                Some(id)
            }
            None => None,
        };

        let _ = self.in_progress.remove(&key);
        let _ = self.target_ids.insert(key, assigned);
        Ok(assigned)
    }

    fn serialize_files(&mut self, files: &[PathBuf], kind: WireFileKind, out: &mut Vec<WireFile>) {
        for file in files {
            let base = match file.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => self.serialize_path(parent),
                _ => self.serialize_path(Path::new("/")),
            };
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            out.push(WireFile { base, name, kind });
        }
    }

    /// Serializes a product, returning `None` for plugin products.
    fn serialize_product(
        &mut self,
        product: &Arc<Product>,
    ) -> Result<Option<ProductId>, SerializationError> {
        let key = identity(product);
        if let Some(id) = self.product_ids.get(&key) {
            return Ok(*id);
        }
        if !self.in_progress.insert(key) {
            return Err(SerializationError::DependencyCycle {
                node: product.name().to_owned(),
            });
        }

        let assigned = if product.info() == ProductInfo::Plugin {
            // Plugin products have no wire form, but their member targets may
            // still be reachable elsewhere; walking them keeps ID assignment
            // independent of which edge reaches them first.
            for target in product.targets() {
                let _ = self.serialize_target(target)?;
            }
            None
        } else {
            let mut member_ids = Vec::new();
            let mut executable_ids = Vec::new();
            for target in product.targets() {
                if let Some(id) = self.serialize_target(target)? {
                    member_ids.push(id);
                    if target.is_executable() {
                        executable_ids.push(id);
                    }
                }
            }

            let info = match product.info() {
                ProductInfo::Executable => {
                    if executable_ids.len() != 1 {
                        return Err(SerializationError::BrokenExecutableProduct {
                            product: product.name().to_owned(),
                            count: executable_ids.len(),
                        });
                    }
                    WireProductInfo::Executable {
                        main_target: executable_ids[0],
                    }
                }
                ProductInfo::Library(linking) => WireProductInfo::Library {
                    kind: match linking {
                        LibraryLinking::Static => LibraryKind::Static,
                        LibraryLinking::Dynamic => LibraryKind::Dynamic,
                        LibraryLinking::Automatic => LibraryKind::Automatic,
                    },
                },
                ProductInfo::Plugin => unreachable!("plugin products handled above"),
            };

            let id = ProductId::new(u32::try_from(self.products.len()).expect("product count fits"));
            self.products.push(WireProduct {
                name: product.name().to_owned(),
                targets: member_ids,
                info,
            });
            Some(id)
        };

        let _ = self.in_progress.remove(&key);
        let _ = self.product_ids.insert(key, assigned);
        Ok(assigned)
    }

    /// Serializes a package after its dependencies, products, and targets,
    /// so every reference in the record points at an earlier entry.
    fn serialize_package(
        &mut self,
        package: &Arc<Package>,
    ) -> Result<PackageId, SerializationError> {
        let key = identity(package);
        if let Some(id) = self.package_ids.get(&key) {
            return Ok(*id);
        }
        if !self.in_progress.insert(key) {
            return Err(SerializationError::DependencyCycle {
                node: package.name().to_owned(),
            });
        }

        let mut dependency_ids = Vec::new();
        for dependency in package.dependencies() {
            dependency_ids.push(self.serialize_package(dependency)?);
        }

        let mut product_ids = Vec::new();
        for product in package.products() {
            if let Some(id) = self.serialize_product(product)? {
                product_ids.push(id);
            }
        }

        let mut target_ids = Vec::new();
        for target in package.targets() {
            if let Some(id) = self.serialize_target(target)? {
                target_ids.push(id);
            }
        }

        let directory = self.serialize_path(package.directory());
        let id = PackageId::new(u32::try_from(self.packages.len()).expect("package count fits"));
        self.packages.push(WirePackage {
            name: package.name().to_owned(),
            directory,
            dependencies: dependency_ids,
            products: product_ids,
            targets: target_ids,
        });

        let _ = self.in_progress.remove(&key);
        let _ = self.package_ids.insert(key, id);
        Ok(id)
    }

    /// Translates the host action, resolving target references through the
    /// memoized walk.
    fn translate_action(
        &mut self,
        action: &ActionRequest,
    ) -> Result<PluginAction, SerializationError> {
        match action {
            ActionRequest::CreateBuildToolCommands { target } => {
                let id = self.require_target(target)?;
                Ok(PluginAction::CreateBuildToolCommands { target: id })
            }
            ActionRequest::PerformUserCommand { targets, arguments } => {
                let ids = targets
                    .iter()
                    .map(|target| self.require_target(target))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(PluginAction::PerformUserCommand {
                    targets: ids,
                    arguments: arguments.clone(),
                })
            }
        }
    }

    fn require_target(&mut self, target: &Arc<Target>) -> Result<TargetId, SerializationError> {
        self.serialize_target(target)?
            .ok_or_else(|| SerializationError::UnrepresentableTarget {
                name: target.name().to_owned(),
            })
    }
}

/// Returns the final component of a path as a string.
fn component_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.to_string_lossy().into_owned(),
        |n| n.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
mod tests;
