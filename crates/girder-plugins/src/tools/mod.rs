//! Discovery of the tools a plugin may invoke.
//!
//! A plugin declares the executables it needs as dependencies. Two kinds
//! exist: **built tools**, executables produced by another target in the
//! graph and addressed relative to the built-products directory, and
//! **vended tools**, prebuilt executables shipped inside a binary target's
//! artifact archive and addressed absolutely after matching the archive's
//! variants against the host triple.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use girder_graph::{ProductInfo, Target, TargetDependency, TargetInfo};

/// Tracing target for tool discovery.
const TOOLS_TARGET: &str = "girder_plugins::tools";

/// Manifest file name inside an artifact archive.
pub const ARTIFACT_MANIFEST_FILENAME: &str = "info.json";

/// Errors raised while resolving a plugin's accessible tools.
#[derive(Debug, Error)]
pub enum ToolResolutionError {
    /// The artifact manifest could not be read.
    #[error("could not read artifact manifest {path}: {source}")]
    ManifestUnreadable {
        /// Manifest path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The artifact manifest is not valid JSON for the expected schema.
    #[error("artifact manifest {path} is malformed: {source}")]
    ManifestMalformed {
        /// Manifest path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// A tool a plugin may invoke, with its resolved absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessibleTool {
    /// Name the plugin refers to the tool by.
    pub name: String,
    /// Absolute path on the host.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ArtifactManifest {
    artifacts: BTreeMap<String, ArtifactEntry>,
}

#[derive(Debug, Deserialize)]
struct ArtifactEntry {
    variants: Vec<ArtifactVariant>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactVariant {
    path: String,
    #[serde(default)]
    supported_triples: Vec<String>,
}

/// Parses an artifact archive and returns the executables usable on the
/// host.
///
/// A variant with an empty `supportedTriples` list is treated as universal.
/// Artifacts with no compatible variant are skipped rather than failing the
/// invocation; a build on another platform may still use them.
pub fn vended_tools(
    artifact_dir: &Path,
    host_triple: &str,
) -> Result<Vec<AccessibleTool>, ToolResolutionError> {
    let manifest_path = artifact_dir.join(ARTIFACT_MANIFEST_FILENAME);
    let raw = std::fs::read_to_string(&manifest_path).map_err(|source| {
        ToolResolutionError::ManifestUnreadable {
            path: manifest_path.clone(),
            source,
        }
    })?;
    let manifest: ArtifactManifest =
        serde_json::from_str(&raw).map_err(|source| ToolResolutionError::ManifestMalformed {
            path: manifest_path,
            source,
        })?;

    let mut tools = Vec::new();
    for (name, entry) in manifest.artifacts {
        let variant = entry.variants.iter().find(|variant| {
            variant.supported_triples.is_empty()
                || variant.supported_triples.iter().any(|t| t == host_triple)
        });
        match variant {
            Some(variant) => tools.push(AccessibleTool {
                name,
                path: artifact_dir.join(&variant.path),
            }),
            None => {
                warn!(
                    target: TOOLS_TARGET,
                    artifact = name.as_str(),
                    host_triple,
                    "artifact has no variant for the host, skipping"
                );
            }
        }
    }
    Ok(tools)
}

/// Collects the tools accessible to one plugin from its dependency edges.
///
/// Built tools resolve to `built_products_dir/<name>`; vended tools are
/// already absolute inside their artifact archive.
pub fn accessible_tools(
    plugin: &Target,
    built_products_dir: &Path,
    host_triple: &str,
) -> Result<Vec<AccessibleTool>, ToolResolutionError> {
    let mut tools = Vec::new();
    for dependency in plugin.dependencies() {
        match dependency {
            TargetDependency::Target(target) => match target.info() {
                TargetInfo::Binary { artifact_path } => {
                    tools.extend(vended_tools(artifact_path, host_triple)?);
                }
                _ if target.is_executable() => {
                    tools.push(AccessibleTool {
                        name: target.name().to_owned(),
                        path: built_products_dir.join(target.name()),
                    });
                }
                _ => {}
            },
            TargetDependency::Product(product) => {
                if product.info() == ProductInfo::Executable {
                    tools.push(AccessibleTool {
                        name: product.name().to_owned(),
                        path: built_products_dir.join(product.name()),
                    });
                }
            }
        }
    }
    Ok(tools)
}

#[cfg(test)]
mod tests;
