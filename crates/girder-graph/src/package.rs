//! Package nodes and identities.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::product::Product;
use crate::target::Target;

/// Canonical identity of a package, stable across graph rebuilds.
///
/// Identities are lower-cased names as resolved by the dependency layer and
/// are used for cache and work-directory layout, so they must be usable as a
/// single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageIdentity(String);

impl PackageIdentity {
    /// Creates an identity from its canonical string form.
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A package in the resolved graph.
///
/// Dependencies, products, and targets preserve manifest declaration order;
/// consumers that need a canonical ordering sort explicitly.
#[derive(Debug)]
pub struct Package {
    identity: PackageIdentity,
    name: String,
    directory: PathBuf,
    dependencies: Vec<Arc<Package>>,
    products: Vec<Arc<Product>>,
    targets: Vec<Arc<Target>>,
}

impl Package {
    /// Creates a package with no dependencies, products, or targets.
    #[must_use]
    pub fn new(identity: PackageIdentity, name: impl Into<String>, directory: PathBuf) -> Self {
        Self {
            identity,
            name: name.into(),
            directory,
            dependencies: Vec::new(),
            products: Vec::new(),
            targets: Vec::new(),
        }
    }

    /// Replaces the package dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<Arc<Package>>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Replaces the vended products.
    #[must_use]
    pub fn with_products(mut self, products: Vec<Arc<Product>>) -> Self {
        self.products = products;
        self
    }

    /// Replaces the package targets.
    #[must_use]
    pub fn with_targets(mut self, targets: Vec<Arc<Target>>) -> Self {
        self.targets = targets;
        self
    }

    /// Returns the canonical identity.
    #[must_use]
    pub const fn identity(&self) -> &PackageIdentity {
        &self.identity
    }

    /// Returns the manifest name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the package root directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the direct package dependencies.
    #[must_use]
    pub fn dependencies(&self) -> &[Arc<Package>] {
        &self.dependencies
    }

    /// Returns the vended products.
    #[must_use]
    pub fn products(&self) -> &[Arc<Product>] {
        &self.products
    }

    /// Returns the package targets.
    #[must_use]
    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }
}
