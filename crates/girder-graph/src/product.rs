//! Product nodes vended by packages.

use std::sync::Arc;

use crate::target::Target;

/// Linkage of a library product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryLinking {
    /// Always linked statically.
    Static,
    /// Always linked dynamically.
    Dynamic,
    /// The build system picks the linkage.
    Automatic,
}

/// Kind-specific payload of a [`Product`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductInfo {
    /// An executable product. Exactly one of its targets must be an
    /// executable module.
    Executable,
    /// A library product with the given linkage.
    Library(LibraryLinking),
    /// A product vending a plugin target.
    Plugin,
}

/// A buildable product composed of one or more targets.
#[derive(Debug)]
pub struct Product {
    name: String,
    targets: Vec<Arc<Target>>,
    info: ProductInfo,
}

impl Product {
    /// Creates a product over the given targets.
    #[must_use]
    pub fn new(name: impl Into<String>, targets: Vec<Arc<Target>>, info: ProductInfo) -> Self {
        Self {
            name: name.into(),
            targets,
            info,
        }
    }

    /// Returns the product name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the member targets in declaration order.
    #[must_use]
    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }

    /// Returns the kind-specific payload.
    #[must_use]
    pub const fn info(&self) -> ProductInfo {
        self.info
    }
}
