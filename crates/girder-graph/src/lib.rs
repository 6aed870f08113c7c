//! In-memory package graph model for the Girder build system.
//!
//! The graph is a DAG of packages, products, and targets produced by the
//! manifest layer and consumed by the plugin subsystem. Nodes are shared via
//! [`std::sync::Arc`]: the same package, product, or target may be reachable
//! along several dependency edges, and consumers that need a flat view (such
//! as the plugin input serializer) deduplicate by `Arc` pointer identity.
//!
//! # Core types
//!
//! - [`Package`] - A package with its declared dependencies, products, and
//!   targets
//! - [`Product`] - A buildable product vending one or more targets
//! - [`Target`] - A buildable or special-purpose target with typed
//!   dependency edges
//!
//! # Example
//!
//! ```
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use girder_graph::{ModuleKind, Package, PackageIdentity, Target, TargetInfo};
//!
//! let target = Arc::new(Target::new(
//!     "Core",
//!     PathBuf::from("/pkg/Sources/Core"),
//!     TargetInfo::source_module(ModuleKind::Library, "Core")
//!         .with_sources(vec![PathBuf::from("/pkg/Sources/Core/lib.rs")]),
//! ));
//! let package = Package::new(
//!     PackageIdentity::new("pkg"),
//!     "pkg",
//!     PathBuf::from("/pkg"),
//! )
//! .with_targets(vec![target]);
//! assert_eq!(package.targets().len(), 1);
//! ```

mod package;
mod product;
mod target;

pub use package::{Package, PackageIdentity};
pub use product::{LibraryLinking, Product, ProductInfo};
pub use target::{ModuleKind, PluginCapabilityKind, Target, TargetDependency, TargetInfo};
