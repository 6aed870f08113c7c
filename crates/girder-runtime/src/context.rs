//! Reconstructed views over the wire input, and the context handed to
//! plugin code.
//!
//! The runtime never sees the host's object graph; it rebuilds a read-only
//! projection from the flat ID-based records. [`InputView::new`] validates
//! every cross-reference up front so the views can index without failing.

use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use girder_wire::{
    Diagnostic, DiagnosticSeverity, FrameError, HostToPluginMessage, PackageId, PathId,
    PluginAction, PluginInput, PluginToHostMessage, ProductId, TargetId, WireDependency,
    WireFileKind, WirePackage, WireProduct, WireTarget, WireTargetInfo, read_message,
    write_message,
};

use crate::error::PluginFailure;

/// Validated, path-resolved view over one [`PluginInput`].
#[derive(Debug)]
pub struct InputView {
    input: PluginInput,
    resolved_paths: Vec<PathBuf>,
}

impl InputView {
    /// Validates the input and resolves every path record.
    ///
    /// # Errors
    ///
    /// Returns [`PluginFailure::MalformedInputJson`] when any ID is out of
    /// range or a path record references a later record.
    pub fn new(input: PluginInput) -> Result<Self, PluginFailure> {
        let mut resolved_paths: Vec<PathBuf> = Vec::with_capacity(input.paths.len());
        for (index, record) in input.paths.iter().enumerate() {
            let path = match record.base {
                Some(base) if base.index() < index => {
                    resolved_paths[base.index()].join(&record.subpath)
                }
                Some(base) => {
                    return Err(malformed(format!(
                        "path {index} references unserialized base {base}"
                    )));
                }
                None => PathBuf::from("/").join(&record.subpath),
            };
            resolved_paths.push(path);
        }

        let view = Self {
            input,
            resolved_paths,
        };
        view.validate()?;
        Ok(view)
    }

    fn validate(&self) -> Result<(), PluginFailure> {
        let input = &self.input;
        for target in &input.targets {
            self.check_path(target.directory)?;
            match &target.info {
                WireTargetInfo::SourceModule {
                    public_headers_dir,
                    files,
                    ..
                } => {
                    if let Some(dir) = public_headers_dir {
                        self.check_path(*dir)?;
                    }
                    for file in files {
                        self.check_path(file.base)?;
                    }
                }
                WireTargetInfo::BinaryLibrary { path } => self.check_path(*path)?,
                WireTargetInfo::SystemLibrary { public_headers_dir } => {
                    self.check_path(*public_headers_dir)?;
                }
            }
            for dependency in &target.dependencies {
                match dependency {
                    WireDependency::Target { target_id } => self.check_target(*target_id)?,
                    WireDependency::Product { product_id } => self.check_product(*product_id)?,
                }
            }
        }
        for product in &input.products {
            for target in &product.targets {
                self.check_target(*target)?;
            }
        }
        for package in &input.packages {
            self.check_path(package.directory)?;
            for dependency in &package.dependencies {
                if dependency.index() >= input.packages.len() {
                    return Err(malformed(format!("package id {dependency} out of range")));
                }
            }
            for product in &package.products {
                self.check_product(*product)?;
            }
            for target in &package.targets {
                self.check_target(*target)?;
            }
        }

        if input.root_package_id.index() >= input.packages.len() {
            return Err(malformed("root package id out of range".into()));
        }
        self.check_path(input.plugin_work_dir_id)?;
        self.check_path(input.built_products_dir_id)?;
        for id in input.tool_names_to_path_ids.values() {
            self.check_path(*id)?;
        }
        match &input.plugin_action {
            PluginAction::CreateBuildToolCommands { target } => self.check_target(*target)?,
            PluginAction::PerformUserCommand { targets, .. } => {
                for target in targets {
                    self.check_target(*target)?;
                }
            }
        }
        Ok(())
    }

    fn check_path(&self, id: PathId) -> Result<(), PluginFailure> {
        if id.index() < self.resolved_paths.len() {
            Ok(())
        } else {
            Err(malformed(format!("path id {id} out of range")))
        }
    }

    fn check_target(&self, id: TargetId) -> Result<(), PluginFailure> {
        if id.index() < self.input.targets.len() {
            Ok(())
        } else {
            Err(malformed(format!("target id {id} out of range")))
        }
    }

    fn check_product(&self, id: ProductId) -> Result<(), PluginFailure> {
        if id.index() < self.input.products.len() {
            Ok(())
        } else {
            Err(malformed(format!("product id {id} out of range")))
        }
    }

    /// Resolves a path ID to an absolute path.
    #[must_use]
    pub fn path(&self, id: PathId) -> &Path {
        &self.resolved_paths[id.index()]
    }

    /// The writable directory scoped to this invocation.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        self.path(self.input.plugin_work_dir_id)
    }

    /// The directory where built products land.
    #[must_use]
    pub fn built_products_dir(&self) -> &Path {
        self.path(self.input.built_products_dir_id)
    }

    /// The requested action.
    #[must_use]
    pub const fn action(&self) -> &PluginAction {
        &self.input.plugin_action
    }

    /// Looks up a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`PluginFailure::ToolNotFound`] when the host did not
    /// provide the tool.
    pub fn tool(&self, name: &str) -> Result<&Path, PluginFailure> {
        self.input
            .tool_names_to_path_ids
            .get(name)
            .map(|id| self.path(*id))
            .ok_or_else(|| PluginFailure::ToolNotFound(name.to_owned()))
    }

    /// The package the plugin belongs to.
    #[must_use]
    pub fn root_package(&self) -> PackageView<'_> {
        self.package(self.input.root_package_id)
    }

    /// Returns a package view; the ID was validated at construction.
    #[must_use]
    pub fn package(&self, id: PackageId) -> PackageView<'_> {
        PackageView {
            view: self,
            record: &self.input.packages[id.index()],
        }
    }

    /// Returns a target view, or `None` for an out-of-range ID.
    #[must_use]
    pub fn target(&self, id: TargetId) -> Option<TargetView<'_>> {
        self.input.targets.get(id.index()).map(|record| TargetView {
            view: self,
            record,
        })
    }

    /// Returns a product view, or `None` for an out-of-range ID.
    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<ProductView<'_>> {
        self.input
            .products
            .get(id.index())
            .map(|record| ProductView {
                view: self,
                record,
            })
    }
}

fn malformed(message: String) -> PluginFailure {
    PluginFailure::MalformedInputJson(message)
}

/// Read-only view of a target record.
#[derive(Debug, Clone, Copy)]
pub struct TargetView<'a> {
    view: &'a InputView,
    record: &'a WireTarget,
}

impl<'a> TargetView<'a> {
    /// Target name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.record.name
    }

    /// Directory containing the target.
    #[must_use]
    pub fn directory(&self) -> &'a Path {
        self.view.path(self.record.directory)
    }

    /// Dependency edges in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &'a [WireDependency] {
        &self.record.dependencies
    }

    /// Module name, for source-module targets.
    #[must_use]
    pub fn module_name(&self) -> Option<&'a str> {
        match &self.record.info {
            WireTargetInfo::SourceModule { module_name, .. } => Some(module_name),
            _ => None,
        }
    }

    /// Absolute file paths with their kinds, in serialization order.
    #[must_use]
    pub fn files(&self) -> Vec<(PathBuf, WireFileKind)> {
        match &self.record.info {
            WireTargetInfo::SourceModule { files, .. } => files
                .iter()
                .map(|file| (self.view.path(file.base).join(&file.name), file.kind))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The kind-specific payload.
    #[must_use]
    pub const fn info(&self) -> &'a WireTargetInfo {
        &self.record.info
    }
}

/// Read-only view of a product record.
#[derive(Debug, Clone, Copy)]
pub struct ProductView<'a> {
    view: &'a InputView,
    record: &'a WireProduct,
}

impl<'a> ProductView<'a> {
    /// Product name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.record.name
    }

    /// Member target IDs.
    #[must_use]
    pub fn target_ids(&self) -> &'a [TargetId] {
        &self.record.targets
    }

    /// Member targets.
    #[must_use]
    pub fn targets(&self) -> Vec<TargetView<'a>> {
        self.record
            .targets
            .iter()
            .filter_map(|id| self.view.target(*id))
            .collect()
    }
}

/// Read-only view of a package record.
#[derive(Debug, Clone, Copy)]
pub struct PackageView<'a> {
    view: &'a InputView,
    record: &'a WirePackage,
}

impl<'a> PackageView<'a> {
    /// Manifest name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.record.name
    }

    /// Package root directory.
    #[must_use]
    pub fn directory(&self) -> &'a Path {
        self.view.path(self.record.directory)
    }

    /// IDs of the package's serialized targets.
    #[must_use]
    pub fn target_ids(&self) -> &'a [TargetId] {
        &self.record.targets
    }

    /// IDs of the package's serialized products.
    #[must_use]
    pub fn product_ids(&self) -> &'a [ProductId] {
        &self.record.products
    }

    /// Direct package dependencies.
    #[must_use]
    pub fn dependencies(&self) -> Vec<PackageView<'a>> {
        self.record
            .dependencies
            .iter()
            .map(|id| self.view.package(*id))
            .collect()
    }
}

/// The framed connection back to the host.
pub(crate) struct HostLink<'a> {
    pub(crate) reader: &'a mut dyn BufRead,
    pub(crate) writer: &'a mut dyn Write,
}

impl HostLink<'_> {
    pub(crate) fn send(&mut self, message: &PluginToHostMessage) -> Result<(), FrameError> {
        write_message(&mut self.writer, message)
    }

    pub(crate) fn receive(&mut self) -> Result<Option<HostToPluginMessage>, FrameError> {
        read_message(&mut self.reader)
    }
}

/// Everything plugin code may consult or emit during one action.
///
/// Diagnostics accumulate here and are framed to the host after the
/// plugin's commands; emission order is preserved within each category.
pub struct PluginContext<'a> {
    view: &'a InputView,
    link: RefCell<HostLink<'a>>,
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl<'a> PluginContext<'a> {
    pub(crate) fn new(view: &'a InputView, link: HostLink<'a>) -> Self {
        Self {
            view,
            link: RefCell::new(link),
            diagnostics: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn finish(self) -> (HostLink<'a>, Vec<Diagnostic>) {
        (self.link.into_inner(), self.diagnostics.into_inner())
    }

    /// The writable directory scoped to this invocation.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        self.view.work_dir()
    }

    /// The directory where built products land.
    #[must_use]
    pub fn built_products_dir(&self) -> &Path {
        self.view.built_products_dir()
    }

    /// The package the plugin belongs to.
    #[must_use]
    pub fn package(&self) -> PackageView<'a> {
        self.view.root_package()
    }

    /// The full input view.
    #[must_use]
    pub const fn input(&self) -> &'a InputView {
        self.view
    }

    /// Resolves a tool the plugin declared as a dependency.
    ///
    /// # Errors
    ///
    /// Returns [`PluginFailure::ToolNotFound`] when the host did not
    /// provide the tool.
    pub fn tool(&self, name: &str) -> Result<PathBuf, PluginFailure> {
        self.view.tool(name).map(Path::to_path_buf)
    }

    /// Records a diagnostic for the host.
    pub fn emit(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    /// Records an error-severity diagnostic.
    pub fn error(&self, message: impl Into<String>) {
        self.emit(Diagnostic::new(DiagnosticSeverity::Error, message));
    }

    /// Records a warning-severity diagnostic.
    pub fn warning(&self, message: impl Into<String>) {
        self.emit(Diagnostic::new(DiagnosticSeverity::Warning, message));
    }

    /// Records a remark-severity diagnostic.
    pub fn remark(&self, message: impl Into<String>) {
        self.emit(Diagnostic::new(DiagnosticSeverity::Remark, message));
    }

    /// Requests the symbol graph of a target from the host.
    ///
    /// The plugin blocks until the host answers. Hosts without symbol graph
    /// support answer with an error response, surfaced as
    /// [`PluginFailure::RequestRefused`].
    pub fn request_symbol_graph(&self, target: &TargetView<'_>) -> Result<(), PluginFailure> {
        let id = self
            .view
            .input
            .targets
            .iter()
            .position(|record| std::ptr::eq(record, target.record))
            .map(|index| TargetId::new(u32::try_from(index).unwrap_or(u32::MAX)))
            .ok_or_else(|| PluginFailure::Other("target is not part of this input".into()))?;

        let mut link = self.link.borrow_mut();
        link.send(&PluginToHostMessage::SymbolGraphRequest { target: id })
            .map_err(frame_failure)?;
        match link.receive().map_err(frame_failure)? {
            Some(HostToPluginMessage::ErrorResponse { error }) => {
                Err(PluginFailure::RequestRefused(error))
            }
            Some(HostToPluginMessage::PerformAction { .. }) => Err(PluginFailure::Other(
                "host sent a new action while a request was pending".into(),
            )),
            None => Err(PluginFailure::Other(
                "host closed the connection while a request was pending".into(),
            )),
        }
    }
}

fn frame_failure(error: FrameError) -> PluginFailure {
    PluginFailure::Other(format!("host connection failed: {error}"))
}
