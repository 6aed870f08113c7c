//! Cache-aware compilation of plugin sources into host executables.
//!
//! Plugins are ordinary source files compiled with the host's `rustc` and
//! linked against the precompiled plugin API library. The compiler driver is
//! deliberately forgiving about *compile* failures - they are an expected
//! outcome, reported through the result - and strict about *launch*
//! failures, which are host configuration problems.
//!
//! Compiled executables live in a per-plugin cache slot keyed by a
//! fingerprint of the plugin identity and source set:
//! `<cache_dir>/<fingerprint>/{compiled-plugin, diagnostics.json,
//! invocation-hash}`. A slot is reused when the recorded command-line hash
//! matches and no source is newer than the executable. Callers serialize
//! compilations of the same plugin; the slot is single-writer.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

/// Tracing target for compiler operations.
const COMPILER_TARGET: &str = "girder_plugins::compiler";

/// Environment variable overriding the incremental compilation directory.
///
/// Honoured by compiler invocations when set, and scrubbed from plugin
/// subprocess environments so plugins cannot observe host coordination
/// state.
pub const INCREMENTAL_DIR_ENV: &str = "GIRDER_PLUGIN_INCREMENTAL_DIR";

/// File name of the cached plugin executable within its cache slot.
pub const COMPILED_PLUGIN_FILENAME: &str = "compiled-plugin";

/// Errors that prevent the compiler from being run at all.
///
/// An ordinary compile failure is not an error here; it is reported through
/// [`CompilationResult::executable`] being absent.
#[derive(Debug, Error)]
pub enum CompilerError {
    /// The compiler binary could not be launched.
    #[error("could not launch the plugin compiler: {source}")]
    Launch {
        /// Command line that was attempted.
        command: Vec<String>,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The host triple could not be determined from the compiler.
    #[error("could not determine the host triple: {message}")]
    HostTripleUnavailable {
        /// Description of the probe failure.
        message: String,
    },

    /// The cache directory could not be prepared or written.
    #[error("plugin cache at {path} is not usable: {source}")]
    Cache {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Declared tools version of the package a plugin belongs to.
///
/// The tools version pins the language edition the plugin is compiled with
/// and the plugin API revision it sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolsVersion {
    major: u32,
    minor: u32,
}

impl ToolsVersion {
    /// Creates a tools version.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Returns the language edition plugins of this tools version use.
    #[must_use]
    pub const fn edition(self) -> &'static str {
        match self.major {
            0 | 1 => "2018",
            2 => "2021",
            _ => "2024",
        }
    }

    /// Returns the `--cfg` flag value selecting the plugin API revision.
    #[must_use]
    pub fn api_cfg(self) -> String {
        format!("girder_api_v{}", self.major)
    }
}

impl std::fmt::Display for ToolsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Location of the precompiled plugin API library plugins link against.
#[derive(Debug, Clone)]
pub struct PluginApiLibrary {
    /// Directory searched for the API library's dependencies.
    pub lib_dir: PathBuf,
    /// The API library itself.
    pub rlib_path: PathBuf,
}

/// Outcome of one compiler run (or cache hit).
#[derive(Debug, Clone)]
pub struct CompilationResult {
    /// The built executable; absent when compilation failed.
    pub executable: Option<PathBuf>,
    /// File holding the compiler's structured diagnostics.
    pub diagnostics_file: PathBuf,
    /// The full command line, for reproduction outside the host.
    pub command: Vec<String>,
    /// Raw compiler stderr; empty on a cache hit.
    pub output: String,
    /// Whether the cached executable was reused without running the
    /// compiler.
    pub cached: bool,
    /// The plugin's cache slot; granted to the invocation sandbox.
    pub cache_dir: PathBuf,
}

/// Seam for obtaining a plugin executable, enabling test doubles that do
/// not run a real compiler.
pub trait PluginBuilder {
    /// Compiles (or reuses) the plugin executable.
    ///
    /// # Errors
    ///
    /// Returns a [`CompilerError`] only when the compiler could not be run;
    /// ordinary compile failures report through the result.
    fn build(
        &self,
        plugin_name: &str,
        sources: &[PathBuf],
        tools_version: ToolsVersion,
        cache_dir: &Path,
    ) -> Result<CompilationResult, CompilerError>;
}

/// Compiles plugin sources into per-plugin executables.
#[derive(Debug, Clone)]
pub struct PluginCompiler {
    rustc_path: PathBuf,
    api: PluginApiLibrary,
    host_triple_override: Option<String>,
}

static HOST_TRIPLE: OnceLock<Result<String, String>> = OnceLock::new();

impl PluginCompiler {
    /// Creates a compiler using the given `rustc` and plugin API library.
    #[must_use]
    pub const fn new(rustc_path: PathBuf, api: PluginApiLibrary) -> Self {
        Self {
            rustc_path,
            api,
            host_triple_override: None,
        }
    }

    /// Pins the target triple instead of probing the compiler for it.
    #[must_use]
    pub fn with_host_triple(mut self, triple: impl Into<String>) -> Self {
        self.host_triple_override = Some(triple.into());
        self
    }

    /// Returns the host triple, probing the compiler at most once per
    /// process.
    pub fn host_triple(&self) -> Result<String, CompilerError> {
        if let Some(triple) = &self.host_triple_override {
            return Ok(triple.clone());
        }
        HOST_TRIPLE
            .get_or_init(|| probe_host_triple(&self.rustc_path))
            .clone()
            .map_err(|message| CompilerError::HostTripleUnavailable { message })
    }

    /// Compiles the plugin, reusing the cached executable when nothing
    /// changed.
    ///
    /// # Errors
    ///
    /// Fails only when the compiler cannot be launched or the cache is
    /// unusable. A plugin that does not compile yields a result with
    /// `executable` absent and the diagnostics preserved.
    pub fn compile(
        &self,
        plugin_name: &str,
        sources: &[PathBuf],
        tools_version: ToolsVersion,
        cache_dir: &Path,
    ) -> Result<CompilationResult, CompilerError> {
        let slot = cache_dir.join(cache_slot_name(plugin_name, sources));
        std::fs::create_dir_all(&slot).map_err(|source| CompilerError::Cache {
            path: slot.clone(),
            source,
        })?;

        let executable = slot.join(COMPILED_PLUGIN_FILENAME);
        let diagnostics_file = slot.join("diagnostics.json");
        let hash_file = slot.join("invocation-hash");

        let command = self.command_line(plugin_name, sources, tools_version, &executable)?;
        let command_hash = {
            let mut hasher = Sha256::new();
            for part in &command {
                hasher.update(part.as_bytes());
                hasher.update([0]);
            }
            format!("{:x}", hasher.finalize())
        };

        if cache_is_fresh(&executable, &hash_file, &command_hash, sources) {
            debug!(
                target: COMPILER_TARGET,
                plugin = plugin_name,
                executable = %executable.display(),
                "reusing cached plugin executable"
            );
            return Ok(CompilationResult {
                executable: Some(executable),
                diagnostics_file,
                command,
                output: String::new(),
                cached: true,
                cache_dir: slot,
            });
        }

        debug!(
            target: COMPILER_TARGET,
            plugin = plugin_name,
            sources = sources.len(),
            "compiling plugin"
        );

        let output = Command::new(&self.rustc_path)
            .args(&command[1..])
            .output()
            .map_err(|source| CompilerError::Launch {
                command: command.clone(),
                source,
            })?;

        std::fs::write(&diagnostics_file, &output.stderr).map_err(|source| {
            CompilerError::Cache {
                path: diagnostics_file.clone(),
                source,
            }
        })?;
        std::fs::write(&hash_file, &command_hash).map_err(|source| CompilerError::Cache {
            path: hash_file.clone(),
            source,
        })?;

        let succeeded = output.status.success();
        debug!(
            target: COMPILER_TARGET,
            plugin = plugin_name,
            success = succeeded,
            "plugin compilation finished"
        );

        Ok(CompilationResult {
            executable: succeeded.then_some(executable),
            diagnostics_file,
            command,
            output: String::from_utf8_lossy(&output.stderr).into_owned(),
            cached: false,
            cache_dir: slot,
        })
    }

    fn command_line(
        &self,
        plugin_name: &str,
        sources: &[PathBuf],
        tools_version: ToolsVersion,
        executable: &Path,
    ) -> Result<Vec<String>, CompilerError> {
        let triple = self.host_triple()?;
        let mut command = vec![
            self.rustc_path.display().to_string(),
            "--edition".into(),
            tools_version.edition().into(),
            "--crate-type".into(),
            "bin".into(),
            "--crate-name".into(),
            crate_name(plugin_name),
            "--target".into(),
            triple,
            "--error-format".into(),
            "json".into(),
            "--cfg".into(),
            tools_version.api_cfg(),
            "-L".into(),
            format!("dependency={}", self.api.lib_dir.display()),
            "--extern".into(),
            format!("girder_runtime={}", self.api.rlib_path.display()),
            "-o".into(),
            executable.display().to_string(),
        ];
        if let Ok(dir) = std::env::var(INCREMENTAL_DIR_ENV) {
            command.push("-C".into());
            command.push(format!("incremental={dir}"));
        }
        for source in sources {
            command.push(source.display().to_string());
        }
        Ok(command)
    }
}

impl PluginBuilder for PluginCompiler {
    fn build(
        &self,
        plugin_name: &str,
        sources: &[PathBuf],
        tools_version: ToolsVersion,
        cache_dir: &Path,
    ) -> Result<CompilationResult, CompilerError> {
        self.compile(plugin_name, sources, tools_version, cache_dir)
    }
}

/// Returns the cache slot directory name for a plugin's source set.
fn cache_slot_name(plugin_name: &str, sources: &[PathBuf]) -> String {
    let mut sorted: Vec<&PathBuf> = sources.iter().collect();
    sorted.sort();
    let mut hasher = Sha256::new();
    hasher.update(plugin_name.as_bytes());
    for source in sorted {
        hasher.update([0]);
        hasher.update(source.display().to_string().as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}", crate_name(plugin_name), &digest[..16])
}

/// Maps a plugin name onto a valid crate name.
fn crate_name(plugin_name: &str) -> String {
    plugin_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Checks whether the cached executable can be reused.
fn cache_is_fresh(
    executable: &Path,
    hash_file: &Path,
    command_hash: &str,
    sources: &[PathBuf],
) -> bool {
    let Ok(exe_mtime) = std::fs::metadata(executable).and_then(|m| m.modified()) else {
        return false;
    };
    if std::fs::read_to_string(hash_file).as_deref() != Ok(command_hash) {
        return false;
    }
    sources.iter().all(|source| {
        std::fs::metadata(source)
            .and_then(|m| m.modified())
            .is_ok_and(|mtime| mtime <= exe_mtime)
    })
}

/// Probes `rustc -vV` for the host triple.
fn probe_host_triple(rustc_path: &Path) -> Result<String, String> {
    let output = Command::new(rustc_path)
        .arg("-vV")
        .output()
        .map_err(|err| format!("failed to run {}: {err}", rustc_path.display()))?;
    if !output.status.success() {
        return Err(format!(
            "{} -vV exited with {}",
            rustc_path.display(),
            output.status
        ));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("host: "))
        .map(str::to_owned)
        .ok_or_else(|| "no 'host:' line in compiler version output".to_owned())
}
