//! Sandboxed execution of compiled plugins with framed message exchange.
//!
//! The runner owns one subprocess and its three pipes for the duration of an
//! invocation. Stdin carries framed host messages, stdout carries framed
//! plugin messages, and stderr is free-form text drained by a dedicated
//! reader thread that forwards chunks to the caller's [`TextSink`] in
//! arrival order.
//!
//! The conversation is strictly shaped: the host sends `performAction`
//! first, then only answers plugin-initiated requests, and stops reading at
//! the plugin's `actionComplete` (or EOF). The invocation succeeds only when
//! the subprocess exits with code 0 *and* a terminal message arrived;
//! failure variants carry the command line and the captured stderr.
//!
//! Cancellation closes the plugin's stdin, which a well-behaved plugin
//! answers by exiting at EOF. A reaper escalates to `SIGTERM` and then
//! `SIGKILL` if the process lingers past the grace period.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ChildStdin;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use girder_sandbox::{Sandbox, SandboxCommand, SandboxMode, SandboxProfile};
use girder_wire::{
    BuildCommand, Diagnostic, FrameError, HostToPluginMessage, PluginInput, PluginToHostMessage,
    PrebuildCommand, read_frame, write_message,
};

use crate::compiler::INCREMENTAL_DIR_ENV;
use crate::error::PluginHostError;

/// Tracing target for runner operations.
const RUNNER_TARGET: &str = "girder_plugins::runner";

/// How long a cancelled plugin gets to exit before each escalation step.
const CANCELLATION_GRACE: Duration = Duration::from_secs(5);

/// Poll interval while waiting for a cancelled plugin to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Receives free-form plugin stderr text as it arrives.
///
/// Calls are serialized by the single stderr reader thread of the
/// invocation; a sink never sees interleaved chunks.
pub trait TextSink: Send {
    /// Receives one chunk of stderr text.
    fn receive_text(&mut self, chunk: &str);
}

impl<F: FnMut(&str) + Send> TextSink for F {
    fn receive_text(&mut self, chunk: &str) {
        self(chunk);
    }
}

/// Everything a plugin sent back over one successful conversation.
#[derive(Debug, Clone, Default)]
pub struct InvocationOutcome {
    /// Build commands in emission order.
    pub build_commands: Vec<BuildCommand>,
    /// Prebuild commands in emission order.
    pub prebuild_commands: Vec<PrebuildCommand>,
    /// Plugin-authored diagnostics in emission order.
    pub diagnostics: Vec<Diagnostic>,
    /// The `success` flag of the terminal message.
    pub success: bool,
}

/// Cooperative cancellation handle for one invocation.
///
/// [`CancellationToken::cancel`] closes the plugin's stdin so its message
/// loop terminates at EOF, then escalates signals if the process does not
/// exit within the grace period. A cancelled invocation discards any
/// collected output and fails with
/// [`PluginHostError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    exited: AtomicBool,
    pid: AtomicI32,
    stdin: Mutex<Option<ChildStdin>>,
}

impl CancellationToken {
    /// Creates a token not yet attached to a subprocess.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Cancels the invocation this token is attached to.
    ///
    /// Closes the plugin's stdin and spawns a reaper that sends `SIGTERM`
    /// and then `SIGKILL` if the process outlives the grace periods.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        drop(self.lock_stdin().take());

        let state = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("girder-plugin-reaper".into())
            .spawn(move || escalate_termination(&state));
        if spawned.is_err() {
            warn!(target: RUNNER_TARGET, "could not spawn cancellation reaper");
        }
    }

    fn attach(&self, pid: u32, stdin: ChildStdin) {
        self.inner
            .pid
            .store(i32::try_from(pid).unwrap_or(0), Ordering::SeqCst);
        // A cancel that raced the spawn wins: do not hand the pipe over.
        if self.is_cancelled() {
            drop(stdin);
            return;
        }
        *self.lock_stdin() = Some(stdin);
    }

    /// Runs `f` against the plugin's stdin, returning `Ok(false)` when the
    /// pipe has already been closed.
    fn with_stdin(
        &self,
        f: impl FnOnce(&mut ChildStdin) -> Result<(), FrameError>,
    ) -> Result<bool, FrameError> {
        let mut guard = self.lock_stdin();
        match guard.as_mut() {
            Some(stdin) => f(stdin).map(|()| true),
            None => Ok(false),
        }
    }

    fn close_stdin(&self) {
        drop(self.lock_stdin().take());
    }

    fn mark_exited(&self) {
        self.inner.exited.store(true, Ordering::SeqCst);
    }

    fn lock_stdin(&self) -> std::sync::MutexGuard<'_, Option<ChildStdin>> {
        self.inner
            .stdin
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Signals a cancelled plugin with escalating severity.
fn escalate_termination(state: &CancelState) {
    for signal in [libc::SIGTERM, libc::SIGKILL] {
        let deadline = Instant::now() + CANCELLATION_GRACE;
        while Instant::now() < deadline {
            if state.exited.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
        let pid = state.pid.load(Ordering::SeqCst);
        if pid > 0 && !state.exited.load(Ordering::SeqCst) {
            warn!(target: RUNNER_TARGET, pid, signal, "plugin did not exit, signalling");
            // SAFETY: kill(2) is memory-safe for any pid value; the kernel
            // rejects invalid targets with an error we deliberately ignore.
            unsafe {
                let _ = libc::kill(pid, signal);
            }
        }
    }
}

/// Seam for invoking a compiled plugin, enabling test doubles that do not
/// spawn real processes.
pub trait PluginInvoker {
    /// Runs the plugin executable and exchanges the framed conversation.
    ///
    /// # Errors
    ///
    /// Returns a [`PluginHostError`] describing the spawn, protocol, or exit
    /// failure.
    fn invoke(
        &self,
        executable: &Path,
        cache_dir: &Path,
        writable_dirs: &[PathBuf],
        input: &PluginInput,
        text_sink: Box<dyn TextSink>,
        token: &CancellationToken,
    ) -> Result<InvocationOutcome, PluginHostError>;
}

/// Production [`PluginInvoker`] that spawns the plugin under the sandbox.
#[derive(Debug, Default)]
pub struct SandboxedPluginRunner {
    sandbox_mode: SandboxMode,
}

impl SandboxedPluginRunner {
    /// Creates a runner with sandboxing enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner that spawns plugins unconfined.
    ///
    /// Only for platforms with no native sandbox facility; the plugin can
    /// then write anywhere the host user can.
    #[must_use]
    pub const fn without_sandbox() -> Self {
        Self {
            sandbox_mode: SandboxMode::Disabled,
        }
    }

    fn build_profile(
        &self,
        executable: &Path,
        cache_dir: &Path,
        writable_dirs: &[PathBuf],
    ) -> SandboxProfile {
        let mut profile = SandboxProfile::new()
            .allow_executable(executable)
            .allow_writable_path(cache_dir)
            .scrub_environment_variable(INCREMENTAL_DIR_ENV);
        for dir in writable_dirs {
            profile = profile.allow_writable_path(dir);
        }
        if self.sandbox_mode == SandboxMode::Disabled {
            profile = profile.disabled();
        }
        profile
    }
}

impl PluginInvoker for SandboxedPluginRunner {
    fn invoke(
        &self,
        executable: &Path,
        cache_dir: &Path,
        writable_dirs: &[PathBuf],
        input: &PluginInput,
        text_sink: Box<dyn TextSink>,
        token: &CancellationToken,
    ) -> Result<InvocationOutcome, PluginHostError> {
        let command_line = vec![executable.display().to_string()];

        let profile = self.build_profile(executable, cache_dir, writable_dirs);
        let mut command = SandboxCommand::new(executable);
        command
            .current_dir(cache_dir)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        debug!(
            target: RUNNER_TARGET,
            executable = %executable.display(),
            cache_dir = %cache_dir.display(),
            "spawning plugin"
        );

        let mut child = Sandbox::new(profile).spawn(command).map_err(|err| {
            PluginHostError::SubprocessDidNotStart {
                message: err.to_string(),
                command: command_line.clone(),
            }
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PluginHostError::SubprocessDidNotStart {
                message: "failed to capture stdin".into(),
                command: command_line.clone(),
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PluginHostError::SubprocessDidNotStart {
                message: "failed to capture stdout".into(),
                command: command_line.clone(),
            })?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PluginHostError::SubprocessDidNotStart {
                message: "failed to capture stderr".into(),
                command: command_line.clone(),
            })?;

        token.attach(child.id(), stdin);
        let stderr_reader = spawn_stderr_reader(stderr, text_sink)?;


        let send_result = token.with_stdin(|stdin| {
            write_message(
                stdin,
                &HostToPluginMessage::PerformAction {
                    input: input.clone(),
                },
            )
        });

        let mut state = SessionState::default();
        let session_result = match send_result {
            // A plugin that exits before reading its input closes the pipe;
            // the exit status and missing terminal message characterise that
            // failure better than the broken pipe does.
            Err(FrameError::Io(err)) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
            Err(err) => Err(PluginHostError::Frame(err)),
            Ok(_) => drive_session(&mut BufReader::new(stdout), token, &mut state),
        };

        // The conversation is over either way; no further host messages.
        token.close_stdin();

        if session_result.is_err() && !token.is_cancelled() {
            let _ = child.kill();
        }

        let stderr_text = stderr_reader.join().unwrap_or_default();
        let status = child.wait().map_err(FrameError::Io);
        token.mark_exited();

        if token.is_cancelled() {
            debug!(target: RUNNER_TARGET, "plugin invocation cancelled, output discarded");
            return Err(PluginHostError::Cancelled {
                command: command_line,
            });
        }

        let status = status?;
        if !status.success() {
            return Err(PluginHostError::SubprocessFailed {
                exit: status,
                command: command_line,
                stderr: stderr_text,
            });
        }

        session_result?;

        match state.terminal {
            Some(success) => Ok(InvocationOutcome {
                build_commands: state.build_commands,
                prebuild_commands: state.prebuild_commands,
                diagnostics: state.diagnostics,
                success,
            }),
            None => Err(PluginHostError::MissingPluginOutput {
                message: "plugin exited without sending a terminal message".into(),
                command: command_line,
                stderr: stderr_text,
            }),
        }
    }
}

#[derive(Default)]
struct SessionState {
    build_commands: Vec<BuildCommand>,
    prebuild_commands: Vec<PrebuildCommand>,
    diagnostics: Vec<Diagnostic>,
    terminal: Option<bool>,
}

/// Reads plugin messages until the terminal message or EOF.
///
/// Commands and diagnostics are accumulated in emission order. A
/// plugin-initiated request is answered inline on stdin; this host supports
/// none, so every request gets an error response.
fn drive_session<R: Read>(
    reader: &mut R,
    token: &CancellationToken,
    state: &mut SessionState,
) -> Result<(), PluginHostError> {
    loop {
        let Some(payload) = read_frame(reader)? else {
            return Ok(());
        };
        let message: PluginToHostMessage =
            serde_json::from_slice(&payload).map_err(|source| {
                PluginHostError::DecodingPluginOutputFailed {
                    payload: String::from_utf8_lossy(&payload).into_owned(),
                    source,
                }
            })?;

        match message {
            PluginToHostMessage::EmitDiagnostic { diagnostic } => {
                state.diagnostics.push(diagnostic);
            }
            PluginToHostMessage::DefineBuildCommand {
                config,
                inputs,
                outputs,
            } => {
                state.build_commands.push(BuildCommand {
                    config,
                    inputs,
                    outputs,
                });
            }
            PluginToHostMessage::DefinePrebuildCommand {
                config,
                output_files_directory,
            } => {
                state.prebuild_commands.push(PrebuildCommand {
                    config,
                    output_files_directory,
                });
            }
            PluginToHostMessage::SymbolGraphRequest { target } => {
                debug!(target: RUNNER_TARGET, requested = %target, "answering unsupported request");
                let _ = token.with_stdin(|stdin| {
                    write_message(
                        stdin,
                        &HostToPluginMessage::ErrorResponse {
                            error: format!(
                                "symbol graph generation is not available in this host (target {target})"
                            ),
                        },
                    )
                })?;
            }
            PluginToHostMessage::ActionComplete { success } => {
                state.terminal = Some(success);
                return Ok(());
            }
        }
    }
}

/// Spawns the dedicated stderr reader.
///
/// The sink moves onto the reader thread, which forwards chunks as they
/// arrive and returns the accumulated text for failure payloads. One thread
/// per invocation keeps sink calls serialized.
fn spawn_stderr_reader<R: Read + Send + 'static>(
    mut stderr: R,
    mut sink: Box<dyn TextSink>,
) -> Result<thread::JoinHandle<String>, PluginHostError> {
    thread::Builder::new()
        .name("girder-plugin-stderr".into())
        .spawn(move || {
            let mut collected = String::new();
            let mut buffer = [0u8; 4096];
            loop {
                match stderr.read(&mut buffer) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buffer[..n]);
                        sink.receive_text(&chunk);
                        collected.push_str(&chunk);
                    }
                }
            }
            collected
        })
        .map_err(|err| PluginHostError::Frame(FrameError::Io(err)))
}
