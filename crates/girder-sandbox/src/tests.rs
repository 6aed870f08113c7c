//! Unit tests for sandbox profiles and spawn preflight checks.

use std::process::Stdio;

use rstest::rstest;
use tempfile::TempDir;

use super::*;

#[test]
fn default_profile_is_enabled_and_write_denied() {
    let profile = SandboxProfile::new();
    assert_eq!(profile.mode(), SandboxMode::Enabled);
}

#[test]
fn disabled_profile_keeps_scrub_list() {
    let profile = SandboxProfile::new()
        .scrub_environment_variable("GIRDER_PLUGIN_INCREMENTAL_DIR")
        .disabled();
    assert_eq!(profile.mode(), SandboxMode::Disabled);
}

#[rstest]
#[case::relative("bin/true")]
#[case::bare("true")]
fn relative_program_is_rejected(#[case] program: &str) {
    let sandbox = Sandbox::new(SandboxProfile::new().disabled());
    let command = SandboxCommand::new(program);
    assert!(matches!(
        sandbox.spawn(command),
        Err(SandboxError::ProgramNotAbsolute(_))
    ));
}

#[test]
fn unlisted_program_is_rejected() {
    let sandbox = Sandbox::new(SandboxProfile::new().disabled());
    let command = SandboxCommand::new("/usr/bin/true");
    assert!(matches!(
        sandbox.spawn(command),
        Err(SandboxError::ExecutableNotAuthorised { .. })
    ));
}

#[test]
fn missing_writable_path_is_rejected() {
    let sandbox = Sandbox::new(
        SandboxProfile::new()
            .allow_executable("/usr/bin/true")
            .allow_writable_path("/girder/definitely/not/here"),
    );
    let command = SandboxCommand::new("/usr/bin/true");
    assert!(matches!(
        sandbox.spawn(command),
        Err(SandboxError::MissingPath { .. })
    ));
}

#[test]
#[ignore = "requires Linux user namespace privileges"]
fn enabled_sandbox_confines_writes_to_writable_roots() {
    let allowed = TempDir::new().expect("tempdir");
    let denied = TempDir::new().expect("tempdir");
    let sandbox = Sandbox::new(
        SandboxProfile::new()
            .allow_executable("/bin/sh")
            .allow_writable_path(allowed.path()),
    );

    let inside = allowed.path().join("ok");
    let outside = denied.path().join("blocked");
    let mut command = SandboxCommand::new("/bin/sh");
    command.arg("-c").arg(format!(
        "echo yes > \"{}\"; echo no > \"{}\"",
        inside.display(),
        outside.display()
    ));

    let mut child = sandbox.spawn(command).expect("spawn");
    let _ = child.wait().expect("wait");

    assert!(inside.exists(), "write under the writable root failed");
    assert!(!outside.exists(), "write outside the writable roots escaped");
}

#[test]
fn disabled_mode_spawns_and_scrubs_environment() {
    let work = TempDir::new().expect("tempdir");
    let sandbox = Sandbox::new(
        SandboxProfile::new()
            .allow_executable("/bin/sh")
            .allow_writable_path(work.path())
            .scrub_environment_variable("GIRDER_TEST_SECRET")
            .disabled(),
    );

    let mut command = SandboxCommand::new("/bin/sh");
    command
        .arg("-c")
        .arg("printf '%s' \"${GIRDER_TEST_SECRET-unset}\"")
        .env("GIRDER_TEST_SECRET", "leak")
        .stdout(Stdio::piped());

    let child = sandbox.spawn(command).expect("spawn");
    let output = child.wait_with_output().expect("wait");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "unset");
}
