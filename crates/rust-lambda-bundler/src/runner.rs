//! Build runners
//!
//! Executes what the rest of the crate only describes: container
//! invocations through the Docker CLI and local builds through the host shell.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

use rust_lambda_bundler_props::{BundleError, Result};

use crate::docker::{ContainerInvocation, MountKind};
use crate::hash::{entry_kind, EntryKind, Exclusions, SOURCE_EXCLUDES};

/// Result of a finished container run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerOutput {
    pub status: i32,
    /// Combined stdout and stderr
    pub output: String,
}

/// Runs assembled container invocations
pub trait ContainerRuntime: Send + Sync {
    /// Run to completion; a non-zero exit is a [`BundleError::BuildError`]
    fn run(&self, invocation: &ContainerInvocation) -> Result<ContainerOutput>;
}

/// Runtime backed by the `docker` CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    docker_bin: String,
}

impl DockerCli {
    pub fn new(docker_bin: impl Into<String>) -> Self {
        Self {
            docker_bin: docker_bin.into(),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ContainerRuntime for DockerCli {
    fn run(&self, invocation: &ContainerInvocation) -> Result<ContainerOutput> {
        // Staging dirs must outlive the container run
        let mut staged: Vec<TempDir> = Vec::new();
        let mut invocation = invocation.clone();

        for mount in invocation
            .mounts
            .iter_mut()
            .filter(|m| m.kind == MountKind::StagedCopy)
        {
            let dir = tempfile::Builder::new()
                .prefix("cargo-lambda-staged-")
                .tempdir()?;
            let exclusions = Exclusions {
                names: SOURCE_EXCLUDES,
                roots: &mount.excludes,
            };
            copy_tree(&mount.host_path, dir.path(), &exclusions)?;
            tracing::debug!(
                from = %mount.host_path.display(),
                to = %dir.path().display(),
                "Staged source copy"
            );
            mount.host_path = dir.path().to_path_buf();
            mount.kind = MountKind::Bind;
            staged.push(dir);
        }

        let args = invocation.docker_args();
        tracing::info!(image = %invocation.image, "Running container build");
        tracing::debug!(args = ?args, "docker invocation");

        let output = Command::new(&self.docker_bin)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(&self.docker_bin, e))?;

        let (status, output) = finish(output, "docker run")?;
        Ok(ContainerOutput { status, output })
    }
}

/// Run `command` through the host shell in `cwd`
///
/// Returns the combined output; a non-zero exit is a build error.
pub fn run_local(command: &str, env: &BTreeMap<String, String>, cwd: &Path) -> Result<String> {
    let (shell, flag) = host_shell();
    tracing::info!(cwd = %cwd.display(), "Running local build");
    tracing::debug!(command, "local build command");

    let output = Command::new(shell)
        .arg(flag)
        .arg(command)
        .envs(env)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error(shell, e))?;

    finish(output, "local build").map(|(_, output)| output)
}

#[cfg(windows)]
fn host_shell() -> (&'static str, &'static str) {
    ("cmd", "/C")
}

#[cfg(not(windows))]
fn host_shell() -> (&'static str, &'static str) {
    ("bash", "-c")
}

fn spawn_error(program: &str, e: std::io::Error) -> BundleError {
    if e.kind() == ErrorKind::NotFound {
        BundleError::build(format!("`{}` was not found on this host", program))
    } else {
        BundleError::build(format!("failed to start `{}`: {}", program, e))
    }
}

fn finish(output: Output, what: &str) -> Result<(i32, String)> {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    let status = output.status.code();
    if !output.status.success() {
        return Err(BundleError::BuildError {
            message: match status {
                Some(code) => format!("{} exited with status {}", what, code),
                None => format!("{} was terminated by a signal", what),
            },
            status,
            output: combined,
        });
    }

    Ok((status.unwrap_or(0), combined))
}

/// Recursively copy `from` into `to`, skipping excluded directories
///
/// Linked files are copied as files; linked directories are left out.
fn copy_tree(from: &Path, to: &Path, exclusions: &Exclusions<'_>) -> Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let path = entry.path();
        let target = to.join(entry.file_name());

        match entry_kind(&entry)? {
            EntryKind::Dir if exclusions.skips(&entry) => {}
            EntryKind::Dir => copy_tree(&path, &target, exclusions)?,
            EntryKind::File => {
                fs::copy(&path, &target)?;
            }
            EntryKind::Other => {}
        }
    }
    Ok(())
}
