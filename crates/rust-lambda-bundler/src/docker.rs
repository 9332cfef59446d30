//! Docker invocation assembly
//!
//! Turns options into a [`ContainerInvocation`]. Nothing runs here; the
//! invocation is plain data handed to a [`crate::runner::ContainerRuntime`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use rust_lambda_bundler_props::docker::{
    BundlingFileAccess, BundlingOutput, VolumeConsistency, BUNDLING_INPUT_DIR, BUNDLING_OUTPUT_DIR,
};
use rust_lambda_bundler_props::function::Runtime;
use rust_lambda_bundler_props::{Architecture, BundleError, BundlingOptions, DockerImage, DockerOptions, Result};

use crate::cargo::BinarySelection;
use crate::command::{create_bundling_command, CommandOptions};

/// Target dir used when the source tree is mounted read-only
const STAGED_TARGET_DIR: &str = "/tmp/cargo-target";

/// How a mount's host side is provided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MountKind {
    /// The host path is mounted as-is
    Bind,
    /// A snapshot of the host path is staged first and mounted instead
    StagedCopy,
}

/// A volume mounted into the bundling container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mount {
    pub host_path: PathBuf,
    pub container_path: String,
    pub read_only: bool,
    pub kind: MountKind,
    pub consistency: Option<VolumeConsistency>,
    /// Host directories left out when the mount is staged
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<PathBuf>,
}

impl Mount {
    /// `-v` argument for this mount
    pub fn volume_arg(&self) -> String {
        let mut flags = Vec::new();
        if self.read_only {
            flags.push("ro");
        }
        if let Some(consistency) = self.consistency {
            flags.push(consistency.as_str());
        }

        let mut arg = format!("{}:{}", self.host_path.display(), self.container_path);
        if !flags.is_empty() {
            arg.push(':');
            arg.push_str(&flags.join(","));
        }
        arg
    }
}

/// Fully assembled container build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerInvocation {
    pub image: DockerImage,
    pub command: Vec<String>,
    pub entrypoint: Option<Vec<String>>,
    pub working_directory: String,
    pub environment: BTreeMap<String, String>,
    pub mounts: Vec<Mount>,
    pub user: Option<String>,
    pub security_opt: Option<String>,
    pub network: Option<String>,
    pub volumes_from: Vec<String>,
    pub output_type: BundlingOutput,
    pub file_access: BundlingFileAccess,
}

/// Inputs to [`assemble_container_invocation`]
#[derive(Debug, Clone, Copy)]
pub struct AssemblyRequest<'a> {
    pub bundling: &'a BundlingOptions,
    pub docker: &'a DockerOptions,
    pub image: &'a DockerImage,
    /// Resolved `Cargo.toml` on the host
    pub manifest_path: &'a Path,
    /// Host directory the output mount points at
    pub output_dir: &'a Path,
    pub binary: &'a BinarySelection,
    pub architecture: Architecture,
    pub runtime: Option<Runtime>,
    pub lambda_extension: bool,
    /// Host directories under the source root that are not build inputs
    pub excluded_roots: &'a [PathBuf],
}

/// Assemble the container invocation for a unit
///
/// The source tree is mounted at the working directory, `/asset-input`
/// unless overridden, and the generated build command reads it from there.
pub fn assemble_container_invocation(req: &AssemblyRequest<'_>) -> Result<ContainerInvocation> {
    let source_root = req.manifest_path.parent().ok_or_else(|| {
        BundleError::ManifestError(format!(
            "manifest path {} has no parent directory",
            req.manifest_path.display()
        ))
    })?;

    let file_access = req.docker.file_access();
    let working_directory = req
        .docker
        .working_directory
        .clone()
        .unwrap_or_else(|| BUNDLING_INPUT_DIR.to_string());

    let command = match &req.docker.command {
        Some(command) => command.clone(),
        None => {
            let script = create_bundling_command(&CommandOptions {
                input_dir: &working_directory,
                output_dir: BUNDLING_OUTPUT_DIR,
                binary: req.binary,
                architecture: req.architecture,
                runtime: req.runtime,
                lambda_extension: req.lambda_extension,
                hooks: req.bundling.command_hooks.as_deref(),
            });
            vec!["bash".to_string(), "-c".to_string(), script]
        }
    };

    let source_mount = match file_access {
        BundlingFileAccess::BindMount => Mount {
            host_path: source_root.to_path_buf(),
            container_path: working_directory.clone(),
            read_only: false,
            kind: MountKind::Bind,
            consistency: Some(VolumeConsistency::Delegated),
            excludes: Vec::new(),
        },
        BundlingFileAccess::VolumeCopy => Mount {
            host_path: source_root.to_path_buf(),
            container_path: working_directory.clone(),
            read_only: true,
            kind: MountKind::StagedCopy,
            consistency: None,
            excludes: req
                .excluded_roots
                .iter()
                .filter(|r| r.starts_with(source_root))
                .cloned()
                .collect(),
        },
    };

    let output_mount = Mount {
        host_path: req.output_dir.to_path_buf(),
        container_path: BUNDLING_OUTPUT_DIR.to_string(),
        read_only: false,
        kind: MountKind::Bind,
        consistency: Some(VolumeConsistency::Delegated),
        excludes: Vec::new(),
    };

    let mut mounts = vec![source_mount, output_mount];
    mounts.extend(req.docker.volumes.iter().map(|v| Mount {
        host_path: PathBuf::from(&v.host_path),
        container_path: v.container_path.clone(),
        read_only: v.read_only,
        kind: MountKind::Bind,
        consistency: v.consistency,
        excludes: Vec::new(),
    }));

    let mut environment = req.bundling.environment.clone();
    if file_access == BundlingFileAccess::VolumeCopy {
        // The source mount is read-only, cargo needs somewhere to write
        environment
            .entry("CARGO_TARGET_DIR".to_string())
            .or_insert_with(|| STAGED_TARGET_DIR.to_string());
    }

    Ok(ContainerInvocation {
        image: req.image.clone(),
        command,
        entrypoint: req.docker.entrypoint.clone(),
        working_directory,
        environment,
        mounts,
        user: req.docker.user.clone(),
        security_opt: req.docker.security_opt.clone(),
        network: req.docker.network.clone(),
        volumes_from: req.docker.volumes_from.clone(),
        output_type: req.docker.output(),
        file_access,
    })
}

impl ContainerInvocation {
    /// The source tree mount, at the working directory
    pub fn source_mount(&self) -> Option<&Mount> {
        self.mounts
            .iter()
            .find(|m| m.container_path == self.working_directory)
    }

    /// Arguments for `docker`, starting at `run`
    pub fn docker_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];

        if let Some(user) = &self.user {
            args.push("-u".to_string());
            args.push(user.clone());
        }

        for mount in &self.mounts {
            args.push("-v".to_string());
            args.push(mount.volume_arg());
        }

        for from in &self.volumes_from {
            args.push("--volumes-from".to_string());
            args.push(from.clone());
        }

        for (key, value) in &self.environment {
            args.push("--env".to_string());
            args.push(format!("{}={}", key, value));
        }

        if let Some(network) = &self.network {
            args.push("--network".to_string());
            args.push(network.clone());
        }

        if let Some(security_opt) = &self.security_opt {
            args.push("--security-opt".to_string());
            args.push(security_opt.clone());
        }

        args.push("-w".to_string());
        args.push(self.working_directory.clone());

        // docker takes a single entrypoint binary; the rest goes before the command
        let mut entry_args = Vec::new();
        if let Some((first, rest)) = self.entrypoint.as_deref().and_then(|e| e.split_first()) {
            args.push("--entrypoint".to_string());
            args.push(first.clone());
            entry_args.extend(rest.iter().cloned());
        }

        args.push(self.image.image.clone());
        args.extend(entry_args);
        args.extend(self.command.iter().cloned());
        args
    }
}
