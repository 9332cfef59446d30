//! Docker invocation options
//!
//! These mirror the knobs of a `docker run` used for container bundling.
//! Anything left unset falls back to the bundler's own defaults.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::options::BundlingOptions;

/// Default container path the source tree is mounted at
pub const BUNDLING_INPUT_DIR: &str = "/asset-input";

/// Default container path the bundling output is written to
pub const BUNDLING_OUTPUT_DIR: &str = "/asset-output";

/// A container image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DockerImage {
    pub image: String,
}

impl DockerImage {
    /// Reference an image from a registry, e.g. `ghcr.io/cargo-lambda/cargo-lambda`
    pub fn from_registry(image: impl Into<String>) -> Self {
        Self { image: image.into() }
    }
}

impl fmt::Display for DockerImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.image)
    }
}

/// How the source tree is made available to the bundling container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundlingFileAccess {
    /// Mount the host source directory directly
    #[default]
    BindMount,
    /// Stage a snapshot copy; the container never sees live host mutations
    #[serde(alias = "copy")]
    VolumeCopy,
}

/// How the bundling output is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundlingOutput {
    /// A single archive file in the output is used as-is, anything else is a directory
    #[default]
    AutoDiscover,
    /// The output must contain exactly one archive file
    Archived,
    /// The output directory is the asset
    NotArchived,
}

/// Docker volume consistency, only meaningful on macOS hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeConsistency {
    Consistent,
    Delegated,
    Cached,
}

impl VolumeConsistency {
    pub fn as_str(self) -> &'static str {
        match self {
            VolumeConsistency::Consistent => "consistent",
            VolumeConsistency::Delegated => "delegated",
            VolumeConsistency::Cached => "cached",
        }
    }
}

/// An extra volume mounted into the bundling container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerVolume {
    pub host_path: String,
    pub container_path: String,

    #[serde(default)]
    pub read_only: bool,

    #[serde(default)]
    pub consistency: Option<VolumeConsistency>,
}

/// Outcome reported by a local bundling provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalBundlingOutcome {
    /// The provider wrote the asset into the output directory
    Bundled,
    /// The provider cannot build on this host
    Unavailable,
}

/// Pluggable host build, attempted before falling back to Docker
pub trait LocalBundling: Send + Sync + fmt::Debug {
    /// Try to write the bundled asset into `output_dir`
    fn try_bundle(&self, output_dir: &Path, options: &BundlingOptions) -> Result<LocalBundlingOutcome>;
}

/// Additional options for Docker bundling
///
/// `command`, `entrypoint` and `local` override what the bundler would
/// otherwise synthesize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerOptions {
    #[serde(default)]
    pub bundling_file_access: Option<BundlingFileAccess>,

    #[serde(default)]
    pub command: Option<Vec<String>>,

    #[serde(default)]
    pub entrypoint: Option<Vec<String>>,

    /// Local bundling provider (code only)
    #[serde(skip)]
    pub local: Option<Arc<dyn LocalBundling>>,

    #[serde(default)]
    pub network: Option<String>,

    #[serde(default)]
    pub output_type: Option<BundlingOutput>,

    #[serde(default)]
    pub security_opt: Option<String>,

    /// User and group, e.g. `1000:1000`
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub volumes: Vec<DockerVolume>,

    #[serde(default)]
    pub volumes_from: Vec<String>,

    /// Container working directory, `/asset-input` by default; the source
    /// tree is mounted here
    #[serde(default)]
    pub working_directory: Option<String>,
}

impl DockerOptions {
    /// Effective file access mode
    pub fn file_access(&self) -> BundlingFileAccess {
        self.bundling_file_access.unwrap_or_default()
    }

    /// Effective output type
    pub fn output(&self) -> BundlingOutput {
        self.output_type.unwrap_or_default()
    }
}
