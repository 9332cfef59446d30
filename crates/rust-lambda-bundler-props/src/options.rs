//! Bundling options shared by functions and extensions

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::docker::{DockerImage, DockerOptions};
use crate::error::{BundleError, Result};
use crate::hooks::{deserialize_hooks, CommandHooks};

/// Instruction set architecture of the Lambda
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    #[default]
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "arm64")]
    Arm64,
}

impl Architecture {
    /// Name as used by the Lambda API
    pub fn name(self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64",
            Architecture::Arm64 => "arm64",
        }
    }

    /// cargo-lambda flag selecting this architecture
    pub fn cargo_lambda_flag(self) -> &'static str {
        match self {
            Architecture::X86_64 => "--x86-64",
            Architecture::Arm64 => "--arm64",
        }
    }

    /// Rust target triple for Amazon Linux
    pub fn target_triple(self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64-unknown-linux-gnu",
            Architecture::Arm64 => "aarch64-unknown-linux-gnu",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the asset hash is calculated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetHashType {
    /// Hash of the source tree and build options
    #[serde(alias = "SOURCE")]
    Source,
    /// Hash of the bundling output
    #[serde(alias = "OUTPUT")]
    Output,
    /// Hash of a user supplied string
    #[serde(alias = "CUSTOM")]
    Custom,
}

impl fmt::Display for AssetHashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssetHashType::Source => "source",
            AssetHashType::Output => "output",
            AssetHashType::Custom => "custom",
        })
    }
}

/// Bundling options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlingOptions {
    /// Environment variables defined when cargo runs
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Force bundling in a Docker container even if local bundling is possible
    #[serde(default)]
    pub forced_docker_bundling: bool,

    /// Custom bundling image, defaults to `ghcr.io/cargo-lambda/cargo-lambda`
    #[serde(default)]
    pub docker_image: Option<DockerImage>,

    /// Additional options when using Docker bundling
    #[serde(default)]
    pub docker_options: Option<DockerOptions>,

    /// Defaults to `output`, or `custom` when `asset_hash` is set
    #[serde(default)]
    pub asset_hash_type: Option<AssetHashType>,

    /// Custom hash; it is SHA-256 hashed and hex encoded to form the asset hash.
    /// It must change whenever the asset does, or deployments won't be invalidated.
    #[serde(default)]
    pub asset_hash: Option<String>,

    #[serde(default, deserialize_with = "deserialize_hooks", skip_serializing)]
    pub command_hooks: Option<Arc<dyn CommandHooks>>,

    /// Defaults to x86_64
    #[serde(default)]
    pub architecture: Option<Architecture>,
}

impl BundlingOptions {
    /// Effective architecture
    pub fn architecture(&self) -> Architecture {
        self.architecture.unwrap_or_default()
    }

    /// Effective asset hash type
    ///
    /// Fails when a custom hash is combined with a non-custom hash type,
    /// or when the custom type has no hash to work with.
    pub fn asset_hash_type(&self) -> Result<AssetHashType> {
        match (self.asset_hash.as_deref(), self.asset_hash_type) {
            (Some(_), None | Some(AssetHashType::Custom)) => Ok(AssetHashType::Custom),
            (Some(_), Some(other)) => Err(BundleError::config(format!(
                "custom hash requires CUSTOM hash type, got {}",
                other
            ))),
            (None, Some(AssetHashType::Custom)) => Err(BundleError::config(
                "CUSTOM hash type requires an `assetHash` value",
            )),
            (None, Some(other)) => Ok(other),
            (None, None) => Ok(AssetHashType::Output),
        }
    }

    /// Docker options, or the defaults
    pub fn docker_options(&self) -> DockerOptions {
        self.docker_options.clone().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        self.asset_hash_type()?;

        if self.environment.keys().any(|k| k.is_empty() || k.contains('=')) {
            return Err(BundleError::config(
                "environment variable names must be non-empty and must not contain '='",
            ));
        }

        Ok(())
    }
}
