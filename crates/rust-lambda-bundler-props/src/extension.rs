//! Properties for a Lambda extension written in Rust

use serde::{Deserialize, Serialize};

use crate::error::{BundleError, Result};
use crate::options::{Architecture, BundlingOptions};
use crate::source::SourceLocation;

/// What happens to the layer version when it is removed from the stack
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    #[default]
    Retain,
    Destroy,
    Snapshot,
}

/// Properties for a Rust extension, published as a layer version
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionProps {
    /// The name of the binary to build, in case that's different than the package's name
    #[serde(default)]
    pub binary_name: Option<String>,

    /// Path to a directory containing `Cargo.toml`, or to `Cargo.toml` itself
    #[serde(default)]
    pub manifest_path: Option<String>,

    #[serde(default)]
    pub bundling: Option<BundlingOptions>,

    #[serde(default)]
    pub git_remote: Option<String>,

    #[serde(default)]
    pub git_reference: Option<String>,

    #[serde(default)]
    pub git_force_clone: Option<bool>,

    #[serde(default)]
    pub layer_version_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// SPDX license identifier of the layer content
    #[serde(default)]
    pub license: Option<String>,

    #[serde(default)]
    pub removal_policy: Option<RemovalPolicy>,

    #[serde(default)]
    pub compatible_architectures: Vec<Architecture>,
}

impl ExtensionProps {
    pub fn removal_policy(&self) -> RemovalPolicy {
        self.removal_policy.unwrap_or_default()
    }

    pub fn source(&self) -> Result<SourceLocation> {
        SourceLocation::from_props(
            self.manifest_path.as_deref(),
            self.git_remote.as_deref(),
            self.git_reference.as_deref(),
            self.git_force_clone,
        )
    }

    /// Bundling options with the architecture resolved to x86_64 when unset
    pub fn bundling_options(&self) -> BundlingOptions {
        let mut bundling = self.bundling.clone().unwrap_or_default();
        bundling.architecture = Some(bundling.architecture());
        bundling
    }

    pub fn validate(&self) -> Result<()> {
        self.source()?;
        let bundling = self.bundling_options();
        bundling.validate()?;

        if !self.compatible_architectures.is_empty()
            && !self.compatible_architectures.contains(&bundling.architecture())
        {
            return Err(BundleError::config(format!(
                "the extension is built for {} but compatibleArchitectures doesn't include it",
                bundling.architecture()
            )));
        }

        if let Some(name) = &self.layer_version_name {
            if name.is_empty() || name.len() > 140 {
                return Err(BundleError::config(
                    "layerVersionName must be between 1 and 140 characters",
                ));
            }
        }

        Ok(())
    }
}
