//! Where the Cargo project to bundle lives

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BundleError, Result};

/// A remote git repository holding the Cargo project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    /// Remote URL, e.g. `https://github.com/your_user/your_repo`
    pub remote: String,

    /// Branch, tag or commit to check out; the default branch when unset
    #[serde(default)]
    pub reference: Option<String>,

    /// Clone again even if the repository and reference are already cached
    #[serde(default)]
    pub force_clone: bool,
}

/// Source location resolved from props
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Manifest path on the local filesystem
    Local { manifest_path: PathBuf },
    /// Manifest path relative to the root of a git checkout
    Git { source: GitSource, manifest_path: PathBuf },
}

impl SourceLocation {
    /// Build a source location from the shared git/manifest props
    pub fn from_props(
        manifest_path: Option<&str>,
        git_remote: Option<&str>,
        git_reference: Option<&str>,
        git_force_clone: Option<bool>,
    ) -> Result<Self> {
        let manifest_path = PathBuf::from(manifest_path.unwrap_or("Cargo.toml"));

        match git_remote {
            Some(remote) if remote.trim().is_empty() => {
                Err(BundleError::config("`gitRemote` must not be empty"))
            }
            Some(remote) => Ok(SourceLocation::Git {
                source: GitSource {
                    remote: remote.to_string(),
                    reference: git_reference.map(str::to_string),
                    force_clone: git_force_clone.unwrap_or(false),
                },
                manifest_path,
            }),
            None if git_reference.is_some() || git_force_clone.is_some() => Err(BundleError::config(
                "`gitReference` and `gitForceClone` require `gitRemote`",
            )),
            None => Ok(SourceLocation::Local { manifest_path }),
        }
    }

    /// The manifest path as declared, local or relative to the checkout
    pub fn manifest_path(&self) -> &Path {
        match self {
            SourceLocation::Local { manifest_path } => manifest_path,
            SourceLocation::Git { manifest_path, .. } => manifest_path,
        }
    }
}
