//! Cargo manifest resolution
//!
//! Finds the `Cargo.toml` a unit points at and reads just enough of it to
//! know which binary cargo-lambda should build.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use rust_lambda_bundler_props::{BundleError, Result};

const MANIFEST_FILE: &str = "Cargo.toml";

/// The parts of a Cargo manifest the bundler cares about
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub package: Option<Package>,

    #[serde(default)]
    pub bin: Option<Vec<BinTarget>>,

    #[serde(default)]
    pub workspace: Option<Workspace>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Package {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinTarget {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub members: Vec<String>,
}

/// The binary cargo-lambda builds for a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySelection {
    /// Name of the built binary, also used to flatten the output
    pub name: String,
    /// Whether `--bin <name>` must be passed
    pub explicit: bool,
}

/// Resolve a directory or `Cargo.toml` path to an existing manifest file
pub fn resolve_manifest_path(path: &Path) -> Result<PathBuf> {
    let is_file_path = path.extension().is_some();

    match path.file_name().and_then(|n| n.to_str()) {
        Some(MANIFEST_FILE) => {
            if !path.is_file() {
                return Err(BundleError::ManifestError(format!(
                    "Cargo.toml doesn't exist at {}",
                    path.display()
                )));
            }
            Ok(path.to_path_buf())
        }
        Some(_) if is_file_path && !path.is_dir() => Err(BundleError::ManifestError(
            "manifestPath is specifying a file that is not Cargo.toml".to_string(),
        )),
        _ => {
            let candidate = path.join(MANIFEST_FILE);
            if !candidate.is_file() {
                return Err(BundleError::ManifestError(format!(
                    "'{}' is not a path to a Cargo.toml file, use the option `manifestPath` to specify the location of the Cargo.toml file",
                    candidate.display()
                )));
            }
            Ok(candidate)
        }
    }
}

impl Manifest {
    /// Parse a manifest from TOML content
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BundleError::ManifestError(format!("Failed to parse Cargo manifest: {}", e)))
    }

    /// Load a manifest from a `Cargo.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BundleError::ManifestError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Decide which binary to build
    ///
    /// An explicit `binary_name` always wins. Otherwise workspaces and
    /// packages with several `[[bin]]` targets are ambiguous.
    pub fn select_binary(&self, binary_name: Option<&str>) -> Result<BinarySelection> {
        if let Some(name) = binary_name {
            return Ok(BinarySelection {
                name: name.to_string(),
                explicit: true,
            });
        }

        if self.workspace.is_some() {
            return Err(BundleError::ManifestError(
                "the Cargo manifest is a workspace, use the option `binaryName` to specify the binary to build".to_string(),
            ));
        }

        match self.bin.as_deref() {
            Some([single]) => {
                return single
                    .name
                    .clone()
                    .map(|name| BinarySelection { name, explicit: true })
                    .ok_or_else(missing_binary_name);
            }
            Some(bins) if bins.len() > 1 => {
                return Err(BundleError::ManifestError(
                    "there are more than one binaries declared in this Cargo package, use the option `binaryName` to specify the binary to build".to_string(),
                ));
            }
            _ => {}
        }

        self.package
            .as_ref()
            .and_then(|p| p.name.clone())
            .map(|name| BinarySelection { name, explicit: false })
            .ok_or_else(missing_binary_name)
    }
}

fn missing_binary_name() -> BundleError {
    BundleError::ManifestError(
        "the Cargo package is missing the package name or a [[bin]] section, use the option `binaryName` to specify the binary to build".to_string(),
    )
}
