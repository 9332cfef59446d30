//! Asset hash computation
//!
//! The hash is an opaque cache key for the provisioning engine: assets are
//! rebuilt and uploaded only when it changes.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use rust_lambda_bundler_props::function::Runtime;
use rust_lambda_bundler_props::{Architecture, AssetHashType, BundleError, BundlingOptions, Result};

/// Directory names never part of a source hash
pub(crate) const SOURCE_EXCLUDES: &[&str] = &["target", ".git", "cdk.out"];

/// A computed asset hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetHash {
    pub value: String,
    pub hash_type: AssetHashType,
}

/// Build options that change the produced binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildFingerprint {
    pub architecture: Architecture,
    pub environment: BTreeMap<String, String>,
    /// Manifest path relative to the source root, `/` separated
    pub manifest_path: String,
    pub binary_name: Option<String>,
    pub runtime: Option<Runtime>,
    pub extension: bool,
}

impl BuildFingerprint {
    pub fn new(
        options: &BundlingOptions,
        source_root: &Path,
        manifest_path: &Path,
        binary_name: Option<&str>,
        runtime: Option<Runtime>,
        extension: bool,
    ) -> Self {
        let relative = manifest_path.strip_prefix(source_root).unwrap_or(manifest_path);
        Self {
            architecture: options.architecture(),
            environment: options.environment.clone(),
            manifest_path: normalize_path(relative),
            binary_name: binary_name.map(str::to_string),
            runtime,
            extension,
        }
    }
}

/// Inputs to [`compute_asset_hash`]
#[derive(Debug, Clone)]
pub struct HashRequest<'a> {
    pub options: &'a BundlingOptions,
    /// Root of the source tree (the directory holding the manifest)
    pub source_root: &'a Path,
    /// Bundling output; required for output hashes
    pub output_dir: Option<&'a Path>,
    /// Directories under the source root left out of source hashes,
    /// compared as given against `source_root.join(..)` paths
    pub excluded_roots: &'a [PathBuf],
    pub fingerprint: &'a BuildFingerprint,
}

/// Effective hash type for a set of options
pub fn resolve_asset_hash_type(options: &BundlingOptions) -> Result<AssetHashType> {
    options.asset_hash_type()
}

/// Compute the asset hash for a unit
pub fn compute_asset_hash(request: &HashRequest<'_>) -> Result<AssetHash> {
    let hash_type = resolve_asset_hash_type(request.options)?;

    let value = match hash_type {
        AssetHashType::Custom => {
            // resolve_asset_hash_type guarantees the custom hash is set
            let custom = request
                .options
                .asset_hash
                .as_deref()
                .ok_or_else(|| BundleError::config("CUSTOM hash type requires an `assetHash` value"))?;
            sha256_hex(custom.as_bytes())
        }
        AssetHashType::Source => {
            let mut hasher = Sha256::new();
            hash_tree(&mut hasher, request.source_root, SOURCE_EXCLUDES, request.excluded_roots)?;
            let fingerprint = serde_json::to_vec(request.fingerprint)
                .map_err(|e| BundleError::config(format!("unserializable build options: {}", e)))?;
            hasher.update(&fingerprint);
            hex::encode(hasher.finalize())
        }
        AssetHashType::Output => {
            let output_dir = request.output_dir.ok_or_else(|| {
                BundleError::config("OUTPUT hash type requires the bundling output, bundle before hashing")
            })?;
            let mut hasher = Sha256::new();
            hash_tree(&mut hasher, output_dir, &[], &[])?;
            hex::encode(hasher.finalize())
        }
    };

    tracing::debug!(hash_type = %hash_type, hash = %value, "Computed asset hash");

    Ok(AssetHash { value, hash_type })
}

/// Hex encoded SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Feed every file under `root` into `hasher`, in sorted path order
///
/// Directories named in `excludes` or listed in `excluded_roots` are skipped.
fn hash_tree(
    hasher: &mut Sha256,
    root: &Path,
    excludes: &[&str],
    excluded_roots: &[PathBuf],
) -> Result<()> {
    let exclusions = Exclusions {
        names: excludes,
        roots: excluded_roots,
    };
    let mut files = Vec::new();
    collect_files(root, root, &exclusions, &mut files)?;
    files.sort();

    let mut buf = Vec::new();
    for (relative, path) in files {
        buf.clear();
        fs::File::open(&path)?.read_to_end(&mut buf)?;

        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update((buf.len() as u64).to_le_bytes());
        hasher.update(&buf);
    }

    Ok(())
}

/// Directories a tree walk leaves out
pub(crate) struct Exclusions<'a> {
    /// Directory names, at any depth
    pub names: &'a [&'a str],
    /// Exact directory paths
    pub roots: &'a [PathBuf],
}

impl Exclusions<'_> {
    pub(crate) fn skips(&self, entry: &fs::DirEntry) -> bool {
        let name = entry.file_name();
        self.names.iter().any(|e| name.to_str() == Some(*e))
            || self.roots.iter().any(|r| *r == entry.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    File,
    Dir,
    Other,
}

/// Classify a walked entry without following directory symlinks
///
/// Symlinks to files count as files. Symlinked directories are not walked,
/// so link cycles cannot recurse.
pub(crate) fn entry_kind(entry: &fs::DirEntry) -> Result<EntryKind> {
    let file_type = entry.file_type()?;
    let linked_file =
        || file_type.is_symlink() && fs::metadata(entry.path()).is_ok_and(|m| m.is_file());

    Ok(if file_type.is_dir() {
        EntryKind::Dir
    } else if file_type.is_file() || linked_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    })
}

fn collect_files(
    root: &Path,
    dir: &Path,
    exclusions: &Exclusions<'_>,
    files: &mut Vec<(String, PathBuf)>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        match entry_kind(&entry)? {
            EntryKind::Dir if exclusions.skips(&entry) => {}
            EntryKind::Dir => collect_files(root, &path, exclusions, files)?,
            EntryKind::File => {
                let relative = path.strip_prefix(root).unwrap_or(&path);
                files.push((normalize_path(relative), path));
            }
            EntryKind::Other => {}
        }
    }
    Ok(())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
