//! Zip archiving of directory assets

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use rust_lambda_bundler_props::{BundleError, Result};

use crate::hash::{entry_kind, EntryKind};

/// Entries with this file name are marked executable
const BOOTSTRAP: &str = "bootstrap";

/// Zip the contents of `dir` into `dest`, returning `dest`
///
/// Entries are written in sorted path order with `/` separators.
pub fn archive_directory(dir: &Path, dest: &Path) -> Result<PathBuf> {
    let mut files = Vec::new();
    collect(dir, dir, &mut files)?;
    files.sort();

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut zip = ZipWriter::new(fs::File::create(dest)?);

    for (name, path) in &files {
        let is_bootstrap = name.rsplit('/').next() == Some(BOOTSTRAP);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(if is_bootstrap { 0o755 } else { 0o644 });

        zip.start_file(name.as_str(), options).map_err(zip_error)?;
        zip.write_all(&fs::read(path)?)?;
    }

    zip.finish().map_err(zip_error)?;
    tracing::debug!(dir = %dir.display(), archive = %dest.display(), entries = files.len(), "Archived asset");

    Ok(dest.to_path_buf())
}

fn collect(root: &Path, dir: &Path, files: &mut Vec<(String, PathBuf)>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        match entry_kind(&entry)? {
            EntryKind::Dir => collect(root, &path, files)?,
            EntryKind::File => {
                let name = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                files.push((name, path));
            }
            EntryKind::Other => {}
        }
    }
    Ok(())
}

fn zip_error(e: zip::result::ZipError) -> BundleError {
    BundleError::build(format!("failed to write archive: {}", e))
}
