//! Remote source fetch
//!
//! Clones `gitRemote` repositories into a local cache so they can be
//! bundled like any local project.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use url::Url;

use rust_lambda_bundler_props::source::GitSource;
use rust_lambda_bundler_props::{BundleError, Result};

use crate::hash::sha256_hex;

/// Length of the hash prefix naming a checkout directory
const CHECKOUT_KEY_LEN: usize = 16;

/// Materializes a remote source on the local filesystem
pub trait SourceFetcher: Send + Sync {
    /// Return the root of a checkout of `source`
    fn fetch(&self, source: &GitSource) -> Result<PathBuf>;
}

/// Fetcher backed by the `git` CLI
#[derive(Debug, Clone)]
pub struct GitCli {
    clone_dir: PathBuf,
    git_bin: String,
}

impl GitCli {
    pub fn new(clone_dir: impl Into<PathBuf>) -> Self {
        Self {
            clone_dir: clone_dir.into(),
            git_bin: "git".to_string(),
        }
    }

    pub fn with_git_bin(mut self, git_bin: impl Into<String>) -> Self {
        self.git_bin = git_bin.into();
        self
    }

    /// Cache directory for a remote and reference
    pub fn checkout_dir(&self, source: &GitSource) -> PathBuf {
        let key = format!(
            "{}#{}",
            source.remote,
            source.reference.as_deref().unwrap_or_default()
        );
        self.clone_dir
            .join(&sha256_hex(key.as_bytes())[..CHECKOUT_KEY_LEN])
    }

    fn git(&self, args: &[&str], cwd: Option<&Path>) -> Result<()> {
        let mut cmd = Command::new(&self.git_bin);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null());
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd.output().map_err(|e| {
            BundleError::FetchError(format!("failed to run `{}`: {}", self.git_bin, e))
        })?;

        if !output.status.success() {
            return Err(BundleError::FetchError(format!(
                "`git {}` failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl SourceFetcher for GitCli {
    fn fetch(&self, source: &GitSource) -> Result<PathBuf> {
        validate_remote(&source.remote)?;

        let dest = self.checkout_dir(source);
        if dest.join(".git").is_dir() {
            if !source.force_clone {
                tracing::debug!(remote = %source.remote, path = %dest.display(), "Reusing cached checkout");
                return Ok(dest);
            }
            fs::remove_dir_all(&dest).map_err(|e| {
                BundleError::FetchError(format!("failed to remove {}: {}", dest.display(), e))
            })?;
        } else if dest.exists() {
            // Leftover from an interrupted clone
            fs::remove_dir_all(&dest)?;
        }

        fs::create_dir_all(&self.clone_dir)?;
        tracing::info!(remote = %source.remote, reference = ?source.reference, "Cloning repository");

        let dest_str = dest.to_string_lossy().into_owned();
        let result = match &source.reference {
            None => self.git(&["clone", "--quiet", "--depth", "1", source.remote.as_str(), dest_str.as_str()], None),
            Some(reference) => self
                .git(&["clone", "--quiet", source.remote.as_str(), dest_str.as_str()], None)
                .and_then(|_| {
                    self.git(&["checkout", "--quiet", reference.as_str()], Some(&dest))
                        .map_err(|e| {
                            BundleError::FetchError(format!(
                                "reference `{}` not found in {}: {}",
                                reference, source.remote, e
                            ))
                        })
                }),
        };

        if let Err(e) = result {
            let _ = fs::remove_dir_all(&dest);
            return Err(e);
        }

        Ok(dest)
    }
}

/// Accept URLs git understands: http(s), ssh, git, file, or scp-like `user@host:path`
fn validate_remote(remote: &str) -> Result<()> {
    match Url::parse(remote) {
        Ok(url) => match url.scheme() {
            "https" | "http" | "ssh" | "git" | "file" => Ok(()),
            scheme => Err(BundleError::FetchError(format!(
                "unsupported git remote scheme `{}` in {}",
                scheme, remote
            ))),
        },
        Err(_) if is_scp_like(remote) => Ok(()),
        Err(e) => Err(BundleError::FetchError(format!(
            "invalid git remote {}: {}",
            remote, e
        ))),
    }
}

fn is_scp_like(remote: &str) -> bool {
    match remote.split_once(':') {
        Some((host, path)) => {
            !host.is_empty()
                && !path.is_empty()
                && !host.contains('/')
                && !host.contains(char::is_whitespace)
                && !path.contains(char::is_whitespace)
        }
        None => false,
    }
}
