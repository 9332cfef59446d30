//! Bundler configuration

use std::env;
use std::path::PathBuf;

use rust_lambda_bundler_props::DockerImage;

/// Image used for container bundling when none is supplied
pub const DEFAULT_BUNDLING_IMAGE: &str = "ghcr.io/cargo-lambda/cargo-lambda";

/// Bundler configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct BundlerConfig {
    /// Directory bundling outputs are written under
    pub output_dir: PathBuf,

    /// Directory remote repositories are cloned into
    pub clone_dir: PathBuf,

    /// Fallback image for container bundling; `None` disables the fallback
    pub default_image: Option<DockerImage>,

    /// Docker CLI binary
    pub docker_bin: String,

    /// Force container bundling for every unit (`FORCE_DOCKER_RUN`)
    pub force_docker: bool,
}

impl BundlerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            output_dir: env::var("CARGO_LAMBDA_BUNDLER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./cdk.out/bundles")),

            clone_dir: env::var("CARGO_LAMBDA_BUNDLER_CLONE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("cargo-lambda-bundler")),

            // An empty value disables the default image
            default_image: match env::var("CARGO_LAMBDA_BUNDLER_IMAGE") {
                Ok(image) if image.trim().is_empty() => None,
                Ok(image) => Some(DockerImage::from_registry(image)),
                Err(_) => Some(DockerImage::from_registry(DEFAULT_BUNDLING_IMAGE)),
            },

            docker_bin: env::var("CARGO_LAMBDA_BUNDLER_DOCKER")
                .unwrap_or_else(|_| "docker".to_string()),

            force_docker: env::var("FORCE_DOCKER_RUN")
                .map(|v| !v.is_empty())
                .unwrap_or(false),
        }
    }

    /// Configuration rooted at `dir`, ignoring the environment
    pub fn rooted_at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            output_dir: dir.join("bundles"),
            clone_dir: dir.join("clones"),
            default_image: Some(DockerImage::from_registry(DEFAULT_BUNDLING_IMAGE)),
            docker_bin: "docker".to_string(),
            force_docker: false,
        }
    }
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooted_at() {
        let config = BundlerConfig::rooted_at("/tmp/bundler");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/bundler/bundles"));
        assert_eq!(config.clone_dir, PathBuf::from("/tmp/bundler/clones"));
        assert_eq!(
            config.default_image,
            Some(DockerImage::from_registry(DEFAULT_BUNDLING_IMAGE))
        );
        assert!(!config.force_docker);
    }
}
