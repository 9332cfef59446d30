//! Bundling decision: build on the host or inside a container
//!
//! Rules, in priority order:
//! 1. forced Docker bundling always builds in a container
//! 2. a custom local provider is tried; if it can't build, use a container
//! 3. the host probe decides; a failing probe counts as "unavailable"

use std::fmt;
use std::path::Path;

use serde::Serialize;

use rust_lambda_bundler_props::docker::LocalBundlingOutcome;
use rust_lambda_bundler_props::{BundleError, BundlingOptions, DockerImage, Result};

use crate::probe::{HostProbe, HELPER, TOOLCHAIN};

/// Who performs a local build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocalSource {
    /// A custom provider already wrote the output
    Provider,
    /// cargo-lambda on the host
    Host,
}

/// Where the build runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum BundlingMode {
    Local { source: LocalSource },
    Container { image: DockerImage },
}

impl BundlingMode {
    pub fn is_container(&self) -> bool {
        matches!(self, BundlingMode::Container { .. })
    }
}

impl fmt::Display for BundlingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundlingMode::Local { source: LocalSource::Provider } => f.write_str("local (provider)"),
            BundlingMode::Local { source: LocalSource::Host } => f.write_str("local"),
            BundlingMode::Container { image } => write!(f, "container ({})", image),
        }
    }
}

/// Inputs to the decision besides the options themselves
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    /// Where a local provider should write its output
    pub output_dir: &'a Path,
    /// Image used when the options don't name one
    pub default_image: Option<&'a DockerImage>,
    /// Global override, e.g. from `FORCE_DOCKER_RUN`
    pub force_docker: bool,
    /// Skip invoking the local provider (planning only)
    pub dry_run: bool,
}

/// The image container bundling would use
pub fn resolve_image(
    options: &BundlingOptions,
    default_image: Option<&DockerImage>,
) -> Result<DockerImage> {
    options
        .docker_image
        .clone()
        .or_else(|| default_image.cloned())
        .ok_or_else(|| {
            BundleError::config(
                "container bundling was chosen but no Docker image is available, set `dockerImage`",
            )
        })
}

/// Choose between local and container bundling
///
/// A custom local provider is invoked here, so on `Local { Provider }` the
/// output directory is already populated.
pub fn choose_bundling_mode(
    options: &BundlingOptions,
    probe: &dyn HostProbe,
    ctx: &DecisionContext<'_>,
) -> Result<BundlingMode> {
    let container = || -> Result<BundlingMode> {
        Ok(BundlingMode::Container {
            image: resolve_image(options, ctx.default_image)?,
        })
    };

    if options.forced_docker_bundling || ctx.force_docker {
        tracing::debug!("Docker bundling forced");
        return container();
    }

    let provider = options.docker_options.as_ref().and_then(|d| d.local.as_ref());
    if let Some(provider) = provider {
        if ctx.dry_run {
            tracing::debug!("Skipping local bundling provider in dry run");
            return container();
        }
        return match provider.try_bundle(ctx.output_dir, options) {
            Ok(LocalBundlingOutcome::Bundled) => Ok(BundlingMode::Local {
                source: LocalSource::Provider,
            }),
            Ok(LocalBundlingOutcome::Unavailable) => {
                tracing::info!("Local bundling provider unavailable, switching to Docker bundling");
                container()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Local bundling provider failed, switching to Docker bundling");
                container()
            }
        };
    }

    if host_can_build(probe) {
        Ok(BundlingMode::Local {
            source: LocalSource::Host,
        })
    } else {
        tracing::info!("Rust build cannot run locally, switching to Docker bundling");
        container()
    }
}

fn host_can_build(probe: &dyn HostProbe) -> bool {
    let check = || -> Result<bool> {
        Ok(probe.toolchain_available(TOOLCHAIN)? && probe.helper_available(HELPER)?)
    };

    match check() {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(error = %e, "Host probe failed, assuming local bundling is unavailable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::StaticProbe;
    use rust_lambda_bundler_props::docker::{DockerOptions, LocalBundling};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct FailingProbe;

    impl HostProbe for FailingProbe {
        fn toolchain_available(&self, _name: &str) -> Result<bool> {
            Err(BundleError::ProbeError("permission denied".into()))
        }

        fn helper_available(&self, _name: &str) -> Result<bool> {
            Err(BundleError::ProbeError("permission denied".into()))
        }
    }

    #[derive(Debug)]
    struct Provider {
        outcome: LocalBundlingOutcome,
        calls: AtomicUsize,
    }

    impl LocalBundling for Provider {
        fn try_bundle(&self, _output_dir: &Path, _options: &BundlingOptions) -> Result<LocalBundlingOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome)
        }
    }

    fn default_image() -> DockerImage {
        DockerImage::from_registry("ghcr.io/cargo-lambda/cargo-lambda")
    }

    fn ctx<'a>(output_dir: &'a Path, image: Option<&'a DockerImage>) -> DecisionContext<'a> {
        DecisionContext {
            output_dir,
            default_image: image,
            force_docker: false,
            dry_run: false,
        }
    }

    fn with_provider(provider: Arc<Provider>) -> BundlingOptions {
        BundlingOptions {
            docker_options: Some(DockerOptions {
                local: Some(provider as Arc<dyn LocalBundling>),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_forced_docker_wins_over_probe() {
        let out = PathBuf::from("/tmp/out");
        let image = default_image();
        let options = BundlingOptions {
            forced_docker_bundling: true,
            ..Default::default()
        };

        let mode = choose_bundling_mode(&options, &StaticProbe::available(), &ctx(&out, Some(&image))).unwrap();
        assert_eq!(mode, BundlingMode::Container { image });
    }

    #[test]
    fn test_forced_docker_from_config() {
        let out = PathBuf::from("/tmp/out");
        let image = default_image();
        let context = DecisionContext {
            force_docker: true,
            ..ctx(&out, Some(&image))
        };

        let mode = choose_bundling_mode(&BundlingOptions::default(), &StaticProbe::available(), &context).unwrap();
        assert!(mode.is_container());
    }

    #[test]
    fn test_host_toolchain_present() {
        let out = PathBuf::from("/tmp/out");
        let image = default_image();
        let mode = choose_bundling_mode(
            &BundlingOptions::default(),
            &StaticProbe::available(),
            &ctx(&out, Some(&image)),
        )
        .unwrap();
        assert_eq!(mode, BundlingMode::Local { source: LocalSource::Host });
    }

    #[test]
    fn test_host_toolchain_absent() {
        let out = PathBuf::from("/tmp/out");
        let image = default_image();
        let probe = StaticProbe { toolchain: true, helper: false };
        let mode = choose_bundling_mode(&BundlingOptions::default(), &probe, &ctx(&out, Some(&image))).unwrap();
        assert!(mode.is_container());
    }

    #[test]
    fn test_probe_error_biases_to_container() {
        let out = PathBuf::from("/tmp/out");
        let image = default_image();
        let mode = choose_bundling_mode(&BundlingOptions::default(), &FailingProbe, &ctx(&out, Some(&image))).unwrap();
        assert!(mode.is_container());
    }

    #[test]
    fn test_provider_bundled() {
        let out = PathBuf::from("/tmp/out");
        let provider = Arc::new(Provider {
            outcome: LocalBundlingOutcome::Bundled,
            calls: AtomicUsize::new(0),
        });
        let options = with_provider(provider.clone());

        let mode = choose_bundling_mode(&options, &StaticProbe::unavailable(), &ctx(&out, None)).unwrap();
        assert_eq!(mode, BundlingMode::Local { source: LocalSource::Provider });
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_provider_unavailable_falls_through() {
        let out = PathBuf::from("/tmp/out");
        let image = default_image();
        let provider = Arc::new(Provider {
            outcome: LocalBundlingOutcome::Unavailable,
            calls: AtomicUsize::new(0),
        });
        let options = with_provider(provider);

        // The probe is not consulted once a provider is supplied
        let mode = choose_bundling_mode(&options, &StaticProbe::available(), &ctx(&out, Some(&image))).unwrap();
        assert!(mode.is_container());
    }

    #[test]
    fn test_provider_skipped_in_dry_run() {
        let out = PathBuf::from("/tmp/out");
        let image = default_image();
        let provider = Arc::new(Provider {
            outcome: LocalBundlingOutcome::Bundled,
            calls: AtomicUsize::new(0),
        });
        let options = with_provider(provider.clone());
        let context = DecisionContext {
            dry_run: true,
            ..ctx(&out, Some(&image))
        };

        let mode = choose_bundling_mode(&options, &StaticProbe::available(), &context).unwrap();
        assert!(mode.is_container());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_container_without_image_fails() {
        let out = PathBuf::from("/tmp/out");
        let err = choose_bundling_mode(&BundlingOptions::default(), &StaticProbe::unavailable(), &ctx(&out, None))
            .unwrap_err();
        assert!(matches!(err, BundleError::ConfigurationError(_)));
    }

    #[test]
    fn test_custom_image_preferred() {
        let options = BundlingOptions {
            docker_image: Some(DockerImage::from_registry("my/cargo-lambda:nightly")),
            ..Default::default()
        };
        let fallback = default_image();
        assert_eq!(
            resolve_image(&options, Some(&fallback)).unwrap().image,
            "my/cargo-lambda:nightly"
        );
    }
}
