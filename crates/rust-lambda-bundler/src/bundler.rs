//! Bundling orchestration
//!
//! Ties the pieces together for one unit (a function or an extension):
//! fetch the source, resolve the manifest and binary, hash, decide where to
//! build, build, and describe the result as an [`Asset`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use rust_lambda_bundler_props::docker::BundlingOutput;
use rust_lambda_bundler_props::function::Runtime;
use rust_lambda_bundler_props::source::SourceLocation;
use rust_lambda_bundler_props::{
    Architecture, AssetHashType, BundleError, BundlingOptions, ExtensionProps, FunctionProps, Result,
};

use crate::cargo::{resolve_manifest_path, BinarySelection, Manifest};
use crate::command::{create_bundling_command, CommandOptions};
use crate::config::BundlerConfig;
use crate::decision::{choose_bundling_mode, BundlingMode, DecisionContext, LocalSource};
use crate::docker::{assemble_container_invocation, AssemblyRequest, ContainerInvocation};
use crate::git::{GitCli, SourceFetcher};
use crate::hash::{compute_asset_hash, resolve_asset_hash_type, AssetHash, BuildFingerprint, HashRequest};
use crate::probe::{HostProbe, SystemProbe};
use crate::runner::{run_local, ContainerRuntime, DockerCli};

/// Archive extensions recognized when auto-discovering the output type
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "jar"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    Function,
    Extension,
}

/// Props of a unit, by kind
#[derive(Debug, Clone)]
pub enum TargetProps {
    Function(FunctionProps),
    Extension(ExtensionProps),
}

/// A named unit to bundle
#[derive(Debug, Clone)]
pub struct PackageTarget {
    pub name: String,
    pub props: TargetProps,
    /// Directory relative local manifest paths are resolved against
    pub base_dir: PathBuf,
}

impl PackageTarget {
    pub fn function(name: impl Into<String>, props: FunctionProps) -> Self {
        Self {
            name: name.into(),
            props: TargetProps::Function(props),
            base_dir: PathBuf::from("."),
        }
    }

    pub fn extension(name: impl Into<String>, props: ExtensionProps) -> Self {
        Self {
            name: name.into(),
            props: TargetProps::Extension(props),
            base_dir: PathBuf::from("."),
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn kind(&self) -> PackageKind {
        match self.props {
            TargetProps::Function(_) => PackageKind::Function,
            TargetProps::Extension(_) => PackageKind::Extension,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match &self.props {
            TargetProps::Function(p) => p.validate(),
            TargetProps::Extension(p) => p.validate(),
        }
    }

    fn source(&self) -> Result<SourceLocation> {
        match &self.props {
            TargetProps::Function(p) => p.source(),
            TargetProps::Extension(p) => p.source(),
        }
    }

    fn bundling_options(&self) -> Result<BundlingOptions> {
        match &self.props {
            TargetProps::Function(p) => p.bundling_options(),
            TargetProps::Extension(p) => Ok(p.bundling_options()),
        }
    }

    fn binary_name(&self) -> Option<&str> {
        match &self.props {
            TargetProps::Function(p) => p.binary_name.as_deref(),
            TargetProps::Extension(p) => p.binary_name.as_deref(),
        }
    }

    fn runtime(&self) -> Option<Runtime> {
        match &self.props {
            TargetProps::Function(p) => Some(p.runtime()),
            TargetProps::Extension(_) => None,
        }
    }
}

/// A bundled unit, ready for the provisioning engine
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub name: String,
    pub kind: PackageKind,
    /// Output directory, or the archive file when `archived`
    pub path: PathBuf,
    pub hash: String,
    pub hash_type: AssetHashType,
    pub architecture: Architecture,
    pub mode: BundlingMode,
    pub archived: bool,
}

/// What [`Bundler::bundle`] would do, without doing it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlePlan {
    pub name: String,
    pub kind: PackageKind,
    pub manifest_path: PathBuf,
    pub binary: String,
    pub architecture: Architecture,
    pub hash_type: AssetHashType,
    /// Known up front for source and custom hashes only
    pub hash: Option<String>,
    pub mode: BundlingMode,
    /// Host command for local builds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invocation: Option<ContainerInvocation>,
}

/// Everything resolved about a unit before any build
struct Prepared {
    options: BundlingOptions,
    manifest_path: PathBuf,
    source_root: PathBuf,
    binary: BinarySelection,
    runtime: Option<Runtime>,
    extension: bool,
    hash_type: AssetHashType,
    fingerprint: BuildFingerprint,
    /// Bundler directories inside the source tree
    excluded_roots: Vec<PathBuf>,
}

impl Prepared {
    fn hash(&self, output_dir: Option<&Path>) -> Result<AssetHash> {
        compute_asset_hash(&HashRequest {
            options: &self.options,
            source_root: &self.source_root,
            output_dir,
            excluded_roots: &self.excluded_roots,
            fingerprint: &self.fingerprint,
        })
    }

    fn command(&self, input_dir: &str, output_dir: &str) -> String {
        create_bundling_command(&CommandOptions {
            input_dir,
            output_dir,
            binary: &self.binary,
            architecture: self.options.architecture(),
            runtime: self.runtime,
            lambda_extension: self.extension,
            hooks: self.options.command_hooks.as_deref(),
        })
    }

    fn invocation(&self, mode: &BundlingMode, output_dir: &Path) -> Result<Option<ContainerInvocation>> {
        let BundlingMode::Container { image } = mode else {
            return Ok(None);
        };
        let docker = self.options.docker_options();
        assemble_container_invocation(&AssemblyRequest {
            bundling: &self.options,
            docker: &docker,
            image,
            manifest_path: &self.manifest_path,
            output_dir,
            binary: &self.binary,
            architecture: self.options.architecture(),
            runtime: self.runtime,
            lambda_extension: self.extension,
            excluded_roots: &self.excluded_roots,
        })
        .map(Some)
    }
}

/// Bundles units with a shared configuration and set of collaborators
pub struct Bundler {
    config: BundlerConfig,
    probe: Arc<dyn HostProbe>,
    fetcher: Arc<dyn SourceFetcher>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl Bundler {
    /// Bundler using the real host probe, git and Docker CLIs
    pub fn new(config: BundlerConfig) -> Self {
        let fetcher = GitCli::new(config.clone_dir.clone());
        let runtime = DockerCli::new(config.docker_bin.clone());
        Self {
            config,
            probe: Arc::new(SystemProbe::new()),
            fetcher: Arc::new(fetcher),
            runtime: Arc::new(runtime),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn HostProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn config(&self) -> &BundlerConfig {
        &self.config
    }

    /// Output directory of a unit
    pub fn output_dir(&self, name: &str) -> PathBuf {
        self.config.output_dir.join(name)
    }

    fn prepare(&self, target: &PackageTarget) -> Result<Prepared> {
        target.validate()?;

        let declared = match target.source()? {
            SourceLocation::Local { manifest_path } => target.base_dir.join(manifest_path),
            SourceLocation::Git { source, manifest_path } => {
                self.fetcher.fetch(&source)?.join(manifest_path)
            }
        };

        let manifest_path = std::path::absolute(resolve_manifest_path(&declared)?)?;
        let source_root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                BundleError::ManifestError(format!("{} has no parent directory", manifest_path.display()))
            })?;

        let binary = Manifest::load(&manifest_path)?.select_binary(target.binary_name())?;
        let options = target.bundling_options()?;
        let hash_type = resolve_asset_hash_type(&options)?;
        let runtime = target.runtime();
        let extension = target.kind() == PackageKind::Extension;

        let fingerprint = BuildFingerprint::new(
            &options,
            &source_root,
            &manifest_path,
            Some(&binary.name),
            runtime,
            extension,
        );

        let excluded_roots = self.excluded_roots(&source_root)?;

        Ok(Prepared {
            options,
            manifest_path,
            source_root,
            binary,
            runtime,
            extension,
            hash_type,
            fingerprint,
            excluded_roots,
        })
    }

    /// Output and clone directories that sit inside `source_root`
    ///
    /// Earlier outputs must not feed the next source hash or staged copy.
    fn excluded_roots(&self, source_root: &Path) -> Result<Vec<PathBuf>> {
        let mut roots = Vec::new();
        for dir in [&self.config.output_dir, &self.config.clone_dir] {
            let dir = std::path::absolute(dir)?;
            if dir.starts_with(source_root) {
                roots.push(dir);
            }
        }
        Ok(roots)
    }

    fn decision_context<'a>(&'a self, output_dir: &'a Path, dry_run: bool) -> DecisionContext<'a> {
        DecisionContext {
            output_dir,
            default_image: self.config.default_image.as_ref(),
            force_docker: self.config.force_docker,
            dry_run,
        }
    }

    /// Bundle one unit into a fresh output directory
    pub fn bundle(&self, target: &PackageTarget) -> Result<Asset> {
        let prepared = self.prepare(target)?;

        // Source and custom hashes don't depend on the build
        let early_hash = match prepared.hash_type {
            AssetHashType::Output => None,
            _ => Some(prepared.hash(None)?),
        };

        let output_dir = fresh_output_dir(&self.output_dir(&target.name))?;
        let mode = choose_bundling_mode(
            &prepared.options,
            self.probe.as_ref(),
            &self.decision_context(&output_dir, false),
        )?;
        tracing::info!(unit = %target.name, binary = %prepared.binary.name, %mode, "Bundling");

        match &mode {
            BundlingMode::Local { source: LocalSource::Provider } => {}
            BundlingMode::Local { source: LocalSource::Host } => {
                let command = prepared.command(
                    &prepared.source_root.to_string_lossy(),
                    &output_dir.to_string_lossy(),
                );
                let output = run_local(&command, &prepared.options.environment, &prepared.source_root)?;
                tracing::debug!(unit = %target.name, output = %output, "Local build finished");
            }
            BundlingMode::Container { .. } => {
                if let Some(invocation) = prepared.invocation(&mode, &output_dir)? {
                    let output = self.runtime.run(&invocation)?;
                    tracing::debug!(unit = %target.name, output = %output.output, "Container build finished");
                }
            }
        }

        let output_type = prepared.options.docker_options().output();
        let (path, archived) = resolve_output(&output_dir, output_type)?;

        let hash = match early_hash {
            Some(hash) => hash,
            None => prepared.hash(Some(&output_dir))?,
        };

        tracing::info!(unit = %target.name, path = %path.display(), hash = %hash.value, "Bundled");

        Ok(Asset {
            name: target.name.clone(),
            kind: target.kind(),
            path,
            hash: hash.value,
            hash_type: hash.hash_type,
            architecture: prepared.options.architecture(),
            mode,
            archived,
        })
    }

    /// Resolve a unit and describe the build without running it
    ///
    /// Custom local providers are not invoked; a unit that has one plans as
    /// a container build.
    pub fn plan(&self, target: &PackageTarget) -> Result<BundlePlan> {
        let prepared = self.prepare(target)?;
        let output_dir = std::path::absolute(self.output_dir(&target.name))?;

        let hash = match prepared.hash_type {
            AssetHashType::Output => None,
            _ => Some(prepared.hash(None)?.value),
        };

        let mode = choose_bundling_mode(
            &prepared.options,
            self.probe.as_ref(),
            &self.decision_context(&output_dir, true),
        )?;

        let command = match mode {
            BundlingMode::Local { .. } => Some(prepared.command(
                &prepared.source_root.to_string_lossy(),
                &output_dir.to_string_lossy(),
            )),
            BundlingMode::Container { .. } => None,
        };
        let invocation = prepared.invocation(&mode, &output_dir)?;

        Ok(BundlePlan {
            name: target.name.clone(),
            kind: target.kind(),
            manifest_path: prepared.manifest_path,
            binary: prepared.binary.name,
            architecture: prepared.options.architecture(),
            hash_type: prepared.hash_type,
            hash,
            mode,
            command,
            invocation,
        })
    }

    /// Bundle every target in parallel, one blocking task per unit
    ///
    /// Results come back in target order.
    pub async fn bundle_all(
        self: Arc<Self>,
        targets: Vec<PackageTarget>,
    ) -> Vec<(String, Result<Asset>)> {
        let handles: Vec<_> = targets
            .into_iter()
            .map(|target| {
                let bundler = Arc::clone(&self);
                let name = target.name.clone();
                (name, tokio::task::spawn_blocking(move || bundler.bundle(&target)))
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(BundleError::build(format!("bundling task failed: {}", e))));
            if let Err(e) = &result {
                tracing::error!(unit = %name, kind = e.kind(), error = %e, "Bundling failed");
            }
            results.push((name, result));
        }
        results
    }
}

/// Empty the unit's output directory, returning its absolute path
fn fresh_output_dir(dir: &Path) -> Result<PathBuf> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(std::path::absolute(dir)?)
}

/// Decide whether the output is an archive and where the asset lives
fn resolve_output(output_dir: &Path, output_type: BundlingOutput) -> Result<(PathBuf, bool)> {
    let entries = fs::read_dir(output_dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;

    let single_file = match entries.as_slice() {
        [only] if only.is_file() => Some(only.clone()),
        _ => None,
    };

    match output_type {
        BundlingOutput::NotArchived => Ok((output_dir.to_path_buf(), false)),
        BundlingOutput::Archived => match single_file {
            Some(file) => Ok((file, true)),
            None => Err(BundleError::build(
                "Bundling output directory is expected to include only a single file when `outputType` is `archived`",
            )),
        },
        BundlingOutput::AutoDiscover => match single_file {
            Some(file) if is_archive(&file) => Ok((file, true)),
            _ => Ok((output_dir.to_path_buf(), false)),
        },
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ARCHIVE_EXTENSIONS.iter().any(|a| e.eq_ignore_ascii_case(a)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256_hex;
    use crate::probe::StaticProbe;
    use crate::runner::ContainerOutput;
    use rust_lambda_bundler_props::docker::{
        BundlingFileAccess, DockerOptions, LocalBundling, LocalBundlingOutcome, BUNDLING_OUTPUT_DIR,
    };
    use rust_lambda_bundler_props::source::GitSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Writes `files` into the output mount instead of running Docker
    #[derive(Default)]
    struct StubRuntime {
        files: Vec<&'static str>,
        calls: Mutex<Vec<ContainerInvocation>>,
    }

    impl StubRuntime {
        fn writing(files: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                files: files.to_vec(),
                calls: Mutex::default(),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl ContainerRuntime for StubRuntime {
        fn run(&self, invocation: &ContainerInvocation) -> Result<ContainerOutput> {
            let out = invocation
                .mounts
                .iter()
                .find(|m| m.container_path == BUNDLING_OUTPUT_DIR)
                .unwrap();
            for file in &self.files {
                fs::write(out.host_path.join(file), format!("built {}", file)).unwrap();
            }
            self.calls.lock().unwrap().push(invocation.clone());
            Ok(ContainerOutput {
                status: 0,
                output: String::new(),
            })
        }
    }

    struct FailingFetcher;

    impl SourceFetcher for FailingFetcher {
        fn fetch(&self, source: &GitSource) -> Result<PathBuf> {
            Err(BundleError::FetchError(format!("{} is unreachable", source.remote)))
        }
    }

    #[derive(Debug, Default)]
    struct WritingProvider {
        calls: AtomicUsize,
    }

    impl LocalBundling for WritingProvider {
        fn try_bundle(&self, output_dir: &Path, _options: &BundlingOptions) -> Result<LocalBundlingOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            fs::write(output_dir.join("bootstrap"), "prebuilt")?;
            Ok(LocalBundlingOutcome::Bundled)
        }
    }

    fn project(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(
            dir.join("Cargo.toml"),
            format!("[package]\nname = \"{}\"\nversion = \"0.1.0\"\n", name),
        )
        .unwrap();
        fs::write(dir.join("src/main.rs"), "fn main() {}\n").unwrap();
        dir
    }

    fn bundler(root: &Path, runtime: Arc<StubRuntime>) -> Bundler {
        Bundler::new(BundlerConfig::rooted_at(root.join("out")))
            .with_probe(Arc::new(StaticProbe::unavailable()))
            .with_runtime(runtime)
    }

    fn function(root: &Path, name: &str, bundling: BundlingOptions) -> PackageTarget {
        let dir = project(root, name);
        PackageTarget::function(
            name,
            FunctionProps {
                manifest_path: Some(dir.to_string_lossy().into_owned()),
                bundling: Some(bundling),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_source_hash_stable_across_rebundles() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = project(tmp.path(), "hello");
        let target = PackageTarget::function(
            "hello",
            FunctionProps {
                manifest_path: Some(dir.to_string_lossy().into_owned()),
                bundling: Some(BundlingOptions {
                    forced_docker_bundling: true,
                    asset_hash_type: Some(AssetHashType::Source),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        // Outputs inside the project, by well-known name and by configured path
        for output in ["cdk.out/bundles", "dist"] {
            let mut config = BundlerConfig::rooted_at(tmp.path().join("out"));
            config.output_dir = dir.join(output);
            let bundler = Bundler::new(config)
                .with_probe(Arc::new(StaticProbe::unavailable()))
                .with_runtime(StubRuntime::writing(&["bootstrap"]));

            let first = bundler.bundle(&target).unwrap();
            assert!(dir.join(output).join("hello/bootstrap").is_file());
            let second = bundler.bundle(&target).unwrap();
            assert_eq!(first.hash, second.hash, "output dir {}", output);
        }
    }

    #[test]
    fn test_staged_copy_excludes_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = project(tmp.path(), "hello");
        let mut config = BundlerConfig::rooted_at(tmp.path().join("out"));
        config.output_dir = dir.join("dist");
        let bundler = Bundler::new(config).with_probe(Arc::new(StaticProbe::unavailable()));

        let target = PackageTarget::function(
            "hello",
            FunctionProps {
                manifest_path: Some(dir.to_string_lossy().into_owned()),
                bundling: Some(BundlingOptions {
                    forced_docker_bundling: true,
                    docker_options: Some(DockerOptions {
                        bundling_file_access: Some(BundlingFileAccess::VolumeCopy),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        let plan = bundler.plan(&target).unwrap();
        let source = plan.invocation.unwrap().source_mount().cloned().unwrap();
        assert_eq!(source.excludes, vec![std::path::absolute(dir.join("dist")).unwrap()]);
    }

    #[test]
    fn test_container_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = StubRuntime::writing(&["bootstrap"]);
        let bundler = bundler(tmp.path(), runtime.clone());
        let target = function(
            tmp.path(),
            "hello",
            BundlingOptions {
                forced_docker_bundling: true,
                ..Default::default()
            },
        );

        let asset = bundler.bundle(&target).unwrap();

        assert_eq!(runtime.call_count(), 1);
        assert!(asset.mode.is_container());
        assert_eq!(asset.kind, PackageKind::Function);
        assert_eq!(asset.hash_type, AssetHashType::Output);
        assert_eq!(asset.hash.len(), 64);
        assert!(!asset.archived);
        assert!(asset.path.join("bootstrap").is_file());

        let invocation = &runtime.calls.lock().unwrap()[0];
        let script = invocation.command.last().unwrap();
        assert!(script.contains("--flatten hello"));
        assert!(script.contains("--x86-64"));
    }

    #[test]
    fn test_archive_is_discovered() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = StubRuntime::writing(&["bootstrap.zip"]);
        let bundler = bundler(tmp.path(), runtime);
        let target = function(tmp.path(), "zipped", BundlingOptions::default());

        let asset = bundler.bundle(&target).unwrap();
        assert!(asset.archived);
        assert_eq!(asset.path.file_name().unwrap(), "bootstrap.zip");
    }

    #[test]
    fn test_archived_output_requires_single_file() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = StubRuntime::writing(&["bootstrap", "extra.json"]);
        let bundler = bundler(tmp.path(), runtime);
        let target = function(
            tmp.path(),
            "two-files",
            BundlingOptions {
                docker_options: Some(DockerOptions {
                    output_type: Some(BundlingOutput::Archived),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        let err = bundler.bundle(&target).unwrap_err();
        assert!(matches!(err, BundleError::BuildError { .. }));
    }

    #[test]
    fn test_custom_hash_asset() {
        let tmp = tempfile::tempdir().unwrap();
        let bundler = bundler(tmp.path(), StubRuntime::writing(&["bootstrap"]));
        let target = function(
            tmp.path(),
            "custom",
            BundlingOptions {
                asset_hash: Some("abc".into()),
                ..Default::default()
            },
        );

        let asset = bundler.bundle(&target).unwrap();
        assert_eq!(asset.hash_type, AssetHashType::Custom);
        assert_eq!(asset.hash, sha256_hex(b"abc"));
    }

    #[test]
    fn test_fetch_failure_stops_before_build() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = StubRuntime::writing(&["bootstrap"]);
        let bundler = bundler(tmp.path(), runtime.clone()).with_fetcher(Arc::new(FailingFetcher));
        let target = PackageTarget::function(
            "remote",
            FunctionProps {
                git_remote: Some("https://example.invalid/repo".into()),
                bundling: Some(BundlingOptions {
                    forced_docker_bundling: true,
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        let err = bundler.bundle(&target).unwrap_err();
        assert!(matches!(err, BundleError::FetchError(_)));
        assert_eq!(runtime.call_count(), 0);
        assert!(!bundler.output_dir("remote").exists());
    }

    #[test]
    fn test_local_provider_skips_container() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = StubRuntime::writing(&["bootstrap"]);
        let bundler = bundler(tmp.path(), runtime.clone());
        let provider = Arc::new(WritingProvider::default());
        let target = function(
            tmp.path(),
            "provided",
            BundlingOptions {
                docker_options: Some(DockerOptions {
                    local: Some(provider.clone() as Arc<dyn LocalBundling>),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        let asset = bundler.bundle(&target).unwrap();
        assert_eq!(asset.mode, BundlingMode::Local { source: LocalSource::Provider });
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.call_count(), 0);
        assert_eq!(
            fs::read_to_string(asset.path.join("bootstrap")).unwrap(),
            "prebuilt"
        );
    }

    #[test]
    fn test_plan_does_not_build() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = StubRuntime::writing(&["bootstrap"]);
        let bundler = bundler(tmp.path(), runtime.clone());
        let target = function(
            tmp.path(),
            "planned",
            BundlingOptions {
                asset_hash_type: Some(AssetHashType::Source),
                architecture: Some(Architecture::Arm64),
                ..Default::default()
            },
        );

        let plan = bundler.plan(&target).unwrap();
        assert!(plan.mode.is_container());
        assert_eq!(plan.binary, "planned");
        assert!(plan.hash.is_some());
        assert!(plan.command.is_none());
        let invocation = plan.invocation.unwrap();
        assert!(invocation.command[2].contains("--arm64"));

        assert_eq!(runtime.call_count(), 0);
        assert!(!bundler.output_dir("planned").exists());
    }

    #[test]
    fn test_plan_local_host_command() {
        let tmp = tempfile::tempdir().unwrap();
        let bundler = bundler(tmp.path(), StubRuntime::writing(&[]))
            .with_probe(Arc::new(StaticProbe::available()));
        let target = function(tmp.path(), "host", BundlingOptions::default());

        let plan = bundler.plan(&target).unwrap();
        assert_eq!(plan.mode, BundlingMode::Local { source: LocalSource::Host });
        assert!(plan.invocation.is_none());
        assert!(plan.command.unwrap().starts_with("cargo lambda build --release"));
    }

    #[test]
    fn test_architecture_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let bundler = bundler(tmp.path(), StubRuntime::writing(&[]));
        let mut target = function(
            tmp.path(),
            "mismatch",
            BundlingOptions {
                architecture: Some(Architecture::Arm64),
                ..Default::default()
            },
        );
        if let TargetProps::Function(props) = &mut target.props {
            props.architecture = Some(Architecture::X86_64);
        }

        let err = bundler.bundle(&target).unwrap_err();
        assert!(err.to_string().contains("Architecture mismatch"));
    }

    #[tokio::test]
    async fn test_bundle_all_keeps_order() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = StubRuntime::writing(&["bootstrap"]);
        let bundler = Arc::new(bundler(tmp.path(), runtime.clone()));

        let targets = vec![
            function(tmp.path(), "alpha", BundlingOptions::default()),
            PackageTarget::extension(
                "beta",
                ExtensionProps {
                    manifest_path: Some(project(tmp.path(), "beta").to_string_lossy().into_owned()),
                    ..Default::default()
                },
            ),
            PackageTarget::function(
                "broken",
                FunctionProps {
                    manifest_path: Some(tmp.path().join("missing").to_string_lossy().into_owned()),
                    ..Default::default()
                },
            ),
        ];

        let results = bundler.bundle_all(targets).await;
        let names: Vec<_> = results.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "broken"]);

        assert!(results[0].1.is_ok());
        let beta = results[1].1.as_ref().unwrap();
        assert_eq!(beta.kind, PackageKind::Extension);
        assert!(matches!(results[2].1, Err(BundleError::ManifestError(_))));
        assert_eq!(runtime.call_count(), 2);
    }
}
