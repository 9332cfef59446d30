//! Rust Lambda bundler
//!
//! Packages Rust Lambda functions and extensions into deployable assets by
//! running `cargo lambda build`, on the host when it can and inside a Docker
//! container otherwise.
//!
//! The pieces are usable on their own:
//! - [`hash::compute_asset_hash`] computes the asset cache key
//! - [`decision::choose_bundling_mode`] picks local or container bundling
//! - [`docker::assemble_container_invocation`] describes the container build
//!
//! [`bundler::Bundler`] runs them end to end.

pub mod archive;
pub mod bundler;
pub mod cargo;
pub mod command;
pub mod config;
pub mod decision;
pub mod definition;
pub mod docker;
pub mod git;
pub mod hash;
pub mod probe;
pub mod runner;

pub use bundler::{Asset, BundlePlan, Bundler, PackageKind, PackageTarget, TargetProps};
pub use config::BundlerConfig;
pub use decision::{BundlingMode, LocalSource};
pub use definition::DeploymentDefinition;

pub use rust_lambda_bundler_props as props;
