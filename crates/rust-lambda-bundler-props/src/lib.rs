//! Rust Lambda bundler props - Options and properties for bundling Rust Lambdas
//!
//! This crate holds the data model shared by the bundler: bundling and Docker
//! options, function and extension props, the pluggable hook and local
//! bundling traits, and the error type.

pub mod docker;
pub mod error;
pub mod extension;
pub mod function;
pub mod hooks;
pub mod options;
pub mod source;

pub mod prelude {
    //! Common imports for bundler users
    pub use crate::docker::{
        BundlingFileAccess, BundlingOutput, DockerImage, DockerOptions, DockerVolume,
        LocalBundling, LocalBundlingOutcome, VolumeConsistency,
    };
    pub use crate::error::{BundleError, Result};
    pub use crate::extension::{ExtensionProps, RemovalPolicy};
    pub use crate::function::{FunctionProps, Runtime, SubnetSelection, VpcRef};
    pub use crate::hooks::{CommandHooks, StaticCommandHooks};
    pub use crate::options::{Architecture, AssetHashType, BundlingOptions};
    pub use crate::source::{GitSource, SourceLocation};
}

// Re-export key types at crate root
pub use docker::{DockerImage, DockerOptions};
pub use error::{BundleError, Result};
pub use extension::ExtensionProps;
pub use function::FunctionProps;
pub use options::{Architecture, AssetHashType, BundlingOptions};
