//! Properties for a Rust Lambda function

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BundleError, Result};
use crate::options::{Architecture, BundlingOptions};
use crate::source::SourceLocation;

/// Minimum and maximum accepted `max_event_age`, in seconds
const MAX_EVENT_AGE_RANGE: (u64, u64) = (60, 6 * 60 * 60);
const MEMORY_SIZE_RANGE: (u32, u32) = (128, 10_240);
const MAX_TIMEOUT_SECS: u64 = 900;
const MAX_RETRY_ATTEMPTS: u32 = 2;

/// OS-only Lambda runtime the binary is deployed on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Runtime {
    #[default]
    #[serde(rename = "provided.al2023")]
    ProvidedAl2023,
    #[serde(rename = "provided.al2")]
    ProvidedAl2,
}

impl Runtime {
    pub fn name(self) -> &'static str {
        match self {
            Runtime::ProvidedAl2023 => "provided.al2023",
            Runtime::ProvidedAl2 => "provided.al2",
        }
    }

    /// glibc version the binary must link against, when it has to be pinned
    pub fn glibc_version(self) -> Option<&'static str> {
        match self {
            Runtime::ProvidedAl2023 => None,
            Runtime::ProvidedAl2 => Some("2.26"),
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reference to an existing VPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcRef {
    pub vpc_id: String,
}

/// Which subnets of the VPC the function's network interfaces go in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSelection {
    #[serde(default)]
    pub subnet_type: Option<String>,

    #[serde(default)]
    pub subnet_ids: Vec<String>,
}

/// Properties for a Rust function
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionProps {
    /// The name of the binary to build, in case that's different than the package's name
    #[serde(default)]
    pub binary_name: Option<String>,

    /// Path to a directory containing `Cargo.toml`, or to `Cargo.toml` itself.
    /// Relative to the repository root when `git_remote` is set.
    #[serde(default)]
    pub manifest_path: Option<String>,

    #[serde(default)]
    pub bundling: Option<BundlingOptions>,

    #[serde(default)]
    pub git_remote: Option<String>,

    #[serde(default)]
    pub git_reference: Option<String>,

    #[serde(default)]
    pub git_force_clone: Option<bool>,

    /// Defaults to `provided.al2023`
    #[serde(default)]
    pub runtime: Option<Runtime>,

    #[serde(default)]
    pub architecture: Option<Architecture>,

    // Pass-through deployment parameters, handed to the provisioning engine untouched.
    #[serde(default)]
    pub function_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Megabytes
    #[serde(default)]
    pub memory_size: Option<u32>,

    /// Seconds
    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    #[serde(default)]
    pub retry_attempts: Option<u32>,

    /// Seconds
    #[serde(default)]
    pub max_event_age: Option<u64>,

    #[serde(default)]
    pub reserved_concurrent_executions: Option<u32>,

    #[serde(default)]
    pub vpc: Option<VpcRef>,

    #[serde(default)]
    pub vpc_subnets: Option<SubnetSelection>,

    #[serde(default)]
    pub allow_public_subnet: Option<bool>,
}

impl FunctionProps {
    pub fn runtime(&self) -> Runtime {
        self.runtime.unwrap_or_default()
    }

    pub fn source(&self) -> Result<SourceLocation> {
        SourceLocation::from_props(
            self.manifest_path.as_deref(),
            self.git_remote.as_deref(),
            self.git_reference.as_deref(),
            self.git_force_clone,
        )
    }

    /// Bundling options with the architecture resolved
    ///
    /// The bundling architecture wins, then the function's, then x86_64.
    /// Both set and different is an error.
    pub fn bundling_options(&self) -> Result<BundlingOptions> {
        let mut bundling = self.bundling.clone().unwrap_or_default();

        let architecture = match (bundling.architecture, self.architecture) {
            (Some(b), Some(f)) if b != f => {
                return Err(BundleError::config(format!(
                    "Architecture mismatch: the architecture for bundling ({}) didn't match the architecture of the underlying lambda ({}).",
                    b, f
                )));
            }
            (Some(b), _) => b,
            (None, Some(f)) => f,
            (None, None) => Architecture::default(),
        };
        bundling.architecture = Some(architecture);

        Ok(bundling)
    }

    /// Validate the props, applying the same rules the provisioning engine would
    pub fn validate(&self) -> Result<()> {
        self.source()?;
        self.bundling_options()?.validate()?;

        if self.vpc_subnets.is_some() && self.vpc.is_none() {
            return Err(BundleError::config(
                "Cannot configure 'vpcSubnets' without configuring a VPC",
            ));
        }

        if self.allow_public_subnet.unwrap_or(false) && self.vpc.is_none() {
            return Err(BundleError::config(
                "Cannot configure 'allowPublicSubnet' without configuring a VPC",
            ));
        }

        if let Some(attempts) = self.retry_attempts {
            if attempts > MAX_RETRY_ATTEMPTS {
                return Err(BundleError::config(format!(
                    "retryAttempts must be between 0 and {}, got {}",
                    MAX_RETRY_ATTEMPTS, attempts
                )));
            }
        }

        if let Some(age) = self.max_event_age {
            let (min, max) = MAX_EVENT_AGE_RANGE;
            if !(min..=max).contains(&age) {
                return Err(BundleError::config(format!(
                    "maxEventAge must be between {} and {} seconds, got {}",
                    min, max, age
                )));
            }
        }

        if let Some(memory) = self.memory_size {
            let (min, max) = MEMORY_SIZE_RANGE;
            if !(min..=max).contains(&memory) {
                return Err(BundleError::config(format!(
                    "memorySize must be between {} and {} MB, got {}",
                    min, max, memory
                )));
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 || timeout > MAX_TIMEOUT_SECS {
                return Err(BundleError::config(format!(
                    "timeout must be between 1 and {} seconds, got {}",
                    MAX_TIMEOUT_SECS, timeout
                )));
            }
        }

        Ok(())
    }
}
