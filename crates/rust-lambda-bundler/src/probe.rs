//! Host capability probing
//!
//! Answers whether the host can build locally: the cargo toolchain and the
//! cargo-lambda helper both have to be resolvable.

use std::io::ErrorKind;
use std::process::{Command, Stdio};

use dashmap::DashMap;

use rust_lambda_bundler_props::{BundleError, Result};

/// Toolchain needed for local bundling
pub const TOOLCHAIN: &str = "cargo";

/// Build helper needed for local bundling, invoked as `cargo lambda`
pub const HELPER: &str = "cargo-lambda";

/// Read-only host capability probe
pub trait HostProbe: Send + Sync {
    /// Whether the named toolchain runs on this host
    fn toolchain_available(&self, name: &str) -> Result<bool>;

    /// Whether the named build helper runs on this host
    fn helper_available(&self, name: &str) -> Result<bool>;
}

/// Probe that runs `--version` against the real host, caching results
#[derive(Debug, Default)]
pub struct SystemProbe {
    cache: DashMap<String, bool>,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn probe(&self, key: &str, program: &str, args: &[&str]) -> Result<bool> {
        if let Some(found) = self.cache.get(key) {
            return Ok(*found);
        }

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        let found = match status {
            Ok(status) => status.success(),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                return Err(BundleError::ProbeError(format!(
                    "failed to run `{} {}`: {}",
                    program,
                    args.join(" "),
                    e
                )))
            }
        };

        tracing::debug!(probe = key, found, "Probed host capability");
        self.cache.insert(key.to_string(), found);
        Ok(found)
    }
}

impl HostProbe for SystemProbe {
    fn toolchain_available(&self, name: &str) -> Result<bool> {
        self.probe(name, name, &["--version"])
    }

    fn helper_available(&self, name: &str) -> Result<bool> {
        // cargo subcommands are reached through cargo itself
        match name.strip_prefix("cargo-") {
            Some(sub) => self.probe(name, TOOLCHAIN, &[sub, "--version"]),
            None => self.probe(name, name, &["--version"]),
        }
    }
}

/// Probe with fixed answers
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe {
    pub toolchain: bool,
    pub helper: bool,
}

impl StaticProbe {
    pub fn available() -> Self {
        Self { toolchain: true, helper: true }
    }

    pub fn unavailable() -> Self {
        Self { toolchain: false, helper: false }
    }
}

impl HostProbe for StaticProbe {
    fn toolchain_available(&self, _name: &str) -> Result<bool> {
        Ok(self.toolchain)
    }

    fn helper_available(&self, _name: &str) -> Result<bool> {
        Ok(self.helper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_unavailable() {
        let probe = SystemProbe::new();
        let found = probe
            .toolchain_available("definitely-not-a-real-toolchain-7f3a")
            .unwrap();
        assert!(!found);

        // Served from the cache the second time
        assert!(probe.cache.contains_key("definitely-not-a-real-toolchain-7f3a"));
        assert!(!probe
            .toolchain_available("definitely-not-a-real-toolchain-7f3a")
            .unwrap());
    }

    #[test]
    fn test_static_probe() {
        assert!(StaticProbe::available().toolchain_available(TOOLCHAIN).unwrap());
        assert!(!StaticProbe::unavailable().helper_available(HELPER).unwrap());
    }
}
