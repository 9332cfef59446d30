//! Deployment definition parsing
//!
//! Parses YAML files listing the functions and extensions to bundle, with
//! environment variable substitution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rust_lambda_bundler_props::{ExtensionProps, FunctionProps};

use crate::bundler::PackageTarget;

/// The deployment definition (e.g. `lambdas.yaml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentDefinition {
    /// Functions by unit name
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionProps>,

    /// Extensions by unit name
    #[serde(default)]
    pub extensions: BTreeMap<String, ExtensionProps>,

    /// Directory of the definition file; local manifest paths are relative to it
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl DeploymentDefinition {
    /// Parse a definition from YAML content
    ///
    /// Variables are expanded in scalar values, except under `commandHooks`
    /// whose commands run in the bundling environment.
    pub fn parse(yaml: &str) -> Result<Self> {
        let mut value: serde_yaml::Value =
            serde_yaml::from_str(yaml).context("Failed to parse deployment definition")?;
        let pattern = regex_lite::Regex::new(ENV_VAR_PATTERN)?;
        expand_value(&mut value, &pattern);
        serde_yaml::from_value(value).context("Failed to parse deployment definition")
    }

    /// Load a definition from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read definition file: {:?}", path))?;
        let mut definition = Self::parse(&content)?;
        definition.base_dir = Some(
            path.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        );
        Ok(definition)
    }

    /// Validate every unit
    pub fn validate(&self) -> Result<()> {
        if self.functions.is_empty() && self.extensions.is_empty() {
            anyhow::bail!("Definition declares no functions or extensions");
        }

        for name in self.extensions.keys() {
            if self.functions.contains_key(name) {
                anyhow::bail!("'{}' is declared both as a function and as an extension", name);
            }
        }

        for name in self.functions.keys().chain(self.extensions.keys()) {
            if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                anyhow::bail!("'{}' is not a valid unit name", name);
            }
        }

        for (name, props) in &self.functions {
            props
                .validate()
                .with_context(|| format!("Invalid function '{}'", name))?;
        }

        for (name, props) in &self.extensions {
            props
                .validate()
                .with_context(|| format!("Invalid extension '{}'", name))?;
        }

        Ok(())
    }

    /// Units to bundle, functions first, each group in name order
    pub fn targets(&self) -> Vec<PackageTarget> {
        let base_dir = self.base_dir.clone().unwrap_or_else(|| PathBuf::from("."));

        let functions = self
            .functions
            .iter()
            .map(|(name, props)| PackageTarget::function(name.clone(), props.clone()));
        let extensions = self
            .extensions
            .iter()
            .map(|(name, props)| PackageTarget::extension(name.clone(), props.clone()));

        functions
            .chain(extensions)
            .map(|t| t.with_base_dir(base_dir.clone()))
            .collect()
    }
}

/// Mapping key whose values are left unexpanded
const HOOKS_KEY: &str = "commandHooks";

/// `$$`, `${VAR}`, `${VAR:-default}` or `$VAR`
const ENV_VAR_PATTERN: &str =
    r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}|\$([A-Za-z_][A-Za-z0-9_]*)";

fn expand_value(value: &mut serde_yaml::Value, pattern: &regex_lite::Regex) {
    use serde_yaml::Value;

    match value {
        Value::String(s) => {
            let expanded = expand_env_vars(s, pattern);
            if expanded != *s {
                // `memorySize: ${MEMORY}` should still read as a number
                *value = match serde_yaml::from_str::<Value>(&expanded) {
                    Ok(scalar @ (Value::Number(_) | Value::Bool(_))) => scalar,
                    _ => Value::String(expanded),
                };
            }
        }
        Value::Sequence(items) => {
            for item in items {
                expand_value(item, pattern);
            }
        }
        Value::Mapping(map) => {
            for (key, item) in map.iter_mut() {
                if key.as_str() != Some(HOOKS_KEY) {
                    expand_value(item, pattern);
                }
            }
        }
        Value::Tagged(tagged) => expand_value(&mut tagged.value, pattern),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Expand environment variables in a string
/// Supports: ${VAR}, ${VAR:-default}, $VAR, and $$ for a literal `$`
fn expand_env_vars(input: &str, pattern: &regex_lite::Regex) -> String {
    pattern
        .replace_all(input, |caps: &regex_lite::Captures| {
            if let Some(name) = caps.get(1) {
                let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                std::env::var(name.as_str()).unwrap_or_else(|_| default.to_string())
            } else if let Some(name) = caps.get(3) {
                std::env::var(name.as_str()).unwrap_or_default()
            } else {
                "$".to_string()
            }
        })
        .into_owned()
}
