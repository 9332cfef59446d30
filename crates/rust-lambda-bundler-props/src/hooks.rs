//! Command hooks run around the cargo-lambda build
//!
//! Hooks run in the environment in which bundling occurs: inside the
//! container for Docker bundling or on the host for local bundling.
//! Commands are chained with `&&`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle callbacks returning shell commands
///
/// ```ignore
/// #[derive(Debug)]
/// struct RunTests;
///
/// impl CommandHooks for RunTests {
///     fn before_bundling(&self, _input_dir: &str, _output_dir: &str) -> Vec<String> {
///         vec!["cargo test".to_string()]
///     }
///
///     fn after_bundling(&self, _input_dir: &str, _output_dir: &str) -> Vec<String> {
///         Vec::new()
///     }
/// }
/// ```
pub trait CommandHooks: Send + Sync + fmt::Debug {
    /// Returns commands to run before bundling
    fn before_bundling(&self, input_dir: &str, output_dir: &str) -> Vec<String>;

    /// Returns commands to run after bundling
    fn after_bundling(&self, input_dir: &str, output_dir: &str) -> Vec<String>;
}

/// Hooks declared as plain command lists, usable from YAML definitions
///
/// `{input_dir}` and `{output_dir}` are replaced with the directories of
/// the current bundling environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCommandHooks {
    #[serde(default)]
    pub before_bundling: Vec<String>,

    #[serde(default)]
    pub after_bundling: Vec<String>,
}

impl StaticCommandHooks {
    fn render(commands: &[String], input_dir: &str, output_dir: &str) -> Vec<String> {
        commands
            .iter()
            .map(|c| {
                c.replace("{input_dir}", input_dir)
                    .replace("{output_dir}", output_dir)
            })
            .collect()
    }
}

impl CommandHooks for StaticCommandHooks {
    fn before_bundling(&self, input_dir: &str, output_dir: &str) -> Vec<String> {
        Self::render(&self.before_bundling, input_dir, output_dir)
    }

    fn after_bundling(&self, input_dir: &str, output_dir: &str) -> Vec<String> {
        Self::render(&self.after_bundling, input_dir, output_dir)
    }
}

pub(crate) fn deserialize_hooks<'de, D>(
    deserializer: D,
) -> Result<Option<Arc<dyn CommandHooks>>, D::Error>
where
    D: Deserializer<'de>,
{
    let hooks = Option::<StaticCommandHooks>::deserialize(deserializer)?;
    Ok(hooks.map(|h| Arc::new(h) as Arc<dyn CommandHooks>))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_hooks_placeholders() {
        let hooks = StaticCommandHooks {
            before_bundling: vec!["cargo test --manifest-path {input_dir}/Cargo.toml".into()],
            after_bundling: vec!["cp {input_dir}/config.json {output_dir}".into()],
        };

        assert_eq!(
            hooks.before_bundling("/asset-input", "/asset-output"),
            vec!["cargo test --manifest-path /asset-input/Cargo.toml"]
        );
        assert_eq!(
            hooks.after_bundling("/asset-input", "/asset-output"),
            vec!["cp /asset-input/config.json /asset-output"]
        );
    }

    #[test]
    fn test_static_hooks_default_empty() {
        let hooks: StaticCommandHooks = serde_json::from_str("{}").unwrap();
        assert!(hooks.before_bundling("a", "b").is_empty());
        assert!(hooks.after_bundling("a", "b").is_empty());
    }
}
