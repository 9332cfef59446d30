//! cargo-lambda command synthesis
//!
//! Produces the shell command run either on the host or inside the
//! bundling container, with command hooks chained around it.

use rust_lambda_bundler_props::function::Runtime;
use rust_lambda_bundler_props::hooks::CommandHooks;
use rust_lambda_bundler_props::Architecture;

use crate::cargo::BinarySelection;

/// Everything the build command depends on
#[derive(Debug, Clone, Copy)]
pub struct CommandOptions<'a> {
    /// Directory holding `Cargo.toml`, as seen where the command runs
    pub input_dir: &'a str,
    /// Directory cargo-lambda writes into, as seen where the command runs
    pub output_dir: &'a str,
    pub binary: &'a BinarySelection,
    pub architecture: Architecture,
    /// Only set for functions; extensions run on whatever runtime loads them
    pub runtime: Option<Runtime>,
    pub lambda_extension: bool,
    pub hooks: Option<&'a dyn CommandHooks>,
}

/// Build the `cargo lambda build` invocation, wrapped in hooks
pub fn create_bundling_command(opts: &CommandOptions<'_>) -> String {
    let manifest = format!("{}/Cargo.toml", opts.input_dir.trim_end_matches(['/', '\\']));

    let mut build = vec![
        "cargo".to_string(),
        "lambda".to_string(),
        "build".to_string(),
        "--release".to_string(),
        "--manifest-path".to_string(),
        shell_quote(&manifest),
        "--lambda-dir".to_string(),
        shell_quote(opts.output_dir),
    ];

    if opts.lambda_extension {
        build.push("--extension".to_string());
    }

    // provided.al2 ships an old glibc, so pin the target to it
    match opts.runtime.and_then(Runtime::glibc_version) {
        Some(glibc) => {
            build.push("--target".to_string());
            build.push(format!("{}.{}", opts.architecture.target_triple(), glibc));
        }
        None => build.push(opts.architecture.cargo_lambda_flag().to_string()),
    }

    if opts.binary.explicit {
        build.push("--bin".to_string());
        build.push(shell_quote(&opts.binary.name));
    }

    if !opts.lambda_extension {
        build.push("--flatten".to_string());
        build.push(shell_quote(&opts.binary.name));
    }

    let command = build.join(" ");

    let mut commands = Vec::new();
    if let Some(hooks) = opts.hooks {
        commands.extend(hooks.before_bundling(opts.input_dir, opts.output_dir));
    }
    commands.push(command);
    if let Some(hooks) = opts.hooks {
        commands.extend(hooks.after_bundling(opts.input_dir, opts.output_dir));
    }

    chain(&commands)
}

/// Join commands with `&&`, dropping empty ones
fn chain(commands: &[String]) -> String {
    commands
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Single-quote a word for `bash -c` if it needs it
fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_lambda_bundler_props::hooks::StaticCommandHooks;

    fn binary(name: &str, explicit: bool) -> BinarySelection {
        BinarySelection {
            name: name.to_string(),
            explicit,
        }
    }

    fn options<'a>(binary: &'a BinarySelection) -> CommandOptions<'a> {
        CommandOptions {
            input_dir: "/asset-input",
            output_dir: "/asset-output",
            binary,
            architecture: Architecture::X86_64,
            runtime: Some(Runtime::ProvidedAl2023),
            lambda_extension: false,
            hooks: None,
        }
    }

    #[test]
    fn test_function_command() {
        let bin = binary("simple-package", false);
        let command = create_bundling_command(&options(&bin));
        assert_eq!(
            command,
            "cargo lambda build --release --manifest-path /asset-input/Cargo.toml --lambda-dir /asset-output --x86-64 --flatten simple-package"
        );
    }

    #[test]
    fn test_explicit_binary_arm64() {
        let bin = binary("binary1", true);
        let command = create_bundling_command(&CommandOptions {
            architecture: Architecture::Arm64,
            ..options(&bin)
        });
        assert!(command.contains("--arm64"));
        assert!(command.contains("--bin binary1"));
        assert!(command.contains("--flatten binary1"));
        assert!(command.contains("/asset-input/Cargo.toml"));
    }

    #[test]
    fn test_extension_command() {
        let bin = binary("rust-extension", false);
        let command = create_bundling_command(&CommandOptions {
            lambda_extension: true,
            runtime: None,
            ..options(&bin)
        });
        assert!(command.contains("--extension"));
        assert!(!command.contains("--flatten"));
    }

    #[test]
    fn test_al2_pins_glibc() {
        let bin = binary("hello", false);
        let command = create_bundling_command(&CommandOptions {
            runtime: Some(Runtime::ProvidedAl2),
            architecture: Architecture::Arm64,
            ..options(&bin)
        });
        assert!(command.contains("--target aarch64-unknown-linux-gnu.2.26"));
        assert!(!command.contains("--arm64"));
    }

    #[test]
    fn test_hooks_chained() {
        let bin = binary("hello", false);
        let hooks = StaticCommandHooks {
            before_bundling: vec!["cargo test".into(), "".into()],
            after_bundling: vec!["cp {input_dir}/extra.json {output_dir}".into()],
        };
        let command = create_bundling_command(&CommandOptions {
            hooks: Some(&hooks),
            ..options(&bin)
        });

        assert!(command.starts_with("cargo test && cargo lambda build"));
        assert!(command.ends_with(" && cp /asset-input/extra.json /asset-output"));
    }

    #[test]
    fn test_paths_with_spaces_are_quoted() {
        let bin = binary("hello", false);
        let command = create_bundling_command(&CommandOptions {
            input_dir: "/home/me/my project",
            ..options(&bin)
        });
        assert!(command.contains("--manifest-path '/home/me/my project/Cargo.toml'"));
    }
}
