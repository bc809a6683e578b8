//! Container tool invocation.
//!
//! Builds and pushes go through [`ContainerTool`] so the pipelines never
//! spawn processes themselves. [`CliTool`] runs a docker-compatible binary.

use std::path::Path;

use crate::config::PipelineConfig;
use crate::error::{CommandFailedDetails, Error};
use crate::utils::command::{self, CommandOutput};
use crate::utils::shell;

/// Number of output lines kept in failure details.
const OUTPUT_TAIL_LINES: usize = 15;

pub trait ContainerTool: Send + Sync {
    /// Program name used in logs and error details.
    fn program(&self) -> &str;

    /// Run the tool with `args`, inside `dir` when given.
    fn run(&self, dir: Option<&Path>, args: &[String]) -> CommandOutput;
}

/// A docker-compatible command line client.
#[derive(Debug, Clone)]
pub struct CliTool {
    program: String,
}

impl CliTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ContainerTool for CliTool {
    fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, dir: Option<&Path>, args: &[String]) -> CommandOutput {
        command::run_in_dir(&self.program, args, dir)
    }
}

/// Flags that change how an image is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildFlags {
    pub no_cache: bool,
    pub squash: bool,
}

/// Arguments for `<tool> build` run inside the build context.
///
/// Order: `build`, cache and squash flags, proxy build args taken from the
/// environment, then `-t <image> .`.
pub fn build_args(image: &str, flags: BuildFlags, config: &PipelineConfig) -> Vec<String> {
    let mut args = vec!["build".to_string()];

    if flags.no_cache {
        args.push("--no-cache".to_string());
    }
    if flags.squash {
        args.push("--squash".to_string());
    }
    if let Some(proxy) = &config.http_proxy {
        args.push("--build-arg".to_string());
        args.push(format!("http_proxy={}", proxy));
    }
    if let Some(proxy) = &config.https_proxy {
        args.push("--build-arg".to_string());
        args.push(format!("https_proxy={}", proxy));
    }

    args.push("-t".to_string());
    args.push(image.to_string());
    args.push(".".to_string());
    args
}

pub fn push_args(image: &str) -> Vec<String> {
    vec!["push".to_string(), image.to_string()]
}

/// Printable form of an invocation, quoted the way a shell would need it.
pub fn display_command(tool: &dyn ContainerTool, args: &[String]) -> String {
    format!("{} {}", tool.program(), shell::quote_args(args))
}

/// Failure details for a finished invocation, keeping only the output tail.
pub fn failure_details(
    function: &str,
    tool: &dyn ContainerTool,
    args: &[String],
    output: &CommandOutput,
) -> CommandFailedDetails {
    CommandFailedDetails {
        function: function.to_string(),
        command: display_command(tool, args),
        exit_code: output.exit_code,
        stdout: command::tail(&output.stdout, OUTPUT_TAIL_LINES),
        stderr: command::tail(&output.stderr, OUTPUT_TAIL_LINES),
    }
}

/// Hint for the handful of exit codes that mean the tool itself is unusable.
pub fn exit_code_hint(error: Error, exit_code: i32) -> Error {
    match exit_code {
        -1 | 127 => error.with_hint(
            "Command not found. Check that the container tool is installed and in PATH",
        ),
        126 => error.with_hint("Permission denied. Check that you can run the container tool"),
        _ => error,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::defaults;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Records every invocation and fails those whose arguments contain one
    /// of `failing`.
    #[derive(Default)]
    pub(crate) struct RecordingTool {
        pub calls: Mutex<Vec<(Option<PathBuf>, Vec<String>)>>,
        pub failing: Vec<String>,
        pub delay_ms: u64,
    }

    impl RecordingTool {
        pub fn failing(images: &[&str]) -> Self {
            Self {
                failing: images.iter().map(|s| s.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<(Option<PathBuf>, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ContainerTool for RecordingTool {
        fn program(&self) -> &str {
            "docker"
        }

        fn run(&self, dir: Option<&Path>, args: &[String]) -> CommandOutput {
            self.calls
                .lock()
                .unwrap()
                .push((dir.map(Path::to_path_buf), args.to_vec()));
            if self.delay_ms > 0 {
                std::thread::sleep(std::time::Duration::from_millis(self.delay_ms));
            }
            let fails = args.iter().any(|a| self.failing.contains(a));
            CommandOutput {
                stdout: "step 1/1".to_string(),
                stderr: if fails { "denied".to_string() } else { String::new() },
                success: !fails,
                exit_code: if fails { 1 } else { 0 },
            }
        }
    }

    fn config(http: Option<&str>, https: Option<&str>) -> PipelineConfig {
        let mut config =
            PipelineConfig::from_defaults(Path::new("./"), &defaults::builtin_defaults());
        config.http_proxy = http.map(str::to_string);
        config.https_proxy = https.map(str::to_string);
        config
    }

    #[test]
    fn build_args_default_order() {
        let args = build_args("alexellis/echo", BuildFlags::default(), &config(None, None));
        assert_eq!(args, vec!["build", "-t", "alexellis/echo", "."]);
    }

    #[test]
    fn build_args_include_flags_and_proxies() {
        let flags = BuildFlags {
            no_cache: true,
            squash: true,
        };
        let args = build_args(
            "img",
            flags,
            &config(Some("http://proxy:3128"), Some("https://proxy:3129")),
        );
        assert_eq!(
            args,
            vec![
                "build",
                "--no-cache",
                "--squash",
                "--build-arg",
                "http_proxy=http://proxy:3128",
                "--build-arg",
                "https_proxy=https://proxy:3129",
                "-t",
                "img",
                "."
            ]
        );
    }

    #[test]
    fn failure_details_keep_output_tail() {
        let tool = RecordingTool::default();
        let stderr: String = (0..40).map(|i| format!("line {}\n", i)).collect();
        let output = CommandOutput {
            stdout: String::new(),
            stderr,
            success: false,
            exit_code: 2,
        };
        let details = failure_details("echo", &tool, &push_args("my image"), &output);

        assert_eq!(details.command, "docker push 'my image'");
        assert_eq!(details.stderr.lines().count(), OUTPUT_TAIL_LINES);
        assert!(details.stderr.ends_with("line 39"));
    }

    #[test]
    fn exit_code_hint_only_for_tool_problems() {
        let err = exit_code_hint(Error::other("x"), 127);
        assert_eq!(err.hints.len(), 1);
        let err = exit_code_hint(Error::other("x"), 1);
        assert!(err.hints.is_empty());
    }

    #[test]
    fn cli_tool_reports_missing_binary() {
        let tool = CliTool::new("fnship-missing-tool-xyz");
        let output = tool.run(None, &push_args("img"));
        assert!(!output.success);
        assert_eq!(output.exit_code, -1);
    }
}
