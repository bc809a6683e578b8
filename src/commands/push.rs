use clap::Args;
use std::path::Path;

use fnship::container::CliTool;
use fnship::manifest::{self, Selection};
use fnship::log_status;
use fnship::push;
use fnship::utils::validation;
use fnship::BatchReport;

use super::CmdResult;

#[derive(Args)]
pub struct PushArgs {
    /// Stack file describing the functions to push
    #[arg(short = 'f', long = "yaml")]
    pub yaml: Option<String>,

    /// Number of images to push in parallel
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Only push functions whose name matches this regular expression
    #[arg(long)]
    pub regex: Option<String>,

    /// Only push functions whose name matches this wildcard pattern
    #[arg(long)]
    pub filter: Option<String>,
}

pub fn run(args: PushArgs, global: &super::GlobalArgs) -> CmdResult<BatchReport> {
    let yaml = validation::require(
        args.yaml,
        "yaml",
        "Pass a stack file with -f <stack.yml>",
    )?;
    let config = global.pipeline_config()?;
    let selection = Selection {
        regex: args.regex.as_deref(),
        filter: args.filter.as_deref(),
    };
    let stack = manifest::load(Path::new(&yaml), &selection)?;
    if stack.functions.is_empty() {
        log_status!("push", "No functions found in {}", yaml);
    }

    let tool = CliTool::new(&config.tool);
    let report = push::push(&stack.functions, args.parallel.unwrap_or(config.parallel), &tool);
    if let Some(err) = report.error.clone() {
        return Err(err.with_hint(format!(
            "{} of {} image(s) failed to push",
            report.summary.failed, report.summary.total
        )));
    }

    Ok((report, 0))
}
