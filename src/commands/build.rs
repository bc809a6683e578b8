use clap::Args;
use serde::Serialize;
use std::path::Path;

use fnship::build::{self, BuildOptions};
use fnship::config::PipelineConfig;
use fnship::container::CliTool;
use fnship::log_status;
use fnship::manifest::{self, FunctionSpec, LanguageKind, Selection};
use fnship::template::{self, ProvisionReport};
use fnship::{BatchReport, ItemStatus};

use super::CmdResult;

#[derive(Args)]
pub struct BuildArgs {
    /// Stack file describing the functions to build
    #[arg(short = 'f', long = "yaml")]
    pub yaml: Option<String>,

    /// Image name for a single function build
    #[arg(long)]
    pub image: Option<String>,

    /// Handler directory for a single function build
    #[arg(long)]
    pub handler: Option<String>,

    /// Function name for a single function build
    #[arg(long)]
    pub name: Option<String>,

    /// Language template (or 'Dockerfile') for a single function build
    #[arg(long)]
    pub lang: Option<String>,

    /// Do not use the build cache
    #[arg(long)]
    pub no_cache: bool,

    /// Squash image layers (experimental builder feature)
    #[arg(long)]
    pub squash: bool,

    /// Only assemble build contexts under <workdir>/build
    #[arg(long)]
    pub shrinkwrap: bool,

    /// Number of functions to build in parallel
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Only build functions whose name matches this regular expression
    #[arg(long)]
    pub regex: Option<String>,

    /// Only build functions whose name matches this wildcard pattern
    #[arg(long)]
    pub filter: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum BuildOutput {
    Batch(BuildBatchOutput),
    Single(BuildSingleOutput),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildBatchOutput {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates: Option<ProvisionReport>,
    pub report: BatchReport,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSingleOutput {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates: Option<ProvisionReport>,
    pub function: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub fn run(args: BuildArgs, global: &super::GlobalArgs) -> CmdResult<BuildOutput> {
    let config = global.pipeline_config()?;
    let tool = CliTool::new(&config.tool);
    let options = BuildOptions {
        no_cache: args.no_cache,
        squash: args.squash,
        shrinkwrap: args.shrinkwrap,
    };

    if let Some(yaml) = &args.yaml {
        let selection = Selection {
            regex: args.regex.as_deref(),
            filter: args.filter.as_deref(),
        };
        let stack = manifest::load(Path::new(yaml), &selection)?;
        log_status!("build", "Selected function(s): {:?}", stack.names());
        let templates = provision_if_needed(&config, stack.functions.iter())?;
        let parallel = args.parallel.unwrap_or(config.parallel);

        let report = build::build(&config, &stack.functions, parallel, options, &tool)?;
        if let Some(err) = report.error.clone() {
            return Err(err.with_hint(format!(
                "{} of {} function(s) failed; {} not dispatched",
                report.summary.failed, report.summary.total, report.summary.not_dispatched
            )));
        }

        return Ok((
            BuildOutput::Batch(BuildBatchOutput {
                command: "build".to_string(),
                templates,
                report,
            }),
            0,
        ));
    }

    let spec = FunctionSpec::standalone(args.name, args.handler, args.image, args.lang)?;
    let templates = provision_if_needed(&config, std::iter::once(&spec))?;
    let outcome = build::build_single(&config, &spec, options, &tool)?;

    Ok((
        BuildOutput::Single(BuildSingleOutput {
            command: "build".to_string(),
            templates,
            function: spec.name,
            status: outcome.status,
            detail: outcome.detail,
        }),
        0,
    ))
}

/// Templates are only needed when some function builds from a language template.
fn provision_if_needed<'a>(
    config: &PipelineConfig,
    mut functions: impl Iterator<Item = &'a FunctionSpec>,
) -> fnship::Result<Option<ProvisionReport>> {
    let needed = functions
        .any(|f| !f.skip_build && matches!(f.language_kind(), LanguageKind::Template(_)));
    if needed {
        template::ensure_templates(config, None)
    } else {
        Ok(None)
    }
}
