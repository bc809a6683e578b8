use fnship::config::PipelineConfig;
use fnship::utils::validation;

pub type CmdResult<T> = fnship::Result<(T, i32)>;

/// Flags shared by every subcommand.
pub(crate) struct GlobalArgs {
    pub workdir: String,
    pub tool: Option<String>,
}

impl GlobalArgs {
    /// Resolve `fnship.json` defaults with the command line overrides applied.
    pub fn pipeline_config(&self) -> fnship::Result<PipelineConfig> {
        let config = PipelineConfig::load(&self.workdir)?;
        match &self.tool {
            Some(tool) => Ok(config.with_tool(validation::require_non_empty(
                tool,
                "tool",
                "Container tool cannot be empty",
            )?)),
            None => Ok(config),
        }
    }
}

pub mod build;
pub mod push;
pub mod template;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (fnship::Result<serde_json::Value>, i32) {
    crate::tty::status("fnship is working...");

    match command {
        crate::Commands::Template(args) => dispatch!(args, global, template),
        crate::Commands::Build(args) => dispatch!(args, global, build),
        crate::Commands::Push(args) => dispatch!(args, global, push),
    }
}
