use clap::{Args, Subcommand};

use fnship::template::{self, ProvisionReport};

use super::CmdResult;

#[derive(Args)]
pub struct TemplateArgs {
    #[command(subcommand)]
    command: TemplateCommand,
}

#[derive(Subcommand)]
enum TemplateCommand {
    /// Download language templates into <workdir>/template
    Pull {
        /// Repository to fetch from (default: templates.repository in fnship.json)
        repository: Option<String>,

        /// Replace language templates that already exist locally
        #[arg(long)]
        overwrite: bool,
    },
}

pub fn run(args: TemplateArgs, global: &super::GlobalArgs) -> CmdResult<ProvisionReport> {
    match args.command {
        TemplateCommand::Pull {
            repository,
            overwrite,
        } => {
            if let Some(repo) = &repository {
                template::validate_repository_url(repo)?;
            }
            let config = global.pipeline_config()?;
            let report = template::fetch_and_expand(&config, repository.as_deref(), overwrite)?;
            Ok((report, 0))
        }
    }
}
