use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{build, push, template};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "fnship")]
#[command(version = VERSION)]
#[command(about = "Build and push serverless function images from language templates")]
struct Cli {
    /// Directory holding template/ and build/
    #[arg(long, global = true, default_value = "./")]
    workdir: String,

    /// Container tool used for build and push (default: build.tool in fnship.json)
    #[arg(long, global = true)]
    tool: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage language templates
    Template(template::TemplateArgs),
    /// Build function images from a stack file or flags
    Build(build::BuildArgs),
    /// Push function images listed in a stack file
    Push(push::PushArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs {
        workdir: cli.workdir,
        tool: cli.tool,
    };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    if output::print_json_result(json_result).is_err() {
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
