pub mod args;
pub mod commands;

pub use args::{CompileArgs, SourceArgs, ValidateArgs};
use crate::core::config::ConfigLoader;
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
COMMANDS:\n{subcommands}\n\
{after-help}\n";

#[derive(Parser, Debug)]
#[command(name = "ghaw")]
#[command(version = crate::VERSION)]
#[command(about = "Compile agentic workflow Markdown into GitHub Actions lock files")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: edit .github/workflows/<name>.md, run `ghaw compile`, commit both the source and <name>.lock.yml."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(
        about = "Compile workflows into .lock.yml files",
        long_about = "Compile reads each workflow source, resolves its imports, validates the front matter, and writes <name>.lock.yml next to it together with helper files under aw/<name>/.",
        after_help = "Examples:\n    ghaw compile\n    ghaw compile .github/workflows/triage.md --strict\n    ghaw compile --action-mode dev --refresh-stop-time"
    )]
    Compile(CompileArgs),
    #[command(
        about = "Check workflows without writing anything",
        long_about = "Validate runs the full compile pipeline and reports every error, but leaves lock files and helper files untouched.",
        after_help = "Example:\n    ghaw validate .github/workflows/triage.md"
    )]
    Validate(ValidateArgs),
}

impl Command {
    fn source(&self) -> &SourceArgs {
        match self {
            Command::Compile(args) => &args.source,
            Command::Validate(args) => &args.source,
        }
    }

    pub fn verbose(&self) -> bool {
        match self {
            Command::Compile(args) => args.verbose,
            Command::Validate(args) => args.verbose,
        }
    }

    /// Repository root the command operates in: `--dir` (or the current
    /// directory) walked up to the nearest `.github` / `.git` holder.
    pub fn workspace_root(&self) -> PathBuf {
        let start = match &self.source().dir {
            Some(dir) => dir.clone(),
            None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        ConfigLoader::find_workspace_root(&start)
    }
}
