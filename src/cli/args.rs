use crate::core::types::ActionMode;
use clap::Args;
use std::path::PathBuf;

/// Which workflow sources to operate on.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Workflow Markdown files (default: every *.md in .github/workflows)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Repository directory to search for workflows (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CompileArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Reject permissive constructs (write scopes, wildcard network, sandbox: false)
    #[arg(long)]
    pub strict: bool,

    /// Recompute relative stop-after deadlines instead of keeping the previous ones
    #[arg(long)]
    pub refresh_stop_time: bool,

    /// Resolve helper actions locally (dev) or from pinned published refs (release)
    #[arg(long, value_name = "MODE")]
    pub action_mode: Option<ActionMode>,

    /// Write only the lock files, not the helper scripts and tool descriptors
    #[arg(long)]
    pub no_emit: bool,

    /// Log pipeline stages at debug level
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Apply strict-mode checks
    #[arg(long)]
    pub strict: bool,

    /// Log pipeline stages at debug level
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
