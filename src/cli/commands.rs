use crate::{
    cli::{args::SourceArgs, Command},
    core::{
        config::{CompilerConfig, ConfigLoader},
        context::{self, CompilerContext},
        workflow::Compiler,
        DefaultErrorReporter, ErrorReporter,
    },
    Result,
};
use anyhow::{anyhow, Context};
use std::fs;
use std::path::{Path, PathBuf};

/// Totals for one CLI invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub compiled: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Run `command`, reporting per-file problems on stderr. A failing workflow
/// does not stop the others; only setup problems return `Err`.
pub fn execute(command: &Command) -> Result<RunSummary> {
    context::set_version(crate::VERSION);
    context::set_verbose(command.verbose());

    let workspace_root = command.workspace_root();
    let mut config = ConfigLoader::load_from_workspace(&workspace_root)
        .with_context(|| format!("failed to load config from {}", workspace_root.display()))?
        .compiler;

    let (source, write) = match command {
        Command::Compile(args) => {
            config.strict |= args.strict;
            config.refresh_stop_time |= args.refresh_stop_time;
            if let Some(mode) = args.action_mode {
                config.action_mode = mode;
            }
            if args.no_emit {
                config.emit_aux_files = false;
            }
            (&args.source, true)
        }
        Command::Validate(args) => {
            config.strict |= args.strict;
            (&args.source, false)
        }
    };

    let files = collect_sources(source, &workspace_root)?;
    tracing::debug!(
        "{} workflow(s) under {} (strict: {}, action mode: {})",
        files.len(),
        workspace_root.display(),
        config.strict,
        config.action_mode
    );
    Ok(compile_all(config, &files, write, &DefaultErrorReporter::new()))
}

/// Compile each file with its own context so warning counts stay per file.
pub fn compile_all(
    config: CompilerConfig,
    files: &[PathBuf],
    write: bool,
    reporter: &dyn ErrorReporter,
) -> RunSummary {
    let compiler = Compiler::new(config);
    let mut summary = RunSummary::default();

    for file in files {
        let context = CompilerContext::new();
        let result = if write {
            compiler.compile_file(file, &context)
        } else {
            compiler.build(file, &context)
        };

        for message in context.warning_messages() {
            reporter.report_warning(&message, Some(file.display().to_string()));
        }
        summary.warnings += context.warning_count();

        match result {
            Ok(compiled) => {
                summary.compiled += 1;
                if context::is_verbose() {
                    println!(
                        "{} -> {} ({})",
                        file.display(),
                        compiled.lock_path.display(),
                        compiled.jobs.join(", ")
                    );
                }
            }
            Err(err) => {
                summary.failed += 1;
                summary.errors += err.count();
                reporter.report_error(&err);
            }
        }
    }

    reporter.report_summary(summary.compiled, summary.errors, summary.warnings);
    summary
}

/// Explicit files as given, else every `*.md` directly inside
/// `<root>/.github/workflows`, sorted.
pub fn collect_sources(source: &SourceArgs, workspace_root: &Path) -> Result<Vec<PathBuf>> {
    if !source.files.is_empty() {
        return Ok(source.files.clone());
    }

    let workflows_dir = workspace_root.join(".github").join("workflows");
    if !workflows_dir.is_dir() {
        return Err(anyhow!(
            "no workflow directory at {}",
            workflows_dir.display()
        ));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(&workflows_dir)
        .with_context(|| format!("failed to read {}", workflows_dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(anyhow!(
            "no workflow sources (*.md) in {}",
            workflows_dir.display()
        ));
    }
    Ok(files)
}
