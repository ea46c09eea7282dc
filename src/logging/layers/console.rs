use crate::logging::context::ExecutionContext;
use serde::Deserialize;
use std::fmt;
use std::io;
use std::str::FromStr;
use tracing::Subscriber;
use tracing_subscriber::fmt::{self as tracing_fmt, format, writer::BoxMakeWriter};
use tracing_subscriber::registry::LookupSpan;

pub type ConsoleFmtLayer<S> =
    tracing_fmt::Layer<S, format::DefaultFields, format::Format<format::Full>, BoxMakeWriter>;

/// Where compiler log lines go. Per-workflow results and the summary line are
/// printed by the CLI regardless of this setting.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleOutput {
    Stdout,
    #[default]
    Stderr,
    None,
}

impl ConsoleOutput {
    fn as_str(self) -> &'static str {
        match self {
            ConsoleOutput::Stdout => "stdout",
            ConsoleOutput::Stderr => "stderr",
            ConsoleOutput::None => "none",
        }
    }

    fn writer(self) -> BoxMakeWriter {
        match self {
            ConsoleOutput::Stdout => BoxMakeWriter::new(io::stdout),
            ConsoleOutput::Stderr => BoxMakeWriter::new(io::stderr),
            ConsoleOutput::None => BoxMakeWriter::new(io::sink),
        }
    }
}

impl fmt::Display for ConsoleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsoleOutput {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        [ConsoleOutput::Stdout, ConsoleOutput::Stderr, ConsoleOutput::None]
            .into_iter()
            .find(|output| output.as_str() == normalized)
            .or((normalized == "off").then_some(ConsoleOutput::None))
            .ok_or_else(|| format!("unknown console sink '{}'; use stdout, stderr or none", value))
    }
}

/// `GHAW_LOG_CONSOLE` or the config file wins; CI runners read stdout, terminals stderr.
pub fn select_console_output(context: ExecutionContext, configured: Option<ConsoleOutput>) -> ConsoleOutput {
    configured.unwrap_or(match context {
        ExecutionContext::Ci => ConsoleOutput::Stdout,
        ExecutionContext::LocalDev => ConsoleOutput::Stderr,
    })
}

/// Plain-text layer; CI lines carry the target so runner logs show the pipeline stage.
pub fn console_layer<S>(output: ConsoleOutput, context: ExecutionContext) -> ConsoleFmtLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_fmt::layer()
        .with_writer(output.writer())
        .with_ansi(false)
        .with_target(context == ExecutionContext::Ci)
        .with_thread_ids(false)
        .with_thread_names(false)
}
