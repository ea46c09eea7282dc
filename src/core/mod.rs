pub mod config;
pub mod context;
pub mod error;
pub mod types;
pub mod workflow;

pub use config::{CompilerConfig, ConfigLoader, ConfigValidator, GhawConfig};
pub use context::CompilerContext;
pub use error::{AppError, DefaultErrorReporter, ErrorReporter};
pub use types::*;
pub use workflow::{CompiledWorkflow, Compiler};
