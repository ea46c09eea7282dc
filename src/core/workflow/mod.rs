//! Agentic workflow compiler: Markdown source in, GitHub Actions lock file out.

pub mod compiler;
pub mod emit;
pub mod engines;
pub mod imports;
pub mod jobs;
pub mod model;
pub mod network;
pub mod normalize;
pub mod pins;
pub mod runtimes;
pub mod safe_inputs;
pub mod safe_outputs;
pub mod schema;
pub mod scripts;
pub mod source;
pub mod steps;
pub mod stop_time;
pub mod tools;
pub mod triggers;
pub mod validate;
pub mod values;

pub use compiler::{lock_path_for, CompiledWorkflow, Compiler};
pub use model::{build_model, WorkflowModel};
pub use source::{parse_source, read_source, SourceDocument};
pub use validate::{SemanticValidator, ValidationFinding};
