#![allow(clippy::result_large_err)] // Normalizer returns AppError for structured diagnostics.

use crate::core::context::CompilerContext;
use crate::core::error::AppError;
use serde_yaml::Mapping;

mod rules;

pub use rules::{
    expand_bash_tools, expand_toolsets, BashToolTransform, CacheMemoryTransform, ConcurrencyTransform,
    EngineShorthandTransform, GitHubToolsetTransform, NetworkShorthandTransform, ReactionTransform,
    ScalarCanonicalTransform, DEFAULT_BASH_COMMANDS, DEFAULT_TOOLSETS, GIT_BASH_COMMANDS,
};

/// Pure transform over the merged front matter.
pub trait FrontMatterTransform {
    fn name(&self) -> &'static str;
    fn transform(&self, front_matter: Mapping, context: &CompilerContext) -> Result<Mapping, AppError>;
}

/// Apply every normalization in order. Transforms leave values they do not
/// understand untouched so schema validation can report them.
pub fn apply_default_pipeline(front_matter: Mapping, context: &CompilerContext) -> Result<Mapping, AppError> {
    let transforms: Vec<Box<dyn FrontMatterTransform>> = vec![
        Box::new(EngineShorthandTransform),
        Box::new(ScalarCanonicalTransform),
        Box::new(ConcurrencyTransform),
        Box::new(NetworkShorthandTransform),
        Box::new(ReactionTransform),
        Box::new(GitHubToolsetTransform),
        Box::new(BashToolTransform),
        Box::new(CacheMemoryTransform),
    ];
    let mut current = front_matter;
    for transform in transforms {
        tracing::trace!("normalize: {}", transform.name());
        current = transform.transform(current, context)?;
    }
    Ok(current)
}
