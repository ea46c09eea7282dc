//! File-system helpers shared by the compile pipeline.
pub mod files;

pub use files::{write_atomic, AuxiliaryStore};
