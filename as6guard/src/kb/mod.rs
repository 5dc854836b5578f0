//! Versioned deprecation knowledge base: rule schema, loader and the
//! embedded default rule data.

pub mod builtin;
pub mod loader;
pub mod schema;

pub use builtin::{builtin_sources, load_builtin};
pub use loader::{KnowledgeBase, KnowledgeBaseError};
pub use schema::{
    ArgScale, PatternKind, RewriteSpec, Rule, RuleKind, Severity, Version, VersionRange,
};
