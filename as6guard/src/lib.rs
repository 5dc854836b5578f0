//! as6guard - Automation Studio 4 to 6 migration analysis library
//!
//! This library scans B&R Automation Studio 4 projects for constructs
//! that Automation Studio 6 / Automation Runtime 6 no longer supports:
//! deprecated libraries, discontinued hardware modules, renamed function
//! blocks, types and enumerators. It can also rewrite renamed constructs
//! in place, syntax-aware and idempotently.
//!
//! # Quick Start
//!
//! ```no_run
//! use as6guard::{load_builtin_rules, AnalyzeOptions, As6GuardCore};
//! use std::path::Path;
//!
//! let kb = load_builtin_rules().unwrap();
//! let core = As6GuardCore::new();
//! let report = core
//!     .analyze(Path::new("MyPlantProject"), &kb, &AnalyzeOptions::default())
//!     .unwrap();
//!
//! for finding in &report.findings {
//!     println!("{}: {}", finding.severity, finding.message);
//! }
//! ```
//!
//! # Features
//!
//! - **Knowledge Base**: versioned deprecation rules, embedded or loaded
//!   from external JSON files
//! - **Analysis**: per-role checkers over the project tree, parallel and
//!   deterministic
//! - **Rewrite**: token-based replacements that never touch comments or
//!   strings, verified before anything is written back

pub mod checkers;
pub mod core;
pub mod kb;
pub mod lexer;
pub mod report;
pub mod rewrite;
pub mod walker;

// Re-export main types
pub use crate::core::{
    tool_version, AnalyzeOptions, As6GuardCore, As6GuardError, RewriteOptions,
};
pub use checkers::{CheckContext, Checker, CheckerSet};
pub use kb::loader::{KnowledgeBase, KnowledgeBaseError};
pub use kb::schema::{Rule, RuleKind, Severity, Version, VersionRange};
pub use report::{aggregate, Finding, Location, Report, SeverityCounts, ARTIFACT_NAME};
pub use rewrite::{AppliedRule, RewriteEngine, RewriteOutcome, RewriteResult};
pub use walker::{ClassifiedFile, FileRole, ProjectWalker};

/// Load the embedded rule data (convenience wrapper).
pub fn load_builtin_rules() -> Result<KnowledgeBase, KnowledgeBaseError> {
    kb::builtin::load_builtin()
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        load_builtin_rules, AnalyzeOptions, As6GuardCore, As6GuardError, Finding, KnowledgeBase,
        Report, RewriteOptions, RuleKind, Severity,
    };
}
