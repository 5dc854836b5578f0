//! Per-role checkers. Each checker consumes one classified file plus the
//! read-only Knowledge Base and emits zero or more findings; routing is by
//! the file's role, never by runtime type inspection.

pub mod function;
pub mod hardware;
pub mod library;
pub mod project;

use std::path::PathBuf;

use crate::kb::loader::KnowledgeBase;
use crate::kb::schema::Rule;
use crate::report::{Finding, Location};
use crate::walker::{ClassifiedFile, FileRole};

pub use function::FunctionChecker;
pub use hardware::HardwareChecker;
pub use library::LibraryChecker;
pub use project::ProjectChecker;

/// Read-only context shared by all checkers of one scan pass.
pub struct CheckContext {
    pub project_root: PathBuf,
}

pub trait Checker: Send + Sync {
    fn id(&self) -> &'static str;
    fn roles(&self) -> &'static [FileRole];
    fn check(
        &self,
        file: &ClassifiedFile,
        content: &str,
        kb: &KnowledgeBase,
        ctx: &CheckContext,
    ) -> Vec<Finding>;
}

pub struct CheckerSet {
    checkers: Vec<Box<dyn Checker>>,
}

impl CheckerSet {
    pub fn new() -> Self {
        Self {
            checkers: Vec::new(),
        }
    }

    pub fn with_default_checkers() -> Self {
        let mut set = Self::new();
        set.add_checker(Box::new(ProjectChecker::new()));
        set.add_checker(Box::new(LibraryChecker::new()));
        set.add_checker(Box::new(HardwareChecker::new()));
        set.add_checker(Box::new(FunctionChecker::functions()));
        set.add_checker(Box::new(FunctionChecker::opc_ua()));
        set.add_checker(Box::new(FunctionChecker::motion()));
        set.add_checker(Box::new(FunctionChecker::mapp_components()));
        set
    }

    pub fn add_checker(&mut self, checker: Box<dyn Checker>) {
        self.checkers.push(checker);
    }

    /// Run every checker registered for the file's role.
    pub fn check_file(
        &self,
        file: &ClassifiedFile,
        content: &str,
        kb: &KnowledgeBase,
        ctx: &CheckContext,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();
        for checker in &self.checkers {
            if checker.roles().contains(&file.role) {
                findings.extend(checker.check(file, content, kb, ctx));
            }
        }
        findings
    }
}

impl Default for CheckerSet {
    fn default() -> Self {
        Self::with_default_checkers()
    }
}

/// Line/column for a byte offset, both 1-based.
pub(crate) fn location_at(content: &str, offset: usize) -> Location {
    let clamped = offset.min(content.len());
    let before = &content.as_bytes()[..clamped];
    let line = before.iter().filter(|&&b| b == b'\n').count() as u32 + 1;
    let column = before
        .iter()
        .rev()
        .take_while(|&&b| b != b'\n')
        .count() as u32
        + 1;
    Location { line, column }
}

/// Pick one rule when several match the same identifier. Should not happen
/// given the uniqueness invariant; when it does, the narrowest source
/// version range wins. Returns the winner and whether the choice was
/// ambiguous (the caller records a rule-ambiguity warning).
pub(crate) fn select_rule<'a>(mut candidates: Vec<&'a Rule>) -> (&'a Rule, bool) {
    debug_assert!(!candidates.is_empty());
    let ambiguous = candidates.len() > 1;
    candidates.sort_by(|a, b| {
        b.source_range
            .specificity()
            .cmp(&a.source_range.specificity())
            .then_with(|| a.identifier.cmp(&b.identifier))
            .then_with(|| a.kind.cmp(&b.kind))
    });
    (candidates[0], ambiguous)
}

/// Build the standard deprecation finding for a rule hit. Hints get the
/// documentation links of any topic they mention appended.
pub(crate) fn rule_finding(
    rule: &Rule,
    kb: &KnowledgeBase,
    file: &ClassifiedFile,
    location: Option<Location>,
    subject: String,
) -> Finding {
    let message = match &rule.replacement {
        Some(replacement) => format!("{} (use '{}' instead)", subject, replacement),
        None => subject,
    };
    Finding {
        rule: rule.id(),
        file: file.path.clone(),
        location,
        severity: rule.severity,
        message,
        hint: Some(kb.linkify(&rule.hint)),
    }
}

/// Warning emitted when more than one rule matched one identifier.
pub(crate) fn ambiguity_finding(
    file: &ClassifiedFile,
    location: Option<Location>,
    identifier: &str,
) -> Finding {
    Finding {
        rule: "rule-ambiguity".to_string(),
        file: file.path.clone(),
        location,
        severity: crate::kb::schema::Severity::Warning,
        message: format!(
            "multiple rules match identifier '{}'; the narrowest version range was applied",
            identifier
        ),
        hint: Some("check the rule data for overlapping records".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_at_counts_lines_and_columns() {
        let content = "abc\nde\nfgh";
        assert_eq!(location_at(content, 0), Location { line: 1, column: 1 });
        assert_eq!(location_at(content, 4), Location { line: 2, column: 1 });
        assert_eq!(location_at(content, 8), Location { line: 3, column: 2 });
    }
}
