//! Scan and rewrite orchestration.
//!
//! `As6GuardCore` owns the checker set and drives the walk, the parallel
//! per-file passes and the aggregation into a report. File contents are
//! read once per file and never shared between passes, so the workers only
//! share the read-only Knowledge Base.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rayon::prelude::*;

use crate::checkers::{CheckContext, CheckerSet};
use crate::kb::loader::{KnowledgeBase, KnowledgeBaseError};
use crate::kb::schema::{RuleKind, Severity};
use crate::report::{aggregate, Finding, Report, ScanMetadata};
use crate::rewrite::{RewriteEngine, RewriteOutcome, RewriteResult};
use crate::walker::{read_classified, FileRole, ProjectWalker, WalkEvent};

#[derive(Debug, thiserror::Error)]
pub enum As6GuardError {
    #[error(transparent)]
    KnowledgeBase(#[from] KnowledgeBaseError),
    #[error("'{0}' is not an Automation Studio project root (no .apj file found)")]
    InvalidProjectRoot(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("operation cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Include info-level findings in the report.
    pub verbose: bool,
    /// Write the text artifact into the project root (or `output`).
    pub emit_file: bool,
    pub output: Option<PathBuf>,
    pub cancel: Option<Arc<AtomicBool>>,
}

#[derive(Debug, Clone)]
pub struct RewriteOptions {
    /// Rule categories the rewrite pass executes.
    pub kinds: Vec<RuleKind>,
    pub dry_run: bool,
    /// Keep the original next to each rewritten file as `<name>.bak`.
    pub backup: bool,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            kinds: vec![
                RuleKind::Function,
                RuleKind::FunctionBlock,
                RuleKind::OpcUaConstruct,
                RuleKind::MotionConstruct,
            ],
            dry_run: false,
            backup: false,
            cancel: None,
        }
    }
}

pub struct As6GuardCore {
    checkers: CheckerSet,
}

impl As6GuardCore {
    pub fn new() -> Self {
        Self {
            checkers: CheckerSet::with_default_checkers(),
        }
    }

    pub fn with_checkers(checkers: CheckerSet) -> Self {
        Self { checkers }
    }

    /// Analyze a project tree and aggregate the findings into a report.
    /// All-or-nothing: cancellation discards partial results.
    pub fn analyze(
        &self,
        root: &Path,
        kb: &KnowledgeBase,
        options: &AnalyzeOptions,
    ) -> Result<Report, As6GuardError> {
        let walker = ProjectWalker::new(root);
        if walker.find_project_descriptor()?.is_none() {
            return Err(As6GuardError::InvalidProjectRoot(root.to_path_buf()));
        }

        let events = walker.walk();
        let ctx = CheckContext {
            project_root: root.to_path_buf(),
        };
        tracing::debug!(files = events.len(), root = %root.display(), "scan started");

        let per_file: Result<Vec<Vec<Finding>>, As6GuardError> = events
            .par_iter()
            .map(|event| {
                if is_cancelled(&options.cancel) {
                    return Err(As6GuardError::Cancelled);
                }
                Ok(match event {
                    WalkEvent::Unreadable { path, error } => {
                        vec![Finding::scan_error(path.clone(), error.clone())]
                    }
                    WalkEvent::File(file) => match read_classified(file) {
                        Ok((content, _)) => self.checkers.check_file(file, &content, kb, &ctx),
                        Err(err) => vec![Finding::scan_error(file.path.clone(), err.to_string())],
                    },
                })
            })
            .collect();

        let mut findings: Vec<Finding> = per_file?.into_iter().flatten().collect();
        if !options.verbose {
            findings.retain(|f| f.severity > Severity::Info);
        }

        let metadata = ScanMetadata {
            project_root: root.to_path_buf(),
            timestamp: Utc::now(),
            ruleset_version: kb.version().to_string(),
            tool_version: tool_version(),
        };
        let report = aggregate(findings, metadata);
        tracing::info!(
            errors = report.counts.errors,
            warnings = report.counts.warnings,
            "scan finished"
        );

        if options.emit_file {
            match report.write_artifact(options.output.as_deref()) {
                Ok(path) => tracing::info!(path = %path.display(), "result file written"),
                // The analysis itself succeeded; a read-only project root
                // must not turn it into a failure.
                Err(err) => tracing::warn!(error = %err, "result file could not be written"),
            }
        }
        Ok(report)
    }

    /// Rewrite deprecated constructs in place. Each file is handled
    /// independently; a failed file is reported, not fatal.
    pub fn rewrite(
        &self,
        root: &Path,
        kb: &KnowledgeBase,
        options: &RewriteOptions,
    ) -> Result<Vec<RewriteResult>, As6GuardError> {
        let walker = ProjectWalker::new(root);
        if walker.find_project_descriptor()?.is_none() {
            return Err(As6GuardError::InvalidProjectRoot(root.to_path_buf()));
        }

        let engine = RewriteEngine::new(options.kinds.clone());
        let files: Vec<_> = walker
            .walk()
            .into_iter()
            .filter_map(|event| match event {
                WalkEvent::File(file)
                    if matches!(file.role, FileRole::Source | FileRole::Declaration)
                        && !is_library_source(&file.path, root) =>
                {
                    Some(file)
                }
                _ => None,
            })
            .collect();

        let mut results: Vec<RewriteResult> = files
            .par_iter()
            .map(|file| {
                if is_cancelled(&options.cancel) {
                    return Err(As6GuardError::Cancelled);
                }
                // I/O trouble stays with its file; the rest of the pass
                // keeps going.
                Ok(engine
                    .rewrite_file(file, kb, options.dry_run, options.backup)
                    .unwrap_or_else(|err| RewriteResult {
                        path: file.path.clone(),
                        outcome: RewriteOutcome::Failed(format!(
                            "file could not be processed: {}",
                            err
                        )),
                        applied: Vec::new(),
                        diff: None,
                        warnings: Vec::new(),
                    }))
            })
            .collect::<Result<Vec<_>, As6GuardError>>()?;

        results.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(results)
    }
}

impl Default for As6GuardCore {
    fn default() -> Self {
        Self::new()
    }
}

/// Build identity for the report metadata. Release builds stamp
/// `RELEASE_VERSION`; otherwise the crate version stands in.
pub fn tool_version() -> Option<String> {
    option_env!("RELEASE_VERSION")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(str::to_string)
}

fn is_cancelled(cancel: &Option<Arc<AtomicBool>>) -> bool {
    cancel
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Sources below `Logical/Libraries` belong to the libraries themselves;
/// the migration replaces the library, not its internals.
fn is_library_source(path: &Path, root: &Path) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let components: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_str().unwrap_or("").to_ascii_lowercase())
        .collect();
    components
        .windows(2)
        .any(|pair| pair[0] == "logical" && pair[1] == "libraries")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::builtin::load_builtin;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn sample_project(dir: &Path) {
        write(
            &dir.join("Plant.apj"),
            r#"<?AutomationStudio Version="4.12.2.90"?><Project />"#,
        );
        write(
            &dir.join("Logical/Package.pkg"),
            r#"<Package><Objects><Object Type="Library">AsMath</Object></Objects></Package>"#,
        );
        write(
            &dir.join("Logical/prog/main.st"),
            "angle := atan2(y, x);\n",
        );
    }

    #[test]
    fn analyze_reports_library_and_function_findings() {
        let dir = tempfile::tempdir().unwrap();
        sample_project(dir.path());
        let kb = load_builtin().unwrap();
        let core = As6GuardCore::new();
        let report = core
            .analyze(dir.path(), &kb, &AnalyzeOptions::default())
            .unwrap();
        let rules: Vec<&str> = report.findings.iter().map(|f| f.rule.as_str()).collect();
        assert!(rules.contains(&"library:AsMath"));
        assert!(rules.contains(&"function:atan2"));
    }

    #[test]
    fn missing_descriptor_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("whatever.txt"), "not a project");
        let kb = load_builtin().unwrap();
        let core = As6GuardCore::new();
        let err = core
            .analyze(dir.path(), &kb, &AnalyzeOptions::default())
            .unwrap_err();
        assert!(matches!(err, As6GuardError::InvalidProjectRoot(_)));
    }

    #[test]
    fn cancellation_discards_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        sample_project(dir.path());
        let kb = load_builtin().unwrap();
        let core = As6GuardCore::new();
        let flag = Arc::new(AtomicBool::new(true));
        let options = AnalyzeOptions {
            cancel: Some(flag),
            ..Default::default()
        };
        let err = core.analyze(dir.path(), &kb, &options).unwrap_err();
        assert!(matches!(err, As6GuardError::Cancelled));
    }

    #[test]
    fn artifact_lands_in_the_project_root() {
        let dir = tempfile::tempdir().unwrap();
        sample_project(dir.path());
        let kb = load_builtin().unwrap();
        let core = As6GuardCore::new();
        let options = AnalyzeOptions {
            emit_file: true,
            ..Default::default()
        };
        core.analyze(dir.path(), &kb, &options).unwrap();
        let artifact = dir.path().join(crate::report::ARTIFACT_NAME);
        let text = std::fs::read_to_string(artifact).unwrap();
        assert!(text.contains("library:AsMath") || text.contains("AsMath"));
    }

    #[test]
    fn rewrite_skips_library_sources() {
        let dir = tempfile::tempdir().unwrap();
        sample_project(dir.path());
        write(
            &dir.path().join("Logical/Libraries/MyLib/helper.st"),
            "a := atan2(p, q);\n",
        );
        let kb = load_builtin().unwrap();
        let core = As6GuardCore::new();
        let results = core
            .rewrite(dir.path(), &kb, &RewriteOptions::default())
            .unwrap();
        let paths: Vec<String> = results
            .iter()
            .map(|r| r.path.display().to_string())
            .collect();
        assert!(paths.iter().any(|p| p.ends_with("main.st")));
        assert!(!paths.iter().any(|p| p.ends_with("helper.st")));
        let rewritten = std::fs::read_to_string(dir.path().join("Logical/prog/main.st")).unwrap();
        assert_eq!(rewritten, "angle := brmatan2(y, x);\n");
        let untouched =
            std::fs::read_to_string(dir.path().join("Logical/Libraries/MyLib/helper.st")).unwrap();
        assert_eq!(untouched, "a := atan2(p, q);\n");
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_source_fails_only_that_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        sample_project(dir.path());
        let blocked = dir.path().join("Logical/prog/locked.st");
        write(&blocked, "b := pow(x, y);\n");
        std::fs::set_permissions(&blocked, std::fs::Permissions::from_mode(0o000)).unwrap();
        if std::fs::read(&blocked).is_ok() {
            // Running as root; permissions cannot block the read.
            return;
        }

        let kb = load_builtin().unwrap();
        let results = As6GuardCore::new()
            .rewrite(dir.path(), &kb, &RewriteOptions::default())
            .unwrap();
        let locked = results.iter().find(|r| r.path.ends_with("locked.st")).unwrap();
        assert!(matches!(locked.outcome, RewriteOutcome::Failed(_)));
        let rewritten = std::fs::read_to_string(dir.path().join("Logical/prog/main.st")).unwrap();
        assert_eq!(rewritten, "angle := brmatan2(y, x);\n");
    }

    #[test]
    fn dry_run_leaves_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        sample_project(dir.path());
        let kb = load_builtin().unwrap();
        let core = As6GuardCore::new();
        let options = RewriteOptions {
            dry_run: true,
            ..Default::default()
        };
        let results = core.rewrite(dir.path(), &kb, &options).unwrap();
        assert!(results
            .iter()
            .any(|r| r.outcome == crate::rewrite::RewriteOutcome::Rewritten));
        let content = std::fs::read_to_string(dir.path().join("Logical/prog/main.st")).unwrap();
        assert_eq!(content, "angle := atan2(y, x);\n");
    }
}
