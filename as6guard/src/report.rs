//! Finding and Report model, deterministic aggregation and the text
//! renderer for the result artifact.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::kb::schema::Severity;

/// Fixed artifact name inside the analyzed project root, matching what the
/// original command-line tool wrote.
pub const ARTIFACT_NAME: &str = "as4_to_as6_analyzer_result.txt";

/// Best-effort position of a finding inside its file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One reported issue. Equality is structural; deduplication and ordering
/// rely on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Finding {
    /// Stable rule reference, `kind:identifier` for knowledge-base rules or
    /// a fixed id like `scan-error` for engine-generated findings.
    pub rule: String,
    pub file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Finding {
    pub fn scan_error(path: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Finding {
            rule: "scan-error".to_string(),
            file: path.into(),
            location: None,
            severity: Severity::Warning,
            message: format!("file could not be read: {}", error.into()),
            hint: Some("check permissions; the rest of the project was analyzed".to_string()),
        }
    }
}

impl PartialOrd for Finding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Finding {
    /// Report ordering: severity descending, then file path, then location
    /// (findings without a position first), then the remaining fields so
    /// that the total order is unambiguous.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .severity
            .cmp(&self.severity)
            .then_with(|| self.file.cmp(&other.file))
            .then_with(|| self.location.cmp(&other.location))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.rule.cmp(&other.rule))
            .then_with(|| self.hint.cmp(&other.hint))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.infos
    }

    pub fn at_least(&self, severity: Severity) -> usize {
        match severity {
            Severity::Error => self.errors,
            Severity::Warning => self.errors + self.warnings,
            Severity::Info => self.total(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanMetadata {
    pub project_root: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub ruleset_version: String,
    /// Build identity of the tool itself. Unknown is fine; analysis only
    /// depends on the ruleset version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub findings: Vec<Finding>,
    pub counts: SeverityCounts,
    pub metadata: ScanMetadata,
}

/// Deduplicate, order and count findings. Pure: the same input set always
/// yields the same report body.
pub fn aggregate(mut findings: Vec<Finding>, metadata: ScanMetadata) -> Report {
    findings.sort();
    findings.dedup();

    let mut counts = SeverityCounts::default();
    for finding in &findings {
        match finding.severity {
            Severity::Error => counts.errors += 1,
            Severity::Warning => counts.warnings += 1,
            Severity::Info => counts.infos += 1,
        }
    }

    Report {
        findings,
        counts,
        metadata,
    }
}

impl Report {
    /// Render the deterministic text artifact. The scan timestamp is left
    /// out on purpose: two runs over an unchanged project must produce
    /// byte-identical files.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "AS4 to AS6 migration analysis");
        let _ = writeln!(out, "ruleset: {}", self.metadata.ruleset_version);
        let _ = writeln!(out);

        for finding in &self.findings {
            let location = finding
                .location
                .map(|l| l.to_string())
                .unwrap_or_else(|| "-".to_string());
            let hint = finding.hint.as_deref().unwrap_or("-");
            let _ = writeln!(
                out,
                "{} | {} | {} | {} | {}",
                finding.severity,
                relative_display(&finding.file, &self.metadata.project_root),
                location,
                finding.message,
                hint
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "summary");
        let _ = writeln!(out, "errors:   {}", self.counts.errors);
        let _ = writeln!(out, "warnings: {}", self.counts.warnings);
        let _ = writeln!(out, "infos:    {}", self.counts.infos);
        out
    }

    /// Write the artifact into the project root (or an explicit path).
    pub fn write_artifact(&self, output: Option<&Path>) -> std::io::Result<PathBuf> {
        let path = match output {
            Some(p) => p.to_path_buf(),
            None => self.metadata.project_root.join(ARTIFACT_NAME),
        };
        std::fs::write(&path, self.render_text())?;
        Ok(path)
    }
}

/// Path relative to the project root, rendered with forward slashes so the
/// artifact does not depend on the host platform.
fn relative_display(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str().unwrap_or("?"))
        .collect();
    parts.join("/")
}
