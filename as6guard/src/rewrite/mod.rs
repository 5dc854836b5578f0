//! Syntax-aware, idempotent source rewriting.
//!
//! The engine runs in fixed stages per file: scan for candidate sites over
//! lexer tokens, resolve overlaps, apply replacements right to left, then
//! verify the result (delimiter balance and a re-scan that must come up
//! empty). A file that fails verification is left exactly as it was.

pub mod template;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::checkers::select_rule;
use crate::kb::loader::KnowledgeBase;
use crate::kb::schema::{PatternKind, RuleKind};
use crate::lexer::{CommentStyle, Lexer, Token, TokenKind};
use crate::walker::{encode, read_classified, ClassifiedFile};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "reason")]
pub enum RewriteOutcome {
    /// No candidate site survived; the file was not touched.
    Unchanged,
    Rewritten,
    /// Verification rejected the result; the file was not touched.
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedRule {
    pub rule: String,
    pub line: u32,
    pub original: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RewriteResult {
    pub path: PathBuf,
    pub outcome: RewriteOutcome,
    pub applied: Vec<AppliedRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    pub warnings: Vec<String>,
}

struct Candidate {
    start: usize,
    end: usize,
    text: String,
    rule: String,
    line: u32,
}

pub struct RewriteEngine {
    kinds: Vec<RuleKind>,
}

impl RewriteEngine {
    pub fn new(kinds: Vec<RuleKind>) -> Self {
        Self { kinds }
    }

    /// Rewrite one file on disk. `dry_run` computes the full result without
    /// touching the filesystem; `backup` keeps the original next to the
    /// rewritten file as `<name>.bak`.
    pub fn rewrite_file(
        &self,
        file: &ClassifiedFile,
        kb: &KnowledgeBase,
        dry_run: bool,
        backup: bool,
    ) -> std::io::Result<RewriteResult> {
        let (content, encoding) = read_classified(file)?;
        let (result, new_content) = self.rewrite_content(&file.path, &content, kb);

        if result.outcome == RewriteOutcome::Rewritten && !dry_run {
            let new_content = match new_content {
                Some(c) => c,
                None => return Ok(result),
            };
            let original_bytes = encode(&content, encoding);
            if backup {
                std::fs::write(backup_path(&file.path), &original_bytes)?;
            }
            if let Err(err) = std::fs::write(&file.path, encode(&new_content, encoding)) {
                // Put the original back; a half-written source is worse
                // than a failed rewrite.
                let _ = std::fs::write(&file.path, &original_bytes);
                return Err(err);
            }
            tracing::info!(path = %file.path.display(), sites = result.applied.len(), "file rewritten");
        }
        Ok(result)
    }

    /// Pure rewrite pass over in-memory content. Returns the result record
    /// and, when the outcome is `Rewritten`, the new content.
    pub fn rewrite_content(
        &self,
        path: &Path,
        content: &str,
        kb: &KnowledgeBase,
    ) -> (RewriteResult, Option<String>) {
        let style = CommentStyle::for_path(path);
        let (candidates, mut warnings) = self.collect_candidates(content, style, kb);
        let (accepted, skipped) = resolve_overlaps(candidates, &mut warnings);

        if accepted.is_empty() {
            return (
                RewriteResult {
                    path: path.to_path_buf(),
                    outcome: RewriteOutcome::Unchanged,
                    applied: Vec::new(),
                    diff: None,
                    warnings,
                },
                None,
            );
        }

        let mut new_content = content.to_string();
        let mut applied = Vec::with_capacity(accepted.len());
        for cand in accepted.iter().rev() {
            new_content.replace_range(cand.start..cand.end, &cand.text);
        }
        for cand in &accepted {
            applied.push(AppliedRule {
                rule: cand.rule.clone(),
                line: cand.line,
                original: content[cand.start..cand.end].to_string(),
                replacement: cand.text.clone(),
            });
        }

        if template::delimiter_balance(content, style)
            != template::delimiter_balance(&new_content, style)
        {
            return (
                RewriteResult {
                    path: path.to_path_buf(),
                    outcome: RewriteOutcome::Failed(
                        "replacement changed the delimiter balance".to_string(),
                    ),
                    applied,
                    diff: None,
                    warnings,
                },
                None,
            );
        }

        // A second scan over the result must find nothing new. Sites the
        // overlap resolution skipped still match and are accounted for;
        // anything beyond them is a rule whose replacement matches itself
        // and would rewrite forever.
        let (residue, _) = self.collect_candidates(&new_content, style, kb);
        let mut expected = skipped;
        let loop_site = residue.iter().find(|cand| {
            match expected.iter().position(|rule| *rule == cand.rule) {
                Some(at) => {
                    expected.swap_remove(at);
                    false
                }
                None => true,
            }
        });
        if let Some(loop_site) = loop_site {
            return (
                RewriteResult {
                    path: path.to_path_buf(),
                    outcome: RewriteOutcome::Failed(format!(
                        "rule '{}' matches its own output (rule definition error)",
                        loop_site.rule
                    )),
                    applied,
                    diff: None,
                    warnings,
                },
                None,
            );
        }

        let diff = template::line_diff(content, &new_content);
        (
            RewriteResult {
                path: path.to_path_buf(),
                outcome: RewriteOutcome::Rewritten,
                applied,
                diff: Some(diff),
                warnings,
            },
            Some(new_content),
        )
    }

    fn collect_candidates(
        &self,
        content: &str,
        style: CommentStyle,
        kb: &KnowledgeBase,
    ) -> (Vec<Candidate>, Vec<String>) {
        let tokens = Lexer::new(content, style).tokens();
        let mut candidates = Vec::new();
        let mut warnings = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            if token.kind != TokenKind::Ident {
                continue;
            }
            if i > 0 && tokens[i - 1].kind == TokenKind::Symbol && tokens[i - 1].text == "." {
                continue;
            }
            let matching: Vec<_> = kb
                .matching_rules(&self.kinds, token.text)
                .into_iter()
                .filter(|r| r.rewrite.is_some())
                .collect();
            if matching.is_empty() {
                continue;
            }
            let (rule, ambiguous) = select_rule(matching);
            if ambiguous {
                // Two rules competing for one span never both apply; the
                // span stays as it is and the conflict is reported.
                warnings.push(format!(
                    "conflicting rewrite rules for '{}' at line {}; site skipped",
                    token.text, token.line
                ));
                continue;
            }
            let spec = match &rule.rewrite {
                Some(spec) => spec,
                None => continue,
            };

            match spec.pattern {
                PatternKind::Identifier => candidates.push(Candidate {
                    start: token.start,
                    end: token.end,
                    text: spec.replacement.clone(),
                    rule: rule.id(),
                    line: token.line,
                }),
                PatternKind::Prefix => {
                    let tail = &token.text[rule.identifier.len()..];
                    candidates.push(Candidate {
                        start: token.start,
                        end: token.end,
                        text: format!("{}{}", spec.replacement, tail),
                        rule: rule.id(),
                        line: token.line,
                    });
                }
                PatternKind::Call => {
                    let opens_call = tokens
                        .get(i + 1)
                        .is_some_and(|n| n.kind == TokenKind::Symbol && n.text == "(");
                    if !opens_call {
                        continue;
                    }
                    // Plain renames keep the argument list untouched, so
                    // nested calls stay independent rewrite sites.
                    if spec.arg_order.is_none() && spec.scale.is_none() {
                        candidates.push(Candidate {
                            start: token.start,
                            end: token.end,
                            text: spec.replacement.clone(),
                            rule: rule.id(),
                            line: token.line,
                        });
                        continue;
                    }
                    let open = &tokens[i + 1];
                    let close = match find_call_close(&tokens, i + 1) {
                        Some(t) => t,
                        None => {
                            warnings.push(format!(
                                "unbalanced call of '{}' at line {}; site skipped",
                                token.text, token.line
                            ));
                            continue;
                        }
                    };
                    let body = &content[open.end..close.start];
                    let args = template::split_args(body, style);
                    match template::render_call(spec, &args) {
                        Some(text) => candidates.push(Candidate {
                            start: token.start,
                            end: close.end,
                            text,
                            rule: rule.id(),
                            line: token.line,
                        }),
                        None => warnings.push(format!(
                            "rewrite of '{}' at line {} references an argument the call \
                             does not have; site skipped",
                            token.text, token.line
                        )),
                    }
                }
            }
        }
        (candidates, warnings)
    }
}

/// Matching close paren for the open paren at token index `open_idx`.
fn find_call_close<'a, 'b>(tokens: &'b [Token<'a>], open_idx: usize) -> Option<&'b Token<'a>> {
    let mut depth = 0i32;
    for token in &tokens[open_idx..] {
        if token.kind != TokenKind::Symbol {
            continue;
        }
        match token.text {
            "(" => depth += 1,
            ")" => {
                depth -= 1;
                if depth == 0 {
                    return Some(token);
                }
            }
            _ => {}
        }
    }
    None
}

/// Keep non-overlapping candidates; on overlap the earlier (and, at equal
/// start, longer) span wins and the loser is reported. The rule ids of the
/// skipped candidates are returned so the idempotence re-scan can tell
/// expected residue from a self-matching rule.
fn resolve_overlaps(
    mut candidates: Vec<Candidate>,
    warnings: &mut Vec<String>,
) -> (Vec<Candidate>, Vec<String>) {
    candidates.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    let mut accepted: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut skipped = Vec::new();
    for cand in candidates {
        if let Some(last) = accepted.last() {
            if cand.start < last.end {
                warnings.push(format!(
                    "overlapping rewrites at line {}: kept '{}', skipped '{}'",
                    cand.line, last.rule, cand.rule
                ));
                skipped.push(cand.rule);
                continue;
            }
        }
        accepted.push(cand);
    }
    (accepted, skipped)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".bak");
    PathBuf::from(os)
}
