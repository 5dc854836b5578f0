//! Token-level checks over Structured Text and C-family sources.
//!
//! One checker type covers three configurations: plain math/string
//! functions, the OPC UA client surface and the mapp Motion constructs.
//! Matching runs over lexer tokens, so occurrences inside comments and
//! string literals never fire.

use crate::checkers::{ambiguity_finding, rule_finding, select_rule, CheckContext, Checker};
use crate::kb::loader::KnowledgeBase;
use crate::kb::schema::RuleKind;
use crate::lexer::{CommentStyle, Lexer, TokenKind};
use crate::report::{Finding, Location};
use crate::walker::{ClassifiedFile, FileRole};

pub struct FunctionChecker {
    id: &'static str,
    kinds: &'static [RuleKind],
    /// Namespace gate: when non-empty, only identifiers starting with one
    /// of these prefixes are looked up at all.
    prefixes: &'static [&'static str],
    /// Predicate the finding message states about the matched identifier.
    subject: &'static str,
}

impl FunctionChecker {
    /// Math and string function calls plus their constants.
    pub fn functions() -> Self {
        Self {
            id: "functions",
            kinds: &[RuleKind::Function, RuleKind::FunctionBlock],
            prefixes: &[],
            subject: "is deprecated in AS6",
        }
    }

    /// OPC UA client function blocks, types and enumerators.
    pub fn opc_ua() -> Self {
        Self {
            id: "opc-ua",
            kinds: &[RuleKind::OpcUaConstruct],
            prefixes: &["ua"],
            subject: "is deprecated in AS6",
        }
    }

    /// mapp Motion function blocks, types and enumerators.
    pub fn motion() -> Self {
        Self {
            id: "motion",
            kinds: &[RuleKind::MotionConstruct],
            prefixes: &["mc", "mp"],
            subject: "is deprecated in AS6",
        }
    }

    /// mapp technology components that need a separate license in AS6.
    pub fn mapp_components() -> Self {
        Self {
            id: "mapp-license",
            kinds: &[RuleKind::MappComponent],
            prefixes: &["mp"],
            subject: "requires a mapp technology license in AS6",
        }
    }

    fn in_namespace(&self, token: &str) -> bool {
        self.prefixes.is_empty()
            || self.prefixes.iter().any(|p| {
                token.len() >= p.len() && token[..p.len()].eq_ignore_ascii_case(p)
            })
    }
}

impl Checker for FunctionChecker {
    fn id(&self) -> &'static str {
        self.id
    }

    fn roles(&self) -> &'static [FileRole] {
        &[FileRole::Source, FileRole::Declaration]
    }

    fn check(
        &self,
        file: &ClassifiedFile,
        content: &str,
        kb: &KnowledgeBase,
        _ctx: &CheckContext,
    ) -> Vec<Finding> {
        let style = CommentStyle::for_path(&file.path);
        let tokens = Lexer::new(content, style).tokens();
        let mut findings = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            if token.kind != TokenKind::Ident || !self.in_namespace(token.text) {
                continue;
            }
            // `fb.StopMode` is a structure member, not a construct reference.
            if i > 0 && tokens[i - 1].kind == TokenKind::Symbol && tokens[i - 1].text == "." {
                continue;
            }
            let followed_by_call = tokens
                .get(i + 1)
                .is_some_and(|next| next.kind == TokenKind::Symbol && next.text == "(");

            let candidates: Vec<_> = kb
                .matching_rules(self.kinds, token.text)
                .into_iter()
                .filter(|rule| !rule.requires_call() || followed_by_call)
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let location = Location {
                line: token.line,
                column: token.column,
            };
            let (rule, ambiguous) = select_rule(candidates);
            findings.push(rule_finding(
                rule,
                kb,
                file,
                Some(location),
                format!("'{}' {}", token.text, self.subject),
            ));
            if ambiguous {
                findings.push(ambiguity_finding(file, Some(location), token.text));
            }
        }
        findings
    }
}
