//! Knowledge Base construction and indexing.
//!
//! Rule data comes from one JSON file per category. The loader validates
//! every record, rejects duplicate `(kind, identifier)` keys and malformed
//! version ranges, and builds the lookup indexes the checkers rely on. The
//! resulting `KnowledgeBase` is immutable and shared read-only.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::kb::schema::{Rule, RuleKind};

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeBaseError {
    #[error("failed to read rule data '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rule data '{name}': {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate rule ({kind}, {identifier}) in '{name}'")]
    DuplicateRule {
        kind: RuleKind,
        identifier: String,
        name: String,
    },
    #[error("malformed version range for rule '{identifier}' in '{name}'")]
    InvalidVersionRange { identifier: String, name: String },
    #[error("rule data '{name}' has ruleset version '{found}', expected '{expected}'")]
    VersionMismatch {
        name: String,
        expected: String,
        found: String,
    },
    #[error("duplicate link topic '{topic}' in '{name}'")]
    DuplicateLink { topic: String, name: String },
    #[error("no rule data sources given")]
    NoSources,
}

/// Documentation link record. Topics a finding's hint mentions get the
/// matching link appended.
#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub topic: String,
    pub url: String,
}

/// On-disk shape of one rule data file.
#[derive(Debug, Deserialize)]
struct RuleFile {
    version: String,
    #[serde(default)]
    rules: Vec<Rule>,
    #[serde(default)]
    links: Vec<Link>,
}

/// Validated, indexed rule set. Lookup by `(kind, identifier)` is O(1);
/// prefix-pattern rules are matched by scanning the per-kind list.
#[derive(Debug)]
pub struct KnowledgeBase {
    version: String,
    rules: Vec<Rule>,
    by_key: HashMap<(RuleKind, String), usize>,
    by_kind: HashMap<RuleKind, Vec<usize>>,
    links: Vec<Link>,
}

impl KnowledgeBase {
    /// Build a Knowledge Base from named JSON sources. The name is only
    /// used in error messages.
    pub fn from_sources(sources: &[(&str, &str)]) -> Result<Self, KnowledgeBaseError> {
        if sources.is_empty() {
            return Err(KnowledgeBaseError::NoSources);
        }

        let mut version: Option<String> = None;
        let mut rules: Vec<Rule> = Vec::new();
        let mut by_key: HashMap<(RuleKind, String), usize> = HashMap::new();
        let mut by_kind: HashMap<RuleKind, Vec<usize>> = HashMap::new();
        let mut links: Vec<Link> = Vec::new();

        for (name, json) in sources {
            let file: RuleFile =
                serde_json::from_str(json).map_err(|source| KnowledgeBaseError::Parse {
                    name: (*name).to_string(),
                    source,
                })?;

            match &version {
                None => version = Some(file.version.clone()),
                Some(expected) if *expected != file.version => {
                    return Err(KnowledgeBaseError::VersionMismatch {
                        name: (*name).to_string(),
                        expected: expected.clone(),
                        found: file.version,
                    });
                }
                Some(_) => {}
            }

            for rule in file.rules {
                if !rule.source_range.is_valid() || !rule.target_range.is_valid() {
                    return Err(KnowledgeBaseError::InvalidVersionRange {
                        identifier: rule.identifier.clone(),
                        name: (*name).to_string(),
                    });
                }
                let key = rule.key();
                if by_key.contains_key(&key) {
                    return Err(KnowledgeBaseError::DuplicateRule {
                        kind: rule.kind,
                        identifier: rule.identifier.clone(),
                        name: (*name).to_string(),
                    });
                }
                let idx = rules.len();
                by_key.insert(key, idx);
                by_kind.entry(rule.kind).or_default().push(idx);
                rules.push(rule);
            }

            for link in file.links {
                if links
                    .iter()
                    .any(|known| known.topic.eq_ignore_ascii_case(&link.topic))
                {
                    return Err(KnowledgeBaseError::DuplicateLink {
                        topic: link.topic,
                        name: (*name).to_string(),
                    });
                }
                links.push(link);
            }
        }

        // Stable link order keeps the appended references deterministic.
        links.sort_by(|a, b| a.topic.cmp(&b.topic));

        let version = version.unwrap_or_default();
        tracing::debug!(
            ruleset = %version,
            rules = rules.len(),
            links = links.len(),
            "knowledge base loaded"
        );

        Ok(KnowledgeBase {
            version,
            rules,
            by_key,
            by_kind,
            links,
        })
    }

    /// Load rule data from external JSON files.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, KnowledgeBaseError> {
        let mut owned = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let name = path.display().to_string();
            let json = std::fs::read_to_string(path).map_err(|source| {
                KnowledgeBaseError::Io {
                    name: name.clone(),
                    source,
                }
            })?;
            owned.push((name, json));
        }
        let borrowed: Vec<(&str, &str)> = owned
            .iter()
            .map(|(n, j)| (n.as_str(), j.as_str()))
            .collect();
        Self::from_sources(&borrowed)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Exact lookup by kind and identifier, case-insensitive.
    pub fn lookup(&self, kind: RuleKind, identifier: &str) -> Option<&Rule> {
        self.by_key
            .get(&(kind, identifier.to_ascii_lowercase()))
            .map(|&idx| &self.rules[idx])
    }

    /// All rules that match `token` under any of the given kinds, including
    /// prefix-pattern rules. Result order follows rule-file order.
    pub fn matching_rules(&self, kinds: &[RuleKind], token: &str) -> Vec<&Rule> {
        let mut out = Vec::new();
        for kind in kinds {
            for rule in self.rules_of_kind(*kind) {
                if rule.matches_token(token) {
                    out.push(rule);
                }
            }
        }
        out
    }

    /// Ordered rules of one kind, for checkers that must scan.
    pub fn rules_of_kind(&self, kind: RuleKind) -> impl Iterator<Item = &Rule> {
        self.by_kind
            .get(&kind)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&idx| &self.rules[idx])
    }

    /// Documentation link for an exact topic, case-insensitive.
    pub fn link_for(&self, topic: &str) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.topic.eq_ignore_ascii_case(topic))
            .map(|link| link.url.as_str())
    }

    /// Append the documentation link of every known topic the text
    /// mentions, the way the original analyzer decorated its log lines.
    pub fn linkify(&self, text: &str) -> String {
        let mut out = text.to_string();
        for link in &self.links {
            if text.contains(&link.topic) && !out.contains(&link.url) {
                out.push_str(" See ");
                out.push_str(&link.url);
            }
        }
        out
    }

    /// Rules of the given kinds that carry a rewrite pattern, in rule-file
    /// order. This is the subset the rewrite engine executes.
    pub fn rewrite_rules(&self, kinds: &[RuleKind]) -> Vec<&Rule> {
        let mut out = Vec::new();
        for kind in kinds {
            for rule in self.rules_of_kind(*kind) {
                if rule.rewrite.is_some() {
                    out.push(rule);
                }
            }
        }
        out
    }
}
