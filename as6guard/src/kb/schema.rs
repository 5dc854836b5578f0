//! Rule record types shared by the loader, the checkers and the rewrite
//! engine. Rule data itself lives in the JSON files under `rules/`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity of a finding, ordered so that `Error` compares greatest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// What category of project element a rule talks about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    Library,
    HardwareModule,
    FunctionBlock,
    Function,
    OpcUaConstruct,
    MotionConstruct,
    /// mapp technology component whose use requires a separate license.
    MappComponent,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleKind::Library => "library",
            RuleKind::HardwareModule => "hardware-module",
            RuleKind::FunctionBlock => "function-block",
            RuleKind::Function => "function",
            RuleKind::OpcUaConstruct => "opc-ua-construct",
            RuleKind::MotionConstruct => "motion-construct",
            RuleKind::MappComponent => "mapp-component",
        };
        write!(f, "{}", s)
    }
}

/// Dotted numeric version, e.g. `4.12.3`. Comparison is componentwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(Vec<u32>);

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid version string '{0}'")]
pub struct VersionParseError(pub String);

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('v');
        // Drop a build suffix like '+g1234abc'.
        let trimmed = trimmed.split('+').next().unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(VersionParseError(s.to_string()));
        }
        let mut parts = Vec::new();
        for part in trimmed.split('.') {
            match part.parse::<u32>() {
                Ok(n) => parts.push(n),
                Err(_) => return Err(VersionParseError(s.to_string())),
            }
        }
        Ok(Version(parts))
    }
}

impl TryFrom<String> for Version {
    type Error = VersionParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> String {
        v.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // Componentwise, missing trailing components count as zero.
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or(0);
            let b = other.0.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl Version {
    pub fn starts_with(&self, prefix: &Version) -> bool {
        prefix.0.len() <= self.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

/// Half-open version interval `[min, max)`. Either bound may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Version>,
}

impl VersionRange {
    pub fn contains(&self, version: &Version) -> bool {
        if let Some(min) = &self.min {
            if version < min {
                return false;
            }
        }
        if let Some(max) = &self.max {
            if version >= max {
                return false;
            }
        }
        true
    }

    pub fn is_valid(&self) -> bool {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => min < max,
            _ => true,
        }
    }

    /// Number of closed bounds; used to pick the narrowest rule when more
    /// than one matches the same identifier.
    pub fn specificity(&self) -> u8 {
        self.min.is_some() as u8 + self.max.is_some() as u8
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.min {
            Some(v) => write!(f, "[{}, ", v)?,
            None => write!(f, "(, ")?,
        }
        match &self.max {
            Some(v) => write!(f, "{})", v),
            None => write!(f, ")"),
        }
    }
}

/// How a rewrite rule matches source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Identifier immediately followed by an argument list; the whole call
    /// expression is the matched span.
    Call,
    /// A single identifier token.
    Identifier,
    /// Identifier token starting with the rule identifier; only the prefix
    /// is replaced, the tail is kept (enum families like `UASecurityPolicy_*`).
    Prefix,
}

/// Declarative scaling of one argument, for replacements whose unit changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgScale {
    pub arg: usize,
    pub factor: String,
}

/// Executable projection of a rule's rewrite pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteSpec {
    pub pattern: PatternKind,
    pub replacement: String,
    /// Indices into the original argument list; reordering and dropping
    /// arguments is expressed here. Only meaningful for call patterns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg_order: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<ArgScale>,
}

/// One deprecation/discontinuation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub kind: RuleKind,
    pub identifier: String,
    #[serde(default)]
    pub source_range: VersionRange,
    #[serde(default)]
    pub target_range: VersionRange,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    pub hint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<RewriteSpec>,
}

impl Rule {
    /// Case-insensitive uniqueness key within a Knowledge Base snapshot.
    pub fn key(&self) -> (RuleKind, String) {
        (self.kind, self.identifier.to_ascii_lowercase())
    }

    /// Stable reference string used in findings and rewrite results.
    pub fn id(&self) -> String {
        format!("{}:{}", self.kind, self.identifier)
    }

    /// Whether the identifier matching mode is "name followed by a call".
    /// Call matching applies when the rewrite pattern says so, or for plain
    /// `function` rules without a rewrite spec (constants are modeled as
    /// identifier-pattern function rules).
    pub fn requires_call(&self) -> bool {
        match &self.rewrite {
            Some(spec) => spec.pattern == PatternKind::Call,
            None => self.kind == RuleKind::Function,
        }
    }

    /// Whether `token` matches this rule's identifier (case-insensitive,
    /// honoring prefix patterns).
    pub fn matches_token(&self, token: &str) -> bool {
        let is_prefix = matches!(
            &self.rewrite,
            Some(RewriteSpec {
                pattern: PatternKind::Prefix,
                ..
            })
        );
        if is_prefix {
            token.len() >= self.identifier.len()
                && token[..self.identifier.len()].eq_ignore_ascii_case(&self.identifier)
        } else {
            token.eq_ignore_ascii_case(&self.identifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parsing_and_ordering() {
        let a: Version = "1.0".parse().unwrap();
        let b: Version = "2.0".parse().unwrap();
        let c: Version = "1.0.1".parse().unwrap();
        assert!(a < b);
        assert!(a < c);
        assert!(c < b);
        assert_eq!(a, "1.0".parse().unwrap());
        assert!("".parse::<Version>().is_err());
        assert!("4.x".parse::<Version>().is_err());
    }

    #[test]
    fn version_prefix() {
        let v: Version = "4.12.3".parse().unwrap();
        let p: Version = "4.12".parse().unwrap();
        assert!(v.starts_with(&p));
        let q: Version = "4.10".parse().unwrap();
        assert!(!v.starts_with(&q));
    }

    #[test]
    fn range_is_half_open() {
        let range = VersionRange {
            min: Some("1.0".parse().unwrap()),
            max: Some("2.0".parse().unwrap()),
        };
        assert!(range.contains(&"1.0".parse().unwrap()));
        assert!(range.contains(&"1.9".parse().unwrap()));
        assert!(!range.contains(&"2.0".parse().unwrap()));
        assert!(!range.contains(&"0.9".parse().unwrap()));
    }

    #[test]
    fn open_range_contains_everything() {
        let range = VersionRange::default();
        assert!(range.contains(&"0.1".parse().unwrap()));
        assert!(range.contains(&"99".parse().unwrap()));
    }

    #[test]
    fn invalid_range_detected() {
        let range = VersionRange {
            min: Some("3.0".parse().unwrap()),
            max: Some("1.0".parse().unwrap()),
        };
        assert!(!range.is_valid());
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
