//! Library reference checks over package descriptors, library descriptors
//! and C-family includes.

use regex::Regex;

use crate::checkers::{location_at, rule_finding, CheckContext, Checker};
use crate::kb::loader::KnowledgeBase;
use crate::kb::schema::{RuleKind, Version};
use crate::report::Finding;
use crate::walker::{ClassifiedFile, FileRole};

pub struct LibraryChecker {
    object_re: Regex,
    type_attr_re: Regex,
    version_attr_re: Regex,
    dependency_re: Regex,
    include_re: Regex,
}

impl LibraryChecker {
    pub fn new() -> Self {
        Self {
            object_re: Regex::new(r"<Object([^>]*)>([^<]+)</Object>").expect("valid pattern"),
            type_attr_re: Regex::new(r#"Type\s*=\s*"([^"]*)""#).expect("valid pattern"),
            version_attr_re: Regex::new(r#"Version\s*=\s*"([^"]*)""#).expect("valid pattern"),
            dependency_re: Regex::new(r#"<Dependency\s+ObjectName\s*=\s*"([^"]*)""#)
                .expect("valid pattern"),
            include_re: Regex::new(r#"#include\s*[<"]([^">]+)[">]"#).expect("valid pattern"),
        }
    }

    fn check_reference(
        &self,
        file: &ClassifiedFile,
        content: &str,
        offset: usize,
        name: &str,
        version: Option<&str>,
        kb: &KnowledgeBase,
    ) -> Option<Finding> {
        let rule = kb.lookup(RuleKind::Library, name)?;
        // A declared library version outside the rule's source range means
        // the project already references a version the rule does not cover.
        if let Some(raw) = version {
            if let Ok(v) = raw.parse::<Version>() {
                if !rule.source_range.contains(&v) {
                    return None;
                }
            }
        }
        Some(rule_finding(
            rule,
            kb,
            file,
            Some(location_at(content, offset)),
            format!("library '{}' is deprecated in AS6", name),
        ))
    }

    fn check_package(
        &self,
        file: &ClassifiedFile,
        content: &str,
        kb: &KnowledgeBase,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();
        for caps in self.object_re.captures_iter(content) {
            let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let object_type = self
                .type_attr_re
                .captures(attrs)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str());
            if !object_type.is_some_and(|t| t.eq_ignore_ascii_case("library")) {
                continue;
            }
            let name = match caps.get(2) {
                Some(m) => m.as_str().trim(),
                None => continue,
            };
            let version = self
                .version_attr_re
                .captures(attrs)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str());
            let offset = caps.get(0).map(|m| m.start()).unwrap_or(0);
            if let Some(f) = self.check_reference(file, content, offset, name, version, kb) {
                findings.push(f);
            }
        }
        findings
    }

    fn check_library_descriptor(
        &self,
        file: &ClassifiedFile,
        content: &str,
        kb: &KnowledgeBase,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();
        for caps in self.dependency_re.captures_iter(content) {
            let name = match caps.get(1) {
                Some(m) => m.as_str().trim(),
                None => continue,
            };
            let offset = caps.get(0).map(|m| m.start()).unwrap_or(0);
            if let Some(f) = self.check_reference(file, content, offset, name, None, kb) {
                findings.push(f);
            }
        }
        findings
    }

    fn check_includes(
        &self,
        file: &ClassifiedFile,
        content: &str,
        kb: &KnowledgeBase,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();
        for caps in self.include_re.captures_iter(content) {
            let header = match caps.get(1) {
                Some(m) => m.as_str(),
                None => continue,
            };
            // `<asmath.h>` refers to the AsMath library; match on the stem.
            let stem = header
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(header)
                .trim_end_matches(".h");
            let offset = caps.get(0).map(|m| m.start()).unwrap_or(0);
            if let Some(f) = self.check_reference(file, content, offset, stem, None, kb) {
                findings.push(f);
            }
        }
        findings
    }

    fn is_c_family(file: &ClassifiedFile) -> bool {
        file.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| matches!(e.as_str(), "c" | "cpp" | "hpp" | "h"))
    }
}

impl Default for LibraryChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker for LibraryChecker {
    fn id(&self) -> &'static str {
        "library"
    }

    fn roles(&self) -> &'static [FileRole] {
        &[
            FileRole::PackageDescriptor,
            FileRole::LibraryDescriptor,
            FileRole::Source,
        ]
    }

    fn check(
        &self,
        file: &ClassifiedFile,
        content: &str,
        kb: &KnowledgeBase,
        _ctx: &CheckContext,
    ) -> Vec<Finding> {
        match file.role {
            FileRole::PackageDescriptor => self.check_package(file, content, kb),
            FileRole::LibraryDescriptor => self.check_library_descriptor(file, content, kb),
            FileRole::Source if Self::is_c_family(file) => {
                self.check_includes(file, content, kb)
            }
            _ => Vec::new(),
        }
    }
}
