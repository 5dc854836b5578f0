//! Hardware configuration checks: discontinued modules plus a handful of
//! parameter constellations that Automation Runtime 6 no longer accepts.

use regex::Regex;

use crate::checkers::{location_at, rule_finding, CheckContext, Checker};
use crate::kb::loader::KnowledgeBase;
use crate::kb::schema::{RuleKind, Severity};
use crate::report::Finding;
use crate::walker::{ClassifiedFile, FileRole};

pub struct HardwareChecker {
    module_re: Regex,
    file_device_re: Regex,
    ftp_partition_re: Regex,
}

impl HardwareChecker {
    pub fn new() -> Self {
        Self {
            module_re: Regex::new(r#"<Module\s+[^>]*Type\s*=\s*"([^"]*)""#)
                .expect("valid pattern"),
            file_device_re: Regex::new(
                r#"<Parameter\s+ID\s*=\s*"FileDevicePath\d*"\s+Value\s*=\s*"([^"]*)""#,
            )
            .expect("valid pattern"),
            ftp_partition_re: Regex::new(
                r#"<Parameter\s+ID\s*=\s*"FTPMSPartition\d*"\s+Value\s*=\s*"SYSTEM""#,
            )
            .expect("valid pattern"),
        }
    }

    fn check_modules(
        &self,
        file: &ClassifiedFile,
        content: &str,
        kb: &KnowledgeBase,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();
        for caps in self.module_re.captures_iter(content) {
            let module_type = match caps.get(1) {
                Some(m) => m.as_str().trim(),
                None => continue,
            };
            if let Some(rule) = kb.lookup(RuleKind::HardwareModule, module_type) {
                let offset = caps.get(0).map(|m| m.start()).unwrap_or(0);
                findings.push(rule_finding(
                    rule,
                    kb,
                    file,
                    Some(location_at(content, offset)),
                    format!("hardware module '{}' is not supported by AR6", module_type),
                ));
            }
        }
        findings
    }

    fn check_parameters(&self, file: &ClassifiedFile, content: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        for caps in self.file_device_re.captures_iter(content) {
            let value = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            if value.to_ascii_uppercase().contains("SYSTEM") {
                let offset = caps.get(0).map(|m| m.start()).unwrap_or(0);
                findings.push(Finding {
                    rule: "file-device-system-partition".to_string(),
                    file: file.path.clone(),
                    location: Some(location_at(content, offset)),
                    severity: Severity::Error,
                    message: format!(
                        "file device points to the SYSTEM partition ('{}')",
                        value
                    ),
                    hint: Some(
                        "AR6 write-protects the system partition; move the file device to \
                         the user partition"
                            .to_string(),
                    ),
                });
            }
        }
        for m in self.ftp_partition_re.find_iter(content) {
            findings.push(Finding {
                rule: "ftp-system-partition".to_string(),
                file: file.path.clone(),
                location: Some(location_at(content, m.start())),
                severity: Severity::Error,
                message: "FTP server exposes the SYSTEM partition".to_string(),
                hint: Some(
                    "AR6 blocks FTP access to the system partition; restrict the server \
                     to the user partition"
                        .to_string(),
                ),
            });
        }
        findings
    }
}

impl Default for HardwareChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker for HardwareChecker {
    fn id(&self) -> &'static str {
        "hardware"
    }

    fn roles(&self) -> &'static [FileRole] {
        &[FileRole::HardwareConfig]
    }

    fn check(
        &self,
        file: &ClassifiedFile,
        content: &str,
        kb: &KnowledgeBase,
        _ctx: &CheckContext,
    ) -> Vec<Finding> {
        let mut findings = self.check_modules(file, content, kb);
        findings.extend(self.check_parameters(file, content));
        findings
    }
}
