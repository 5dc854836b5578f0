//! Project-level checks: save version, descriptor naming and the placement
//! of OPC UA address models.

use regex::Regex;

use crate::checkers::{location_at, CheckContext, Checker};
use crate::kb::loader::KnowledgeBase;
use crate::kb::schema::{Severity, Version};
use crate::report::Finding;
use crate::walker::{ClassifiedFile, FileRole};

/// Projects must be saved with this Automation Studio line before the
/// migration; older save formats are not converted by AS6.
const REQUIRED_SAVE_VERSION: &str = "4.12";

pub struct ProjectChecker {
    save_version_re: Regex,
    name_re: Regex,
    path_component_re: Regex,
}

impl ProjectChecker {
    pub fn new() -> Self {
        Self {
            save_version_re: Regex::new(r#"AutomationStudio\s+[^>]*Version\s*=\s*"?([0-9][0-9.]*)"#)
                .expect("valid pattern"),
            name_re: Regex::new(r"^\w+$").expect("valid pattern"),
            path_component_re: Regex::new(r"^[A-Za-z0-9_. -]+$").expect("valid pattern"),
        }
    }

    fn check_save_version(&self, file: &ClassifiedFile, content: &str) -> Vec<Finding> {
        let is_descriptor = file.role == FileRole::ProjectDescriptor;
        match self.save_version_re.captures(content) {
            Some(caps) => {
                let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                let outdated = match raw.parse::<Version>() {
                    Ok(version) => {
                        let required: Version = match REQUIRED_SAVE_VERSION.parse() {
                            Ok(v) => v,
                            Err(_) => return Vec::new(),
                        };
                        !version.starts_with(&required)
                    }
                    Err(_) => true,
                };
                if !outdated {
                    return Vec::new();
                }
                let offset = caps.get(0).map(|m| m.start()).unwrap_or(0);
                let severity = if is_descriptor {
                    Severity::Error
                } else {
                    Severity::Warning
                };
                vec![Finding {
                    rule: "save-version".to_string(),
                    file: file.path.clone(),
                    location: Some(location_at(content, offset)),
                    severity,
                    message: format!(
                        "file was last saved with Automation Studio {}, expected {}",
                        raw, REQUIRED_SAVE_VERSION
                    ),
                    hint: Some(format!(
                        "open and save the project with AS {} before migrating",
                        REQUIRED_SAVE_VERSION
                    )),
                }]
            }
            None if is_descriptor => vec![Finding {
                rule: "save-version-missing".to_string(),
                file: file.path.clone(),
                location: None,
                severity: Severity::Warning,
                message: "no Automation Studio version marker found".to_string(),
                hint: Some(
                    "the save version could not be verified; make sure the project was \
                     saved with AS 4.12"
                        .to_string(),
                ),
            }],
            None => Vec::new(),
        }
    }

    fn check_naming(&self, file: &ClassifiedFile, ctx: &CheckContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        let stem = file
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        if !self.name_re.is_match(stem) {
            findings.push(Finding {
                rule: "project-name".to_string(),
                file: file.path.clone(),
                location: None,
                severity: Severity::Error,
                message: format!(
                    "project name '{}' contains characters AS6 does not accept",
                    stem
                ),
                hint: Some(
                    "rename the project to letters, digits and underscores only".to_string(),
                ),
            });
        }
        for component in ctx.project_root.components() {
            let text = component.as_os_str().to_str().unwrap_or("");
            if text.is_empty() || text == "/" || text == "\\" || text.ends_with(':') {
                continue;
            }
            if !self.path_component_re.is_match(text) {
                findings.push(Finding {
                    rule: "project-path".to_string(),
                    file: file.path.clone(),
                    location: None,
                    severity: Severity::Warning,
                    message: format!(
                        "project path component '{}' contains characters AS6 does not accept",
                        text
                    ),
                    hint: Some("move the project to a plain ASCII path".to_string()),
                });
            }
        }
        findings
    }

    /// AS6 only picks up OPC UA address models stored below a
    /// `Connectivity/OpcUa` package.
    fn check_uad_location(&self, file: &ClassifiedFile, ctx: &CheckContext) -> Vec<Finding> {
        let rel = file
            .path
            .strip_prefix(&ctx.project_root)
            .unwrap_or(&file.path);
        let components: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_str().unwrap_or("").to_ascii_lowercase())
            .collect();
        let well_placed = components
            .windows(2)
            .any(|pair| pair[0] == "connectivity" && pair[1] == "opcua");
        if well_placed {
            return Vec::new();
        }
        vec![Finding {
            rule: "uad-location".to_string(),
            file: file.path.clone(),
            location: None,
            severity: Severity::Warning,
            message: "OPC UA address model is not stored under Connectivity/OpcUa".to_string(),
            hint: Some(
                "AS6 expects .uad files below the Connectivity/OpcUa package; move the \
                 file before converting"
                    .to_string(),
            ),
        }]
    }
}

impl Default for ProjectChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker for ProjectChecker {
    fn id(&self) -> &'static str {
        "project"
    }

    fn roles(&self) -> &'static [FileRole] {
        &[
            FileRole::ProjectDescriptor,
            FileRole::HardwareConfig,
            FileRole::OpcUaAddressModel,
        ]
    }

    fn check(
        &self,
        file: &ClassifiedFile,
        content: &str,
        _kb: &KnowledgeBase,
        ctx: &CheckContext,
    ) -> Vec<Finding> {
        match file.role {
            FileRole::ProjectDescriptor => {
                let mut findings = self.check_save_version(file, content);
                findings.extend(self.check_naming(file, ctx));
                findings
            }
            FileRole::HardwareConfig => self.check_save_version(file, content),
            FileRole::OpcUaAddressModel => self.check_uad_location(file, ctx),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::builtin::load_builtin;
    use std::path::PathBuf;

    fn ctx() -> CheckContext {
        CheckContext {
            project_root: PathBuf::from("/proj"),
        }
    }

    fn file(path: &str, role: FileRole) -> ClassifiedFile {
        ClassifiedFile {
            path: PathBuf::from(path),
            role,
        }
    }

    #[test]
    fn accepts_current_save_version() {
        let kb = load_builtin().unwrap();
        let checker = ProjectChecker::new();
        let content = r#"<?AutomationStudio Version="4.12.4.85 SP"?><Project />"#;
        let f = file("/proj/Plant.apj", FileRole::ProjectDescriptor);
        assert!(checker.check(&f, content, &kb, &ctx()).is_empty());
    }

    #[test]
    fn flags_outdated_save_version_on_descriptor() {
        let kb = load_builtin().unwrap();
        let checker = ProjectChecker::new();
        let content = r#"<?AutomationStudio Version="4.7.2.60"?><Project />"#;
        let f = file("/proj/Plant.apj", FileRole::ProjectDescriptor);
        let findings = checker.check(&f, content, &kb, &ctx());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "save-version");
        assert_eq!(findings[0].severity, Severity::Error);
    }

    #[test]
    fn missing_marker_is_a_warning_not_an_error() {
        let kb = load_builtin().unwrap();
        let checker = ProjectChecker::new();
        let f = file("/proj/Plant.apj", FileRole::ProjectDescriptor);
        let findings = checker.check(&f, "<Project />", &kb, &ctx());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "save-version-missing");
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn hardware_config_save_version_is_only_a_warning() {
        let kb = load_builtin().unwrap();
        let checker = ProjectChecker::new();
        let content = r#"<?AutomationStudio Version=4.9.1.37?><Hardware />"#;
        let f = file("/proj/Physical/C1/Hardware.hw", FileRole::HardwareConfig);
        let findings = checker.check(&f, content, &kb, &ctx());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn flags_bad_project_name() {
        let kb = load_builtin().unwrap();
        let checker = ProjectChecker::new();
        let content = r#"<?AutomationStudio Version="4.12.1.90"?><Project />"#;
        let f = file("/proj/Plant (old).apj", FileRole::ProjectDescriptor);
        let findings = checker.check(&f, content, &kb, &ctx());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "project-name");
    }

    #[test]
    fn uad_outside_connectivity_is_flagged() {
        let kb = load_builtin().unwrap();
        let checker = ProjectChecker::new();
        let misplaced = file(
            "/proj/Physical/C1/PLC1/Misc/Model.uad",
            FileRole::OpcUaAddressModel,
        );
        let findings = checker.check(&misplaced, "<Uad />", &kb, &ctx());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "uad-location");

        let placed = file(
            "/proj/Physical/C1/PLC1/Connectivity/OpcUa/Model.uad",
            FileRole::OpcUaAddressModel,
        );
        assert!(checker.check(&placed, "<Uad />", &kb, &ctx()).is_empty());
    }
}
