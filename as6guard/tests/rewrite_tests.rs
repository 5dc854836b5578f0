//! End-to-end rewrite runs over real directory trees.

use std::path::Path;

use as6guard::{load_builtin_rules, As6GuardCore, RewriteOptions, RewriteOutcome};

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn project_with(dir: &Path, source: &str) {
    write(
        &dir.join("Plant.apj"),
        r#"<?AutomationStudio Version="4.12.2.90"?><Project />"#,
    );
    write(&dir.join("Logical/prog/main.st"), source);
}

#[test]
fn rewrites_live_code_and_leaves_comments() {
    let dir = tempfile::tempdir().unwrap();
    project_with(
        dir.path(),
        "(* atan2(a, b) documented here *)\nangle := atan2(y, x);\nmsg := 'atan2';\n",
    );
    let kb = load_builtin_rules().unwrap();
    let results = As6GuardCore::new()
        .rewrite(dir.path(), &kb, &RewriteOptions::default())
        .unwrap();

    let main = results
        .iter()
        .find(|r| r.path.ends_with("main.st"))
        .unwrap();
    assert_eq!(main.outcome, RewriteOutcome::Rewritten);
    assert_eq!(main.applied.len(), 1);
    assert_eq!(main.applied[0].rule, "function:atan2");
    assert_eq!(main.applied[0].line, 2);

    let content = std::fs::read_to_string(dir.path().join("Logical/prog/main.st")).unwrap();
    assert_eq!(
        content,
        "(* atan2(a, b) documented here *)\nangle := brmatan2(y, x);\nmsg := 'atan2';\n"
    );
}

#[test]
fn second_run_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    project_with(
        dir.path(),
        "angle := atan2(y, x);\nc := amPI;\npolicy := UASecurityPolicy_Basic256;\n",
    );
    let kb = load_builtin_rules().unwrap();
    let core = As6GuardCore::new();

    let first = core
        .rewrite(dir.path(), &kb, &RewriteOptions::default())
        .unwrap();
    assert!(first
        .iter()
        .any(|r| r.outcome == RewriteOutcome::Rewritten));
    let after_first = std::fs::read_to_string(dir.path().join("Logical/prog/main.st")).unwrap();

    let second = core
        .rewrite(dir.path(), &kb, &RewriteOptions::default())
        .unwrap();
    assert!(second
        .iter()
        .all(|r| r.outcome == RewriteOutcome::Unchanged));
    let after_second = std::fs::read_to_string(dir.path().join("Logical/prog/main.st")).unwrap();
    assert_eq!(after_first, after_second);
}

#[test]
fn backup_keeps_the_original() {
    let dir = tempfile::tempdir().unwrap();
    let original = "angle := atan2(y, x);\n";
    project_with(dir.path(), original);
    let kb = load_builtin_rules().unwrap();
    let options = RewriteOptions {
        backup: true,
        ..Default::default()
    };
    As6GuardCore::new()
        .rewrite(dir.path(), &kb, &options)
        .unwrap();

    let backup = std::fs::read_to_string(dir.path().join("Logical/prog/main.st.bak")).unwrap();
    assert_eq!(backup, original);
    let rewritten = std::fs::read_to_string(dir.path().join("Logical/prog/main.st")).unwrap();
    assert_eq!(rewritten, "angle := brmatan2(y, x);\n");
}

#[test]
fn dry_run_reports_the_diff_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    project_with(dir.path(), "angle := atan2(y, x);\n");
    let kb = load_builtin_rules().unwrap();
    let options = RewriteOptions {
        dry_run: true,
        ..Default::default()
    };
    let results = As6GuardCore::new()
        .rewrite(dir.path(), &kb, &options)
        .unwrap();

    let main = results
        .iter()
        .find(|r| r.path.ends_with("main.st"))
        .unwrap();
    assert_eq!(main.outcome, RewriteOutcome::Rewritten);
    let diff = main.diff.as_deref().unwrap();
    assert!(diff.contains("-1 angle := atan2(y, x);"));
    assert!(diff.contains("+1 angle := brmatan2(y, x);"));

    let content = std::fs::read_to_string(dir.path().join("Logical/prog/main.st")).unwrap();
    assert_eq!(content, "angle := atan2(y, x);\n");
    assert!(!dir.path().join("Logical/prog/main.st.bak").exists());
}

#[test]
fn latin1_file_round_trips_without_mojibake() {
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir.path().join("Plant.apj"),
        r#"<?AutomationStudio Version="4.12.2.90"?><Project />"#,
    );
    std::fs::create_dir_all(dir.path().join("Logical/prog")).unwrap();
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"(* L\xE4nge *)\nl := strlen(s);\n");
    std::fs::write(dir.path().join("Logical/prog/calc.st"), &bytes).unwrap();

    let kb = load_builtin_rules().unwrap();
    As6GuardCore::new()
        .rewrite(dir.path(), &kb, &RewriteOptions::default())
        .unwrap();

    let out = std::fs::read(dir.path().join("Logical/prog/calc.st")).unwrap();
    assert_eq!(out, b"(* L\xE4nge *)\nl := brsstrlen(s);\n".to_vec());
}

#[test]
fn latin1_tail_far_into_a_large_file_survives_the_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir.path().join("Plant.apj"),
        r#"<?AutomationStudio Version="4.12.2.90"?><Project />"#,
    );
    std::fs::create_dir_all(dir.path().join("Logical/prog")).unwrap();
    // The only non-ASCII byte sits well past any sniffing window.
    let mut bytes = Vec::new();
    for _ in 0..512 {
        bytes.extend_from_slice(b"(* padding line to push the tail out *)\n");
    }
    bytes.extend_from_slice(b"l := strlen(s);\n(* L\xE4nge *)\n");
    std::fs::write(dir.path().join("Logical/prog/calc.st"), &bytes).unwrap();

    let kb = load_builtin_rules().unwrap();
    As6GuardCore::new()
        .rewrite(dir.path(), &kb, &RewriteOptions::default())
        .unwrap();

    let out = std::fs::read(dir.path().join("Logical/prog/calc.st")).unwrap();
    assert!(out.windows(9).any(|w| w == b"brsstrlen"));
    // Still exactly one 0xE4 byte, not a UTF-8 transcoding of it.
    assert_eq!(out.iter().filter(|b| **b == 0xE4).count(), 1);
    assert!(!out.windows(2).any(|w| w == [0xC3, 0xA4]));
}

#[test]
fn selected_kinds_limit_the_pass() {
    use as6guard::RuleKind;

    let dir = tempfile::tempdir().unwrap();
    project_with(
        dir.path(),
        "angle := atan2(y, x);\npolicy := UASecurityPolicy_Basic256;\n",
    );
    let kb = load_builtin_rules().unwrap();
    let options = RewriteOptions {
        kinds: vec![RuleKind::OpcUaConstruct],
        ..Default::default()
    };
    As6GuardCore::new()
        .rewrite(dir.path(), &kb, &options)
        .unwrap();

    let content = std::fs::read_to_string(dir.path().join("Logical/prog/main.st")).unwrap();
    assert_eq!(
        content,
        "angle := atan2(y, x);\npolicy := UASP_Basic256;\n"
    );
}
