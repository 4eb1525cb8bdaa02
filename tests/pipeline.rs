use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use tfgate::output::{json, OutputFormat};
use tfgate::report::DiagnosticKind;
use tfgate::rules::{
    CheckResult, PolicyRegistry, PolicyRule, Provider, ResourceTypeMatch, Severity, Violation,
};
use tfgate::ir::Resource;
use tfgate::{render_report, scan, scan_with_registry, ScanOptions};

fn options() -> ScanOptions {
    ScanOptions {
        now: Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()),
        ..Default::default()
    }
}

fn workspace(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    dir
}

const PUBLIC_DB: &str = r#"{
  "resource": {
    "aws_db_instance": {
      "reporting": { "engine": "postgres", "publicly_accessible": true }
    }
  }
}"#;

fn scenario(config: &str) -> tfgate::report::Report {
    let dir = workspace(&[("main.tf.json", PUBLIC_DB), (".tfgate.toml", config)]);
    scan(dir.path(), &options()).unwrap()
}

#[test]
fn scenario_a_unwaived_high_fails() {
    let report = scenario("[thresholds]\nhigh = 0\n");
    assert!(!report.passed);
    assert_eq!(report.findings.len(), 1);
    let finding = &report.findings[0];
    assert_eq!(finding.policy_id, "TFG-AWS-004");
    assert_eq!(finding.severity, Severity::High);
    assert!(!finding.waived);
    assert_eq!(finding.file, "main.tf.json");
    assert_eq!(finding.line, 4);
}

#[test]
fn scenario_b_waiver_passes() {
    let report = scenario(
        r#"
[thresholds]
high = 0

[[waivers]]
policy_id = "TFG-AWS-004"
reason = "accepted risk"
"#,
    );
    assert!(report.passed);
    assert_eq!(report.findings.len(), 1);
    assert!(report.findings[0].waived);
    assert_eq!(report.findings[0].waiver_reason.as_deref(), Some("accepted risk"));
    assert_eq!(report.summary.waived_findings, 1);
}

#[test]
fn scenario_c_expired_waiver_is_inert() {
    let report = scenario(
        r#"
[thresholds]
high = 0

[[waivers]]
policy_id = "TFG-AWS-004"
reason = "accepted risk"
expires = "2026-02-28"
"#,
    );
    assert!(!report.passed);
    assert!(!report.findings[0].waived);
    assert_eq!(report.findings[0].waiver_reason, None);
}

#[test]
fn waiver_expiring_on_scan_date_still_applies() {
    let report = scenario(
        r#"
[thresholds]
high = 0

[[waivers]]
policy_id = "TFG-AWS-004"
resource = "aws_db_instance.reporting"
reason = "migration window"
expires = "2026-03-01"
"#,
    );
    assert!(report.passed);
}

#[test]
fn scenario_d_medium_threshold_boundary() {
    let volumes: Vec<String> = (0..10)
        .map(|i| format!("\"vol{i}\": {{ \"size\": 8, \"encrypted\": {} }}", i % 2 == 0))
        .collect();
    let doc = format!(
        "{{\"resource\": {{\"aws_ebs_volume\": {{{}}}}}}}",
        volumes.join(",\n")
    );

    let at_limit = workspace(&[
        ("volumes.tf.json", &doc),
        (".tfgate.toml", "[thresholds]\nmedium = 5\n"),
    ]);
    let report = scan(at_limit.path(), &options()).unwrap();
    assert_eq!(report.findings.len(), 5);
    assert!(report.passed);

    let mut tighter = options();
    tighter.threshold_overrides.set(Severity::Medium, Some(4));
    let report = scan(at_limit.path(), &tighter).unwrap();
    assert!(!report.passed);
    assert_eq!(report.threshold_violations.len(), 1);
    assert_eq!(report.threshold_violations[0].count, 5);
    assert_eq!(report.threshold_violations[0].limit, 4);
}

#[test]
fn empty_config_always_passes() {
    let report = scan(Path::new("tests/fixtures/insecure/network"), &options()).unwrap();
    assert!(!report.findings.is_empty());
    assert!(report.passed);
}

#[test]
fn malformed_file_becomes_diagnostic() {
    let report = scan(Path::new("tests/fixtures/broken"), &options()).unwrap();
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].resource_address, "aws_db_instance.reporting");
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::Parse);
    assert_eq!(report.diagnostics[0].file.as_deref(), Some("truncated.tf.json"));
}

#[test]
fn findings_follow_file_then_declaration_order() {
    let report = scan(Path::new("tests/fixtures/insecure"), &options()).unwrap();
    let keys: Vec<(&str, &str)> = report
        .findings
        .iter()
        .map(|f| (f.file.as_str(), f.policy_id.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("network/firewall.tf.json", "TFG-GCP-002"),
            ("network/firewall.tf.json", "TFG-AWS-002"),
            ("storage.tf.json", "TFG-AWS-001"),
            ("storage.tf.json", "TFG-AZR-001"),
            ("storage.tf.json", "TFG-AZR-002"),
        ]
    );
    assert!(!report.passed);
}

#[test]
fn json_round_trip_is_lossless() {
    let report = scan(Path::new("tests/fixtures/insecure"), &options()).unwrap();
    let text = render_report(&report, OutputFormat::Json).unwrap();
    assert_eq!(json::parse(&text).unwrap(), report);
}

#[test]
fn identical_inputs_render_identically() {
    for format in OutputFormat::ALL {
        let first = scan(Path::new("tests/fixtures/insecure"), &options()).unwrap();
        let second = scan(Path::new("tests/fixtures/insecure"), &options()).unwrap();
        assert_eq!(
            render_report(&first, format).unwrap(),
            render_report(&second, format).unwrap(),
            "{format} output differs between runs"
        );
    }
}

#[test]
fn explicit_file_set_skips_discovery() {
    let root = Path::new("tests/fixtures/insecure");
    let mut opts = options();
    opts.files = vec![root.join("storage.tf.json")];
    let report = scan(root, &opts).unwrap();
    assert!(report.findings.iter().all(|f| f.file == "storage.tf.json"));
    assert_eq!(report.findings.len(), 3);
}

#[test]
fn exclude_patterns_apply() {
    let mut opts = options();
    opts.exclude = vec!["network/**".into()];
    let report = scan(Path::new("tests/fixtures/insecure"), &opts).unwrap();
    assert!(report.findings.iter().all(|f| !f.file.starts_with("network/")));
}

fn tagged_owner(resource: &Resource) -> CheckResult {
    let tagged = resource
        .attr("tags")
        .and_then(|t| t.get("owner"))
        .is_some();
    Ok((!tagged).then(|| Violation::new("resource has no `owner` tag")))
}

fn broken_rule(_resource: &Resource) -> CheckResult {
    panic!("index out of range")
}

#[test]
fn custom_registry_and_rule_isolation() {
    let mut registry = PolicyRegistry::new();
    registry
        .register(PolicyRule {
            id: "ORG-001",
            name: "Owner tag required",
            severity: Severity::Low,
            provider: Provider::Aws,
            resource_type: ResourceTypeMatch::Any,
            check: tagged_owner,
            remediation: "Add an `owner` tag.",
            references: &[],
        })
        .unwrap();
    registry
        .register(PolicyRule {
            id: "ORG-002",
            name: "Always crashes",
            severity: Severity::High,
            provider: Provider::Aws,
            resource_type: ResourceTypeMatch::Exact("aws_db_instance"),
            check: broken_rule,
            remediation: "n/a",
            references: &[],
        })
        .unwrap();

    let dir = workspace(&[("main.tf.json", PUBLIC_DB)]);
    let report = scan_with_registry(dir.path(), &options(), &registry).unwrap();
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].policy_id, "ORG-001");
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::RuleEvaluation);
    assert_eq!(report.diagnostics[0].rule_id.as_deref(), Some("ORG-002"));
    assert!(report.passed);
}
