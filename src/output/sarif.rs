use std::collections::BTreeMap;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::report::{Report, TOOL_NAME};
use crate::rules::{Finding, Severity};

/// Render the report as SARIF 2.1.0.
///
/// Produces a self-contained SARIF log compatible with GitHub Code Scanning
/// and other SARIF consumers. Waived findings are kept as results with an
/// accepted external suppression.
pub fn render(report: &Report) -> Result<String> {
    let mut first_by_rule: BTreeMap<&str, &Finding> = BTreeMap::new();
    for f in &report.findings {
        first_by_rule.entry(f.policy_id.as_str()).or_insert(f);
    }

    let rules: Vec<Value> = first_by_rule
        .values()
        .map(|finding| {
            json!({
                "id": finding.policy_id,
                "shortDescription": { "text": finding.policy_id },
                "help": { "text": finding.remediation },
                "helpUri": finding.references.first(),
                "defaultConfiguration": {
                    "level": severity_to_sarif_level(finding.severity),
                },
                "properties": {
                    "severity": finding.severity,
                },
            })
        })
        .collect();

    let results: Vec<Value> = report
        .findings
        .iter()
        .map(|f| {
            let mut result = json!({
                "ruleId": f.policy_id,
                "level": severity_to_sarif_level(f.severity),
                "message": { "text": f.message },
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": { "uri": f.file },
                        "region": { "startLine": f.line.max(1) },
                    },
                    "logicalLocations": [{
                        "fullyQualifiedName": f.resource_address,
                        "kind": "resource",
                    }],
                }],
                "partialFingerprints": {
                    "tfgateFindingHash/v1": fingerprint(f),
                },
                "fixes": [{
                    "description": { "text": f.remediation },
                }],
            });

            if f.waived {
                result["suppressions"] = json!([{
                    "kind": "external",
                    "status": "accepted",
                    "justification": f.waiver_reason.as_deref().unwrap_or_default(),
                }]);
            }

            result
        })
        .collect();

    let notifications: Vec<Value> = report
        .diagnostics
        .iter()
        .map(|d| {
            json!({
                "level": "warning",
                "message": { "text": d.describe() },
            })
        })
        .collect();

    let sarif = json!({
        "$schema": "https://docs.oasis-open.org/sarif/sarif/v2.1.0/errata01/os/schemas/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": TOOL_NAME,
                    "version": report.version,
                    "semanticVersion": report.version,
                    "rules": rules,
                },
            },
            "invocations": [{
                "executionSuccessful": true,
                "startTimeUtc": report.generated_at.to_rfc3339(),
                "toolExecutionNotifications": notifications,
            }],
            "results": results,
        }],
    });

    let mut output = serde_json::to_string_pretty(&sarif)?;
    output.push('\n');
    Ok(output)
}

/// Stable identity of a finding across scans: line numbers are left out so
/// unrelated edits above a resource do not reopen it.
fn fingerprint(f: &Finding) -> String {
    let mut hasher = Sha256::new();
    hasher.update(f.policy_id.as_bytes());
    hasher.update([0]);
    hasher.update(f.resource_address.as_bytes());
    hasher.update([0]);
    hasher.update(f.file.as_bytes());
    hex::encode(hasher.finalize())
}

fn severity_to_sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low => "note",
    }
}
