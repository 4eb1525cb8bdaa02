//! The scan report and its diagnostics channel.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::enrich::EnrichmentReport;
use crate::gate::{GateVerdict, ThresholdViolation};
use crate::rules::{Finding, Severity};

pub const TOOL_NAME: &str = "tfgate";

/// Complete, immutable result of one scan invocation.
///
/// Every output format is rendered from this structure alone, and the JSON
/// form parses back into an identical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub tool: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    /// Date waiver expiry is evaluated against.
    pub scan_date: NaiveDate,
    pub passed: bool,
    pub summary: Summary,
    pub threshold_violations: Vec<ThresholdViolation>,
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default, skip_serializing_if = "EnrichmentReport::is_empty")]
    pub enrichment: EnrichmentReport,
}

impl Report {
    pub fn new(
        findings: Vec<Finding>,
        verdict: GateVerdict,
        diagnostics: Vec<Diagnostic>,
        enrichment: EnrichmentReport,
        generated_at: DateTime<Utc>,
        scan_date: NaiveDate,
    ) -> Self {
        Self {
            tool: TOOL_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at,
            scan_date,
            passed: verdict.passed,
            summary: Summary::from_findings(&findings),
            threshold_violations: verdict.violations,
            findings,
            diagnostics,
            enrichment,
        }
    }

    /// Process exit status for a completed scan.
    pub fn exit_code(&self) -> i32 {
        if self.passed {
            0
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_findings: usize,
    pub waived_findings: usize,
    /// All findings per severity, waived included.
    pub by_severity: BTreeMap<Severity, usize>,
    /// Findings that count toward thresholds.
    pub unwaived_by_severity: BTreeMap<Severity, usize>,
}

impl Summary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let zeroed = || -> BTreeMap<Severity, usize> {
            Severity::ALL.iter().map(|&s| (s, 0)).collect()
        };
        let mut by_severity = zeroed();
        let mut unwaived_by_severity = zeroed();
        let mut waived_findings = 0;

        for f in findings {
            *by_severity.entry(f.severity).or_default() += 1;
            if f.waived {
                waived_findings += 1;
            } else {
                *unwaived_by_severity.entry(f.severity).or_default() += 1;
            }
        }

        Self {
            total_findings: findings.len(),
            waived_findings,
            by_severity,
            unwaived_by_severity,
        }
    }

    pub fn unwaived(&self, severity: Severity) -> usize {
        self.unwaived_by_severity.get(&severity).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Parse,
    RuleEvaluation,
    Enrichment,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse => write!(f, "parse"),
            Self::RuleEvaluation => write!(f, "rule_evaluation"),
            Self::Enrichment => write!(f, "enrichment"),
        }
    }
}

/// A non-fatal problem recorded during a scan. Never affects `passed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl Diagnostic {
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Parse,
            message: message.into(),
            file: Some(file.into()),
            rule_id: None,
            resource: None,
            provider: None,
        }
    }

    pub fn rule_evaluation(
        rule_id: &str,
        resource: &str,
        file: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: DiagnosticKind::RuleEvaluation,
            message: message.into(),
            file: Some(file.to_string()),
            rule_id: Some(rule_id.to_string()),
            resource: Some(resource.to_string()),
            provider: None,
        }
    }

    pub fn enrichment(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Enrichment,
            message: message.into(),
            file: None,
            rule_id: None,
            resource: None,
            provider: Some(provider.into()),
        }
    }

    /// One-line `kind [ref]: message` form used by the text renderers.
    pub fn describe(&self) -> String {
        let reference = [
            self.provider.as_deref(),
            self.rule_id.as_deref(),
            self.resource.as_deref(),
            self.file.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
        if reference.is_empty() {
            format!("{}: {}", self.kind, self.message)
        } else {
            format!("{} [{}]: {}", self.kind, reference, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity, waived: bool) -> Finding {
        Finding {
            policy_id: "T-1".into(),
            resource_address: "aws_s3_bucket.a".into(),
            file: "main.tf.json".into(),
            line: 1,
            severity,
            message: "m".into(),
            remediation: "r".into(),
            references: vec![],
            waived,
            waiver_reason: waived.then(|| "ok".to_string()),
        }
    }

    #[test]
    fn summary_counts_every_severity() {
        let summary = Summary::from_findings(&[
            finding(Severity::High, false),
            finding(Severity::High, true),
            finding(Severity::Low, false),
        ]);
        assert_eq!(summary.total_findings, 3);
        assert_eq!(summary.waived_findings, 1);
        assert_eq!(summary.by_severity[&Severity::High], 2);
        assert_eq!(summary.by_severity[&Severity::Medium], 0);
        assert_eq!(summary.unwaived_by_severity[&Severity::High], 1);
        assert_eq!(summary.unwaived_by_severity[&Severity::Low], 1);
    }

    #[test]
    fn summary_serializes_severity_keys() {
        let summary = Summary::from_findings(&[]);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["by_severity"]["high"], 0);
        assert_eq!(value["by_severity"]["low"], 0);
    }

    #[test]
    fn describe_includes_references() {
        let d = Diagnostic::rule_evaluation("R-1", "aws_instance.a", "main.tf.json", "boom");
        assert_eq!(
            d.describe(),
            "rule_evaluation [R-1 aws_instance.a main.tf.json]: boom"
        );
        let d = Diagnostic::enrichment("cost", "tool missing");
        assert_eq!(d.describe(), "enrichment [cost]: tool missing");
    }
}
