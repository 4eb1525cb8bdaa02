//! Waiver and severity-threshold gate.
//!
//! A pure function of (raw findings, waivers, thresholds, scan date): it marks
//! waived findings and decides pass/fail. Configuration is validated before a
//! scan starts, so nothing here can fail.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::rules::{Finding, Severity};

/// A configured suppression for findings of one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Waiver {
    pub policy_id: String,
    /// Restrict to one resource address.
    #[serde(default)]
    pub resource: Option<String>,
    /// Restrict to one file (root-relative, `/`-separated).
    #[serde(default)]
    pub file: Option<String>,
    pub reason: String,
    /// Last day (inclusive) the waiver applies.
    #[serde(default)]
    pub expires: Option<NaiveDate>,
    #[serde(default)]
    pub approved_by: Option<String>,
}

impl Waiver {
    pub fn is_expired(&self, scan_date: NaiveDate) -> bool {
        self.expires.is_some_and(|expires| expires < scan_date)
    }

    pub fn matches(&self, finding: &Finding, scan_date: NaiveDate) -> bool {
        self.policy_id == finding.policy_id
            && self
                .resource
                .as_ref()
                .map_or(true, |r| *r == finding.resource_address)
            && self.file.as_ref().map_or(true, |f| *f == finding.file)
            && !self.is_expired(scan_date)
    }
}

/// Maximum number of non-waived findings tolerated per severity.
/// `None` means the severity is not enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    #[serde(default)]
    pub high: Option<i64>,
    #[serde(default)]
    pub medium: Option<i64>,
    #[serde(default)]
    pub low: Option<i64>,
}

impl Thresholds {
    pub fn limit(&self, severity: Severity) -> Option<i64> {
        match severity {
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    pub fn set(&mut self, severity: Severity, limit: Option<i64>) {
        match severity {
            Severity::High => self.high = limit,
            Severity::Medium => self.medium = limit,
            Severity::Low => self.low = limit,
        }
    }

    /// Reject negative limits.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for severity in Severity::ALL {
            if let Some(limit) = self.limit(severity) {
                if limit < 0 {
                    return Err(format!(
                        "thresholds.{severity} must be zero or positive, got {limit}"
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A severity whose non-waived count exceeded its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdViolation {
    pub severity: Severity,
    pub count: usize,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub passed: bool,
    /// Failing severities, highest first. Empty when passed.
    pub violations: Vec<ThresholdViolation>,
}

/// Mark findings suppressed by a waiver. The first matching waiver in list
/// order wins; expired waivers never match.
pub fn apply_waivers(
    mut findings: Vec<Finding>,
    waivers: &[Waiver],
    scan_date: NaiveDate,
) -> Vec<Finding> {
    for finding in &mut findings {
        if let Some(waiver) = waivers.iter().find(|w| w.matches(finding, scan_date)) {
            finding.waived = true;
            finding.waiver_reason = Some(waiver.reason.clone());
        }
    }
    findings
}

/// Count non-waived findings per severity and compare against the limits.
pub fn evaluate_thresholds(findings: &[Finding], thresholds: &Thresholds) -> GateVerdict {
    let violations: Vec<ThresholdViolation> = Severity::ALL
        .iter()
        .filter_map(|&severity| {
            let limit = thresholds.limit(severity)?;
            let count = findings
                .iter()
                .filter(|f| !f.waived && f.severity == severity)
                .count();
            (count as i64 > limit).then_some(ThresholdViolation {
                severity,
                count,
                limit,
            })
        })
        .collect();

    GateVerdict {
        passed: violations.is_empty(),
        violations,
    }
}

/// Apply waivers, then evaluate thresholds.
pub fn run(
    findings: Vec<Finding>,
    waivers: &[Waiver],
    thresholds: &Thresholds,
    scan_date: NaiveDate,
) -> (Vec<Finding>, GateVerdict) {
    let gated = apply_waivers(findings, waivers, scan_date);
    let verdict = evaluate_thresholds(&gated, thresholds);
    tracing::debug!(
        findings = gated.len(),
        waived = gated.iter().filter(|f| f.waived).count(),
        passed = verdict.passed,
        "gate evaluated"
    );
    (gated, verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn make_finding(policy_id: &str, address: &str, severity: Severity) -> Finding {
        Finding {
            policy_id: policy_id.into(),
            resource_address: address.into(),
            file: "main.tf.json".into(),
            line: 1,
            severity,
            message: "test".into(),
            remediation: "fix".into(),
            references: vec![],
            waived: false,
            waiver_reason: None,
        }
    }

    fn waiver(policy_id: &str, reason: &str) -> Waiver {
        Waiver {
            policy_id: policy_id.into(),
            resource: None,
            file: None,
            reason: reason.into(),
            expires: None,
            approved_by: None,
        }
    }

    fn high_zero() -> Thresholds {
        Thresholds {
            high: Some(0),
            ..Default::default()
        }
    }

    #[test]
    fn unwaived_high_fails_zero_threshold() {
        let findings = vec![make_finding("R-1", "aws_s3_bucket.a", Severity::High)];
        let (gated, verdict) = run(findings, &[], &high_zero(), date("2024-06-01"));
        assert!(!verdict.passed);
        assert_eq!(gated.len(), 1);
        assert!(!gated[0].waived);
        assert_eq!(
            verdict.violations,
            vec![ThresholdViolation {
                severity: Severity::High,
                count: 1,
                limit: 0
            }]
        );
    }

    #[test]
    fn blanket_waiver_suppresses_and_passes() {
        let findings = vec![make_finding("R-1", "aws_s3_bucket.a", Severity::High)];
        let waivers = vec![waiver("R-1", "accepted risk")];
        let (gated, verdict) = run(findings, &waivers, &high_zero(), date("2024-06-01"));
        assert!(verdict.passed);
        assert!(gated[0].waived);
        assert_eq!(gated[0].waiver_reason.as_deref(), Some("accepted risk"));
    }

    #[test]
    fn expired_waiver_is_inert() {
        let findings = vec![make_finding("R-1", "aws_s3_bucket.a", Severity::High)];
        let mut w = waiver("R-1", "accepted risk");
        w.expires = Some(date("2024-05-31"));
        let (gated, verdict) = run(findings, &[w], &high_zero(), date("2024-06-01"));
        assert!(!verdict.passed);
        assert!(!gated[0].waived);
        assert_eq!(gated[0].waiver_reason, None);
    }

    #[test]
    fn waiver_expiring_on_scan_date_still_applies() {
        let mut w = waiver("R-1", "until today");
        w.expires = Some(date("2024-06-01"));
        let f = make_finding("R-1", "aws_s3_bucket.a", Severity::High);
        assert!(w.matches(&f, date("2024-06-01")));
        assert!(!w.matches(&f, date("2024-06-02")));
    }

    #[test]
    fn scoped_waiver_respects_resource_and_file() {
        let f = make_finding("R-1", "aws_s3_bucket.a", Severity::Low);
        let mut w = waiver("R-1", "scoped");
        w.resource = Some("aws_s3_bucket.b".into());
        assert!(!w.matches(&f, date("2024-01-01")));
        w.resource = Some("aws_s3_bucket.a".into());
        assert!(w.matches(&f, date("2024-01-01")));
        w.file = Some("other.tf.json".into());
        assert!(!w.matches(&f, date("2024-01-01")));
        w.file = Some("main.tf.json".into());
        assert!(w.matches(&f, date("2024-01-01")));
    }

    #[test]
    fn first_matching_waiver_wins() {
        let findings = vec![make_finding("R-1", "aws_s3_bucket.a", Severity::High)];
        let mut scoped = waiver("R-1", "resource-specific");
        scoped.resource = Some("aws_s3_bucket.a".into());
        let blanket = waiver("R-1", "blanket");

        let gated = apply_waivers(
            findings.clone(),
            &[blanket.clone(), scoped.clone()],
            date("2024-01-01"),
        );
        assert_eq!(gated[0].waiver_reason.as_deref(), Some("blanket"));

        let gated = apply_waivers(findings, &[scoped, blanket], date("2024-01-01"));
        assert_eq!(gated[0].waiver_reason.as_deref(), Some("resource-specific"));
    }

    #[test]
    fn medium_limit_is_inclusive() {
        let findings: Vec<Finding> = (0..5)
            .map(|i| make_finding("R-2", &format!("aws_instance.i{i}"), Severity::Medium))
            .collect();
        let mut thresholds = Thresholds {
            medium: Some(5),
            ..Default::default()
        };
        assert!(evaluate_thresholds(&findings, &thresholds).passed);
        thresholds.medium = Some(4);
        assert!(!evaluate_thresholds(&findings, &thresholds).passed);
    }

    #[test]
    fn unenforced_severity_never_fails() {
        let findings = vec![make_finding("R-1", "a.b", Severity::Low); 50];
        let thresholds = Thresholds {
            high: Some(0),
            medium: Some(0),
            low: None,
        };
        assert!(evaluate_thresholds(&findings, &thresholds).passed);
    }

    #[test]
    fn negative_limits_rejected() {
        let thresholds = Thresholds {
            medium: Some(-1),
            ..Default::default()
        };
        let err = thresholds.validate().unwrap_err();
        assert!(err.contains("thresholds.medium"));
        assert!(Thresholds::default().validate().is_ok());
    }

    fn severity() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Low),
            Just(Severity::Medium),
            Just(Severity::High)
        ]
    }

    fn finding_strategy() -> impl Strategy<Value = Finding> {
        (0..4u8, 0..6u8, severity()).prop_map(|(p, r, s)| {
            make_finding(&format!("R-{p}"), &format!("aws_instance.r{r}"), s)
        })
    }

    proptest! {
        #[test]
        fn empty_config_always_passes(findings in prop::collection::vec(finding_strategy(), 0..40)) {
            let (gated, verdict) = run(findings, &[], &Thresholds::default(), date("2024-01-01"));
            prop_assert!(verdict.passed);
            prop_assert!(gated.iter().all(|f| !f.waived));
        }

        #[test]
        fn matching_live_waiver_always_waives(
            findings in prop::collection::vec(finding_strategy(), 1..20),
            scoped in any::<bool>(),
            days_left in 0..30i64,
        ) {
            let scan_date = date("2024-01-01");
            let target = findings[0].clone();
            let mut w = waiver(&target.policy_id, "accepted");
            if scoped {
                w.resource = Some(target.resource_address.clone());
            }
            w.expires = Some(scan_date + chrono::Duration::days(days_left));
            let gated = apply_waivers(findings, &[w], scan_date);
            prop_assert!(gated[0].waived);
        }

        #[test]
        fn expired_waiver_never_waives(
            findings in prop::collection::vec(finding_strategy(), 1..20),
            days_ago in 1..365i64,
        ) {
            let scan_date = date("2024-06-01");
            let waivers: Vec<Waiver> = (0..4)
                .map(|p| {
                    let mut w = waiver(&format!("R-{p}"), "old");
                    w.expires = Some(scan_date - chrono::Duration::days(days_ago));
                    w
                })
                .collect();
            let gated = apply_waivers(findings, &waivers, scan_date);
            prop_assert!(gated.iter().all(|f| !f.waived));
        }

        #[test]
        fn zero_threshold_fails_on_single_unwaived(
            sev in severity(),
            mut findings in prop::collection::vec(finding_strategy(), 0..20),
        ) {
            findings.push(make_finding("R-9", "aws_instance.x", sev));
            let mut thresholds = Thresholds::default();
            thresholds.set(sev, Some(0));
            prop_assert!(!evaluate_thresholds(&findings, &thresholds).passed);
        }
    }
}
