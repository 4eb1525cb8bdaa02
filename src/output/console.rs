use std::fmt::Write;

use crate::enrich::{EnrichmentReport, Section};
use crate::report::Report;
use crate::rules::{Finding, Severity};

/// Render the report as plain console text, grouped by severity (high
/// first) then file path.
pub fn render(report: &Report) -> String {
    let mut out = String::new();

    if report.findings.is_empty() {
        out.push_str("\n  No policy findings.\n");
    } else {
        let _ = writeln!(out, "\n  {} finding(s):", report.findings.len());
        for severity in Severity::ALL {
            let group = grouped(&report.findings, severity);
            if group.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n  {}", severity.as_str().to_uppercase());
            let mut current_file = "";
            for finding in group {
                if finding.file != current_file {
                    current_file = &finding.file;
                    let _ = writeln!(out, "  {current_file}");
                }
                write_finding(&mut out, finding);
            }
        }
    }

    if !report.diagnostics.is_empty() {
        let _ = writeln!(out, "\n  Diagnostics:");
        for d in &report.diagnostics {
            let _ = writeln!(out, "    - {}", d.describe());
        }
    }

    write_enrichment(&mut out, &report.enrichment);

    let s = &report.summary;
    let status = if report.passed { "PASS" } else { "FAIL" };
    let _ = writeln!(
        out,
        "\n  Result: {status} ({} total, {} waived; unwaived high {}, medium {}, low {})",
        s.total_findings,
        s.waived_findings,
        s.unwaived(Severity::High),
        s.unwaived(Severity::Medium),
        s.unwaived(Severity::Low),
    );
    for v in &report.threshold_violations {
        let _ = writeln!(
            out,
            "    {} findings: {} exceed the limit of {}",
            v.severity, v.count, v.limit
        );
    }
    out.push('\n');
    out
}

/// Findings of one severity, ordered by file with the original order
/// kept inside a file.
pub(crate) fn grouped(findings: &[Finding], severity: Severity) -> Vec<&Finding> {
    let mut group: Vec<&Finding> = findings.iter().filter(|f| f.severity == severity).collect();
    group.sort_by(|a, b| a.file.cmp(&b.file));
    group
}

fn write_finding(out: &mut String, f: &Finding) {
    let mark = if f.waived { " [WAIVED]" } else { "" };
    let _ = writeln!(out, "    {} {}{}", f.policy_id, f.resource_address, mark);
    let _ = writeln!(out, "      line {}: {}", f.line, f.message);
    let _ = writeln!(out, "      fix: {}", f.remediation);
    if let Some(reason) = &f.waiver_reason {
        let _ = writeln!(out, "      waived: {reason}");
    }
}

fn write_enrichment(out: &mut String, e: &EnrichmentReport) {
    if e.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n  Enrichment:");
    if let Some(section) = &e.cost {
        let line = match section {
            Section::Available(c) => match c.total_monthly_cost {
                Some(total) => format!("{total:.2} {}/month", c.currency),
                None => "no priced resources".to_string(),
            },
            Section::Unavailable { reason } => format!("unavailable ({reason})"),
        };
        let _ = writeln!(out, "    cost: {line}");
    }
    if let Some(section) = &e.drift {
        let line = match section {
            Section::Available(d) if d.drifted.is_empty() => "no drift".to_string(),
            Section::Available(d) => d
                .drifted
                .iter()
                .map(|r| format!("{} ({})", r.address, r.action))
                .collect::<Vec<_>>()
                .join(", "),
            Section::Unavailable { reason } => format!("unavailable ({reason})"),
        };
        let _ = writeln!(out, "    drift: {line}");
    }
    if let Some(section) = &e.validation {
        let line = match section {
            Section::Available(v) if v.valid => "valid".to_string(),
            Section::Available(v) => format!(
                "invalid ({} error(s), {} warning(s))",
                v.error_count, v.warning_count
            ),
            Section::Unavailable { reason } => format!("unavailable ({reason})"),
        };
        let _ = writeln!(out, "    validation: {line}");
    }
    if let Some(section) = &e.explanations {
        match section {
            Section::Available(list) => {
                let _ = writeln!(out, "    explanations:");
                for x in list {
                    let _ = writeln!(
                        out,
                        "      {} {}: {}",
                        x.policy_id, x.resource_address, x.text
                    );
                }
            }
            Section::Unavailable { reason } => {
                let _ = writeln!(out, "    explanations: unavailable ({reason})");
            }
        }
    }
}
