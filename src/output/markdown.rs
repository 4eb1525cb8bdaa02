use std::fmt::Write;

use crate::enrich::Section;
use crate::report::Report;
use crate::rules::Severity;

use super::console::grouped;

/// Render the report as a Markdown document suitable for a pull request
/// comment.
pub fn render(report: &Report) -> String {
    let mut out = String::new();
    let status = if report.passed { "passed" } else { "failed" };
    let _ = writeln!(out, "## tfgate: {status}\n");

    let s = &report.summary;
    let _ = writeln!(out, "| Severity | Findings | Waived | Counted |");
    let _ = writeln!(out, "|---|---:|---:|---:|");
    for severity in Severity::ALL {
        let total = s.by_severity.get(&severity).copied().unwrap_or(0);
        let counted = s.unwaived(severity);
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            severity,
            total,
            total - counted,
            counted
        );
    }

    if !report.threshold_violations.is_empty() {
        out.push('\n');
        for v in &report.threshold_violations {
            let _ = writeln!(
                out,
                "- **{}**: {} finding(s), limit {}",
                v.severity, v.count, v.limit
            );
        }
    }

    for severity in Severity::ALL {
        let group = grouped(&report.findings, severity);
        if group.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n### {}\n", capitalize(severity.as_str()));
        let _ = writeln!(out, "| Policy | Resource | Location | Message | Remediation |");
        let _ = writeln!(out, "|---|---|---|---|---|");
        for f in group {
            let resource = if f.waived {
                format!(
                    "~~`{}`~~ (waived: {})",
                    f.resource_address,
                    cell(f.waiver_reason.as_deref().unwrap_or(""))
                )
            } else {
                format!("`{}`", f.resource_address)
            };
            let _ = writeln!(
                out,
                "| {} | {} | `{}:{}` | {} | {} |",
                f.policy_id,
                resource,
                f.file,
                f.line,
                cell(&f.message),
                cell(&f.remediation)
            );
        }
    }

    if !report.diagnostics.is_empty() {
        let _ = writeln!(
            out,
            "\n<details><summary>Diagnostics ({})</summary>\n",
            report.diagnostics.len()
        );
        for d in &report.diagnostics {
            let _ = writeln!(out, "- {}", cell(&d.describe()));
        }
        let _ = writeln!(out, "\n</details>");
    }

    let e = &report.enrichment;
    if !e.is_empty() {
        let _ = writeln!(out, "\n### Enrichment\n");
        if let Some(section) = &e.cost {
            let text = match section {
                Section::Available(c) => c
                    .total_monthly_cost
                    .map(|t| format!("{t:.2} {}/month", c.currency))
                    .unwrap_or_else(|| "no priced resources".into()),
                Section::Unavailable { reason } => format!("_unavailable: {reason}_"),
            };
            let _ = writeln!(out, "- Cost: {text}");
        }
        if let Some(section) = &e.drift {
            let text = match section {
                Section::Available(d) => format!("{} drifted resource(s)", d.drifted.len()),
                Section::Unavailable { reason } => format!("_unavailable: {reason}_"),
            };
            let _ = writeln!(out, "- Drift: {text}");
        }
        if let Some(section) = &e.validation {
            let text = match section {
                Section::Available(v) if v.valid => "valid".to_string(),
                Section::Available(v) => format!("{} error(s)", v.error_count),
                Section::Unavailable { reason } => format!("_unavailable: {reason}_"),
            };
            let _ = writeln!(out, "- Validation: {text}");
        }
        if let Some(section) = &e.explanations {
            match section {
                Section::Available(list) => {
                    for x in list {
                        let _ = writeln!(
                            out,
                            "- {} `{}`: {}",
                            x.policy_id,
                            x.resource_address,
                            cell(&x.text)
                        );
                    }
                }
                Section::Unavailable { reason } => {
                    let _ = writeln!(out, "- Explanations: _unavailable: {reason}_");
                }
            }
        }
    }

    out
}

/// Escape text for a single table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
