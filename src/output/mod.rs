pub mod console;
pub mod csv;
pub mod json;
pub mod markdown;
pub mod sarif;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::report::Report;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
    Text,
    Markdown,
    Sarif,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Json,
        OutputFormat::Csv,
        OutputFormat::Text,
        OutputFormat::Markdown,
        OutputFormat::Sarif,
    ];

    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "text" | "console" | "txt" => Some(Self::Text),
            "markdown" | "md" => Some(Self::Markdown),
            "sarif" => Some(Self::Sarif),
            _ => None,
        }
    }

    /// File extension used when several formats are written to a directory.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Text => "txt",
            Self::Markdown => "md",
            Self::Sarif => "sarif",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Sarif => "sarif",
        };
        f.write_str(name)
    }
}

/// Render a report into the specified format.
pub fn render(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json::render(report),
        OutputFormat::Csv => Ok(csv::render(report)),
        OutputFormat::Text => Ok(console::render(report)),
        OutputFormat::Markdown => Ok(markdown::render(report)),
        OutputFormat::Sarif => sarif::render(report),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::enrich::EnrichmentReport;
    use crate::gate::{GateVerdict, ThresholdViolation};
    use crate::report::{Diagnostic, Report};
    use crate::rules::{Finding, Severity};

    pub fn finding(policy_id: &str, address: &str, severity: Severity) -> Finding {
        Finding {
            policy_id: policy_id.into(),
            resource_address: address.into(),
            file: "network/main.tf.json".into(),
            line: 12,
            severity,
            message: "ingress allows SSH (port 22) from 0.0.0.0/0".into(),
            remediation: "Restrict SSH ingress to known CIDR ranges.".into(),
            references: vec![
                "https://example.com/sg".into(),
                "https://cwe.mitre.org/data/definitions/284.html".into(),
            ],
            waived: false,
            waiver_reason: None,
        }
    }

    /// A failing report with one waived and one open finding.
    pub fn report() -> Report {
        let open = finding("TFG-AWS-002", "aws_security_group.ssh", Severity::High);
        let mut waived = finding("TFG-AWS-003", "aws_ebs_volume.scratch", Severity::Medium);
        waived.file = "compute.tf.json".into();
        waived.message = "volume is created without encryption at rest".into();
        waived.waived = true;
        waived.waiver_reason = Some("scratch disk, \"no data\"".into());

        let verdict = GateVerdict {
            passed: false,
            violations: vec![ThresholdViolation {
                severity: Severity::High,
                count: 1,
                limit: 0,
            }],
        };
        Report::new(
            vec![open, waived],
            verdict,
            vec![Diagnostic::parse("broken.tf.json", "expected value at line 1 column 3")],
            EnrichmentReport::default(),
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        )
    }
}
