//! Format validation through `terraform validate -json`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{tool, EnrichmentData, EnrichmentInput, EnrichmentProvider, ProviderKind};
use crate::error::ProviderError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub messages: Vec<ValidationMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub severity: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

pub struct TerraformValidateProvider {
    bin: String,
    timeout: Duration,
}

impl TerraformValidateProvider {
    pub fn new(bin: &str, timeout: Duration) -> Self {
        Self {
            bin: bin.to_string(),
            timeout,
        }
    }
}

impl EnrichmentProvider for TerraformValidateProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Validation
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn enrich(&self, input: &EnrichmentInput) -> Result<EnrichmentData, ProviderError> {
        // validate exits 1 on an invalid configuration but still prints JSON
        let output = tool::run(&self.bin, &["validate", "-json"], &input.root, &[0, 1])?;
        parse_output(&output).map(EnrichmentData::Validation)
    }
}

#[derive(Deserialize)]
struct RawOutput {
    valid: bool,
    #[serde(default)]
    error_count: usize,
    #[serde(default)]
    warning_count: usize,
    #[serde(default)]
    diagnostics: Vec<RawDiagnostic>,
}

#[derive(Deserialize)]
struct RawDiagnostic {
    severity: String,
    summary: String,
    range: Option<RawRange>,
}

#[derive(Deserialize)]
struct RawRange {
    filename: String,
    start: RawPos,
}

#[derive(Deserialize)]
struct RawPos {
    line: usize,
}

pub fn parse_output(text: &str) -> Result<ValidationReport, ProviderError> {
    let raw: RawOutput =
        serde_json::from_str(text).map_err(|e| ProviderError::Decode(e.to_string()))?;
    Ok(ValidationReport {
        valid: raw.valid,
        error_count: raw.error_count,
        warning_count: raw.warning_count,
        messages: raw
            .diagnostics
            .into_iter()
            .map(|d| ValidationMessage {
                severity: d.severity,
                summary: d.summary,
                file: d.range.as_ref().map(|r| r.filename.clone()),
                line: d.range.map(|r| r.start.line),
            })
            .collect(),
    })
}
