//! Drift between state and real infrastructure, from a refresh-only plan.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{tool, EnrichmentData, EnrichmentInput, EnrichmentProvider, ProviderKind};
use crate::error::ProviderError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    pub drifted: Vec<DriftedResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftedResource {
    pub address: String,
    /// Terraform change action, e.g. `update` or `delete`.
    pub action: String,
}

pub struct TerraformDriftProvider {
    bin: String,
    timeout: Duration,
}

impl TerraformDriftProvider {
    pub fn new(bin: &str, timeout: Duration) -> Self {
        Self {
            bin: bin.to_string(),
            timeout,
        }
    }
}

impl EnrichmentProvider for TerraformDriftProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Drift
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn enrich(&self, input: &EnrichmentInput) -> Result<EnrichmentData, ProviderError> {
        let output = tool::run(
            &self.bin,
            &["plan", "-refresh-only", "-json", "-input=false", "-lock=false"],
            &input.root,
            &[0],
        )?;
        parse_events(&output).map(EnrichmentData::Drift)
    }
}

/// Collect `resource_drift` events from Terraform's machine-readable UI
/// stream (one JSON object per line). Other event types are ignored.
pub fn parse_events(stream: &str) -> Result<DriftReport, ProviderError> {
    let mut report = DriftReport::default();
    for line in stream.lines().filter(|l| !l.trim().is_empty()) {
        let event: Value =
            serde_json::from_str(line).map_err(|e| ProviderError::Decode(e.to_string()))?;
        if event.get("type").and_then(Value::as_str) != Some("resource_drift") {
            continue;
        }
        let change = event.get("change");
        let address = change
            .and_then(|c| c.pointer("/resource/addr"))
            .and_then(Value::as_str);
        let action = change
            .and_then(|c| c.get("action"))
            .and_then(Value::as_str)
            .unwrap_or("update");
        if let Some(address) = address {
            report.drifted.push(DriftedResource {
                address: address.to_string(),
                action: action.to_string(),
            });
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_drift_events() {
        let stream = concat!(
            r#"{"@level":"info","type":"version","terraform":"1.7.0"}"#,
            "\n",
            r#"{"@level":"info","type":"resource_drift","change":{"resource":{"addr":"aws_s3_bucket.logs"},"action":"update"}}"#,
            "\n",
            r#"{"@level":"info","type":"resource_drift","change":{"resource":{"addr":"aws_instance.web"},"action":"delete"}}"#,
            "\n",
            r#"{"@level":"info","type":"change_summary","changes":{"add":0}}"#,
            "\n"
        );
        let report = parse_events(stream).unwrap();
        assert_eq!(report.drifted.len(), 2);
        assert_eq!(report.drifted[1].address, "aws_instance.web");
        assert_eq!(report.drifted[1].action, "delete");
    }

    #[test]
    fn non_json_line_is_decode_error() {
        assert!(parse_events("Error: backend not initialized").is_err());
    }
}
