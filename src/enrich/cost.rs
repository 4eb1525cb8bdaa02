//! Monthly cost estimate from `infracost breakdown`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{tool, EnrichmentData, EnrichmentInput, EnrichmentProvider, ProviderKind};
use crate::error::ProviderError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub currency: String,
    pub total_monthly_cost: Option<f64>,
    /// Per-resource costs in the order infracost reports them.
    pub resources: Vec<ResourceCost>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCost {
    pub address: String,
    pub monthly_cost: Option<f64>,
}

pub struct InfracostProvider {
    bin: String,
    timeout: Duration,
}

impl InfracostProvider {
    pub fn new(bin: &str, timeout: Duration) -> Self {
        Self {
            bin: bin.to_string(),
            timeout,
        }
    }
}

impl EnrichmentProvider for InfracostProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cost
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn enrich(&self, input: &EnrichmentInput) -> Result<EnrichmentData, ProviderError> {
        let path = input.root.to_string_lossy();
        let output = tool::run(
            &self.bin,
            &["breakdown", "--path", &path, "--format", "json", "--no-color"],
            &input.root,
            &[0],
        )?;
        parse_breakdown(&output).map(EnrichmentData::Cost)
    }
}

/// Parse `infracost breakdown --format json`. Monetary amounts are decimal
/// strings and may be null for resources without a price.
pub fn parse_breakdown(text: &str) -> Result<CostEstimate, ProviderError> {
    let doc: Value =
        serde_json::from_str(text).map_err(|e| ProviderError::Decode(e.to_string()))?;

    let resources = doc
        .get("projects")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|p| p.pointer("/breakdown/resources").and_then(Value::as_array))
        .flatten()
        .filter_map(|r| {
            Some(ResourceCost {
                address: r.get("name")?.as_str()?.to_string(),
                monthly_cost: amount(r.get("monthlyCost")),
            })
        })
        .collect();

    Ok(CostEstimate {
        currency: doc
            .get("currency")
            .and_then(Value::as_str)
            .unwrap_or("USD")
            .to_string(),
        total_monthly_cost: amount(doc.get("totalMonthlyCost")),
        resources,
    })
}

fn amount(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
