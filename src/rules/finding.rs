use serde::{Deserialize, Serialize};

/// A policy violation detected for one resource by one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Rule identifier (e.g., "TFG-AWS-001").
    pub policy_id: String,
    pub resource_address: String,
    /// File the resource was declared in, relative to the scan root.
    pub file: String,
    /// 1-based declaration line of the resource.
    pub line: usize,
    pub severity: Severity,
    pub message: String,
    pub remediation: String,
    pub references: Vec<String>,
    /// Set by the gate when a waiver suppresses this finding.
    pub waived: bool,
    pub waiver_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// All severities, highest first.
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_low_to_high() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert_eq!(Severity::ALL[0], Severity::High);
    }

    #[test]
    fn severity_vocabulary_is_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Medium).unwrap(), "\"medium\"");
        let parsed: Severity = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(parsed, Severity::High);
        assert!(serde_json::from_str::<Severity>("\"critical\"").is_err());
    }
}
