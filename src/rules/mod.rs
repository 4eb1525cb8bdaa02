pub mod builtin;
pub mod dispatch;
pub mod finding;
pub mod registry;

use serde::{Serialize, Serializer};

use crate::error::RuleError;
use crate::ir::Resource;

pub use dispatch::{Dispatcher, Evaluation};
pub use finding::{Finding, Severity};
pub use registry::PolicyRegistry;

/// Outcome of a single rule check against a single resource.
pub type CheckResult = std::result::Result<Option<Violation>, RuleError>;

/// A rule's check function. Must not touch shared mutable state: checks run
/// concurrently on worker threads.
pub type CheckFn = fn(&Resource) -> CheckResult;

/// What a check reports when a resource violates its rule. The dispatcher
/// combines it with the rule's metadata into a [`Finding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub message: String,
}

impl Violation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Cloud providers with a builtin rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Provider {
    #[serde(rename = "aws")]
    Aws,
    #[serde(rename = "azurerm")]
    Azure,
    #[serde(rename = "google")]
    Google,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Aws, Provider::Azure, Provider::Google];

    /// Terraform provider local name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azurerm",
            Self::Google => "google",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which resource types a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceTypeMatch {
    Exact(&'static str),
    /// Every resource of the rule's provider.
    Any,
}

impl ResourceTypeMatch {
    pub fn matches(self, resource_type: &str) -> bool {
        match self {
            Self::Exact(t) => t == resource_type,
            Self::Any => true,
        }
    }
}

impl std::fmt::Display for ResourceTypeMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(t) => f.write_str(t),
            Self::Any => f.write_str("*"),
        }
    }
}

impl Serialize for ResourceTypeMatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A registered policy rule: static metadata plus a check function.
#[derive(Clone, Copy, Serialize)]
pub struct PolicyRule {
    pub id: &'static str,
    pub name: &'static str,
    pub severity: Severity,
    pub provider: Provider,
    pub resource_type: ResourceTypeMatch,
    #[serde(skip)]
    pub check: CheckFn,
    pub remediation: &'static str,
    pub references: &'static [&'static str],
}

impl PolicyRule {
    /// Whether this rule should be evaluated against `resource`.
    pub fn applies_to(&self, resource: &Resource) -> bool {
        self.provider.as_str() == resource.provider
            && self.resource_type.matches(&resource.resource_type)
    }

    /// Build the finding for a violation of this rule.
    pub fn finding(&self, resource: &Resource, violation: Violation) -> Finding {
        Finding {
            policy_id: self.id.to_string(),
            resource_address: resource.address.clone(),
            file: resource.source_file.clone(),
            line: resource.source_span.line,
            severity: self.severity,
            message: violation.message,
            remediation: self.remediation.to_string(),
            references: self.references.iter().map(|r| r.to_string()).collect(),
            waived: false,
            waiver_reason: None,
        }
    }
}

impl std::fmt::Debug for PolicyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRule")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .field("provider", &self.provider)
            .field("resource_type", &self.resource_type)
            .finish_non_exhaustive()
    }
}
