//! Normalized resource model.
//!
//! Every document parser produces `Resource`s. Every rule consumes a
//! `Resource`. This decouples document formats from policy evaluation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource attributes in document order.
pub type Attributes = serde_json::Map<String, Value>;

/// A single managed resource declared in a configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Terraform address (e.g., `aws_s3_bucket.logs`), unique within a scan.
    pub address: String,
    /// Resource type (e.g., `aws_s3_bucket`).
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Provider local name (e.g., `aws`).
    pub provider: String,
    pub attributes: Attributes,
    /// Path relative to the scan root, `/`-separated.
    pub source_file: String,
    pub source_span: SourceSpan,
}

/// 1-based position of a resource declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
}

impl SourceSpan {
    /// Locate the byte offset `offset` in `text`.
    pub fn at_offset(text: &str, offset: usize) -> Self {
        let offset = offset.min(text.len());
        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;
        Self { line, column }
    }
}

impl Resource {
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(Value::as_str)
    }

    /// Boolean attribute. Terraform JSON allows `"true"`/`"false"` strings too.
    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        match self.attr(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Nested blocks under `key`. A block may be written as a single object
    /// or as an array of objects.
    pub fn blocks(&self, key: &str) -> Vec<&Attributes> {
        blocks_of(self.attr(key))
    }
}

/// Blocks of a nested value, accepting object or array-of-object forms.
pub fn blocks_of(value: Option<&Value>) -> Vec<&Attributes> {
    match value {
        Some(Value::Object(map)) => vec![map],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

/// Whether a string value is a Terraform interpolation rather than a literal.
pub fn is_interpolated(s: &str) -> bool {
    s.contains("${") || s.contains("%{")
}
