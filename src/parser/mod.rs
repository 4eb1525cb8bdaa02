pub mod config_json;
pub mod plan_json;

use serde_json::Value;

use crate::error::ParseError;
use crate::ir::Resource;

/// Kinds of already-parsed configuration documents we can normalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Terraform JSON configuration syntax (`*.tf.json`).
    ConfigJson,
    /// `terraform show -json` output for a saved plan.
    PlanJson,
}

impl DocumentKind {
    pub fn detect(document: &Value) -> Self {
        if document.get("planned_values").is_some() {
            Self::PlanJson
        } else {
            Self::ConfigJson
        }
    }
}

/// Document parser trait. Each parser turns one document into resources in
/// declaration order.
pub trait DocumentParser: Send + Sync {
    /// `file` is the root-relative path recorded on each resource; `text` is
    /// the raw document, used to locate declarations.
    fn parse(&self, file: &str, text: &str, document: &Value)
        -> Result<Vec<Resource>, ParseError>;
}

pub fn parser_for(kind: DocumentKind) -> Box<dyn DocumentParser> {
    match kind {
        DocumentKind::ConfigJson => Box::new(config_json::ConfigJsonParser),
        DocumentKind::PlanJson => Box::new(plan_json::PlanJsonParser),
    }
}

/// Parse raw JSON text, detect its kind and extract resources.
pub fn parse_document(file: &str, text: &str) -> Result<Vec<Resource>, ParseError> {
    let document: Value = serde_json::from_str(text)?;
    if !document.is_object() {
        return Err(ParseError::Shape {
            path: "$".into(),
            message: "document root must be an object".into(),
        });
    }
    let kind = DocumentKind::detect(&document);
    tracing::trace!(file, ?kind, "parsing document");
    parser_for(kind).parse(file, text, &document)
}

/// Provider local name implied by a resource type (`aws_s3_bucket` → `aws`).
pub fn provider_from_type(resource_type: &str) -> String {
    resource_type
        .split_once('_')
        .map(|(prefix, _)| prefix)
        .unwrap_or(resource_type)
        .to_string()
}

/// Byte offset of the JSON object key `key` at or after `from`.
pub(crate) fn find_key(text: &str, from: usize, key: &str) -> Option<usize> {
    let quoted = serde_json::to_string(key).ok()?;
    let from = from.min(text.len());
    text[from..]
        .match_indices(&quoted)
        .map(|(i, _)| from + i)
        .find(|&pos| {
            text[pos + quoted.len()..]
                .trim_start()
                .starts_with(':')
        })
}

/// Byte offset just past the value of the object key that starts at `key_pos`.
pub(crate) fn value_end(text: &str, key_pos: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = skip_string(bytes, key_pos)?;
    i += text.get(i..)?.find(':')? + 1;
    while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
        i += 1;
    }
    match bytes.get(i)? {
        b'"' => skip_string(bytes, i),
        b'{' | b'[' => {
            let mut depth = 0usize;
            while let Some(&b) = bytes.get(i) {
                match b {
                    b'"' => {
                        i = skip_string(bytes, i)?;
                        continue;
                    }
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(i + 1);
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            None
        }
        _ => {
            let rest = &text[i..];
            let len = rest
                .find(|c: char| matches!(c, ',' | '}' | ']') || c.is_whitespace())
                .unwrap_or(rest.len());
            Some(i + len)
        }
    }
}

/// Offset just past the JSON string literal opening at `start`.
fn skip_string(bytes: &[u8], start: usize) -> Option<usize> {
    if bytes.get(start) != Some(&b'"') {
        return None;
    }
    let mut i = start + 1;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'\\' => i += 2,
            b'"' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Byte offset of the JSON string value `value` at or after `from`.
pub(crate) fn find_string(text: &str, from: usize, value: &str) -> Option<usize> {
    let quoted = serde_json::to_string(value).ok()?;
    let from = from.min(text.len());
    text[from..].find(&quoted).map(|i| from + i)
}
