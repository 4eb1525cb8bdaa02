use serde_json::Value;

use crate::error::ParseError;
use crate::ir::{Attributes, Resource, SourceSpan};

use super::{find_key, provider_from_type, value_end, DocumentParser};

/// Terraform JSON configuration syntax.
///
/// ```json
/// { "resource": { "aws_s3_bucket": { "logs": { "acl": "private" } } } }
/// ```
///
/// Every level below `resource` may also be written as an array of objects.
/// Data sources (`data`) are not policy subjects and are skipped.
pub struct ConfigJsonParser;

impl DocumentParser for ConfigJsonParser {
    fn parse(
        &self,
        file: &str,
        text: &str,
        document: &Value,
    ) -> Result<Vec<Resource>, ParseError> {
        let Some(resource_block) = document.get("resource") else {
            return Ok(Vec::new());
        };
        let resource_pos = find_key(text, 0, "resource").unwrap_or(0);
        let mut cursor = resource_pos;
        let mut resources = Vec::new();

        for by_type in objects(resource_block, "resource")? {
            for (resource_type, by_name) in by_type {
                let type_path = format!("resource.{resource_type}");
                for named in objects(by_name, &type_path)? {
                    for (name, body) in named {
                        let path = format!("{type_path}.{name}");
                        let attributes = body_of(body, &path)?;

                        let type_pos = find_key(text, cursor, resource_type)
                            .or_else(|| find_key(text, resource_pos, resource_type));
                        let name_pos = type_pos.and_then(|tp| {
                            find_key(text, tp.max(cursor), name)
                                .or_else(|| find_key(text, tp, name))
                        });
                        let source_span = match name_pos {
                            Some(pos) => {
                                cursor = value_end(text, pos).unwrap_or(pos);
                                SourceSpan::at_offset(text, pos)
                            }
                            None => SourceSpan::default(),
                        };

                        let provider = attributes
                            .get("provider")
                            .and_then(Value::as_str)
                            .map(|alias| alias.split('.').next().unwrap_or(alias).to_string())
                            .unwrap_or_else(|| provider_from_type(resource_type));

                        resources.push(Resource {
                            address: format!("{resource_type}.{name}"),
                            resource_type: resource_type.clone(),
                            provider,
                            attributes,
                            source_file: file.to_string(),
                            source_span,
                        });
                    }
                }
            }
        }

        Ok(resources)
    }
}

/// An object, or every object of an array of objects.
fn objects<'a>(value: &'a Value, path: &str) -> Result<Vec<&'a Attributes>, ParseError> {
    match value {
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_object().ok_or_else(|| ParseError::Shape {
                    path: path.to_string(),
                    message: "expected an array of objects".into(),
                })
            })
            .collect(),
        _ => Err(ParseError::Shape {
            path: path.to_string(),
            message: "expected an object".into(),
        }),
    }
}

/// A resource body: an object, or a single-element array holding one.
fn body_of(value: &Value, path: &str) -> Result<Attributes, ParseError> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        Value::Array(items) if items.len() == 1 && items[0].is_object() => {
            Ok(items[0].as_object().cloned().unwrap_or_default())
        }
        _ => Err(ParseError::Shape {
            path: path.to_string(),
            message: "resource body must be an object".into(),
        }),
    }
}
