use serde_json::Value;

use crate::error::ParseError;
use crate::ir::{Resource, SourceSpan};

use super::{find_string, provider_from_type, DocumentParser};

/// `terraform show -json <planfile>` output.
///
/// Resources are read from `planned_values.root_module` and, depth first,
/// its `child_modules`. The planned `values` become the attributes.
pub struct PlanJsonParser;

impl DocumentParser for PlanJsonParser {
    fn parse(
        &self,
        file: &str,
        text: &str,
        document: &Value,
    ) -> Result<Vec<Resource>, ParseError> {
        let mut resources = Vec::new();
        let Some(root) = document
            .get("planned_values")
            .and_then(|p| p.get("root_module"))
        else {
            return Ok(resources);
        };
        let mut cursor = 0;
        collect_module(
            root,
            "planned_values.root_module",
            file,
            text,
            &mut cursor,
            &mut resources,
        )?;
        Ok(resources)
    }
}

fn collect_module(
    module: &Value,
    path: &str,
    file: &str,
    text: &str,
    cursor: &mut usize,
    out: &mut Vec<Resource>,
) -> Result<(), ParseError> {
    let shape = |path: String, message: &str| ParseError::Shape {
        path,
        message: message.to_string(),
    };

    if let Some(list) = module.get("resources") {
        let items = list
            .as_array()
            .ok_or_else(|| shape(format!("{path}.resources"), "expected an array"))?;
        for (idx, item) in items.iter().enumerate() {
            let item_path = format!("{path}.resources[{idx}]");
            if item.get("mode").and_then(Value::as_str) == Some("data") {
                continue;
            }
            let address = item
                .get("address")
                .and_then(Value::as_str)
                .ok_or_else(|| shape(item_path.clone(), "missing string `address`"))?;
            let resource_type = item
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| shape(item_path.clone(), "missing string `type`"))?;
            let provider = item
                .get("provider_name")
                .and_then(Value::as_str)
                .and_then(|p| p.rsplit('/').next())
                .map(str::to_string)
                .unwrap_or_else(|| provider_from_type(resource_type));
            let attributes = match item.get("values") {
                None | Some(Value::Null) => Default::default(),
                Some(Value::Object(map)) => map.clone(),
                Some(_) => return Err(shape(format!("{item_path}.values"), "expected an object")),
            };

            let source_span = match find_string(text, *cursor, address)
                .or_else(|| find_string(text, 0, address))
            {
                Some(pos) => {
                    *cursor = pos;
                    SourceSpan::at_offset(text, pos)
                }
                None => SourceSpan::default(),
            };

            out.push(Resource {
                address: address.to_string(),
                resource_type: resource_type.to_string(),
                provider,
                attributes,
                source_file: file.to_string(),
                source_span,
            });
        }
    }

    if let Some(children) = module.get("child_modules") {
        let children = children
            .as_array()
            .ok_or_else(|| shape(format!("{path}.child_modules"), "expected an array"))?;
        for (idx, child) in children.iter().enumerate() {
            let child_path = format!("{path}.child_modules[{idx}]");
            collect_module(child, &child_path, file, text, cursor, out)?;
        }
    }

    Ok(())
}
