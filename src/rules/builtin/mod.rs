mod aws;
mod azure;
mod google;

use serde_json::Value;

use crate::error::RuleError;
use crate::ir::{is_interpolated, Attributes};

use super::{PolicyRule, Provider};

/// The builtin rule table of each provider.
pub fn rules(provider: Provider) -> &'static [PolicyRule] {
    match provider {
        Provider::Aws => aws::RULES,
        Provider::Azure => azure::RULES,
        Provider::Google => google::RULES,
    }
}

/// Network ranges that mean "anyone".
fn is_open_range(range: &str) -> bool {
    matches!(
        range.trim().to_lowercase().as_str(),
        "0.0.0.0/0" | "::/0" | "*" | "internet" | "any"
    )
}

/// String list attribute. Missing means empty; interpolated lists (a single
/// `${...}` string) are unknown at scan time and also yield empty.
fn string_list<'a>(block: &'a Attributes, key: &str) -> Result<Vec<&'a str>, RuleError> {
    match block.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) if is_interpolated(s) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| RuleError::UnexpectedShape {
                    attribute: key.to_string(),
                    expected: "a list of strings",
                })
            })
            .collect(),
        Some(_) => Err(RuleError::UnexpectedShape {
            attribute: key.to_string(),
            expected: "a list of strings",
        }),
    }
}

/// Port number attribute, accepting numbers and numeric strings.
fn port(block: &Attributes, key: &str) -> Result<Option<u32>, RuleError> {
    let shape = || RuleError::UnexpectedShape {
        attribute: key.to_string(),
        expected: "a port number",
    };
    match block.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|p| u32::try_from(p).ok())
            .map(Some)
            .ok_or_else(shape),
        Some(Value::String(s)) if is_interpolated(s) => Ok(None),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| shape()),
        Some(_) => Err(shape()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(v: Value) -> Attributes {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn every_rule_belongs_to_its_table() {
        for provider in Provider::ALL {
            for rule in rules(provider) {
                assert_eq!(rule.provider, provider, "{} in wrong table", rule.id);
                assert!(!rule.remediation.is_empty(), "{} lacks remediation", rule.id);
                assert!(!rule.references.is_empty(), "{} lacks references", rule.id);
            }
        }
    }

    #[test]
    fn open_ranges() {
        assert!(is_open_range("0.0.0.0/0"));
        assert!(is_open_range("Internet"));
        assert!(!is_open_range("10.0.0.0/8"));
    }

    #[test]
    fn string_lists_validate_shape() {
        let b = block(json!({ "ok": ["a", "b"], "dynamic": "${var.x}", "bad": [1], "scalar": 3 }));
        assert_eq!(string_list(&b, "ok").unwrap(), ["a", "b"]);
        assert!(string_list(&b, "dynamic").unwrap().is_empty());
        assert!(string_list(&b, "missing").unwrap().is_empty());
        assert!(string_list(&b, "bad").is_err());
        assert!(string_list(&b, "scalar").is_err());
    }

    #[test]
    fn ports_accept_numbers_and_strings() {
        let b = block(json!({ "n": 22, "s": "3389", "v": "${var.p}", "bad": "ssh" }));
        assert_eq!(port(&b, "n").unwrap(), Some(22));
        assert_eq!(port(&b, "s").unwrap(), Some(3389));
        assert_eq!(port(&b, "v").unwrap(), None);
        assert!(port(&b, "bad").is_err());
    }
}
