use serde_json::Value;

use crate::ir::{blocks_of, Resource};
use crate::rules::{CheckResult, PolicyRule, Provider, ResourceTypeMatch, Severity, Violation};

use super::{is_open_range, string_list};

pub static RULES: &[PolicyRule] = &[
    PolicyRule {
        id: "TFG-GCP-001",
        name: "Bucket without uniform bucket-level access",
        severity: Severity::Medium,
        provider: Provider::Google,
        resource_type: ResourceTypeMatch::Exact("google_storage_bucket"),
        check: bucket_uniform_access,
        remediation: "Set `uniform_bucket_level_access = true` and manage access with IAM only.",
        references: &["https://cloud.google.com/storage/docs/uniform-bucket-level-access"],
    },
    PolicyRule {
        id: "TFG-GCP-002",
        name: "Firewall allows ingress from anywhere",
        severity: Severity::High,
        provider: Provider::Google,
        resource_type: ResourceTypeMatch::Exact("google_compute_firewall"),
        check: firewall_open_ingress,
        remediation: "Narrow `source_ranges` to known networks or use IAP TCP forwarding.",
        references: &["https://cloud.google.com/firewall/docs/firewalls"],
    },
    PolicyRule {
        id: "TFG-GCP-003",
        name: "Cloud SQL authorized for all networks",
        severity: Severity::High,
        provider: Provider::Google,
        resource_type: ResourceTypeMatch::Exact("google_sql_database_instance"),
        check: sql_open_authorized_network,
        remediation: "Remove 0.0.0.0/0 from `authorized_networks`; use private IP or the \
                      Cloud SQL Auth Proxy.",
        references: &["https://cloud.google.com/sql/docs/mysql/authorize-networks"],
    },
];

fn bucket_uniform_access(r: &Resource) -> CheckResult {
    Ok((r.attr_bool("uniform_bucket_level_access") != Some(true))
        .then(|| Violation::new("bucket uses per-object ACLs")))
}

fn firewall_open_ingress(r: &Resource) -> CheckResult {
    let ingress = r
        .attr_str("direction")
        .map_or(true, |d| d.eq_ignore_ascii_case("ingress"));
    if !ingress || r.blocks("allow").is_empty() {
        return Ok(None);
    }
    let ranges = string_list(&r.attributes, "source_ranges")?;
    Ok(ranges
        .into_iter()
        .find(|range| is_open_range(range))
        .map(|range| Violation::new(format!("ingress allowed from {range}"))))
}

fn sql_open_authorized_network(r: &Resource) -> CheckResult {
    for settings in r.blocks("settings") {
        for ip in blocks_of(settings.get("ip_configuration")) {
            for network in blocks_of(ip.get("authorized_networks")) {
                if let Some(Value::String(value)) = network.get("value") {
                    if is_open_range(value) {
                        return Ok(Some(Violation::new(format!(
                            "authorized network `{value}` admits any client"
                        ))));
                    }
                }
            }
        }
    }
    Ok(None)
}
