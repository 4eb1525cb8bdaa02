use crate::ir::Resource;
use crate::rules::{CheckResult, PolicyRule, Provider, ResourceTypeMatch, Severity, Violation};

use super::is_open_range;

pub static RULES: &[PolicyRule] = &[
    PolicyRule {
        id: "TFG-AZR-001",
        name: "Storage account allows HTTP",
        severity: Severity::Medium,
        provider: Provider::Azure,
        resource_type: ResourceTypeMatch::Exact("azurerm_storage_account"),
        check: storage_http_allowed,
        remediation: "Set `https_traffic_only_enabled = true`.",
        references: &["https://learn.microsoft.com/azure/storage/common/storage-require-secure-transfer"],
    },
    PolicyRule {
        id: "TFG-AZR-002",
        name: "Storage account accepts legacy TLS",
        severity: Severity::Medium,
        provider: Provider::Azure,
        resource_type: ResourceTypeMatch::Exact("azurerm_storage_account"),
        check: storage_legacy_tls,
        remediation: "Set `min_tls_version = \"TLS1_2\"`.",
        references: &["https://learn.microsoft.com/azure/storage/common/transport-layer-security-configure-minimum-version"],
    },
    PolicyRule {
        id: "TFG-AZR-003",
        name: "NSG rule allows inbound traffic from the internet",
        severity: Severity::High,
        provider: Provider::Azure,
        resource_type: ResourceTypeMatch::Exact("azurerm_network_security_rule"),
        check: nsg_inbound_from_internet,
        remediation: "Limit `source_address_prefix` to trusted ranges or service tags.",
        references: &["https://learn.microsoft.com/azure/virtual-network/network-security-groups-overview"],
    },
];

fn storage_http_allowed(r: &Resource) -> CheckResult {
    // azurerm 4.x renamed enable_https_traffic_only
    let https_only = r
        .attr_bool("https_traffic_only_enabled")
        .or_else(|| r.attr_bool("enable_https_traffic_only"));
    Ok((https_only == Some(false))
        .then(|| Violation::new("storage account accepts unencrypted HTTP requests")))
}

fn storage_legacy_tls(r: &Resource) -> CheckResult {
    Ok(r.attr_str("min_tls_version")
        .filter(|v| matches!(*v, "TLS1_0" | "TLS1_1"))
        .map(|v| Violation::new(format!("minimum TLS version is {v}"))))
}

fn nsg_inbound_from_internet(r: &Resource) -> CheckResult {
    let inbound = r
        .attr_str("direction")
        .is_some_and(|d| d.eq_ignore_ascii_case("inbound"));
    let allow = r
        .attr_str("access")
        .is_some_and(|a| a.eq_ignore_ascii_case("allow"));
    if !inbound || !allow {
        return Ok(None);
    }

    let mut sources: Vec<&str> = r.attr_str("source_address_prefix").into_iter().collect();
    if let Some(prefixes) = r.attr("source_address_prefixes") {
        let prefixes = prefixes.as_array().ok_or_else(|| crate::error::RuleError::UnexpectedShape {
            attribute: "source_address_prefixes".into(),
            expected: "a list of strings",
        })?;
        sources.extend(prefixes.iter().filter_map(|p| p.as_str()));
    }

    Ok(sources.into_iter().find(|s| is_open_range(s)).map(|s| {
        let ports = r.attr_str("destination_port_range").unwrap_or("*");
        Violation::new(format!("inbound allow from `{s}` to ports {ports}"))
    }))
}
