use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::ir::{is_interpolated, Resource};
use crate::rules::{CheckResult, PolicyRule, Provider, ResourceTypeMatch, Severity, Violation};

use super::{is_open_range, port, string_list};

pub static RULES: &[PolicyRule] = &[
    PolicyRule {
        id: "TFG-AWS-001",
        name: "S3 bucket publicly readable",
        severity: Severity::High,
        provider: Provider::Aws,
        resource_type: ResourceTypeMatch::Exact("aws_s3_bucket"),
        check: s3_public_acl,
        remediation: "Set `acl` to \"private\" and grant access through bucket policies \
                      scoped to specific principals. Enable S3 Block Public Access.",
        references: &["https://docs.aws.amazon.com/AmazonS3/latest/userguide/access-control-block-public-access.html"],
    },
    PolicyRule {
        id: "TFG-AWS-002",
        name: "Security group exposes admin ports",
        severity: Severity::High,
        provider: Provider::Aws,
        resource_type: ResourceTypeMatch::Exact("aws_security_group"),
        check: security_group_admin_ports,
        remediation: "Restrict SSH (22) and RDP (3389) ingress to known CIDR ranges, \
                      or use SSM Session Manager instead of open ports.",
        references: &[
            "https://docs.aws.amazon.com/vpc/latest/userguide/security-group-rules.html",
            "https://cwe.mitre.org/data/definitions/284.html",
        ],
    },
    PolicyRule {
        id: "TFG-AWS-003",
        name: "EBS volume not encrypted",
        severity: Severity::Medium,
        provider: Provider::Aws,
        resource_type: ResourceTypeMatch::Exact("aws_ebs_volume"),
        check: ebs_unencrypted,
        remediation: "Set `encrypted = true` (optionally with `kms_key_id`) or enable EBS \
                      encryption by default for the account.",
        references: &["https://docs.aws.amazon.com/ebs/latest/userguide/ebs-encryption.html"],
    },
    PolicyRule {
        id: "TFG-AWS-004",
        name: "RDS instance publicly accessible",
        severity: Severity::High,
        provider: Provider::Aws,
        resource_type: ResourceTypeMatch::Exact("aws_db_instance"),
        check: rds_public,
        remediation: "Set `publicly_accessible = false` and reach the database through \
                      private subnets or a bastion.",
        references: &["https://docs.aws.amazon.com/AmazonRDS/latest/UserGuide/USER_VPC.WorkingWithRDSInstanceinaVPC.html"],
    },
    PolicyRule {
        id: "TFG-AWS-005",
        name: "Hardcoded credential",
        severity: Severity::High,
        provider: Provider::Aws,
        resource_type: ResourceTypeMatch::Any,
        check: hardcoded_credential,
        remediation: "Read secrets from a variable marked `sensitive`, AWS Secrets Manager \
                      or SSM Parameter Store instead of literals.",
        references: &["https://cwe.mitre.org/data/definitions/798.html"],
    },
];

const PUBLIC_ACLS: &[&str] = &["public-read", "public-read-write", "authenticated-read"];

const ADMIN_PORTS: &[(u32, &str)] = &[(22, "SSH"), (3389, "RDP")];

static CREDENTIAL_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|_)(password|passwd|secret|secret_key|access_key|private_key|api_key|token)$")
        .expect("credential key pattern is valid")
});

fn s3_public_acl(r: &Resource) -> CheckResult {
    Ok(r.attr_str("acl")
        .filter(|acl| PUBLIC_ACLS.contains(acl))
        .map(|acl| Violation::new(format!("bucket ACL `{acl}` grants public read access"))))
}

fn security_group_admin_ports(r: &Resource) -> CheckResult {
    for rule in r.blocks("ingress") {
        let mut ranges = string_list(rule, "cidr_blocks")?;
        ranges.extend(string_list(rule, "ipv6_cidr_blocks")?);
        let Some(open) = ranges.into_iter().find(|c| is_open_range(c)) else {
            continue;
        };

        let from = port(rule, "from_port")?.unwrap_or(0);
        let to = port(rule, "to_port")?.unwrap_or(from);
        // protocol "-1" opens every port regardless of the range
        let all_ports = rule.get("protocol").and_then(Value::as_str) == Some("-1");

        for (admin, label) in ADMIN_PORTS {
            if all_ports || (from..=to).contains(admin) {
                return Ok(Some(Violation::new(format!(
                    "ingress allows {label} (port {admin}) from {open}"
                ))));
            }
        }
    }
    Ok(None)
}

fn ebs_unencrypted(r: &Resource) -> CheckResult {
    if r.attr_bool("encrypted") == Some(true) {
        return Ok(None);
    }
    Ok(Some(Violation::new("volume is created without encryption at rest")))
}

fn rds_public(r: &Resource) -> CheckResult {
    Ok((r.attr_bool("publicly_accessible") == Some(true))
        .then(|| Violation::new("database instance has a public endpoint")))
}

fn hardcoded_credential(r: &Resource) -> CheckResult {
    let hit = r.attributes.iter().find(|(key, value)| {
        CREDENTIAL_KEY.is_match(key)
            && value
                .as_str()
                .is_some_and(|s| !s.trim().is_empty() && !is_interpolated(s))
    });
    Ok(hit.map(|(key, _)| Violation::new(format!("attribute `{key}` holds a literal secret"))))
}
