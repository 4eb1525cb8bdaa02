use crate::report::Report;

const HEADER: [&str; 10] = [
    "policy_id",
    "resource_address",
    "file",
    "line",
    "severity",
    "message",
    "remediation",
    "references",
    "waived",
    "waiver_reason",
];

/// One row per finding, RFC 4180 quoting, CRLF line endings.
/// References are joined with `|`.
pub fn render(report: &Report) -> String {
    let mut out = String::new();
    push_row(&mut out, HEADER.iter().map(|h| h.to_string()));
    for f in &report.findings {
        push_row(
            &mut out,
            [
                f.policy_id.clone(),
                f.resource_address.clone(),
                f.file.clone(),
                f.line.to_string(),
                f.severity.to_string(),
                f.message.clone(),
                f.remediation.clone(),
                f.references.join("|"),
                f.waived.to_string(),
                f.waiver_reason.clone().unwrap_or_default(),
            ],
        );
    }
    out
}

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    let row: Vec<String> = fields.into_iter().map(|f| escape(&f)).collect();
    out.push_str(&row.join(","));
    out.push_str("\r\n");
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support;

    #[test]
    fn header_and_rows() {
        let out = render(&test_support::report());
        let lines: Vec<&str> = out.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("policy_id,resource_address,file,line,severity"));
        assert!(lines[1]
            .starts_with("TFG-AWS-002,aws_security_group.ssh,network/main.tf.json,12,high,"));
        assert!(lines[1].contains(
            "https://example.com/sg|https://cwe.mitre.org/data/definitions/284.html"
        ));
    }

    #[test]
    fn quotes_when_needed() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        let out = render(&test_support::report());
        assert!(out.contains("true,\"scratch disk, \"\"no data\"\"\""));
    }

    #[test]
    fn empty_report_is_header_only() {
        let mut report = test_support::report();
        report.findings.clear();
        assert_eq!(render(&report).matches("\r\n").count(), 1);
    }
}
