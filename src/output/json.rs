use crate::error::Result;
use crate::report::Report;

/// Render the report as pretty-printed JSON. This is the lossless format:
/// [`parse`] reads it back into an equal `Report`.
pub fn render(report: &Report) -> Result<String> {
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');
    Ok(json)
}

pub fn parse(text: &str) -> Result<Report> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{CostEstimate, DriftReport, ResourceCost, Section};
    use crate::output::test_support;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips() {
        let mut report = test_support::report();
        report.enrichment.drift = Some(Section::Available(DriftReport::default()));
        report.enrichment.cost = Some(Section::Unavailable {
            reason: "tool `infracost` is not installed or not on PATH".into(),
        });

        let text = render(&report).unwrap();
        assert_eq!(parse(&text).unwrap(), report);
    }

    #[test]
    fn cost_amounts_round_trip_exactly() {
        let mut report = test_support::report();
        report.enrichment.cost = Some(Section::Available(CostEstimate {
            currency: "USD".into(),
            total_monthly_cost: Some(0.1 + 0.2),
            resources: vec![ResourceCost {
                address: "aws_db_instance.main".into(),
                monthly_cost: Some(1234.5678901234567),
            }],
        }));

        let text = render(&report).unwrap();
        assert_eq!(parse(&text).unwrap(), report);
    }

    #[test]
    fn stable_field_names() {
        let text = render(&test_support::report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["tool"], "tfgate");
        assert_eq!(value["passed"], false);
        assert_eq!(value["scan_date"], "2026-03-01");
        assert_eq!(value["findings"][0]["severity"], "high");
        assert_eq!(value["findings"][1]["waived"], true);
        assert_eq!(value["summary"]["unwaived_by_severity"]["medium"], 0);
        assert_eq!(value["diagnostics"][0]["kind"], "parse");
        assert!(value.get("enrichment").is_none());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("{\"tool\": 1}").is_err());
    }
}
