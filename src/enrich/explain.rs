//! Finding explanations from an OpenAI-compatible chat completion endpoint.

use std::time::Duration;

use serde_json::{json, Value};

use super::{EnrichmentData, EnrichmentInput, EnrichmentProvider, Explanation, ProviderKind};
use crate::config::ExplainConfig;
use crate::error::ProviderError;
use crate::rules::Finding;

const SYSTEM_PROMPT: &str = "You explain infrastructure security findings to engineers. \
Answer in at most three sentences: the risk, and how the remediation removes it.";

pub struct ChatExplainProvider {
    config: ExplainConfig,
    timeout: Duration,
}

impl ChatExplainProvider {
    pub fn new(config: &ExplainConfig, timeout: Duration) -> Self {
        Self {
            config: config.clone(),
            timeout,
        }
    }

    fn api_key(&self) -> Result<String, ProviderError> {
        std::env::var(&self.config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "environment variable {} is not set",
                    self.config.api_key_env
                ))
            })
    }

    fn explain_one(
        &self,
        agent: &ureq::Agent,
        api_key: &str,
        finding: &Finding,
    ) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt(finding) },
            ],
        });

        let response = agent
            .post(&self.config.endpoint)
            .set("Authorization", &format!("Bearer {api_key}"))
            .send_json(body)
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => {
                    let body = resp.into_string().unwrap_or_default();
                    ProviderError::Request(format!("HTTP {code}: {}", body.trim()))
                }
                other => ProviderError::Request(other.to_string()),
            })?;

        let value: Value = response
            .into_json()
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        completion_text(&value)
    }
}

impl EnrichmentProvider for ChatExplainProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Explanation
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn enrich(&self, input: &EnrichmentInput) -> Result<EnrichmentData, ProviderError> {
        let api_key = self.api_key()?;
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();

        let mut explanations = Vec::new();
        for finding in input
            .findings
            .iter()
            .filter(|f| !f.waived)
            .take(self.config.max_findings)
        {
            let text = self.explain_one(&agent, &api_key, finding)?;
            explanations.push(Explanation {
                policy_id: finding.policy_id.clone(),
                resource_address: finding.resource_address.clone(),
                text,
            });
        }
        tracing::debug!(count = explanations.len(), "explanations received");
        Ok(EnrichmentData::Explanations(explanations))
    }
}

fn prompt(finding: &Finding) -> String {
    format!(
        "Policy {} ({} severity) flagged `{}` in {} line {}: {}\nRemediation: {}",
        finding.policy_id,
        finding.severity,
        finding.resource_address,
        finding.file,
        finding.line,
        finding.message,
        finding.remediation,
    )
}

fn completion_text(value: &Value) -> Result<String, ProviderError> {
    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| ProviderError::Decode("response has no choices[0].message.content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Severity;

    #[test]
    fn extracts_first_choice() {
        let value = json!({ "choices": [{ "message": { "role": "assistant", "content": " Public buckets leak data. " } }] });
        assert_eq!(completion_text(&value).unwrap(), "Public buckets leak data.");
        assert!(completion_text(&json!({ "error": "quota" })).is_err());
    }

    #[test]
    fn prompt_carries_finding_context() {
        let finding = Finding {
            policy_id: "TFG-AWS-001".into(),
            resource_address: "aws_s3_bucket.logs".into(),
            file: "main.tf.json".into(),
            line: 4,
            severity: Severity::High,
            message: "bucket ACL `public-read` grants public read access".into(),
            remediation: "Set acl to private.".into(),
            references: Vec::new(),
            waived: false,
            waiver_reason: None,
        };
        let text = prompt(&finding);
        assert!(text.contains("TFG-AWS-001"));
        assert!(text.contains("high severity"));
        assert!(text.contains("line 4"));
    }

    #[test]
    fn missing_key_is_not_configured() {
        let config = ExplainConfig {
            api_key_env: "TFGATE_TEST_UNSET_KEY_VAR".into(),
            ..Default::default()
        };
        let provider = ChatExplainProvider::new(&config, Duration::from_secs(1));
        assert!(matches!(provider.api_key(), Err(ProviderError::NotConfigured(_))));
    }
}
