use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TfGateError};
use crate::gate::{Thresholds, Waiver};
use crate::rules::PolicyRegistry;

pub const DEFAULT_CONFIG_FILE: &str = ".tfgate.toml";

/// Top-level configuration from `.tfgate.toml` (or a JSON/YAML equivalent).
///
/// Unknown top-level sections are ignored so other tools can share the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub waivers: Vec<Waiver>,
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Per-rule evaluation timeout. `0` disables the watchdog.
    #[serde(default)]
    pub rule_timeout_ms: Option<u64>,
    /// Glob patterns (relative to the scan root) of files to skip.
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Results arriving later than this are dropped.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// Per-provider timeout; the deadline still caps it.
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    #[serde(default = "default_terraform_bin")]
    pub terraform_bin: String,
    #[serde(default = "default_infracost_bin")]
    pub infracost_bin: String,
    #[serde(default)]
    pub explain: ExplainConfig,
}

fn default_deadline_ms() -> u64 {
    30_000
}

fn default_provider_timeout_ms() -> u64 {
    20_000
}

fn default_terraform_bin() -> String {
    "terraform".into()
}

fn default_infracost_bin() -> String {
    "infracost".into()
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            provider_timeout_ms: default_provider_timeout_ms(),
            terraform_bin: default_terraform_bin(),
            infracost_bin: default_infracost_bin(),
            explain: ExplainConfig::default(),
        }
    }
}

/// OpenAI-compatible chat completion endpoint used for explanations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Explanations are requested for at most this many non-waived findings.
    #[serde(default = "default_max_findings")]
    pub max_findings: usize,
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

fn default_max_findings() -> usize {
    20
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_findings: default_max_findings(),
        }
    }
}

impl Config {
    /// Load config from a file. Returns default if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_required(path)
    }

    /// Load config from a file that must exist. The format follows the
    /// extension: `.json`, `.yaml`/`.yml`, otherwise TOML.
    pub fn load_required(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TfGateError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let config: Config = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .map_err(|e| TfGateError::Config(format!("{}: {}", path.display(), e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            _ => toml::from_str(&content)?,
        };
        config.validate()?;
        tracing::debug!(
            path = %path.display(),
            waivers = config.waivers.len(),
            "config loaded"
        );
        Ok(config)
    }

    /// Reject configurations whose gating semantics would be undefined.
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate().map_err(TfGateError::Config)?;

        for (idx, waiver) in self.waivers.iter().enumerate() {
            if waiver.policy_id.trim().is_empty() {
                return Err(TfGateError::Config(format!(
                    "waivers[{idx}]: policy_id must not be empty"
                )));
            }
            if waiver.reason.trim().is_empty() {
                return Err(TfGateError::Config(format!(
                    "waivers[{idx}] ({}): reason must not be empty",
                    waiver.policy_id
                )));
            }
        }

        for pattern in &self.scan.exclude {
            glob::Pattern::new(pattern).map_err(|e| {
                TfGateError::Config(format!("scan.exclude: invalid pattern '{pattern}': {e}"))
            })?;
        }

        url::Url::parse(&self.enrichment.explain.endpoint).map_err(|e| {
            TfGateError::Config(format!(
                "enrichment.explain.endpoint: invalid URL '{}': {}",
                self.enrichment.explain.endpoint, e
            ))
        })?;

        Ok(())
    }

    /// Log waivers that reference policies the registry doesn't know.
    /// Such waivers are kept: they simply never match.
    pub fn warn_unknown_policies(&self, registry: &PolicyRegistry) {
        for waiver in &self.waivers {
            if registry.contains(&waiver.policy_id) {
                continue;
            }
            match registry.closest_id(&waiver.policy_id) {
                Some(suggestion) => tracing::warn!(
                    policy_id = %waiver.policy_id,
                    suggestion,
                    "waiver references unknown policy"
                ),
                None => tracing::warn!(
                    policy_id = %waiver.policy_id,
                    "waiver references unknown policy"
                ),
            }
        }
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# tfgate configuration

# Maximum number of non-waived findings tolerated per severity.
# Omit a severity to leave it unenforced; 0 fails on any finding.
[thresholds]
high = 0
# medium = 5
# low = 20

# Waivers are checked in order; the first match wins.
# [[waivers]]
# policy_id = "TFG-AWS-003"
# resource = "aws_ebs_volume.scratch"   # optional
# file = "storage.tf.json"              # optional
# reason = "scratch volume holds no customer data"
# expires = "2025-12-31"                # optional, inclusive
# approved_by = "security@example.com" # optional

[scan]
# rule_timeout_ms = 250
# exclude = ["vendor/**"]

[enrichment]
# deadline_ms = 30000
# terraform_bin = "terraform"
# infracost_bin = "infracost"

[enrichment.explain]
# endpoint = "https://api.openai.com/v1/chat/completions"
# model = "gpt-4o-mini"
# api_key_env = "OPENAI_API_KEY"
"#
    }
}
