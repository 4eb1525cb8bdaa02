//! tfgate: policy gate for Terraform configurations.
//!
//! Normalizes Terraform JSON configuration and plan documents into
//! resources, evaluates provider rule tables against them, applies waivers
//! and severity thresholds, and renders deterministic reports.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use tfgate::{scan, ScanOptions};
//!
//! let options = ScanOptions::default();
//! let report = scan(Path::new("./infra"), &options).unwrap();
//! println!("Pass: {}, Findings: {}", report.passed, report.findings.len());
//! ```

pub mod config;
pub mod enrich;
pub mod error;
pub mod gate;
pub mod ir;
pub mod normalize;
pub mod output;
pub mod parser;
pub mod report;
pub mod rules;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use config::{Config, DEFAULT_CONFIG_FILE};
use enrich::{Coordinator, EnrichmentFlags, EnrichmentInput, EnrichmentReport};
use error::{Result, TfGateError};
use gate::Thresholds;
use output::OutputFormat;
use report::Report;
use rules::dispatch::DEFAULT_RULE_TIMEOUT;
use rules::{Dispatcher, PolicyRegistry, Severity};

/// Options for a scan invocation.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Path to config file (defaults to `.tfgate.toml` in the scan root).
    pub config_path: Option<PathBuf>,
    /// Explicit documents to scan. Empty means discover under the root.
    pub files: Vec<PathBuf>,
    pub enrichment: EnrichmentFlags,
    /// Overrides `scan.rule_timeout_ms`. A zero duration disables the
    /// per-rule watchdog.
    pub rule_timeout: Option<Duration>,
    /// Limits set here replace the configured ones.
    pub threshold_overrides: Thresholds,
    /// Extra exclude globs, added to `scan.exclude`.
    pub exclude: Vec<String>,
    /// Fixed scan clock. Two scans of the same inputs with the same clock
    /// produce identical reports.
    pub now: Option<DateTime<Utc>>,
}

/// Run a complete scan with the builtin rule set.
pub fn scan(path: &Path, options: &ScanOptions) -> Result<Report> {
    let registry = PolicyRegistry::builtin()?;
    scan_with_registry(path, options, &registry)
}

/// Run a complete scan: load config, normalize, evaluate, gate, enrich.
///
/// Only configuration problems and an unreadable scan root are errors.
/// Everything else ends up in the report's diagnostics.
pub fn scan_with_registry(
    path: &Path,
    options: &ScanOptions,
    registry: &PolicyRegistry,
) -> Result<Report> {
    let now = options.now.unwrap_or_else(Utc::now);
    let scan_date = now.date_naive();

    let mut config = load_config(path, options)?;
    for severity in Severity::ALL {
        if let Some(limit) = options.threshold_overrides.limit(severity) {
            config.thresholds.set(severity, Some(limit));
        }
    }
    config.thresholds.validate().map_err(TfGateError::Config)?;
    config.warn_unknown_policies(registry);

    let exclude = config
        .scan
        .exclude
        .iter()
        .chain(&options.exclude)
        .map(|p| {
            glob::Pattern::new(p)
                .map_err(|e| TfGateError::Config(format!("invalid exclude pattern '{p}': {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let files = if options.files.is_empty() {
        normalize::discover(path, &exclude)?
    } else {
        options.files.clone()
    };
    tracing::info!(root = %path.display(), files = files.len(), "scan started");

    let normalized = normalize::normalize(path, &files);

    let rule_timeout = match options.rule_timeout {
        Some(t) => Some(t),
        None => config
            .scan
            .rule_timeout_ms
            .map(Duration::from_millis)
            .or(Some(DEFAULT_RULE_TIMEOUT)),
    }
    .filter(|t| !t.is_zero());
    let evaluation =
        Dispatcher::with_rule_timeout(rule_timeout).evaluate(&normalized.resources, registry);

    let (findings, verdict) = gate::run(
        evaluation.findings,
        &config.waivers,
        &config.thresholds,
        scan_date,
    );

    let mut diagnostics = normalized.diagnostics;
    diagnostics.extend(evaluation.diagnostics);

    let enrichment = if !options.enrichment.any() {
        EnrichmentReport::default()
    } else {
        let coordinator = Coordinator::from_config(&config.enrichment, options.enrichment);
        let root = if path.is_file() {
            path.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            path.to_path_buf()
        };
        let input = Arc::new(EnrichmentInput {
            root,
            resources: normalized.resources,
            findings: findings.clone(),
        });
        let (enrichment, enrichment_diagnostics) = coordinator.run(input);
        diagnostics.extend(enrichment_diagnostics);
        enrichment
    };

    let report = Report::new(findings, verdict, diagnostics, enrichment, now, scan_date);
    tracing::info!(
        passed = report.passed,
        findings = report.summary.total_findings,
        waived = report.summary.waived_findings,
        diagnostics = report.diagnostics.len(),
        "scan complete"
    );
    Ok(report)
}

/// An explicitly named config file must exist; the default one may not.
fn load_config(path: &Path, options: &ScanOptions) -> Result<Config> {
    match &options.config_path {
        Some(explicit) => Config::load_required(explicit),
        None => {
            let dir = if path.is_file() {
                path.parent().unwrap_or(Path::new("."))
            } else {
                path
            };
            Config::load(&dir.join(DEFAULT_CONFIG_FILE))
        }
    }
}

/// Render a scan report in the specified format.
pub fn render_report(report: &Report, format: OutputFormat) -> Result<String> {
    output::render(report, format)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_options() -> ScanOptions {
        ScanOptions {
            now: Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn clean_config_passes() {
        let report = scan(Path::new("tests/fixtures/clean"), &fixed_options()).unwrap();
        assert!(report.findings.is_empty());
        assert!(report.diagnostics.is_empty());
        assert!(report.passed);
    }

    #[test]
    fn insecure_config_fails_default_config() {
        let report = scan(Path::new("tests/fixtures/insecure"), &fixed_options()).unwrap();
        assert!(report.findings.iter().any(|f| f.policy_id == "TFG-AWS-001"));
        assert!(report.findings.iter().any(|f| f.policy_id == "TFG-GCP-002"));
        assert!(!report.passed);
    }

    #[test]
    fn plan_documents_are_scanned() {
        let report = scan(Path::new("tests/fixtures/plan"), &fixed_options()).unwrap();
        let addresses: Vec<&str> = report
            .findings
            .iter()
            .map(|f| f.resource_address.as_str())
            .collect();
        assert!(addresses.contains(&"module.db.aws_db_instance.main"));
    }

    #[test]
    fn missing_explicit_config_is_error() {
        let options = ScanOptions {
            config_path: Some(PathBuf::from("tests/fixtures/does-not-exist.toml")),
            ..fixed_options()
        };
        let err = scan(Path::new("tests/fixtures/clean"), &options).unwrap_err();
        assert!(err.is_config());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn negative_override_is_config_error() {
        let mut options = fixed_options();
        options.threshold_overrides.set(Severity::Low, Some(-1));
        let err = scan(Path::new("tests/fixtures/clean"), &options).unwrap_err();
        assert!(err.is_config());
    }
}
