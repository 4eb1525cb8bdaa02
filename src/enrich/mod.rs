//! Optional enrichment from external tools.
//!
//! Providers run concurrently on their own threads and never influence the
//! verdict or the findings. A provider that fails, panics or misses its
//! deadline leaves an `unavailable` section and an `enrichment` diagnostic.

pub mod cost;
pub mod drift;
#[cfg(feature = "explain")]
pub mod explain;
mod tool;
pub mod validation;

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use serde::{Deserialize, Serialize};

use crate::config::EnrichmentConfig;
use crate::error::ProviderError;
use crate::ir::Resource;
use crate::report::Diagnostic;
use crate::rules::dispatch::panic_message;
use crate::rules::Finding;

pub use cost::{CostEstimate, ResourceCost};
pub use drift::DriftReport;
pub use validation::ValidationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Cost,
    Drift,
    Validation,
    Explanation,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Drift => "drift",
            Self::Validation => "validation",
            Self::Explanation => "explanation",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a completed scan handed to every provider.
#[derive(Debug, Clone)]
pub struct EnrichmentInput {
    /// Scan root; tool-backed providers run in this directory.
    pub root: PathBuf,
    pub resources: Vec<Resource>,
    /// Gated findings, waiver marks included.
    pub findings: Vec<Finding>,
}

/// What a provider contributes to the report.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentData {
    Cost(CostEstimate),
    Drift(DriftReport),
    Validation(ValidationReport),
    Explanations(Vec<Explanation>),
}

/// A plain-language explanation of one finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub policy_id: String,
    pub resource_address: String,
    pub text: String,
}

/// Capability interface of an enrichment source.
pub trait EnrichmentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Longest this provider may take. The coordinator deadline caps it.
    fn timeout(&self) -> Duration;

    fn enrich(&self, input: &EnrichmentInput) -> Result<EnrichmentData, ProviderError>;
}

/// One report section: either the provider's data or why it is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Section<T> {
    Available(T),
    Unavailable { reason: String },
}

/// Enrichment sections of a report. Providers that were not requested
/// leave their section absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<Section<CostEstimate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift: Option<Section<DriftReport>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Section<ValidationReport>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanations: Option<Section<Vec<Explanation>>>,
}

impl EnrichmentReport {
    pub fn is_empty(&self) -> bool {
        self.cost.is_none()
            && self.drift.is_none()
            && self.validation.is_none()
            && self.explanations.is_none()
    }

    fn insert(&mut self, data: EnrichmentData) {
        match data {
            EnrichmentData::Cost(d) => self.cost = Some(Section::Available(d)),
            EnrichmentData::Drift(d) => self.drift = Some(Section::Available(d)),
            EnrichmentData::Validation(d) => self.validation = Some(Section::Available(d)),
            EnrichmentData::Explanations(d) => self.explanations = Some(Section::Available(d)),
        }
    }

    fn mark_unavailable(&mut self, kind: ProviderKind, reason: String) {
        match kind {
            ProviderKind::Cost => self.cost = Some(Section::Unavailable { reason }),
            ProviderKind::Drift => self.drift = Some(Section::Unavailable { reason }),
            ProviderKind::Validation => self.validation = Some(Section::Unavailable { reason }),
            ProviderKind::Explanation => {
                self.explanations = Some(Section::Unavailable { reason })
            }
        }
    }
}

/// Which providers a scan asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentFlags {
    pub cost: bool,
    pub drift: bool,
    pub validation: bool,
    pub explanation: bool,
}

impl EnrichmentFlags {
    pub fn any(&self) -> bool {
        self.cost || self.drift || self.validation || self.explanation
    }
}

/// Runs the requested providers and merges their sections.
pub struct Coordinator {
    providers: Vec<Arc<dyn EnrichmentProvider>>,
    deadline: Duration,
}

impl Coordinator {
    pub fn new(deadline: Duration) -> Self {
        Self {
            providers: Vec::new(),
            deadline,
        }
    }

    /// Coordinator with the concrete providers selected by `flags`.
    pub fn from_config(config: &EnrichmentConfig, flags: EnrichmentFlags) -> Self {
        let timeout = Duration::from_millis(config.provider_timeout_ms);
        let mut coordinator = Self::new(Duration::from_millis(config.deadline_ms));
        if flags.cost {
            coordinator = coordinator.with_provider(Arc::new(cost::InfracostProvider::new(
                &config.infracost_bin,
                timeout,
            )));
        }
        if flags.drift {
            coordinator = coordinator.with_provider(Arc::new(drift::TerraformDriftProvider::new(
                &config.terraform_bin,
                timeout,
            )));
        }
        if flags.validation {
            coordinator = coordinator.with_provider(Arc::new(
                validation::TerraformValidateProvider::new(&config.terraform_bin, timeout),
            ));
        }
        if flags.explanation {
            coordinator = coordinator.with_provider(explanation_provider(config, timeout));
        }
        coordinator
    }

    pub fn with_provider(mut self, provider: Arc<dyn EnrichmentProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Run every provider concurrently and collect what arrives in time.
    ///
    /// Sections and diagnostics come out in provider registration order,
    /// independent of completion order.
    pub fn run(&self, input: Arc<EnrichmentInput>) -> (EnrichmentReport, Vec<Diagnostic>) {
        let start = Instant::now();
        let overall = start + self.deadline;
        let (tx, rx) = crossbeam_channel::unbounded();

        let deadlines: Vec<Instant> = self
            .providers
            .iter()
            .map(|p| (start + p.timeout()).min(overall))
            .collect();
        let mut outcomes: Vec<Option<Result<EnrichmentData, ProviderError>>> =
            self.providers.iter().map(|_| None).collect();

        for (index, provider) in self.providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let input = Arc::clone(&input);
            let tx = tx.clone();
            let kind = provider.kind();
            tracing::debug!(provider = %kind, "starting enrichment provider");
            let spawned = thread::Builder::new()
                .name(format!("tfgate-enrich-{kind}"))
                .spawn(move || {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| provider.enrich(&input)))
                        .unwrap_or_else(|payload| {
                            Err(ProviderError::Panicked(panic_message(payload.as_ref())))
                        });
                    // The coordinator may have stopped listening.
                    let _ = tx.send((index, result));
                });
            if let Err(e) = spawned {
                outcomes[index] = Some(Err(ProviderError::Request(format!(
                    "could not start provider thread: {e}"
                ))));
            }
        }
        drop(tx);

        loop {
            let next = outcomes
                .iter()
                .zip(&deadlines)
                .filter(|(outcome, _)| outcome.is_none())
                .map(|(_, deadline)| *deadline)
                .min();
            let Some(next) = next else { break };

            match rx.recv_deadline(next) {
                Ok((index, result)) => {
                    if outcomes[index].is_none() {
                        outcomes[index] = Some(result);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let now = Instant::now();
                    for (index, outcome) in outcomes.iter_mut().enumerate() {
                        if outcome.is_none() && deadlines[index] <= now {
                            let waited = deadlines[index].duration_since(start);
                            *outcome = Some(Err(ProviderError::Timeout(waited.as_millis() as u64)));
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    for outcome in outcomes.iter_mut().filter(|o| o.is_none()) {
                        *outcome = Some(Err(ProviderError::Request(
                            "provider exited without a result".into(),
                        )));
                    }
                }
            }
        }

        let mut report = EnrichmentReport::default();
        let mut diagnostics = Vec::new();
        for (provider, outcome) in self.providers.iter().zip(outcomes) {
            let kind = provider.kind();
            match outcome {
                Some(Ok(data)) => {
                    tracing::info!(provider = %kind, "enrichment available");
                    report.insert(data);
                }
                Some(Err(e)) => {
                    tracing::warn!(provider = %kind, error = %e, "enrichment unavailable");
                    diagnostics.push(Diagnostic::enrichment(kind.as_str(), e.to_string()));
                    report.mark_unavailable(kind, e.to_string());
                }
                None => {}
            }
        }
        (report, diagnostics)
    }
}

#[cfg(feature = "explain")]
fn explanation_provider(
    config: &EnrichmentConfig,
    timeout: Duration,
) -> Arc<dyn EnrichmentProvider> {
    Arc::new(explain::ChatExplainProvider::new(&config.explain, timeout))
}

#[cfg(not(feature = "explain"))]
fn explanation_provider(
    _config: &EnrichmentConfig,
    _timeout: Duration,
) -> Arc<dyn EnrichmentProvider> {
    Arc::new(Unsupported(ProviderKind::Explanation))
}

/// Stand-in for a provider compiled out of this build.
#[cfg(not(feature = "explain"))]
struct Unsupported(ProviderKind);

#[cfg(not(feature = "explain"))]
impl EnrichmentProvider for Unsupported {
    fn kind(&self) -> ProviderKind {
        self.0
    }

    fn timeout(&self) -> Duration {
        Duration::ZERO
    }

    fn enrich(&self, _input: &EnrichmentInput) -> Result<EnrichmentData, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "tfgate was built without the `{}` provider",
            self.0
        )))
    }
}
