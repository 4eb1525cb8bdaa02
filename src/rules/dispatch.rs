//! Rule dispatch: every applicable rule against every matching resource.
//!
//! Resources are spread over the rayon pool. Within a resource, rules run on a
//! watchdog worker thread so that a check which never returns is reported as a
//! diagnostic instead of stalling the scan. Results are merged after the
//! parallel section and stable-sorted by (file, declaration order, policy id).

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use rayon::prelude::*;

use crate::ir::Resource;
use crate::report::Diagnostic;

use super::{Finding, PolicyRegistry, PolicyRule};

pub const DEFAULT_RULE_TIMEOUT: Duration = Duration::from_millis(250);

/// Raw findings plus the rule evaluation diagnostics of one dispatch.
#[derive(Debug, Default)]
pub struct Evaluation {
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
enum Outcome {
    Clear,
    Violated(Finding),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    rule_timeout: Option<Duration>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            rule_timeout: Some(DEFAULT_RULE_TIMEOUT),
        }
    }

    /// `None` evaluates rules inline on the rayon workers without a watchdog.
    pub fn with_rule_timeout(rule_timeout: Option<Duration>) -> Self {
        Self { rule_timeout }
    }

    pub fn evaluate(&self, resources: &[Resource], registry: &PolicyRegistry) -> Evaluation {
        let per_resource: Vec<Vec<(&'static str, Outcome)>> = resources
            .par_iter()
            .map(|resource| {
                let rules: Vec<PolicyRule> =
                    registry.rules_for(resource).into_iter().copied().collect();
                match self.rule_timeout {
                    Some(timeout) => run_watched(resource, rules, timeout),
                    None => rules
                        .iter()
                        .map(|rule| (rule.id, run_check(rule, resource)))
                        .collect(),
                }
            })
            .collect();

        let mut tagged: Vec<(usize, &'static str, Outcome)> = per_resource
            .into_iter()
            .enumerate()
            .flat_map(|(idx, outcomes)| {
                outcomes
                    .into_iter()
                    .map(move |(rule_id, outcome)| (idx, rule_id, outcome))
            })
            .collect();

        tagged.sort_by(|a, b| {
            resources[a.0]
                .source_file
                .cmp(&resources[b.0].source_file)
                .then(a.0.cmp(&b.0))
                .then(a.1.cmp(b.1))
        });

        let mut evaluation = Evaluation::default();
        for (idx, rule_id, outcome) in tagged {
            match outcome {
                Outcome::Clear => {}
                Outcome::Violated(finding) => evaluation.findings.push(finding),
                Outcome::Failed(message) => {
                    let resource = &resources[idx];
                    tracing::warn!(
                        rule_id,
                        resource = %resource.address,
                        error = %message,
                        "rule evaluation failed"
                    );
                    evaluation.diagnostics.push(Diagnostic::rule_evaluation(
                        rule_id,
                        &resource.address,
                        &resource.source_file,
                        message,
                    ));
                }
            }
        }

        tracing::info!(
            resources = resources.len(),
            findings = evaluation.findings.len(),
            errors = evaluation.diagnostics.len(),
            "rule evaluation complete"
        );
        evaluation
    }
}

/// Evaluate `rules` in order on a worker thread, waiting at most `timeout`
/// for each result. A rule that times out is abandoned together with its
/// worker; a fresh worker picks up the rules after it.
fn run_watched(
    resource: &Resource,
    rules: Vec<PolicyRule>,
    timeout: Duration,
) -> Vec<(&'static str, Outcome)> {
    let shared = Arc::new(resource.clone());
    let mut outcomes = Vec::with_capacity(rules.len());

    while outcomes.len() < rules.len() {
        let start = outcomes.len();
        let pending: Vec<PolicyRule> = rules[start..].to_vec();
        let (tx, rx) = crossbeam_channel::bounded(pending.len());
        let worker_resource = Arc::clone(&shared);

        let spawned = thread::Builder::new()
            .name("tfgate-rule".into())
            .spawn(move || {
                for rule in &pending {
                    if tx.send(run_check(rule, &worker_resource)).is_err() {
                        break;
                    }
                }
            });

        if let Err(e) = spawned {
            tracing::warn!(error = %e, "could not spawn rule worker, evaluating inline");
            outcomes.extend(
                rules[start..]
                    .iter()
                    .map(|rule| (rule.id, run_check(rule, resource))),
            );
            break;
        }

        for rule in &rules[start..] {
            match rx.recv_timeout(timeout) {
                Ok(outcome) => outcomes.push((rule.id, outcome)),
                Err(RecvTimeoutError::Timeout) => {
                    outcomes.push((
                        rule.id,
                        Outcome::Failed(format!(
                            "rule timed out after {} ms",
                            timeout.as_millis()
                        )),
                    ));
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    outcomes.push((
                        rule.id,
                        Outcome::Failed("rule worker exited unexpectedly".into()),
                    ));
                    break;
                }
            }
        }
    }

    outcomes
}

fn run_check(rule: &PolicyRule, resource: &Resource) -> Outcome {
    match panic::catch_unwind(AssertUnwindSafe(|| (rule.check)(resource))) {
        Ok(Ok(None)) => Outcome::Clear,
        Ok(Ok(Some(violation))) => Outcome::Violated(rule.finding(resource, violation)),
        Ok(Err(e)) => Outcome::Failed(e.to_string()),
        Err(payload) => Outcome::Failed(format!("rule panicked: {}", panic_message(&*payload))),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".into()
    }
}
