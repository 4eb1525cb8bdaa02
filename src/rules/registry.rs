use std::collections::HashMap;

use crate::error::{Result, TfGateError};
use crate::ir::Resource;

use super::{builtin, PolicyRule};

/// Append-only table of policy rules keyed by id.
///
/// Populated once at startup (see [`PolicyRegistry::builtin`]) and shared
/// read-only with every scan afterwards.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    rules: Vec<PolicyRule>,
    by_id: HashMap<&'static str, usize>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with every builtin provider table.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        for provider in super::Provider::ALL {
            for rule in builtin::rules(provider) {
                registry.register(*rule)?;
            }
        }
        tracing::debug!(rules = registry.len(), "builtin registry initialized");
        Ok(registry)
    }

    pub fn register(&mut self, rule: PolicyRule) -> Result<()> {
        if self.by_id.contains_key(rule.id) {
            return Err(TfGateError::DuplicateRuleId(rule.id.to_string()));
        }
        self.by_id.insert(rule.id, self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    /// All rules whose provider and resource type match `resource`,
    /// in registration order.
    pub fn rules_for(&self, resource: &Resource) -> Vec<&PolicyRule> {
        self.rules.iter().filter(|r| r.applies_to(resource)).collect()
    }

    pub fn get(&self, id: &str) -> Option<&PolicyRule> {
        self.by_id.get(id).map(|&i| &self.rules[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// All rules sorted by id.
    pub fn list(&self) -> Vec<&PolicyRule> {
        let mut rules: Vec<&PolicyRule> = self.rules.iter().collect();
        rules.sort_by_key(|r| r.id);
        rules
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|r| r.id)
    }

    /// Closest registered id to `id` within edit distance 3, if any.
    pub fn closest_id(&self, id: &str) -> Option<&'static str> {
        self.rules
            .iter()
            .map(|r| (levenshtein::levenshtein(id, r.id), r.id))
            .filter(|(d, _)| *d > 0 && *d <= 3)
            .min()
            .map(|(_, rule_id)| rule_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
