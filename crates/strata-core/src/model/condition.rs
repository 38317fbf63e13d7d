//! Policy for exceptional but non-fatal conditions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raised when an in-scope artifact has no producing module.
pub const MODULE_NOT_FOUND: &str = "module-not-found";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionalCondition {
    pub name: String,
    pub message: String,
}

impl ExceptionalCondition {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionDecision {
    #[default]
    Continue,
    Abort,
}

/// Decides whether a run continues past an exceptional condition.
pub trait ExceptionalConditionPolicy {
    fn decide(&self, condition: &ExceptionalCondition) -> ConditionDecision;
}

/// Decisions looked up by condition name; unknown conditions continue.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredConditionPolicy {
    decisions: HashMap<String, ConditionDecision>,
}

impl ConfiguredConditionPolicy {
    pub fn new(decisions: HashMap<String, ConditionDecision>) -> Self {
        Self { decisions }
    }

    pub fn with_decision(mut self, condition: impl Into<String>, decision: ConditionDecision) -> Self {
        self.decisions.insert(condition.into(), decision);
        self
    }
}

impl ExceptionalConditionPolicy for ConfiguredConditionPolicy {
    fn decide(&self, condition: &ExceptionalCondition) -> ConditionDecision {
        self.decisions
            .get(&condition.name)
            .copied()
            .unwrap_or_default()
    }
}
