use super::{Rule, Severity};
use crate::expression::{FieldLookup, Outcome, Predicate};
use tracing::{debug, instrument, warn};

/// A rule whose predicate has been parsed.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: Rule,
    predicate: Predicate,
}

impl CompiledRule {
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn description(&self) -> &str {
        &self.rule.description
    }

    pub fn severity(&self) -> &Severity {
        &self.rule.severity
    }

    pub fn check(&self, row: &dyn FieldLookup) -> Outcome {
        self.predicate.check(row)
    }
}

/// The ordered, compiled rules of a run.
///
/// Immutable once built; evaluation workers share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compiles every rule, dropping those whose predicate is missing or does
    /// not parse.
    #[instrument(skip(rules), fields(rules = rules.len()))]
    pub fn compile(rules: Vec<Rule>) -> Self {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let Some(text) = rule.predicate_text() else {
                warn!(column = %rule.column, "Dropping rule without a predicate");
                continue;
            };
            match Predicate::parse(text) {
                Ok(predicate) => {
                    debug!(column = %rule.column, predicate = %predicate.source(), "Compiled rule");
                    compiled.push(CompiledRule { rule, predicate });
                }
                Err(error) => warn!(
                    column = %rule.column,
                    predicate = text,
                    %error,
                    "Dropping rule with invalid predicate"
                ),
            }
        }
        Self { rules: compiled }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }
}
