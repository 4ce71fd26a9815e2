//! Per-record rule evaluation.
//!
//! Every compiled rule is evaluated against every record, in rule order and
//! without short-circuiting. A predicate that is false, or that fails to
//! evaluate, adds the rule's description and severity to the record.
//! Large inputs are split into contiguous partitions and evaluated on
//! blocking workers; results are re-joined in input order.

use crate::error::{Result, TermError};
use crate::expression::Outcome;
use crate::record::{EvaluatedRecord, Record};
use crate::rules::RuleSet;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Evaluates a [`RuleSet`] against records.
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    rules: Arc<RuleSet>,
    partitions: usize,
}

impl RuleEvaluator {
    /// Creates an evaluator using one partition per available CPU.
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self {
            rules,
            partitions: num_cpus::get().max(1),
        }
    }

    /// Sets the number of partitions; zero is treated as one.
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Evaluates all rules against one record.
    pub fn evaluate(&self, record: Record) -> EvaluatedRecord {
        evaluate_record(&self.rules, record)
    }

    /// Evaluates all records, preserving input order.
    #[instrument(skip(self, records), fields(records = records.len(), rules = self.rules.len(), partitions = self.partitions))]
    pub async fn evaluate_all(&self, records: Vec<Record>) -> Result<Vec<EvaluatedRecord>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let total = records.len();
        let chunk_size = total.div_ceil(self.partitions);
        let mut chunks = Vec::with_capacity(self.partitions);
        let mut remaining = records.into_iter();
        loop {
            let chunk: Vec<Record> = remaining.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            chunks.push(chunk);
        }
        debug!(chunks = chunks.len(), chunk_size, "Evaluating partitions");

        let handles = chunks.into_iter().map(|chunk| {
            let rules = Arc::clone(&self.rules);
            tokio::task::spawn_blocking(move || {
                chunk
                    .into_iter()
                    .map(|record| evaluate_record(&rules, record))
                    .collect::<Vec<_>>()
            })
        });

        let results = try_join_all(handles)
            .await
            .map_err(|e| TermError::Internal(format!("Evaluation worker failed: {e}")))?;

        let mut evaluated = Vec::with_capacity(total);
        for part in results {
            evaluated.extend(part);
        }
        Ok(evaluated)
    }
}

/// Evaluates every rule against `record`, collecting failures in rule order.
pub fn evaluate_record(rules: &RuleSet, record: Record) -> EvaluatedRecord {
    let mut evaluated = EvaluatedRecord::new(record);
    for rule in rules.iter() {
        match rule.check(&evaluated.record) {
            Outcome::Satisfied => {}
            Outcome::Violated => {
                evaluated.push_violation(rule.description(), rule.severity().clone());
            }
            Outcome::Failed(error) => {
                trace!(column = %rule.rule().column, %error, "Rule evaluation failed");
                evaluated.push_violation(rule.description(), rule.severity().clone());
            }
        }
    }
    evaluated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Rule, Severity};

    fn rules() -> Arc<RuleSet> {
        Arc::new(RuleSet::compile(vec![
            Rule::new("id", "id > 0", Severity::Warning, "id must be positive"),
            Rule::new("id", "id < 100", Severity::Error, "id must be small"),
            Rule::new("x", "missing > 1", Severity::Info, "references a missing column"),
        ]))
    }

    fn record(id: Option<&str>) -> Record {
        Record::from_pairs([("id", id)])
    }

    #[test]
    fn test_reasons_follow_rule_order() {
        let evaluator = RuleEvaluator::new(rules());
        let evaluated = evaluator.evaluate(record(Some("-500")));
        // -500 fails the first rule only; the third fails on the missing column
        assert_eq!(
            evaluated.reasons(),
            ["id must be positive", "references a missing column"]
        );
        assert_eq!(evaluated.severities(), [Severity::Warning, Severity::Info]);
    }

    #[test]
    fn test_null_values_do_not_violate() {
        let rules = Arc::new(RuleSet::compile(vec![Rule::new(
            "id",
            "id > 0",
            Severity::Error,
            "positive",
        )]));
        let evaluated = RuleEvaluator::new(rules).evaluate(record(None));
        assert!(evaluated.is_valid());
    }

    #[test]
    fn test_record_is_not_modified() {
        let evaluator = RuleEvaluator::new(rules());
        let input = record(Some("150"));
        let evaluated = evaluator.evaluate(input.clone());
        assert_eq!(evaluated.record, input);
    }

    #[tokio::test]
    async fn test_parallel_evaluation_preserves_order() {
        let evaluator = RuleEvaluator::new(rules()).with_partitions(4);
        let records: Vec<Record> = (0..103)
            .map(|i| Record::from_pairs([("id", Some((i * 3 - 50).to_string()))]))
            .collect();

        let sequential: Vec<EvaluatedRecord> = records
            .iter()
            .cloned()
            .map(|r| evaluator.evaluate(r))
            .collect();
        let parallel = evaluator.evaluate_all(records).await.unwrap();

        assert_eq!(parallel, sequential);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let evaluator = RuleEvaluator::new(rules()).with_partitions(0);
        assert_eq!(evaluator.partitions(), 1);
        assert!(evaluator.evaluate_all(Vec::new()).await.unwrap().is_empty());
    }
}
