//! Splits evaluated records into valid and invalid sets.

use crate::record::{EvaluatedRecord, Record};
use crate::rules::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column holding failure descriptions in the invalid output.
pub const REASONS_COLUMN: &str = "reasons";
/// Column holding failure severities in the invalid output.
pub const SEVERITIES_COLUMN: &str = "severities";
/// Column holding the reprocess disposition in the invalid output.
pub const REPROCESS_COLUMN: &str = "Reprocess_IND";

/// Whether an invalid record may be corrected and reprocessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reprocess {
    #[serde(rename = "Y")]
    Yes,
    #[serde(rename = "N")]
    No,
}

impl Reprocess {
    /// `No` as soon as any severity is `ERROR`.
    pub fn from_severities(severities: &[Severity]) -> Self {
        if severities.iter().any(Severity::is_error) {
            Reprocess::No
        } else {
            Reprocess::Yes
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Reprocess::Yes => "Y",
            Reprocess::No => "N",
        }
    }
}

impl fmt::Display for Reprocess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that failed at least one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidRecord {
    pub record: Record,
    pub reasons: Vec<String>,
    pub severities: Vec<Severity>,
    pub reprocess: Reprocess,
}

/// The outcome of classifying a batch of evaluated records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub valid: Vec<Record>,
    pub invalid: Vec<InvalidRecord>,
}

impl Classification {
    /// Number of invalid records marked for reprocessing.
    pub fn reprocessable(&self) -> usize {
        self.invalid
            .iter()
            .filter(|r| r.reprocess == Reprocess::Yes)
            .count()
    }

    pub fn total(&self) -> usize {
        self.valid.len() + self.invalid.len()
    }
}

/// Partitions records by whether any rule failed, preserving relative order.
pub fn classify(evaluated: Vec<EvaluatedRecord>) -> Classification {
    let mut classification = Classification::default();
    for record in evaluated {
        let (record, reasons, severities) = record.into_parts();
        if reasons.is_empty() {
            classification.valid.push(record);
        } else {
            let reprocess = Reprocess::from_severities(&severities);
            classification.invalid.push(InvalidRecord {
                record,
                reasons,
                severities,
                reprocess,
            });
        }
    }
    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluated(id: &str, failures: &[(&str, Severity)]) -> EvaluatedRecord {
        let mut e = EvaluatedRecord::new(Record::from_pairs([("id", Some(id))]));
        for (reason, severity) in failures {
            e.push_violation(*reason, severity.clone());
        }
        e
    }

    #[test]
    fn test_reprocess_disposition() {
        assert_eq!(Reprocess::from_severities(&[]), Reprocess::Yes);
        assert_eq!(
            Reprocess::from_severities(&[Severity::Warning, Severity::Info]),
            Reprocess::Yes
        );
        assert_eq!(
            Reprocess::from_severities(&[Severity::Warning, Severity::Error]),
            Reprocess::No
        );
        assert_eq!(
            Reprocess::from_severities(&[Severity::Other("FATAL".into())]),
            Reprocess::Yes
        );
    }

    #[test]
    fn test_classify_preserves_order() {
        let result = classify(vec![
            evaluated("1", &[]),
            evaluated("2", &[("too small", Severity::Warning)]),
            evaluated("3", &[]),
            evaluated("4", &[("bad type", Severity::Error)]),
        ]);
        let valid: Vec<_> = result.valid.iter().map(|r| r.get("id")).collect();
        assert_eq!(valid, vec![Some(Some("1")), Some(Some("3"))]);
        assert_eq!(result.invalid.len(), 2);
        assert_eq!(result.invalid[0].reprocess, Reprocess::Yes);
        assert_eq!(result.invalid[1].reprocess, Reprocess::No);
        assert_eq!(result.invalid[1].reasons, vec!["bad type"]);
        assert_eq!(result.reprocessable(), 1);
        assert_eq!(result.total(), 4);
    }

    #[test]
    fn test_reprocess_serializes_as_flag() {
        assert_eq!(serde_json::to_string(&Reprocess::No).unwrap(), "\"N\"");
        assert_eq!(Reprocess::Yes.to_string(), "Y");
    }
}
