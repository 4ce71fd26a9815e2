//! Untyped input records and their evaluation annotations.

use crate::expression::FieldLookup;
use crate::rules::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An untyped record: an ordered mapping from column name to a raw value.
///
/// Values are text or null, exactly as read from the dataset source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, Option<String>)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Builds a record from `(column, value)` pairs.
    ///
    /// ```rust
    /// use term_sieve::record::Record;
    ///
    /// let record = Record::from_pairs([("id", Some("1")), ("name", None)]);
    /// assert_eq!(record.get("id"), Some(Some("1")));
    /// assert_eq!(record.get("name"), Some(None));
    /// assert_eq!(record.get("missing"), None);
    /// ```
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        }
    }

    /// Appends a field, replacing any existing field of the same name.
    pub fn set(&mut self, column: impl Into<String>, value: Option<String>) {
        let column = column.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Looks up a field. The outer `Option` is `None` when the column does not
    /// exist, the inner one when the value is null.
    ///
    /// Exact names win; otherwise names match case-insensitively.
    pub fn get(&self, column: &str) -> Option<Option<&str>> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(column))
            })
            .map(|(_, value)| value.as_deref())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn fields(&self) -> &[(String, Option<String>)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (column, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Some(text) => write!(f, "{column}={text:?}")?,
                None => write!(f, "{column}=NULL")?,
            }
        }
        f.write_str("}")
    }
}

impl FieldLookup for Record {
    fn field(&self, column: &str) -> Option<Option<&str>> {
        self.get(column)
    }
}

/// A record after every applicable rule has been evaluated against it.
///
/// `reasons[i]` and `severities[i]` always describe the same failed rule, in
/// rule order.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedRecord {
    pub record: Record,
    reasons: Vec<String>,
    severities: Vec<Severity>,
}

impl EvaluatedRecord {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            reasons: Vec::new(),
            severities: Vec::new(),
        }
    }

    /// Records one violated rule.
    pub fn push_violation(&mut self, reason: impl Into<String>, severity: Severity) {
        self.reasons.push(reason.into());
        self.severities.push(severity);
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn severities(&self) -> &[Severity] {
        &self.severities
    }

    pub fn is_valid(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn into_parts(self) -> (Record, Vec<String>, Vec<Severity>) {
        (self.record, self.reasons, self.severities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive_fallback() {
        let record = Record::from_pairs([("Id", Some("1")), ("id", Some("2"))]);
        assert_eq!(record.get("id"), Some(Some("2")));
        assert_eq!(record.get("ID"), Some(Some("1")));
    }

    #[test]
    fn test_display() {
        let record = Record::from_pairs([("id", Some("7")), ("name", None)]);
        assert_eq!(record.to_string(), r#"{id="7", name=NULL}"#);
    }

    #[test]
    fn test_set_replaces_existing() {
        let mut record = Record::from_pairs([("a", Some("1"))]);
        record.set("a", None);
        record.set("b", Some("x".to_string()));
        assert_eq!(record.get("a"), Some(None));
        assert_eq!(record.columns().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_violations_stay_aligned() {
        let mut evaluated = EvaluatedRecord::new(Record::new());
        assert!(evaluated.is_valid());
        evaluated.push_violation("first", Severity::Warning);
        evaluated.push_violation("second", Severity::Error);
        assert!(!evaluated.is_valid());
        assert_eq!(evaluated.reasons(), ["first", "second"]);
        assert_eq!(evaluated.severities(), [Severity::Warning, Severity::Error]);
    }
}
