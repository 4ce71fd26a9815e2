//! Data-quality rules: the rule model, rule documents, dtype synthesis,
//! filtering and compilation.
//!
//! A run's rule list is built in three steps:
//!
//! 1. contract rules are read from a [`RuleDocument`];
//! 2. [`synthesize_dtype_rules`] derives one `dtype` rule per typed catalog column;
//! 3. [`merge_rules`] concatenates both lists (contract rules first) and drops
//!    rules that cannot be evaluated per record.
//!
//! The survivors are compiled into a [`RuleSet`] that the evaluator shares
//! across workers.

mod compiled;
mod filter;
mod synthesize;

use crate::error::{Result, TermError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

pub use compiled::{CompiledRule, RuleSet};
pub use filter::{filter_rules, is_applicable, merge_rules, TABLE_SENTINEL};
pub use synthesize::{
    dtype_rule, synthesize_dtype_rules, synthesize_dtype_rules_with_pattern, DEFAULT_DATE_PATTERN,
    DTYPE_ACTION,
};

/// Severity attached to a failed rule.
///
/// Contract documents spell severities in upper case. Anything other than the
/// three known levels is preserved verbatim as [`Severity::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    /// Blocks reprocessing of the record
    Error,
    Warning,
    Info,
    Other(String),
}

impl Severity {
    /// Parses a severity, case-insensitively.
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Severity::Error,
            "WARNING" | "WARN" => Severity::Warning,
            "INFO" => Severity::Info,
            _ => Severity::Other(text.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::Other(other) => other,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        Severity::parse(&value)
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_string()
    }
}

/// Kind of rule. Key rules (`pk`, `fk`) span records and are never evaluated
/// per record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleType {
    /// Synthesized from a declared column type
    Dtype,
    #[default]
    Custom,
    PrimaryKey,
    ForeignKey,
    Other(String),
}

impl RuleType {
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "dtype" => RuleType::Dtype,
            "custom" => RuleType::Custom,
            "pk" | "primary_key" => RuleType::PrimaryKey,
            "fk" | "foreign_key" => RuleType::ForeignKey,
            _ => RuleType::Other(text.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RuleType::Dtype => "dtype",
            RuleType::Custom => "custom",
            RuleType::PrimaryKey => "pk",
            RuleType::ForeignKey => "fk",
            RuleType::Other(other) => other,
        }
    }

    pub fn is_key(&self) -> bool {
        matches!(self, RuleType::PrimaryKey | RuleType::ForeignKey)
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for RuleType {
    fn from(value: String) -> Self {
        RuleType::parse(&value)
    }
}

impl From<RuleType> for String {
    fn from(value: RuleType) -> Self {
        value.as_str().to_string()
    }
}

/// A single data-quality rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub column: String,
    #[serde(default)]
    pub rule_type: RuleType,
    /// Free-form condition; the declared type for dtype rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Text recorded in `reasons` when the rule fails
    pub description: String,
    /// Boolean expression over one record
    #[serde(
        rename = "spark_exp",
        alias = "expression",
        alias = "predicate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expression: Option<String>,
}

impl Rule {
    /// Creates a custom rule.
    pub fn new(
        column: impl Into<String>,
        expression: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            rule_type: RuleType::Custom,
            condition: None,
            severity,
            action: None,
            description: description.into(),
            expression: Some(expression.into()),
        }
    }

    pub fn with_rule_type(mut self, rule_type: RuleType) -> Self {
        self.rule_type = rule_type;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// The predicate text, if present and not blank.
    pub fn predicate_text(&self) -> Option<&str> {
        self.expression
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

/// A rule entry as it appears in a contract, before validation.
#[derive(Debug, Default, Deserialize)]
struct RawRule {
    column: Option<String>,
    rule_type: Option<String>,
    condition: Option<String>,
    severity: Option<String>,
    action: Option<String>,
    description: Option<String>,
    #[serde(alias = "expression", alias = "predicate")]
    spark_exp: Option<String>,
}

impl RawRule {
    fn into_rule(self) -> Option<Rule> {
        let column = self.column.filter(|c| !c.trim().is_empty())?;
        let severity = Severity::parse(self.severity.as_deref().filter(|s| !s.trim().is_empty())?);
        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .or_else(|| self.spark_exp.clone())
            .unwrap_or_else(|| format!("rule on {column}"));
        Some(Rule {
            column,
            rule_type: self.rule_type.as_deref().map(RuleType::parse).unwrap_or_default(),
            condition: self.condition,
            severity,
            action: self.action,
            description,
            expression: self.spark_exp,
        })
    }
}

/// The parsed contract for one table: `{"data_quality": {"rules": [...]}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleDocument {
    pub rules: Vec<Rule>,
}

impl RuleDocument {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Parses contract text. `key` only labels errors and warnings.
    pub fn from_json_str(key: &str, text: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| TermError::ContractParse {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Self::from_value(key, &value)
    }

    /// Extracts rules from a parsed contract.
    ///
    /// The document must contain a `data_quality.rules` array. Entries are
    /// parsed one at a time; malformed entries and entries missing `column`
    /// or `severity` are skipped with a warning.
    pub fn from_value(key: &str, value: &serde_json::Value) -> Result<Self> {
        let entries = value
            .get("data_quality")
            .and_then(|dq| dq.get("rules"))
            .and_then(|rules| rules.as_array())
            .ok_or_else(|| TermError::ContractParse {
                key: key.to_string(),
                message: "expected an array at data_quality.rules".to_string(),
            })?;

        let mut rules = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let parsed = serde_json::from_value::<RawRule>(entry.clone())
                .map_err(|e| e.to_string())
                .and_then(|raw| {
                    raw.into_rule()
                        .ok_or_else(|| "missing column or severity".to_string())
                });
            match parsed {
                Ok(rule) => rules.push(rule),
                Err(reason) => warn!(contract = key, index, %reason, "Skipping malformed rule entry"),
            }
        }
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_parsing() {
        assert_eq!(Severity::parse("error"), Severity::Error);
        assert_eq!(Severity::parse(" Warning "), Severity::Warning);
        assert_eq!(Severity::parse("INFO"), Severity::Info);
        assert_eq!(Severity::parse("Critical"), Severity::Other("Critical".into()));
        assert_eq!(Severity::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_severity_serde() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
        let parsed: Severity = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(parsed, Severity::Error);
    }

    #[test]
    fn test_rule_type_aliases() {
        assert_eq!(RuleType::parse("PK"), RuleType::PrimaryKey);
        assert_eq!(RuleType::parse("foreign_key"), RuleType::ForeignKey);
        assert_eq!(RuleType::parse("Primary_Key"), RuleType::PrimaryKey);
        assert!(RuleType::parse("fk").is_key());
        assert!(!RuleType::parse("range").is_key());
    }

    #[test]
    fn test_document_parsing() {
        let doc = json!({
            "data_quality": {
                "rules": [
                    {
                        "column": "id",
                        "rule_type": "custom",
                        "severity": "WARNING",
                        "action": "LOG",
                        "description": "id must be positive",
                        "spark_exp": "id > 0"
                    },
                    {
                        "column": "email",
                        "severity": "ERROR",
                        "expression": "email LIKE '%@%'"
                    }
                ]
            }
        });
        let parsed = RuleDocument::from_value("contracts/emp.json", &doc).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.rules[0].severity, Severity::Warning);
        assert_eq!(parsed.rules[0].action.as_deref(), Some("LOG"));
        assert_eq!(parsed.rules[1].expression.as_deref(), Some("email LIKE '%@%'"));
        assert_eq!(parsed.rules[1].description, "email LIKE '%@%'");
        assert_eq!(parsed.rules[1].rule_type, RuleType::Custom);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let doc = json!({
            "data_quality": {
                "rules": [
                    {"severity": "ERROR", "spark_exp": "a > 1"},
                    {"column": "a", "spark_exp": "a > 1"},
                    {"column": "a", "severity": 3, "spark_exp": "a > 1"},
                    "not an object",
                    {"column": "a", "severity": "INFO", "spark_exp": "a > 1"}
                ]
            }
        });
        let parsed = RuleDocument::from_value("k", &doc).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.rules[0].severity, Severity::Info);
    }

    #[test]
    fn test_missing_rules_array_is_parse_error() {
        let err = RuleDocument::from_value("k", &json!({"rules": []})).unwrap_err();
        assert!(matches!(err, TermError::ContractParse { .. }));

        let err = RuleDocument::from_json_str("k", "{not json").unwrap_err();
        assert!(matches!(err, TermError::ContractParse { .. }));
    }

    #[test]
    fn test_rule_serializes_predicate_as_spark_exp() {
        let rule = Rule::new("id", "id > 0", Severity::Error, "positive");
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["spark_exp"], "id > 0");
        assert_eq!(value["severity"], "ERROR");
        assert_eq!(value["rule_type"], "custom");
    }

    #[test]
    fn test_blank_predicate_text() {
        let mut rule = Rule::new("id", "   ", Severity::Error, "blank");
        assert_eq!(rule.predicate_text(), None);
        rule.expression = Some(" id > 0 ".into());
        assert_eq!(rule.predicate_text(), Some("id > 0"));
    }
}
