use super::{Rule, RuleType, Severity};
use crate::error::Result;
use crate::types::{ColumnSpec, TableSchema};
use tracing::{debug, instrument};

/// Date pattern checked by synthesized rules on `date` columns.
pub const DEFAULT_DATE_PATTERN: &str = "yyyy-MM-dd";

/// Action attached to every synthesized rule.
pub const DTYPE_ACTION: &str = "FAIL_JOB";

/// Derives one `dtype` rule per typed catalog column, in catalog order.
///
/// String-family and blank declared types produce no rule. A declared type the
/// engine cannot cast to is a configuration error.
///
/// ```rust
/// use term_sieve::rules::synthesize_dtype_rules;
/// use term_sieve::types::{ColumnSpec, TableSchema};
///
/// let schema = TableSchema::new(
///     "hr",
///     "employees",
///     vec![ColumnSpec::new("id", "int"), ColumnSpec::new("name", "varchar(50)")],
/// )
/// .unwrap();
/// let rules = synthesize_dtype_rules(&schema).unwrap();
/// assert_eq!(rules.len(), 1);
/// assert_eq!(rules[0].description, "value in id must be a valid int");
/// ```
pub fn synthesize_dtype_rules(schema: &TableSchema) -> Result<Vec<Rule>> {
    synthesize_dtype_rules_with_pattern(schema, DEFAULT_DATE_PATTERN)
}

/// Like [`synthesize_dtype_rules`], checking date columns against `date_pattern`.
#[instrument(skip(schema), fields(table = %schema.table, columns = schema.len()))]
pub fn synthesize_dtype_rules_with_pattern(
    schema: &TableSchema,
    date_pattern: &str,
) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for column in schema.columns() {
        if column.is_free_text() {
            continue;
        }
        // Fails on complex or malformed declared types.
        column.sql_type()?;
        rules.push(dtype_rule(column, date_pattern));
    }
    debug!(synthesized = rules.len(), "Synthesized dtype rules");
    Ok(rules)
}

/// Builds the dtype rule for a single typed column.
pub fn dtype_rule(column: &ColumnSpec, date_pattern: &str) -> Rule {
    let ident = quote_ident(&column.name);
    let declared = column.declared_type.trim();
    let check = if column.base_type() == "date" {
        format!("to_date({ident}, '{}')", date_pattern.replace('\'', "''"))
    } else {
        format!("CAST({ident} AS {declared})")
    };

    Rule {
        column: column.name.clone(),
        rule_type: RuleType::Dtype,
        condition: Some(declared.to_string()),
        severity: Severity::Error,
        action: Some(DTYPE_ACTION.to_string()),
        description: format!("value in {} must be a valid {declared}", column.name),
        expression: Some(format!("{ident} IS NULL OR {check} IS NOT NULL")),
    }
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
