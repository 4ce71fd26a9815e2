use super::Rule;
use tracing::debug;

/// Pseudo-column naming rules that apply to the whole table.
pub const TABLE_SENTINEL: &str = "__TABLE__";

/// Returns true if the rule can be evaluated against a single record.
///
/// A rule is inapplicable when its predicate is missing or blank, when it
/// targets [`TABLE_SENTINEL`], when it is a primary or foreign key rule, or
/// when its predicate is the literal `true`.
pub fn is_applicable(rule: &Rule) -> bool {
    let Some(predicate) = rule.predicate_text() else {
        return false;
    };
    !rule.column.trim().eq_ignore_ascii_case(TABLE_SENTINEL)
        && !rule.rule_type.is_key()
        && !predicate.eq_ignore_ascii_case("true")
}

/// Keeps the applicable rules, preserving order.
pub fn filter_rules(rules: Vec<Rule>) -> Vec<Rule> {
    let before = rules.len();
    let kept: Vec<Rule> = rules.into_iter().filter(is_applicable).collect();
    if kept.len() != before {
        debug!(dropped = before - kept.len(), kept = kept.len(), "Filtered inapplicable rules");
    }
    kept
}

/// Appends synthesized rules after contract rules and filters the result.
pub fn merge_rules(contract: Vec<Rule>, synthesized: Vec<Rule>) -> Vec<Rule> {
    let mut merged = contract;
    merged.extend(synthesized);
    filter_rules(merged)
}
