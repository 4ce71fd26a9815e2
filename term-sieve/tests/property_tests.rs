//! Property-based tests for rule synthesis, filtering, evaluation and
//! classification.
//!
//! ## Properties
//!
//! - Filtering is idempotent and never keeps table-level rules
//! - String-family columns never get a dtype rule
//! - Integers within range pass the dtype rule; non-numeric text fails it
//! - Reasons and severities stay index-aligned with rule order
//! - `Reprocess_IND` is `N` exactly when some severity is `ERROR`
//! - A value that passes its dtype rule always casts to the declared type

use proptest::prelude::*;
use std::sync::Arc;
use term_sieve::prelude::*;
use term_sieve::rules::{
    dtype_rule, filter_rules, synthesize_dtype_rules, synthesize_dtype_rules_with_pattern,
    TABLE_SENTINEL,
};

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Error),
        Just(Severity::Warning),
        Just(Severity::Info),
        "[A-Z]{3,8}".prop_map(|s| Severity::parse(&s)),
    ]
}

fn rule_strategy() -> impl Strategy<Value = Rule> {
    (
        prop_oneof![
            Just(TABLE_SENTINEL.to_string()),
            "[a-z]{1,8}".prop_map(String::from),
        ],
        prop_oneof![
            Just(RuleType::Custom),
            Just(RuleType::Dtype),
            Just(RuleType::PrimaryKey),
            Just(RuleType::ForeignKey),
        ],
        prop_oneof![
            Just("true".to_string()),
            Just("  ".to_string()),
            "[a-z]{1,5} > [0-9]{1,3}".prop_map(String::from),
        ],
        severity_strategy(),
    )
        .prop_map(|(column, rule_type, expression, severity)| {
            Rule::new(column, expression, severity, "generated").with_rule_type(rule_type)
        })
}

proptest! {
    #[test]
    fn prop_filtering_is_idempotent(rules in prop::collection::vec(rule_strategy(), 0..20)) {
        let once = filter_rules(rules);
        let twice = filter_rules(once.clone());
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.iter().all(|r| r.column != TABLE_SENTINEL));
        prop_assert!(once.iter().all(|r| !r.rule_type.is_key()));
    }

    #[test]
    fn prop_string_columns_have_no_dtype_rule(
        types in prop::collection::vec(
            prop_oneof![
                Just("string"),
                Just("varchar(20)"),
                Just("char(3)"),
                Just("STRING"),
                Just("int"),
                Just("date"),
            ],
            1..10,
        )
    ) {
        let columns: Vec<ColumnSpec> = types
            .iter()
            .enumerate()
            .map(|(i, t)| ColumnSpec::new(format!("c{i}"), *t))
            .collect();
        let schema = TableSchema::new("db", "t", columns.clone()).unwrap();
        let rules = synthesize_dtype_rules(&schema).unwrap();

        let typed = columns.iter().filter(|c| !c.is_free_text()).count();
        prop_assert_eq!(rules.len(), typed);
        for rule in &rules {
            let column = columns.iter().find(|c| c.name == rule.column).unwrap();
            prop_assert!(!column.is_free_text());
            prop_assert_eq!(&rule.severity, &Severity::Error);
        }
    }

    #[test]
    fn prop_int_dtype_rule(value in any::<i32>(), garbage in "[a-z]{1,10}") {
        let rule = dtype_rule(&ColumnSpec::new("n", "int"), "yyyy-MM-dd");
        let rules = RuleSet::compile(vec![rule]);
        let evaluator = RuleEvaluator::new(Arc::new(rules));

        let ok = evaluator.evaluate(Record::from_pairs([("n", Some(value.to_string()))]));
        prop_assert!(ok.is_valid());

        let null = evaluator.evaluate(Record::from_pairs([("n", None::<String>)]));
        prop_assert!(null.is_valid());

        let bad = evaluator.evaluate(Record::from_pairs([("n", Some(garbage))]));
        prop_assert!(!bad.is_valid());
    }

    #[test]
    fn prop_violations_are_aligned(
        thresholds in prop::collection::vec((0i64..100, severity_strategy()), 1..8),
        value in 0i64..100,
    ) {
        let rules: Vec<Rule> = thresholds
            .iter()
            .enumerate()
            .map(|(i, (t, severity))| {
                Rule::new("x", format!("x > {t}"), severity.clone(), format!("rule {i}"))
            })
            .collect();
        let evaluator = RuleEvaluator::new(Arc::new(RuleSet::compile(rules)));
        let evaluated = evaluator.evaluate(Record::from_pairs([("x", Some(value.to_string()))]));

        let expected: Vec<(String, Severity)> = thresholds
            .iter()
            .enumerate()
            .filter(|(_, (t, _))| value <= *t)
            .map(|(i, (_, s))| (format!("rule {i}"), s.clone()))
            .collect();
        prop_assert_eq!(evaluated.reasons().len(), evaluated.severities().len());
        let actual: Vec<(String, Severity)> = evaluated
            .reasons()
            .iter()
            .cloned()
            .zip(evaluated.severities().iter().cloned())
            .collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_reprocess_iff_no_error(severities in prop::collection::vec(severity_strategy(), 1..10)) {
        let mut evaluated = EvaluatedRecord::new(Record::new());
        for (i, severity) in severities.iter().enumerate() {
            evaluated.push_violation(format!("r{i}"), severity.clone());
        }
        let classification = classify(vec![evaluated]);
        prop_assert!(classification.valid.is_empty());

        let has_error = severities.iter().any(|s| s.as_str() == "ERROR");
        let expected = if has_error { Reprocess::No } else { Reprocess::Yes };
        prop_assert_eq!(classification.invalid[0].reprocess, expected);
    }

    #[test]
    fn prop_decimal_dtype_pass_implies_cast(
        (precision, scale) in (1u8..=38).prop_flat_map(|p| (Just(p), 0..=p.min(12))),
        text in decimal_text(),
    ) {
        assert_dtype_pass_casts(&format!("decimal({precision},{scale})"), "yyyy-MM-dd", &text)?;
    }

    #[test]
    fn prop_date_dtype_pass_implies_cast(
        pattern in prop_oneof![Just("dd/MM/yyyy"), Just("yyyyMMdd"), Just("MM-dd-yyyy")],
        text in prop_oneof![
            "[0-9]{1,2}/[0-9]{1,2}/[0-9]{4}",
            "[0-9]{8}",
            "[0-9]{2}-[0-9]{2}-[0-9]{4}",
            "2024-0[1-9]-[0-2][0-9]",
            ".{0,12}",
        ],
    ) {
        assert_dtype_pass_casts("date", pattern, &text)?;
    }

    #[test]
    fn prop_timestamp_dtype_pass_implies_cast(
        text in prop_oneof![
            "20[0-9]{2}-[01][0-9]-[0-3][0-9]",
            "20[0-9]{2}-[01][0-9]-[0-3][0-9][ T][0-2][0-9]:[0-5][0-9]:[0-5][0-9]",
            "20[0-9]{2}-[01][0-9]-[0-3][0-9] [0-2][0-9]:[0-5][0-9]:[0-5][0-9]\\.[0-9]{1,6}",
            ".{0,20}",
        ],
    ) {
        assert_dtype_pass_casts("timestamp", "yyyy-MM-dd", &text)?;
    }

    #[test]
    fn prop_boolean_dtype_pass_implies_cast(
        text in prop_oneof![
            prop::sample::select(vec!["true", "FALSE", " yes ", "n", "1", "0", "t", "F"])
                .prop_map(String::from),
            "[a-zA-Z0-9]{0,6}",
        ],
    ) {
        assert_dtype_pass_casts("boolean", "yyyy-MM-dd", &text)?;
    }
}

fn decimal_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[+-]?[0-9]{0,12}(\\.[0-9]{0,8})?",
        "[+-]?[0-9]{1,6}(\\.[0-9]{0,4})?[eE][+-]?[0-9]{1,3}",
        "[+-]?[0-9]{1,3}[eE]-?[0-9]{9,10}",
        prop::sample::select(vec![
            "1e-2147483648",
            "-1e-2147483648",
            "0e1000",
            "0.000e2147483647",
            "1e2147483647",
            "9.99999e-1",
        ])
        .prop_map(String::from),
        ".{0,10}",
    ]
}

/// Runs the synthesized dtype rule for a single `v` column against `text`;
/// when the record passes, casting it must succeed.
fn assert_dtype_pass_casts(
    declared: &str,
    date_pattern: &str,
    text: &str,
) -> std::result::Result<(), TestCaseError> {
    let schema = TableSchema::new("db", "t", vec![ColumnSpec::new("v", declared)]).unwrap();
    let rules = synthesize_dtype_rules_with_pattern(&schema, date_pattern).unwrap();
    prop_assert_eq!(rules.len(), 1);
    let evaluator = RuleEvaluator::new(Arc::new(RuleSet::compile(rules)));
    prop_assert_eq!(evaluator.rules().len(), 1);

    let record = Record::from_pairs([("v", Some(text))]);
    if evaluator.evaluate(record.clone()).is_valid() {
        let caster = SchemaCaster::new(&schema, date_pattern).unwrap();
        let cast = caster.cast(&record);
        prop_assert!(cast.is_ok(), "{} passed its {} rule but failed to cast: {:?}", text, declared, cast);
        prop_assert!(!cast.unwrap().values()[0].is_null());
    }
    Ok(())
}

#[test]
fn test_known_values_pass_and_cast() {
    for (declared, pattern, text) in [
        ("decimal(10,0)", "yyyy-MM-dd", "1e-2147483648"),
        ("decimal(10,2)", "yyyy-MM-dd", "0e1000"),
        ("decimal(5,2)", "yyyy-MM-dd", "-12.345"),
        ("date", "dd/MM/yyyy", "05/01/2024"),
        ("timestamp", "yyyy-MM-dd", "2024-01-05 10:30:00"),
        ("boolean", "yyyy-MM-dd", "yes"),
    ] {
        let schema = TableSchema::new("db", "t", vec![ColumnSpec::new("v", declared)]).unwrap();
        let rules = synthesize_dtype_rules_with_pattern(&schema, pattern).unwrap();
        let evaluator = RuleEvaluator::new(Arc::new(RuleSet::compile(rules)));
        let record = Record::from_pairs([("v", Some(text))]);

        assert!(evaluator.evaluate(record.clone()).is_valid(), "{declared}: {text}");
        let caster = SchemaCaster::new(&schema, pattern).unwrap();
        assert!(caster.cast(&record).is_ok(), "{declared}: {text}");
    }
}
