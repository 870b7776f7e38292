//! Whole-pipeline integration tests: a `FilterRequest` goes in, rows come
//! out, through the in-memory reference backend.
#![cfg(feature = "memory-backend")]

mod support;

use std::sync::Arc;

use filterql::row::FieldAccess;
use filterql::{
    CoercionPolicy, FilterDefinition, FilterQueryFactory, FilterRequest, OperatorRegistry,
    RawValue, Value,
};

use support::{seeded_backend, BookProperty};

fn registry() -> Arc<OperatorRegistry> {
    Arc::new(OperatorRegistry::new())
}

fn title_of(row: &filterql::RowBuffer) -> String {
    match row.get("title").unwrap() {
        FieldAccess::Value(Value::String(s)) => s.clone(),
        other => panic!("expected a string title, got a different field kind: {:?}", matches!(other, FieldAccess::Value(_))),
    }
}

/// Precedence: `f1 & f2 | f3` groups as `(f1 & f2) | f3`, matching rows that
/// are either (available AND rated >4) or foundation-titled.
#[test]
fn dsl_precedence_binds_and_tighter_than_or() {
    let backend = seeded_backend();
    let query = FilterQueryFactory::of::<BookProperty>(registry(), CoercionPolicy::default(), 4096);

    let request = FilterRequest::new()
        .with_filter("f1", FilterDefinition::new(BookProperty::Status, "EQ", Some(RawValue::String("available".into()))))
        .with_filter("f2", FilterDefinition::new(BookProperty::Rating, "GT", Some(RawValue::Number(4.0))))
        .with_filter("f3", FilterDefinition::new(BookProperty::Title, "EQ", Some(RawValue::String("Hyperion".into()))))
        .with_combine_with("f1 & f2 | f3")
        .with_projection(["title"]);

    let mut executor = query
        .to_executor(&request, &backend, &backend.root(), backend.schema(), &[])
        .unwrap();
    let rows = executor.execute_with(&backend, None).unwrap();

    // Correct precedence ("&" binds tighter than "|") evaluates this as
    // `(f1 & f2) | f3`: Dune satisfies the conjunction, Hyperion satisfies
    // `f3` alone. Foundation satisfies neither. A wrong left-to-right
    // parse (`f1 & (f2 | f3)`) would drop Hyperion, since its `f1` is false.
    let titles: Vec<String> = rows.iter().map(title_of).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Dune".to_string()));
    assert!(titles.contains(&"Hyperion".to_string()));
    assert!(!titles.contains(&"Foundation".to_string()));
}

/// Negation distributes per De Morgan's law: `!(f1 & f2)` excludes only rows
/// satisfying both `f1` and `f2`.
#[test]
fn negation_over_conjunction_excludes_only_rows_matching_both() {
    let backend = seeded_backend();
    let query = FilterQueryFactory::of::<BookProperty>(registry(), CoercionPolicy::default(), 4096);

    let request = FilterRequest::new()
        .with_filter("f1", FilterDefinition::new(BookProperty::Status, "EQ", Some(RawValue::String("available".into()))))
        .with_filter("f2", FilterDefinition::new(BookProperty::Rating, "GT", Some(RawValue::Number(4.0))))
        .with_combine_with("!(f1 & f2)")
        .with_projection(["title"]);

    let mut executor = query
        .to_executor(&request, &backend, &backend.root(), backend.schema(), &[])
        .unwrap();
    let rows = executor.execute_with(&backend, None).unwrap();

    let titles: Vec<String> = rows.iter().map(title_of).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Hyperion".to_string()));
    assert!(titles.contains(&"Foundation".to_string()));
    assert!(!titles.contains(&"Dune".to_string()));
}

/// A collection path's inline `[size=..]` option bounds the reviews attached
/// to each parent independently.
#[test]
fn collection_inline_pagination_bounds_children_per_parent() {
    let backend = seeded_backend();
    let query = FilterQueryFactory::of::<BookProperty>(registry(), CoercionPolicy::default(), 4096);

    let request = FilterRequest::new()
        .with_filter("f1", FilterDefinition::new(BookProperty::Title, "EQ", Some(RawValue::String("Dune".into()))))
        .with_combine_with("f1")
        .with_projection(["title", "reviews[size=2].text"]);

    let mut executor = query
        .to_executor(&request, &backend, &backend.root(), backend.schema(), &[])
        .unwrap();
    let rows = executor.execute_with(&backend, None).unwrap();

    assert_eq!(rows.len(), 1);
    let slot = rows[0].schema().index_of_dto("reviews").unwrap().index;
    assert_eq!(rows[0].children(slot).len(), 2);
}

/// Compact multi-field projection (`"title,status"`) is equivalent to
/// passing the same leaves as separate projection entries.
#[test]
fn compact_multi_field_projection_matches_separate_entries() {
    use filterql::parse_projection;

    let compact = parse_projection(&["title,status".to_string()]).unwrap();
    let separate = parse_projection(&["title".to_string(), "status".to_string()]).unwrap();

    let mut compact_paths: Vec<String> = compact.fields.iter().map(|f| f.0.clone()).collect();
    let mut separate_paths: Vec<String> = separate.fields.iter().map(|f| f.0.clone()).collect();
    compact_paths.sort();
    separate_paths.sort();
    assert_eq!(compact_paths, separate_paths);
}

/// Two different pagination options for the same collection path conflict.
#[test]
fn conflicting_collection_options_are_rejected() {
    use filterql::parse_projection;
    use filterql::FilterQlError;

    let err = parse_projection(&["reviews[size=2].text".to_string(), "reviews[size=5].value".to_string()]).unwrap_err();
    let err: FilterQlError = err.into();
    assert!(matches!(err, FilterQlError::Projection(_)));
}

/// A custom operator (`STARTS_WITH`) composes with built-in operators
/// through the same `AND`/`OR` combinators.
#[test]
fn custom_operator_composes_with_builtin_operators() {
    use filterql::backend::memory::MemoryCustomProvider;

    let backend = seeded_backend();
    let registry = registry();
    registry
        .register(Arc::new(MemoryCustomProvider {
            codes: vec!["STARTS_WITH".to_string()],
        }))
        .unwrap();

    let query = FilterQueryFactory::of::<BookProperty>(Arc::clone(&registry), CoercionPolicy::default(), 4096);

    let request = FilterRequest::new()
        .with_filter("f1", FilterDefinition::new(BookProperty::Title, "STARTS_WITH", Some(RawValue::String("H".into()))))
        .with_filter("f2", FilterDefinition::new(BookProperty::Status, "EQ", Some(RawValue::String("checked_out".into()))))
        .with_combine_with("f1 & f2")
        .with_projection(["title"]);

    let mut executor = query
        .to_executor(&request, &backend, &backend.root(), backend.schema(), &[])
        .unwrap();
    let rows = executor.execute_with(&backend, None).unwrap();

    let titles: Vec<String> = rows.iter().map(title_of).collect();
    assert_eq!(titles, vec!["Hyperion".to_string()]);
}

/// An aggregate computed field (review count) is evaluated once per root
/// row, not once per child.
#[test]
fn aggregate_computed_field_counts_reviews_per_book() {
    use filterql::plan::ComputedDependency;
    use filterql::{ComputedFieldEvaluator, ComputedFieldSpec, Reducer};

    struct PassThroughCount;
    impl ComputedFieldEvaluator for PassThroughCount {
        fn evaluate(&self, _dto_field: &str, dependency_values: &[Value]) -> Result<Value, filterql::FilterQlError> {
            Ok(dependency_values.first().cloned().unwrap_or(Value::Null))
        }
    }

    let backend = seeded_backend();
    let query = FilterQueryFactory::of::<BookProperty>(registry(), CoercionPolicy::default(), 4096);

    let request = FilterRequest::new()
        .with_filter("f1", FilterDefinition::new(BookProperty::Title, "EQ", Some(RawValue::String("Dune".into()))))
        .with_combine_with("f1")
        .with_projection(["title"]);

    let specs = vec![ComputedFieldSpec {
        dto_field: "reviewCount".to_string(),
        dependencies: vec![ComputedDependency::Aggregate {
            path: "reviews".to_string(),
            reducer: Reducer::Count,
        }],
    }];

    let mut executor = query
        .to_executor(&request, &backend, &backend.root(), backend.schema(), &specs)
        .unwrap();
    let evaluator = PassThroughCount;
    let rows = executor.execute_with(&backend, Some(&evaluator)).unwrap();

    assert_eq!(rows.len(), 1);
    match rows[0].get("reviewCount").unwrap() {
        FieldAccess::Value(Value::Int64(3)) => {}
        other => panic!("expected 3 reviews counted, got field kind {:?}", matches!(other, FieldAccess::Value(_))),
    }
}
