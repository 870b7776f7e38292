//! Property-based tests for the invariants that should hold for *any* input,
//! not just the literal examples covered by `end_to_end.rs` and the
//! colocated unit tests.

use proptest::prelude::*;

use filterql::schema::FieldSchemaBuilder;
use filterql::{DataType, FilterTree, RawValue, Value};

/// Builds a small, well-formed DSL string from a recursive strategy over a
/// fixed three-identifier alphabet, so every generated string is guaranteed
/// parseable.
fn dsl_expr() -> impl Strategy<Value = String> {
    let leaf = prop_oneof!["a", "b", "c"].prop_map(String::from);
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(|e| format!("!{e}")),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| format!("{l} & {r}")),
            (inner.clone(), inner).prop_map(|(l, r)| format!("{l} | {r}")),
        ]
    })
}

proptest! {
    /// Parsing a rendered tree and re-rendering it is a no-op: `render()` is
    /// already in canonical form, so reparsing never changes it further.
    #[test]
    fn dsl_render_is_idempotent(expr in dsl_expr()) {
        let tree = FilterTree::parse(&expr, 4096).unwrap();
        let once = tree.render();
        let reparsed = FilterTree::parse(&once, 4096).unwrap();
        let twice = reparsed.render();
        prop_assert_eq!(once, twice);
    }

    /// Any DSL string this strategy produces parses without error — the
    /// generator never emits unbalanced parens or bare operators.
    #[test]
    fn generated_dsl_always_parses(expr in dsl_expr()) {
        prop_assert!(FilterTree::parse(&expr, 4096).is_ok());
    }
}

/// A field schema's slot count always equals the number of scalar fields
/// plus the number of collections registered, regardless of how many (or in
/// what order) were added, and every added dto path is independently
/// resolvable back to its own slot.
fn distinct_field_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[a-z]{1,6}", 1..12).prop_map(|set| set.into_iter().collect())
}

proptest! {
    #[test]
    fn schema_slot_count_matches_registered_fields(fields in distinct_field_names(), collections in distinct_field_names()) {
        let mut builder = FieldSchemaBuilder::new("Entity");
        for field in &fields {
            builder.add_field(field, field, false);
        }
        // Collections must not collide with scalar field names, or the
        // builder's last-write-wins dedup would mask one of them.
        let collections: Vec<&String> = collections.iter().filter(|c| !fields.contains(*c)).collect();
        for collection in &collections {
            builder.add_collection(collection);
        }
        let schema = builder.build();

        prop_assert_eq!(schema.field_count(), fields.len());
        prop_assert_eq!(schema.collection_count(), collections.len());
        prop_assert_eq!(schema.total_slots(), fields.len() + collections.len());

        for field in &fields {
            let idx = schema.index_of_dto(field);
            prop_assert!(idx.is_some());
            prop_assert!(!idx.unwrap().is_collection);
        }
        for collection in &collections {
            let idx = schema.index_of_dto(collection);
            prop_assert!(idx.is_some());
            prop_assert!(idx.unwrap().is_collection);
        }
    }
}

/// Coercing the same raw string to the same declared type twice always
/// produces the same coerced value — no hidden source of nondeterminism
/// (clock reads, random tie-breaking) in the coercion path.
proptest! {
    #[test]
    fn coercion_is_deterministic(n in -1_000_000i64..1_000_000i64) {
        use filterql::coerce::{coerce, CoercionPolicy};
        use filterql::Op;

        let raw = RawValue::String(n.to_string());
        let policy = CoercionPolicy::default();
        let first = coerce(DataType::Int64, &raw, Op::Eq, &policy, "n").unwrap();
        let second = coerce(DataType::Int64, &raw, Op::Eq, &policy, "n").unwrap();
        prop_assert_eq!(first, Value::Int64(n));
        prop_assert_eq!(second, Value::Int64(n));
    }
}
