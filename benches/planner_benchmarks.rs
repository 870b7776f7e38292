//! Benchmarks for the execution planner (C8) and the multi-query fetch
//! strategy (C9), the two components whose cost scales with projection and
//! result-set size rather than with DSL complexity. Fixtures are hand-built
//! `BackendRoot`/`MetamodelSnapshot`/`ExecutionStrategy` fakes, the same
//! shape `plan.rs`'s and `exec.rs`'s own unit tests use, so this file has no
//! dependency on the `memory-backend` feature.

use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use filterql::backend::{BackendRoot, FieldMetadata, MetamodelSnapshot, PathResolutionMetadata, PathSegment};
use filterql::condition::{BoxedPredicate, Predicate};
use filterql::error::{FilterQlError, ProjectionDefinitionError};
use filterql::plan::{CollectionPlan, ExecutionPlanner, Reducer};
use filterql::projection::{parse_projection, Pagination};
use filterql::{DataType, ExecutionStrategy, MultiQueryFetchStrategy, Value};

use std::any::Any;

/// A library with `n` independent to-many collections off the root entity
/// (`shelf_0.book`, `shelf_1.book`, ...), so projection/plan size grows
/// linearly with `n`.
struct FanOutRoot {
    collections: usize,
}

impl BackendRoot for FanOutRoot {
    fn entity_type(&self) -> &str {
        "Library"
    }

    fn resolve_path(&self, path: &str) -> Result<PathResolutionMetadata, ProjectionDefinitionError> {
        let segments = path
            .split('.')
            .map(|name| {
                let is_collection = name.starts_with("shelf_");
                let target_type = if is_collection { "Shelf".to_string() } else { "String".to_string() };
                PathSegment {
                    name: name.to_string(),
                    is_collection,
                    target_type,
                }
            })
            .collect();
        Ok(PathResolutionMetadata { all_segments: segments })
    }
}

struct FanOutMetamodel {
    collections: usize,
}

impl MetamodelSnapshot for FanOutMetamodel {
    fn id_fields(&self, entity: &str) -> Vec<String> {
        match entity {
            "Library" | "Shelf" => vec!["id".to_string()],
            _ => vec![],
        }
    }

    fn field_metadata(&self, entity: &str, field: &str) -> Option<FieldMetadata> {
        if entity == "Library" && field.starts_with("shelf_") {
            let _ = self.collections;
            return Some(FieldMetadata {
                declared_type: DataType::String,
                is_collection: true,
                related_type: Some("Shelf".to_string()),
                mapped_by: Some("libraryId".to_string()),
            });
        }
        None
    }
}

fn projection_specs(collections: usize) -> Vec<String> {
    let mut specs = vec!["name".to_string()];
    for i in 0..collections {
        specs.push(format!("shelf_{i}.label"));
    }
    specs
}

fn bench_planner_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("execution_planner_build");
    for &collections in &[1usize, 8, 32, 128] {
        let specs = projection_specs(collections);
        let projection = parse_projection(&specs).unwrap();
        let root = FanOutRoot { collections };
        let metamodel = FanOutMetamodel { collections };

        group.bench_with_input(BenchmarkId::from_parameter(collections), &collections, |b, _| {
            b.iter(|| ExecutionPlanner::build(&root, &metamodel, &projection, &[]).unwrap());
        });
    }
    group.finish();
}

#[derive(Debug)]
struct AlwaysTrue;
impl Predicate for AlwaysTrue {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Returns `rows` synthetic root tuples and no children, so the benchmark
/// isolates C9's per-row assembly cost from backend I/O latency.
struct FlatStrategy {
    rows: usize,
}

impl ExecutionStrategy for FlatStrategy {
    fn fetch_root(
        &self,
        _root_entity: &str,
        _predicate: &BoxedPredicate,
        _select_fields: &[String],
        _pagination: &Pagination,
    ) -> Result<Vec<HashMap<String, Value>>, FilterQlError> {
        Ok((0..self.rows)
            .map(|i| {
                HashMap::from([
                    ("id".to_string(), Value::Int64(i as i64)),
                    ("name".to_string(), Value::String(format!("Library {i}"))),
                ])
            })
            .collect())
    }

    fn fetch_children(&self, _collection: &CollectionPlan, _parent_ids: &[Value]) -> Result<Vec<HashMap<String, Value>>, FilterQlError> {
        Ok(Vec::new())
    }

    fn fetch_aggregate(&self, parent_ids: &[Value], _path: &str, _reducer: Reducer) -> Result<HashMap<String, Value>, FilterQlError> {
        Ok(parent_ids.iter().map(|id| (id.to_string(), Value::Int64(0))).collect())
    }
}

fn bench_fetch_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_query_fetch_execute");
    let projection = parse_projection(&["name".to_string()]).unwrap();

    for &rows in &[10usize, 100, 1_000, 10_000] {
        let root = FanOutRoot { collections: 0 };
        let metamodel = FanOutMetamodel { collections: 0 };
        let plan = ExecutionPlanner::build(&root, &metamodel, &projection, &[]).unwrap();
        let strategy = FlatStrategy { rows };
        let fetcher = MultiQueryFetchStrategy::new(&strategy);
        let predicate = BoxedPredicate::new(AlwaysTrue);

        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| fetcher.execute(&plan, &predicate, &Pagination::default()).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_planner_build, bench_fetch_execute);
criterion_main!(benches);
