//! # Multi-Query Fetch Strategy (C9, spec.md §4.9)
//!
//! Executes an [`ExecutionPlan`] against an [`ExecutionStrategy`] backend:
//! one root query, one child query per collection path (depth-ascending),
//! computed-field evaluation, then bottom-up assembly of [`RowBuffer`]
//! trees. Suspension points are backend I/O inside `ExecutionStrategy`
//! methods only; queries within a request are issued serially to preserve
//! the ID-dependency chain (spec.md §5).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::condition::BoxedPredicate;
use crate::error::FilterQlError;
use crate::plan::{CollectionPlan, ComputedField, ExecutionPlan, Reducer};
use crate::projection::Pagination;
use crate::row::RowBuffer;
use crate::value::Value;

/// The three query shapes C9's algorithm issues against a backend. A real
/// relational backend translates these into SQL/criteria-API calls; the
/// in-memory reference backend (`backend::memory`, test-only) implements
/// this directly over `Vec<HashMap<String, Value>>` tables.
pub trait ExecutionStrategy: Send + Sync {
    /// Select `select_fields` (scalar entity paths plus root IDs) from
    /// `root_entity`, filtered by `predicate`, honoring top-level pagination.
    fn fetch_root(
        &self,
        root_entity: &str,
        predicate: &BoxedPredicate,
        select_fields: &[String],
        pagination: &Pagination,
    ) -> Result<Vec<HashMap<String, Value>>, FilterQlError>;

    /// Select every scalar path of `collection.child_schema` plus child IDs
    /// plus `collection.parent_reference_field`, restricted to rows whose
    /// parent reference is in `parent_ids`.
    fn fetch_children(
        &self,
        collection: &CollectionPlan,
        parent_ids: &[Value],
    ) -> Result<Vec<HashMap<String, Value>>, FilterQlError>;

    /// A grouped aggregate sub-query over `path`, keyed by parent ID
    /// (canonical string form — see [`Value`]'s `Display`).
    fn fetch_aggregate(
        &self,
        parent_ids: &[Value],
        path: &str,
        reducer: Reducer,
    ) -> Result<HashMap<String, Value>, FilterQlError>;
}

/// Resolves one computed field's final value from its ordered dependency
/// values (scalar reads and/or aggregate results, in `ComputedField`
/// dependency order). Stands in for the "provider resolved through an
/// `InstanceResolver`" of spec.md §4.9 step 3 — this crate has no
/// annotation-driven code generation, so the provider is supplied directly
/// rather than looked up by type+name/static-method chain.
pub trait ComputedFieldEvaluator: Send + Sync {
    fn evaluate(&self, dto_field: &str, dependency_values: &[Value]) -> Result<Value, FilterQlError>;
}

/// Implements the 5-step algorithm of spec.md §4.9 against an
/// [`ExecutionStrategy`].
pub struct MultiQueryFetchStrategy<'a, S: ExecutionStrategy> {
    backend: &'a S,
    evaluator: Option<&'a dyn ComputedFieldEvaluator>,
}

impl<'a, S: ExecutionStrategy> MultiQueryFetchStrategy<'a, S> {
    pub fn new(backend: &'a S) -> Self {
        Self { backend, evaluator: None }
    }

    pub fn with_evaluator(mut self, evaluator: &'a dyn ComputedFieldEvaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    #[tracing::instrument(level = "debug", skip_all, fields(entity = %plan.root_entity))]
    pub fn execute(
        &self,
        plan: &ExecutionPlan,
        predicate: &BoxedPredicate,
        top_pagination: &Pagination,
    ) -> Result<Vec<RowBuffer>, FilterQlError> {
        // Step 1: root query.
        let select_fields: Vec<String> = (0..plan.root_schema.field_count())
            .filter_map(|slot| plan.root_schema.entity_field(slot).map(str::to_string))
            .collect();
        let root_tuples = self
            .backend
            .fetch_root(&plan.root_entity, predicate, &select_fields, top_pagination)?;

        let root_id_field = plan.root_id_fields.first().map(String::as_str);
        let mut root_ids: Vec<Value> = Vec::with_capacity(root_tuples.len());
        let mut rows: HashMap<(String, String), RowBuffer> = HashMap::new();

        for tuple in &root_tuples {
            let mut row = RowBuffer::new(Arc::clone(&plan.root_schema));
            for slot in 0..plan.root_schema.field_count() {
                if let Some(entity_field) = plan.root_schema.entity_field(slot) {
                    if let Some(v) = tuple.get(entity_field) {
                        row.set(slot, v.clone());
                    }
                }
            }
            let id = root_id_field.and_then(|f| tuple.get(f)).cloned().unwrap_or(Value::Null);
            let id_key = id.to_string();
            root_ids.push(id);
            rows.insert((String::new(), id_key), row);
        }
        let root_order: Vec<String> = root_ids.iter().map(Value::to_string).collect();

        // Step 2: depth-ascending collection fetch.
        let mut ids_by_path: HashMap<String, Vec<Value>> = HashMap::new();
        ids_by_path.insert(String::new(), root_ids.clone());
        let mut order_within_parent: HashMap<(String, String), Vec<String>> = HashMap::new();
        let mut child_paths_of: HashMap<String, Vec<String>> = HashMap::new();
        let mut plans_by_path: HashMap<String, &CollectionPlan> = HashMap::new();

        for cp in &plan.collection_plans {
            plans_by_path.insert(cp.collection_path.clone(), cp);
            child_paths_of
                .entry(parent_path_of(&cp.collection_path))
                .or_default()
                .push(cp.collection_path.clone());
        }

        for cp in &plan.collection_plans {
            let parent_path = parent_path_of(&cp.collection_path);
            let parent_ids = ids_by_path.get(&parent_path).cloned().unwrap_or_default();
            if parent_ids.is_empty() {
                ids_by_path.insert(cp.collection_path.clone(), Vec::new());
                continue;
            }

            let child_tuples = self.backend.fetch_children(cp, &parent_ids)?;
            let mut buckets: HashMap<String, Vec<String>> = HashMap::new();
            let mut flat_ids = Vec::with_capacity(child_tuples.len());

            for tuple in &child_tuples {
                let mut child_row = RowBuffer::new(Arc::clone(&cp.child_schema));
                for slot in 0..cp.child_schema.field_count() {
                    if let Some(entity_field) = cp.child_schema.entity_field(slot) {
                        if let Some(v) = tuple.get(entity_field) {
                            child_row.set(slot, v.clone());
                        }
                    }
                }
                let child_id = cp
                    .element_id_fields
                    .first()
                    .and_then(|f| tuple.get(f))
                    .cloned()
                    .unwrap_or(Value::Null);
                let child_id_key = child_id.to_string();
                let parent_ref = tuple
                    .get(&cp.parent_reference_field)
                    .cloned()
                    .unwrap_or(Value::Null)
                    .to_string();

                rows.insert((cp.collection_path.clone(), child_id_key.clone()), child_row);
                buckets.entry(parent_ref).or_default().push(child_id_key);
                flat_ids.push(child_id);
            }

            for (parent_ref, ids) in buckets {
                let mut ordered = ids;
                ordered.sort_by(|a, b| {
                    compare_by_sort_keys(&rows[&(cp.collection_path.clone(), a.clone())], &rows[&(cp.collection_path.clone(), b.clone())], &cp.sort_field_indices, &cp.sort_descending)
                });
                if let Some(offset) = cp.offset_per_parent {
                    if offset >= ordered.len() {
                        ordered.clear();
                    } else {
                        ordered.drain(0..offset);
                    }
                }
                if let Some(limit) = cp.limit_per_parent {
                    ordered.truncate(limit);
                }
                order_within_parent.insert((cp.collection_path.clone(), parent_ref), ordered);
            }

            ids_by_path.insert(cp.collection_path.clone(), flat_ids);
        }

        // Step 3: computed fields.
        for cf in &plan.computed_fields {
            self.evaluate_computed_field(cf, &root_ids, &root_order, &mut rows)?;
        }

        // Bottom-up assembly: attach each row's children before its parent
        // claims it, so a parent's collection slot is populated in one pass.
        let mut assembled = Vec::with_capacity(root_order.len());
        for id in &root_order {
            assembled.push(build_tree(
                "",
                id,
                &mut rows,
                &order_within_parent,
                &child_paths_of,
                &plans_by_path,
            ));
        }

        Ok(assembled)
    }

    fn evaluate_computed_field(
        &self,
        cf: &ComputedField,
        root_ids: &[Value],
        root_order: &[String],
        rows: &mut HashMap<(String, String), RowBuffer>,
    ) -> Result<(), FilterQlError> {
        // Pre-fetch every aggregate dependency this field needs, keyed by
        // root ID, before evaluating per-row (one sub-query per dependency,
        // not per row).
        let mut aggregate_results: Vec<Option<HashMap<String, Value>>> = Vec::with_capacity(cf.reducers.len());
        for (i, reducer) in cf.reducers.iter().enumerate() {
            match reducer {
                Some(r) => {
                    let path = &cf.dependency_paths[i];
                    aggregate_results.push(Some(self.backend.fetch_aggregate(root_ids, path, *r)?));
                }
                None => aggregate_results.push(None),
            }
        }

        for id in root_order {
            let dependency_values: Vec<Value> = cf
                .dependency_slots
                .iter()
                .enumerate()
                .map(|(i, &slot)| {
                    if slot >= 0 {
                        rows.get(&(String::new(), id.clone()))
                            .map(|row| row.scalar(slot as usize).clone())
                            .unwrap_or(Value::Null)
                    } else {
                        aggregate_results[i]
                            .as_ref()
                            .and_then(|m| m.get(id))
                            .cloned()
                            .unwrap_or(Value::Null)
                    }
                })
                .collect();

            let value = match self.evaluator {
                Some(eval) => eval.evaluate(&cf.dto_field_name, &dependency_values)?,
                None => dependency_values.into_iter().next().unwrap_or(Value::Null),
            };

            if let Some(row) = rows.get_mut(&(String::new(), id.clone())) {
                row.set(cf.output_slot, value);
            }
        }
        Ok(())
    }
}

fn parent_path_of(collection_path: &str) -> String {
    collection_path
        .rsplit_once('.')
        .map(|(prefix, _)| prefix.to_string())
        .unwrap_or_default()
}

/// Stable comparison by `(sortFieldIndices, sortDescending)` (spec.md §4.9 step 2).
fn compare_by_sort_keys(a: &RowBuffer, b: &RowBuffer, indices: &[usize], descending: &[bool]) -> Ordering {
    for (&idx, &desc) in indices.iter().zip(descending.iter()) {
        let ordering = compare_values(a.scalar(idx), b.scalar(idx));
        let ordering = if desc { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int64(x), Value::Int64(y)) => x.cmp(y),
        (Value::Float64(x), Value::Float64(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_tree(
    path: &str,
    id: &str,
    rows: &mut HashMap<(String, String), RowBuffer>,
    order_within_parent: &HashMap<(String, String), Vec<String>>,
    child_paths_of: &HashMap<String, Vec<String>>,
    plans_by_path: &HashMap<String, &CollectionPlan>,
) -> RowBuffer {
    let mut row = rows
        .remove(&(path.to_string(), id.to_string()))
        .expect("row registered during fetch");

    if let Some(child_collection_paths) = child_paths_of.get(path) {
        for child_path in child_collection_paths {
            let cp = plans_by_path[child_path];
            let Some(slot) = row.schema().index_of_dto(&cp.dto_collection_name).map(|d| d.index) else {
                continue;
            };
            let child_ids = order_within_parent
                .get(&(child_path.clone(), id.to_string()))
                .cloned()
                .unwrap_or_default();
            let children = child_ids
                .iter()
                .map(|cid| build_tree(child_path, cid, rows, order_within_parent, child_paths_of, plans_by_path))
                .collect();
            row.set_children(slot, children);
        }
    }

    row
}
