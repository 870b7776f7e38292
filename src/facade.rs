//! # Facade (C10, spec.md §4.10)
//!
//! The single entry point a caller reaches for: build a `FilterQuery` for a
//! property-reference enum via `FilterQueryFactory`, hand it a
//! `FilterRequest`, and walk it through C3 → C4 → C8 → C9 via
//! `to_executor`/`QueryExecutor::execute_with`. `RequestState` is tracked as
//! a plain enum rather than encoded in the type, consistent with this
//! crate's preference for explicit state over typestate generics.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{BackendRoot, MetamodelSnapshot, PropertyReference};
use crate::coerce::CoercionPolicy;
use crate::condition::{BoxedPredicate, FilterContext, PredicateBackend, QueryExecutionParams};
use crate::dsl::FilterTree;
use crate::error::Result as FqlResult;
use crate::exec::{ComputedFieldEvaluator, ExecutionStrategy, MultiQueryFetchStrategy};
use crate::plan::{ComputedFieldSpec, ExecutionPlan, ExecutionPlanner};
use crate::projection::{parse_projection, Pagination};
use crate::registry::OperatorRegistry;
use crate::row::RowBuffer;
use crate::value::RawValue;

/// A `FilterRequest` filter entry: `{ref, op, value}` (spec.md §3), with
/// `ref` already typed as the caller's property-reference enum rather than a
/// wire string.
#[derive(Debug, Clone)]
pub struct FilterDefinition<P: PropertyReference> {
    pub property: P,
    pub op: String,
    pub value: Option<RawValue>,
}

impl<P: PropertyReference> FilterDefinition<P> {
    pub fn new(property: P, op: impl Into<String>, value: Option<RawValue>) -> Self {
        Self {
            property,
            op: op.into(),
            value,
        }
    }
}

/// The full request shape of spec.md §3: a named filter map, a
/// `combineWith` DSL string (or `AND`/`OR`/`NOT` shorthand), a projection
/// spec list, and top-level pagination.
#[derive(Debug, Clone, Default)]
pub struct FilterRequest<P: PropertyReference> {
    pub filters: HashMap<String, FilterDefinition<P>>,
    pub combine_with: String,
    pub projection: Vec<String>,
    pub pagination: Pagination,
}

impl<P: PropertyReference> FilterRequest<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, key: impl Into<String>, def: FilterDefinition<P>) -> Self {
        self.filters.insert(key.into(), def);
        self
    }

    pub fn with_combine_with(mut self, dsl: impl Into<String>) -> Self {
        self.combine_with = dsl.into();
        self
    }

    pub fn with_projection(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.projection = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }
}

/// A `FilterRequest`'s position in the lifecycle spec.md §4.10 describes:
/// `Built → Parsed → Resolved → Executed → Completed`. Tracked explicitly on
/// `QueryExecutor` rather than encoded as a typestate, so callers can branch
/// on it (logging, metrics, retry) without generic parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Built,
    Parsed,
    Resolved,
    Executed,
    Completed,
}

/// Builds `FilterQuery`s for a given property-reference enum. One factory
/// per entity type is typical; it is cheap to construct and holds only the
/// shared registry and coercion policy.
pub struct FilterQueryFactory;

impl FilterQueryFactory {
    pub fn of<P: PropertyReference>(
        registry: Arc<OperatorRegistry>,
        policy: CoercionPolicy,
        max_dsl_length: usize,
    ) -> FilterQuery<P> {
        FilterQuery {
            context: FilterContext::new(Arc::clone(&registry), policy),
            max_dsl_length,
        }
    }
}

/// The bound C3 → C4 pipeline for one property-reference enum `P`.
/// Stateless across requests; reused for every `FilterRequest<P>`.
pub struct FilterQuery<P: PropertyReference> {
    context: FilterContext<P>,
    max_dsl_length: usize,
}

impl<P: PropertyReference> FilterQuery<P> {
    pub fn max_dsl_length(&self) -> usize {
        self.max_dsl_length
    }

    fn expanded_dsl(&self, request: &FilterRequest<P>) -> String {
        let keys: Vec<String> = request.filters.keys().cloned().collect();
        FilterTree::expand_shorthand(&request.combine_with, &keys)
    }

    fn definitions(&self, request: &FilterRequest<P>) -> HashMap<String, (P, String)> {
        request
            .filters
            .iter()
            .map(|(key, def)| (key.clone(), (def.property, def.op.clone())))
            .collect()
    }

    fn arguments(&self, request: &FilterRequest<P>) -> HashMap<String, RawValue> {
        request
            .filters
            .iter()
            .filter_map(|(key, def)| def.value.clone().map(|v| (key.clone(), v)))
            .collect()
    }

    /// Runs `Built → Parsed → Resolved`: parses `combineWith`, binds
    /// argument values from the request's filters, and resolves the
    /// resulting condition tree against `backend`.
    pub fn to_resolver<B: PredicateBackend>(&self, request: &FilterRequest<P>, backend: &B) -> FqlResult<BoxedPredicate> {
        let dsl = self.expanded_dsl(request);
        let tree = FilterTree::parse(&dsl, self.max_dsl_length)?;
        let definitions = self.definitions(request);
        let condition = tree.generate(&definitions, &self.context)?;

        let mut params = QueryExecutionParams::new();
        params.arguments = self.arguments(request);

        let resolved = self.context.to_resolver(&condition, &params, backend)?;
        Ok(resolved.predicate)
    }

    /// Runs `Built → Parsed → Resolved` plus C8 plan construction, returning
    /// a `QueryExecutor` ready for `execute_with`.
    pub fn to_executor<B: PredicateBackend>(
        &self,
        request: &FilterRequest<P>,
        backend: &B,
        root: &dyn BackendRoot,
        metamodel: &dyn MetamodelSnapshot,
        computed_fields: &[ComputedFieldSpec],
    ) -> FqlResult<QueryExecutor> {
        let predicate = self.to_resolver(request, backend)?;
        let parsed_projection = parse_projection(&request.projection)?;
        let plan = ExecutionPlanner::build(root, metamodel, &parsed_projection, computed_fields)?;
        Ok(QueryExecutor {
            plan,
            predicate,
            pagination: request.pagination.clone(),
            state: RequestState::Resolved,
        })
    }
}

/// A `Resolved` request, ready to run C9 against a concrete
/// `ExecutionStrategy`. Owned per-request; not reused across requests since
/// it carries a resolved predicate and plan bound to one request's values.
pub struct QueryExecutor {
    plan: ExecutionPlan,
    predicate: BoxedPredicate,
    pagination: Pagination,
    state: RequestState,
}

impl QueryExecutor {
    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Runs C9 (`Resolved → Executed → Completed`) against `strategy`,
    /// optionally evaluating computed fields via `evaluator`.
    pub fn execute_with<S: ExecutionStrategy>(
        &mut self,
        strategy: &S,
        evaluator: Option<&dyn ComputedFieldEvaluator>,
    ) -> FqlResult<Vec<RowBuffer>> {
        self.state = RequestState::Executed;
        let mut fetch = MultiQueryFetchStrategy::new(strategy);
        if let Some(eval) = evaluator {
            fetch = fetch.with_evaluator(eval);
        }
        let rows = fetch.execute(&self.plan, &self.predicate, &self.pagination)?;
        self.state = RequestState::Completed;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_support::Prop;
    use crate::backend::{FieldMetadata, PathResolutionMetadata, PathSegment};
    use crate::condition::{BoxedPredicate, Predicate};
    use crate::error::{FilterValidationError, ProjectionDefinitionError};
    use crate::op::Op;
    use crate::value::Value;
    use std::any::Any;

    #[derive(Debug)]
    struct DebugPred(String);
    impl Predicate for DebugPred {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct StringBackend;
    impl PredicateBackend for StringBackend {
        fn build_leaf(&self, property: &str, op: Op, value: Option<&Value>) -> Result<BoxedPredicate, FilterValidationError> {
            Ok(BoxedPredicate::new(DebugPred(format!("{property} {} {:?}", op.code(), value))))
        }
        fn and(&self, l: BoxedPredicate, r: BoxedPredicate) -> BoxedPredicate {
            let l = l.downcast_ref::<DebugPred>().unwrap().0.clone();
            let r = r.downcast_ref::<DebugPred>().unwrap().0.clone();
            BoxedPredicate::new(DebugPred(format!("({l} AND {r})")))
        }
        fn or(&self, l: BoxedPredicate, r: BoxedPredicate) -> BoxedPredicate {
            let l = l.downcast_ref::<DebugPred>().unwrap().0.clone();
            let r = r.downcast_ref::<DebugPred>().unwrap().0.clone();
            BoxedPredicate::new(DebugPred(format!("({l} OR {r})")))
        }
        fn not(&self, p: BoxedPredicate) -> BoxedPredicate {
            let p = p.downcast_ref::<DebugPred>().unwrap().0.clone();
            BoxedPredicate::new(DebugPred(format!("(NOT {p})")))
        }
    }

    struct FakeRoot;
    impl BackendRoot for FakeRoot {
        fn entity_type(&self) -> &str {
            "TestEntity"
        }
        fn resolve_path(&self, path: &str) -> Result<PathResolutionMetadata, ProjectionDefinitionError> {
            let segments = path
                .split('.')
                .map(|name| PathSegment {
                    name: name.to_string(),
                    is_collection: false,
                    target_type: "String".to_string(),
                })
                .collect();
            Ok(PathResolutionMetadata { all_segments: segments })
        }
    }

    struct FakeMetamodel;
    impl MetamodelSnapshot for FakeMetamodel {
        fn id_fields(&self, _entity: &str) -> Vec<String> {
            vec!["name".to_string()]
        }
        fn field_metadata(&self, _entity: &str, _field: &str) -> Option<FieldMetadata> {
            None
        }
    }

    fn factory() -> FilterQuery<Prop> {
        FilterQueryFactory::of(Arc::new(OperatorRegistry::new()), CoercionPolicy::default(), 512)
    }

    #[test]
    fn single_filter_resolves_to_a_leaf_predicate() {
        let query = factory();
        let request = FilterRequest::new()
            .with_filter("f1", FilterDefinition::new(Prop::Name, "EQ", Some(RawValue::String("Ann".into()))))
            .with_combine_with("f1");
        let predicate = query.to_resolver(&request, &StringBackend).unwrap();
        let repr = predicate.downcast_ref::<DebugPred>().unwrap().0.clone();
        assert!(repr.contains("EQ"));
    }

    #[test]
    fn and_shorthand_combines_every_filter() {
        let query = factory();
        let request = FilterRequest::new()
            .with_filter("f1", FilterDefinition::new(Prop::Name, "EQ", Some(RawValue::String("Ann".into()))))
            .with_filter("f2", FilterDefinition::new(Prop::Age, "GT", Some(RawValue::Number(18.0))))
            .with_combine_with("AND");
        let predicate = query.to_resolver(&request, &StringBackend).unwrap();
        let repr = predicate.downcast_ref::<DebugPred>().unwrap().0.clone();
        assert!(repr.contains("AND"));
    }

    #[test]
    fn to_executor_builds_a_plan_and_tracks_state() {
        let query = factory();
        let request = FilterRequest::new()
            .with_filter("f1", FilterDefinition::new(Prop::Name, "EQ", Some(RawValue::String("Ann".into()))))
            .with_combine_with("f1")
            .with_projection(["name"]);
        let executor = query
            .to_executor(&request, &StringBackend, &FakeRoot, &FakeMetamodel, &[])
            .unwrap();
        assert_eq!(executor.state(), RequestState::Resolved);
        assert!(executor.plan().collection_plans.is_empty());
    }
}
