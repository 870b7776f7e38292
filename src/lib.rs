//! # FilterQL
//!
//! A backend-agnostic dynamic-filtering and projection engine: a compact DSL
//! compiles down to a predicate a relational backend can evaluate, and a
//! compact projection syntax compiles down to an [`ExecutionPlan`] a backend
//! can execute as a bounded sequence of queries.
//!
//! ## Pipeline
//!
//! ```text
//! FilterRequest
//!     ↓
//! [DSL Parser]               → FilterTree (boolean combinator AST)
//!     ↓
//! [Condition Generation]     → Condition<P> (property-reference tree)
//!     ↓
//! [Predicate Resolution]     → BoxedPredicate (backend-native predicate)
//!     ↓
//! [Projection Parser]        → ParsedProjection (dotted field paths)
//!     ↓
//! [Execution Planner]        → ExecutionPlan (root query + child fetches)
//!     ↓
//! [Fetch Strategy]           → Vec<RowBuffer>
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use filterql::{FilterQueryFactory, FilterRequest, FilterDefinition, OperatorRegistry, CoercionPolicy};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(OperatorRegistry::new());
//! let factory = FilterQueryFactory::of::<BookProperty>(registry, CoercionPolicy::default(), 4096);
//!
//! let request = FilterRequest::new()
//!     .with_filter("f1", FilterDefinition::new(BookProperty::Title, "STARTS_WITH", Some("The".into())))
//!     .with_combine_with("f1")
//!     .with_projection(["title", "author.name"]);
//!
//! let mut executor = factory.to_executor(&request, &backend, &root, &metamodel, &[])?;
//! let rows = executor.execute_with(&backend, None)?;
//! ```

pub mod backend;
pub mod coerce;
pub mod condition;
pub mod config;
pub mod dsl;
pub mod error;
pub mod exec;
pub mod facade;
pub mod op;
pub mod plan;
pub mod projection;
pub mod registry;
pub mod row;
pub mod schema;
pub mod telemetry;
pub mod value;

pub use backend::{
    BackendRoot, FieldMetadata, InstanceResolver, MetamodelSnapshot, PathResolutionMetadata,
    PathSegment, PropertyReference,
};
pub use coerce::CoercionPolicy;
pub use condition::{
    BoxedPredicate, Condition, FilterContext, Predicate, PredicateBackend, PredicateResolver,
    QueryExecutionParams,
};
pub use config::Config;
pub use dsl::FilterTree;
pub use error::{FilterQlError, Result};
pub use exec::{ComputedFieldEvaluator, ExecutionStrategy, MultiQueryFetchStrategy};
pub use facade::{
    FilterDefinition, FilterQuery, FilterQueryFactory, FilterRequest, QueryExecutor, RequestState,
};
pub use op::Op;
pub use plan::{
    CollectionPlan, ComputedField, ComputedFieldSpec, ExecutionPlan, ExecutionPlanner, Reducer,
};
pub use projection::{parse_projection, Pagination, ParsedProjection};
pub use registry::{CustomFilterDefinition, CustomOperatorProvider, OperatorRegistry};
pub use row::RowBuffer;
pub use schema::FieldSchema;
pub use value::{DataType, RawValue, Value};
