//! In-memory reference backend.
//!
//! Not a production relational adapter: a minimal, dependency-free store
//! used by this crate's own tests, doctests, and the demo CLI to exercise
//! C1–C10 end-to-end without a real database. Gated so it never ships in a
//! library build unless a caller opts in via the `memory-backend` feature.

use std::collections::HashMap;
use std::sync::RwLock;

use regex::Regex;

use crate::backend::{BackendRoot, FieldMetadata, MetamodelSnapshot, PathResolutionMetadata, PathSegment};
use crate::condition::{BoxedPredicate, Predicate, PredicateBackend};
use crate::error::{FilterQlError, FilterValidationError, ProjectionDefinitionError};
use crate::exec::ExecutionStrategy;
use crate::op::Op;
use crate::plan::{CollectionPlan, Reducer};
use crate::projection::Pagination;
use crate::value::{DataType, Value};

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;

/// A single stored entity instance: field name to coerced value.
pub type Row = HashMap<String, Value>;

/// Describes one entity type's fields for path resolution and the planner's
/// metamodel queries (spec.md §6).
#[derive(Debug, Default, Clone)]
pub struct MemorySchema {
    entities: HashMap<String, HashMap<String, FieldMetadata>>,
    id_fields: HashMap<String, Vec<String>>,
}

impl MemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entity type and its identifier field(s).
    pub fn entity(mut self, name: &str, id_fields: &[&str]) -> Self {
        self.id_fields.insert(name.to_string(), id_fields.iter().map(|s| s.to_string()).collect());
        self.entities.entry(name.to_string()).or_default();
        self
    }

    /// A scalar field on `entity`.
    pub fn scalar_field(mut self, entity: &str, field: &str, declared_type: DataType) -> Self {
        self.entities.entry(entity.to_string()).or_default().insert(
            field.to_string(),
            FieldMetadata {
                declared_type,
                is_collection: false,
                related_type: None,
                mapped_by: None,
            },
        );
        self
    }

    /// A to-one relation field on `entity`, navigating into `related_type`.
    pub fn relation_field(mut self, entity: &str, field: &str, related_type: &str) -> Self {
        self.entities.entry(entity.to_string()).or_default().insert(
            field.to_string(),
            FieldMetadata {
                declared_type: DataType::String,
                is_collection: false,
                related_type: Some(related_type.to_string()),
                mapped_by: None,
            },
        );
        self
    }

    /// A to-many collection field on `entity`. `mapped_by` names the child
    /// entity's foreign-key field, if known; `None` defers to the planner's
    /// fallback tiers (spec.md §4.8 step 6).
    pub fn collection_field(mut self, entity: &str, field: &str, related_type: &str, mapped_by: Option<&str>) -> Self {
        self.entities.entry(entity.to_string()).or_default().insert(
            field.to_string(),
            FieldMetadata {
                declared_type: DataType::String,
                is_collection: true,
                related_type: Some(related_type.to_string()),
                mapped_by: mapped_by.map(str::to_string),
            },
        );
        self
    }
}

impl MetamodelSnapshot for MemorySchema {
    fn id_fields(&self, entity: &str) -> Vec<String> {
        self.id_fields.get(entity).cloned().unwrap_or_default()
    }

    fn field_metadata(&self, entity: &str, field: &str) -> Option<FieldMetadata> {
        self.entities.get(entity)?.get(field).cloned()
    }
}

/// Resolves dotted projection paths against a `MemorySchema`, starting from
/// a fixed root entity (spec.md §6 `BackendRoot`).
pub struct MemoryRoot<'a> {
    pub entity: String,
    pub schema: &'a MemorySchema,
}

impl<'a> BackendRoot for MemoryRoot<'a> {
    fn entity_type(&self) -> &str {
        &self.entity
    }

    fn resolve_path(&self, path: &str) -> Result<PathResolutionMetadata, ProjectionDefinitionError> {
        let mut current_entity = self.entity.clone();
        let mut segments = Vec::new();
        for name in path.split('.') {
            let meta = self
                .schema
                .field_metadata(&current_entity, name)
                .ok_or_else(|| ProjectionDefinitionError::UnknownPath { path: path.to_string() })?;
            let target_type = meta.related_type.clone().unwrap_or_else(|| meta.declared_type.to_string());
            segments.push(PathSegment {
                name: name.to_string(),
                is_collection: meta.is_collection,
                target_type: target_type.clone(),
            });
            current_entity = target_type;
        }
        Ok(PathResolutionMetadata { all_segments: segments })
    }
}

/// A backend-agnostic predicate AST the memory backend both builds (via
/// `PredicateBackend`) and evaluates (via `matches`) directly, since it has
/// no query planner of its own to translate into.
#[derive(Debug, Clone)]
enum MemoryPredicate {
    True,
    Leaf {
        property: String,
        op: Op,
        value: Option<Value>,
    },
    Custom {
        property: String,
        code: String,
        value: Option<Value>,
    },
    And(Box<MemoryPredicate>, Box<MemoryPredicate>),
    Or(Box<MemoryPredicate>, Box<MemoryPredicate>),
    Not(Box<MemoryPredicate>),
}

impl fmt::Display for MemoryPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Predicate for MemoryPredicate {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn unwrap_memory(predicate: BoxedPredicate) -> MemoryPredicate {
    predicate
        .downcast_ref::<MemoryPredicate>()
        .cloned()
        .expect("memory backend only composes its own predicates")
}

impl MemoryPredicate {
    fn matches(&self, row: &Row) -> bool {
        match self {
            MemoryPredicate::True => true,
            MemoryPredicate::Leaf { property, op, value } => eval_leaf(row.get(property), *op, value.as_ref()),
            MemoryPredicate::Custom { property, code, value } => eval_custom(row.get(property), code, value.as_ref()),
            MemoryPredicate::And(l, r) => l.matches(row) && r.matches(row),
            MemoryPredicate::Or(l, r) => l.matches(row) || r.matches(row),
            MemoryPredicate::Not(inner) => !inner.matches(row),
        }
    }
}

fn eval_custom(actual: Option<&Value>, code: &str, expected: Option<&Value>) -> bool {
    match code {
        "STARTS_WITH" => match (actual, expected) {
            (Some(Value::String(a)), Some(Value::String(p))) => a.starts_with(p.as_str()),
            _ => false,
        },
        "ENDS_WITH" => match (actual, expected) {
            (Some(Value::String(a)), Some(Value::String(p))) => a.ends_with(p.as_str()),
            _ => false,
        },
        _ => false,
    }
}

fn eval_leaf(actual: Option<&Value>, op: Op, expected: Option<&Value>) -> bool {
    let actual = actual.unwrap_or(&Value::Null);
    match op {
        Op::IsNull => actual.is_null(),
        Op::NotNull => !actual.is_null(),
        Op::Eq => Some(actual) == expected,
        Op::Ne => Some(actual) != expected,
        Op::Gt => compare(actual, expected) == Some(Ordering::Greater),
        Op::Gte => matches!(compare(actual, expected), Some(Ordering::Greater | Ordering::Equal)),
        Op::Lt => compare(actual, expected) == Some(Ordering::Less),
        Op::Lte => matches!(compare(actual, expected), Some(Ordering::Less | Ordering::Equal)),
        Op::In => expected.and_then(Value::as_list).is_some_and(|list| list.contains(actual)),
        Op::NotIn => !expected.and_then(Value::as_list).is_some_and(|list| list.contains(actual)),
        Op::Range => in_range(actual, expected),
        Op::NotRange => !in_range(actual, expected),
        Op::Matches => matches_pattern(actual, expected, false),
        Op::NotMatches => matches_pattern(actual, expected, true),
        Op::Custom => false,
    }
}

fn compare(a: &Value, b: Option<&Value>) -> Option<Ordering> {
    let b = b?;
    match (a, b) {
        (Value::Int64(x), Value::Int64(y)) => Some(x.cmp(y)),
        (Value::Float64(x), Value::Float64(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn in_range(actual: &Value, expected: Option<&Value>) -> bool {
    let Some(list) = expected.and_then(Value::as_list) else {
        return false;
    };
    let (Some(lo), Some(hi)) = (list.first(), list.get(1)) else {
        return false;
    };
    matches!(compare(actual, Some(lo)), Some(Ordering::Greater | Ordering::Equal))
        && matches!(compare(actual, Some(hi)), Some(Ordering::Less | Ordering::Equal))
}

/// Translates a SQL-style `%`/`_` wildcard pattern into an anchored regex.
fn matches_pattern(actual: &Value, expected: Option<&Value>, negate: bool) -> bool {
    let (Value::String(text), Some(Value::String(pattern))) = (actual, expected) else {
        return negate;
    };
    let mut regex_src = String::from("(?s)^");
    for ch in pattern.chars() {
        match ch {
            '%' => regex_src.push_str(".*"),
            '_' => regex_src.push('.'),
            c => regex_src.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex_src.push('$');
    let is_match = Regex::new(&regex_src).is_ok_and(|re| re.is_match(text));
    is_match != negate
}

/// The in-memory store itself: one `Vec<Row>` table per entity type.
pub struct MemoryBackend {
    schema: MemorySchema,
    root_entity: String,
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryBackend {
    pub fn new(schema: MemorySchema, root_entity: impl Into<String>) -> Self {
        Self {
            schema,
            root_entity: root_entity.into(),
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> MemoryRoot<'_> {
        MemoryRoot {
            entity: self.root_entity.clone(),
            schema: &self.schema,
        }
    }

    pub fn schema(&self) -> &MemorySchema {
        &self.schema
    }

    /// Insert one row into `entity`'s table.
    pub fn insert(&self, entity: &str, row: Row) {
        self.tables.write().expect("memory backend lock poisoned").entry(entity.to_string()).or_default().push(row);
    }
}

impl PredicateBackend for MemoryBackend {
    fn build_leaf(&self, property: &str, op: Op, value: Option<&Value>) -> Result<BoxedPredicate, FilterValidationError> {
        Ok(BoxedPredicate::new(MemoryPredicate::Leaf {
            property: property.to_string(),
            op,
            value: value.cloned(),
        }))
    }

    fn and(&self, left: BoxedPredicate, right: BoxedPredicate) -> BoxedPredicate {
        BoxedPredicate::new(MemoryPredicate::And(Box::new(unwrap_memory(left)), Box::new(unwrap_memory(right))))
    }

    fn or(&self, left: BoxedPredicate, right: BoxedPredicate) -> BoxedPredicate {
        BoxedPredicate::new(MemoryPredicate::Or(Box::new(unwrap_memory(left)), Box::new(unwrap_memory(right))))
    }

    fn not(&self, predicate: BoxedPredicate) -> BoxedPredicate {
        BoxedPredicate::new(MemoryPredicate::Not(Box::new(unwrap_memory(predicate))))
    }
}

/// A `CustomOperatorProvider` that builds `MemoryPredicate::Custom` nodes,
/// so custom operators compose with `and`/`or`/`not` the same as built-ins.
pub struct MemoryCustomProvider {
    pub codes: Vec<String>,
}

impl crate::registry::CustomOperatorProvider for MemoryCustomProvider {
    fn supported_operators(&self) -> std::collections::HashSet<String> {
        self.codes.iter().cloned().collect()
    }

    fn to_resolver(
        &self,
        definition: &crate::registry::CustomFilterDefinition,
    ) -> Result<BoxedPredicate, FilterValidationError> {
        Ok(BoxedPredicate::new(MemoryPredicate::Custom {
            property: definition.property.clone(),
            code: definition.code.clone(),
            value: definition.value.clone(),
        }))
    }
}

impl ExecutionStrategy for MemoryBackend {
    fn fetch_root(
        &self,
        root_entity: &str,
        predicate: &BoxedPredicate,
        _select_fields: &[String],
        pagination: &Pagination,
    ) -> Result<Vec<HashMap<String, Value>>, FilterQlError> {
        let tables = self.tables.read().expect("memory backend lock poisoned");
        let rows = tables.get(root_entity).cloned().unwrap_or_default();
        let predicate = predicate.downcast_ref::<MemoryPredicate>();
        let mut matched: Vec<Row> = rows.into_iter().filter(|row| predicate.is_none_or(|p| p.matches(row))).collect();

        if !pagination.sort.is_empty() {
            matched.sort_by(|a, b| {
                for key in &pagination.sort {
                    let ordering = compare(a.get(&key.field).unwrap_or(&Value::Null), b.get(&key.field)).unwrap_or(Ordering::Equal);
                    let ordering = if key.descending { ordering.reverse() } else { ordering };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = pagination.page.zip(pagination.size).map(|(p, s)| p as usize * s).unwrap_or(0);
        if offset >= matched.len() {
            return Ok(Vec::new());
        }
        matched.drain(0..offset);
        if let Some(size) = pagination.size {
            matched.truncate(size);
        }
        Ok(matched)
    }

    fn fetch_children(&self, collection: &CollectionPlan, parent_ids: &[Value]) -> Result<Vec<HashMap<String, Value>>, FilterQlError> {
        let tables = self.tables.read().expect("memory backend lock poisoned");
        let rows = tables.get(&collection.element_type).cloned().unwrap_or_default();
        let parent_keys: Vec<String> = parent_ids.iter().map(Value::to_string).collect();
        let matched = rows
            .into_iter()
            .filter(|row| {
                row.get(&collection.parent_reference_field)
                    .is_some_and(|v| parent_keys.contains(&v.to_string()))
            })
            .collect();
        Ok(matched)
    }

    fn fetch_aggregate(&self, parent_ids: &[Value], path: &str, reducer: Reducer) -> Result<HashMap<String, Value>, FilterQlError> {
        let meta = self
            .schema
            .field_metadata(&self.root_entity, path)
            .ok_or_else(|| FilterQlError::backend(format!("unknown aggregate path '{path}'")))?;
        let related = meta.related_type.unwrap_or_default();
        let parent_field = meta.mapped_by.unwrap_or_else(|| self.root_entity.to_ascii_lowercase());

        let tables = self.tables.read().expect("memory backend lock poisoned");
        let rows = tables.get(&related).cloned().unwrap_or_default();

        let mut out = HashMap::new();
        for id in parent_ids {
            let id_key = id.to_string();
            let matching: Vec<&Row> = rows
                .iter()
                .filter(|row| row.get(&parent_field).is_some_and(|v| v.to_string() == id_key))
                .collect();
            let value = match reducer {
                Reducer::Count => Value::Int64(matching.len() as i64),
                Reducer::Sum | Reducer::Avg | Reducer::Min | Reducer::Max => reduce_numeric(&matching, reducer),
            };
            out.insert(id_key, value);
        }
        Ok(out)
    }
}

/// Reduces `matching` rows' `"value"` field by convention — the memory
/// backend has no schema-declared aggregation target column, so numeric
/// reducers operate on whichever field callers named `value` when inserting
/// rows meant to be aggregated this way.
fn reduce_numeric(matching: &[&Row], reducer: Reducer) -> Value {
    let numbers: Vec<f64> = matching
        .iter()
        .filter_map(|row| match row.get("value") {
            Some(Value::Int64(n)) => Some(*n as f64),
            Some(Value::Float64(n)) => Some(*n),
            _ => None,
        })
        .collect();
    if numbers.is_empty() {
        return Value::Int64(0);
    }
    match reducer {
        Reducer::Sum => Value::Float64(numbers.iter().sum()),
        Reducer::Avg => Value::Float64(numbers.iter().sum::<f64>() / numbers.len() as f64),
        Reducer::Min => Value::Float64(numbers.iter().cloned().fold(f64::INFINITY, f64::min)),
        Reducer::Max => Value::Float64(numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max)),
        Reducer::Count => Value::Int64(numbers.len() as i64),
    }
}
