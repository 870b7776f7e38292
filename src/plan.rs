//! # Execution Planner (C8, spec.md §4.8) — the hardest subsystem.
//!
//! Turns a parsed projection plus a metamodel snapshot into an
//! [`ExecutionPlan`]: a root [`FieldSchema`] and one [`CollectionPlan`] per
//! distinct collection path, depth-ordered so C9 can fetch children after
//! their parents' IDs are known.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::backend::{BackendRoot, MetamodelSnapshot, PathResolutionMetadata};
use crate::error::ProjectionDefinitionError;
use crate::projection::{Pagination, ParsedProjection};
use crate::schema::{FieldSchema, FieldSchemaBuilder};

/// One of the five reduction functions a computed aggregate dependency may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// A dependency of a computed field: either a plain scalar path, already
/// resolvable to a schema slot, or an aggregate over a collection path.
#[derive(Debug, Clone)]
pub enum ComputedDependency {
    Path(String),
    Aggregate { path: String, reducer: Reducer },
}

/// Caller-supplied description of one computed/derived output field, fed to
/// [`ExecutionPlanner::build`] alongside the parsed projection.
#[derive(Debug, Clone)]
pub struct ComputedFieldSpec {
    pub dto_field: String,
    pub dependencies: Vec<ComputedDependency>,
}

/// A computed field's resolved plan entry (spec.md §3). `dependency_slots[i]
/// == -1` marks an aggregate dependency, resolved at execution time by a
/// grouped sub-query rather than read from a root scalar slot.
#[derive(Debug, Clone)]
pub struct ComputedField {
    pub dto_field_name: String,
    pub output_slot: usize,
    pub dependency_slots: Vec<i64>,
    pub dependency_paths: Vec<String>,
    pub reducers: Vec<Option<Reducer>>,
}

/// One collection path's fetch plan (spec.md §3).
#[derive(Debug, Clone)]
pub struct CollectionPlan {
    pub depth: usize,
    pub collection_path: String,
    pub dto_collection_name: String,
    pub parent_reference_field: String,
    pub element_id_fields: Vec<String>,
    pub element_type: String,
    pub child_schema: Arc<FieldSchema>,
    pub limit_per_parent: Option<usize>,
    pub offset_per_parent: Option<usize>,
    pub sort_field_indices: Vec<usize>,
    pub sort_descending: Vec<bool>,
}

/// The complete, immutable output of C8: a root schema plus every
/// collection and computed-field plan needed to fetch and assemble a
/// response (spec.md §3).
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub root_entity: String,
    pub root_schema: Arc<FieldSchema>,
    pub root_id_fields: Vec<String>,
    pub collection_plans: Vec<CollectionPlan>,
    pub computed_fields: Vec<ComputedField>,
}

struct Group {
    representative: PathResolutionMetadata,
    scalar_remainders: Vec<String>,
}

/// Builds an [`ExecutionPlan`] from a parsed projection against a backend's
/// metamodel (spec.md §4.8).
pub struct ExecutionPlanner;

impl ExecutionPlanner {
    #[tracing::instrument(level = "debug", skip_all, fields(entity = root.entity_type()))]
    pub fn build(
        root: &dyn BackendRoot,
        metamodel: &dyn MetamodelSnapshot,
        projection: &ParsedProjection,
        computed_fields: &[ComputedFieldSpec],
    ) -> Result<ExecutionPlan, ProjectionDefinitionError> {
        let root_entity = root.entity_type().to_string();

        // Step 2/3: resolve every projected path and partition by whether it
        // traverses a to-many relation.
        let mut resolved: Vec<(String, PathResolutionMetadata)> = Vec::with_capacity(projection.fields.len());
        for field in &projection.fields {
            let meta = root.resolve_path(&field.0)?;
            resolved.push((field.0.clone(), meta));
        }

        // Step 4: root schema — every scalar path, plus always-present root
        // ID fields (internal if not user-projected), plus computed output slots.
        let mut root_builder = FieldSchemaBuilder::new(&root_entity);
        for (path, meta) in &resolved {
            if meta.depth() == 0 {
                root_builder.add_field(path, path, false);
            }
        }
        let root_id_fields = metamodel.id_fields(&root_entity);
        for id in &root_id_fields {
            root_builder.add_field(id, id, true);
        }
        for spec in computed_fields {
            root_builder.add_computed_field(&spec.dto_field);
        }
        // Step 7 (reservation half): scalar computed dependencies not
        // already present are reserved as internal slots.
        for spec in computed_fields {
            for dep in &spec.dependencies {
                if let ComputedDependency::Path(p) = dep {
                    root_builder.add_field(p, p, true);
                }
            }
        }
        let root_schema = finalize(root_builder.build());

        // Step 7 (resolution half): wire up each computed field's slots now
        // that the root schema is frozen.
        let mut computed_plan = Vec::with_capacity(computed_fields.len());
        for spec in computed_fields {
            let output_slot = root_schema
                .index_of_dto(&spec.dto_field)
                .map(|idx| idx.index)
                .unwrap_or(0);
            let mut dependency_slots = Vec::with_capacity(spec.dependencies.len());
            let mut dependency_paths = Vec::with_capacity(spec.dependencies.len());
            let mut reducers = Vec::with_capacity(spec.dependencies.len());
            for dep in &spec.dependencies {
                match dep {
                    ComputedDependency::Aggregate { path, reducer } => {
                        dependency_slots.push(-1);
                        dependency_paths.push(path.clone());
                        reducers.push(Some(*reducer));
                    }
                    ComputedDependency::Path(p) => {
                        let slot = root_schema
                            .index_of_entity(p)
                            .or_else(|| root_schema.index_of_dto(p).map(|d| d.index))
                            .map(|i| i as i64)
                            .unwrap_or(-1);
                        dependency_slots.push(slot);
                        dependency_paths.push(p.clone());
                        reducers.push(None);
                    }
                }
            }
            computed_plan.push(ComputedField {
                dto_field_name: spec.dto_field.clone(),
                output_slot,
                dependency_slots,
                dependency_paths,
                reducers,
            });
        }

        // Step 5: group collection-bearing paths by (depth, collectionPath).
        let mut groups: HashMap<(usize, String), Group> = HashMap::new();
        let mut depths_seen: BTreeMap<usize, Vec<String>> = BTreeMap::new();

        for (path, meta) in &resolved {
            let depth = meta.depth();
            if depth == 0 {
                continue;
            }
            for d in 1..=depth {
                let collection_path = meta.collection_path_at_depth(d).expect("depth within range");
                let key = (d, collection_path.clone());
                if !groups.contains_key(&key) {
                    groups.insert(
                        key.clone(),
                        Group {
                            representative: meta.clone(),
                            scalar_remainders: Vec::new(),
                        },
                    );
                    depths_seen.entry(d).or_default().push(collection_path.clone());
                }
                if d == depth {
                    if let Some(remainder) = path.strip_prefix(&collection_path) {
                        let remainder = remainder.trim_start_matches('.');
                        if !remainder.is_empty() {
                            groups.get_mut(&key).unwrap().scalar_remainders.push(remainder.to_string());
                        }
                    }
                }
            }
        }

        // Step 6: per-collection-plan synthesis, depth ascending.
        let mut collection_plans = Vec::new();
        for (&depth, paths) in &depths_seen {
            for collection_path in paths {
                let group = groups.get(&(depth, collection_path.clone())).expect("group exists");
                let segments = group.representative.collection_segments();
                let this_segment = segments[depth - 1];
                let parent_entity_type = if depth == 1 {
                    root_entity.clone()
                } else {
                    segments[depth - 2].target_type.clone()
                };

                let field_metadata = metamodel.field_metadata(&parent_entity_type, &this_segment.name);
                let element_type = field_metadata
                    .as_ref()
                    .and_then(|m| m.related_type.clone())
                    .unwrap_or_else(|| this_segment.target_type.clone());
                let parent_reference_field = field_metadata
                    .as_ref()
                    .and_then(|m| m.mapped_by.clone())
                    .or_else(|| metamodel.back_reference_field(&element_type, &parent_entity_type))
                    .unwrap_or_else(|| parent_entity_type.to_ascii_lowercase());

                let mut child_builder = FieldSchemaBuilder::new(&element_type);
                for remainder in &group.scalar_remainders {
                    child_builder.add_field(remainder, remainder, false);
                }
                for id in metamodel.id_fields(&element_type) {
                    child_builder.add_field(&id, &id, true);
                }
                // Link any deeper collection nested directly under this one.
                if let Some(child_depth_paths) = depths_seen.get(&(depth + 1)) {
                    for child_path in child_depth_paths {
                        if let Some(sub) = child_path.strip_prefix(collection_path.as_str()) {
                            let sub = sub.trim_start_matches('.');
                            if !sub.is_empty() && !sub.contains('.') {
                                child_builder.add_collection(sub);
                            }
                        }
                    }
                }
                let child_schema = finalize(child_builder.build());

                let pagination = projection.collection_options.get(collection_path).cloned().unwrap_or_default();
                let (sort_field_indices, sort_descending) = resolve_sort(&child_schema, &pagination);
                let limit_per_parent = pagination.size;
                let offset_per_parent = pagination
                    .page
                    .zip(pagination.size)
                    .map(|(page, size)| page as usize * size);

                collection_plans.push(CollectionPlan {
                    depth,
                    collection_path: collection_path.clone(),
                    dto_collection_name: this_segment.name.clone(),
                    parent_reference_field,
                    element_id_fields: metamodel.id_fields(&element_type),
                    element_type,
                    child_schema: Arc::new(child_schema),
                    limit_per_parent,
                    offset_per_parent,
                    sort_field_indices,
                    sort_descending,
                });
            }
        }

        Ok(ExecutionPlan {
            root_entity,
            root_schema: Arc::new(root_schema),
            root_id_fields,
            collection_plans,
            computed_fields: computed_plan,
        })
    }
}

/// Resolves each sort key by name into the child schema (entity index
/// first, then DTO index); unresolved falls back to slot 0 / ascending
/// (spec.md §4.8 step 6).
fn resolve_sort(schema: &FieldSchema, pagination: &Pagination) -> (Vec<usize>, Vec<bool>) {
    let mut indices = Vec::with_capacity(pagination.sort.len());
    let mut descending = Vec::with_capacity(pagination.sort.len());
    for key in &pagination.sort {
        let idx = schema
            .index_of_entity(&key.field)
            .or_else(|| schema.index_of_dto(&key.field).map(|d| d.index))
            .unwrap_or(0);
        indices.push(idx);
        descending.push(key.descending);
    }
    (indices, descending)
}

/// Marks every internal slot excluded, per the dedicated finalization step
/// that alone may mutate a built [`FieldSchema`] (spec.md §3).
fn finalize(mut schema: FieldSchema) -> FieldSchema {
    for slot in schema.slot_indices().collect::<Vec<_>>() {
        if schema.is_internal(slot) {
            schema.exclude_slot(slot);
        }
    }
    schema
}
