//! # Field Schema (C6, spec.md §4.6/§3)
//!
//! An immutable indexed layout shared by a root `RowBuffer` and every child
//! `RowBuffer` produced for a collection path. Scalar slots occupy
//! `0..fieldCount`; collection slots occupy `fieldCount..totalSlots`, so a
//! slot index alone tells a `RowBuffer` which half of its backing `Vec` to
//! look at without an extra tag.

use std::collections::{HashMap, HashSet};

/// One scalar or computed output slot.
#[derive(Debug, Clone)]
struct FieldSlot {
    /// `None` for a computed field with no direct entity-side path.
    entity_field: Option<String>,
    dto_field: String,
    nested_path: Option<Vec<String>>,
    is_internal: bool,
    is_computed: bool,
}

/// One collection slot; `dto_name` may be dot-qualified (a nested collection).
#[derive(Debug, Clone)]
struct CollectionSlot {
    dto_name: String,
    nested_path: Option<Vec<String>>,
}

fn split_nested(dto_path: &str) -> Option<Vec<String>> {
    if dto_path.contains('.') {
        Some(dto_path.split('.').map(str::to_string).collect())
    } else {
        None
    }
}

/// `indexOfDto` result: a slot index tagged with whether it is a collection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtoIndex {
    pub index: usize,
    pub is_collection: bool,
}

/// Builds a [`FieldSchema`]. Mirrors the builder API of spec.md §4.6:
/// duplicate entity paths are deduplicated, and a later non-internal
/// addition clears an earlier internal flag for the same path.
#[derive(Debug, Default)]
pub struct FieldSchemaBuilder {
    entity_type: String,
    fields: Vec<FieldSlot>,
    entity_lookup: HashMap<String, usize>,
    computed_lookup: HashSet<String>,
    collections: Vec<CollectionSlot>,
    collection_lookup: HashSet<String>,
}

impl FieldSchemaBuilder {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            ..Default::default()
        }
    }

    /// Add (or merge into) a scalar field mapped from `entity_path` to `dto_path`.
    pub fn add_field(&mut self, entity_path: &str, dto_path: &str, is_internal: bool) -> &mut Self {
        if let Some(&idx) = self.entity_lookup.get(entity_path) {
            let slot = &mut self.fields[idx];
            if !is_internal && slot.is_internal {
                slot.is_internal = false;
            }
            return self;
        }
        self.fields.push(FieldSlot {
            entity_field: Some(entity_path.to_string()),
            dto_field: dto_path.to_string(),
            nested_path: split_nested(dto_path),
            is_internal,
            is_computed: false,
        });
        self.entity_lookup.insert(entity_path.to_string(), self.fields.len() - 1);
        self
    }

    /// Reserve an output slot for a computed field with no backing entity path.
    pub fn add_computed_field(&mut self, dto_path: &str) -> &mut Self {
        if !self.computed_lookup.insert(dto_path.to_string()) {
            return self;
        }
        self.fields.push(FieldSlot {
            entity_field: None,
            dto_field: dto_path.to_string(),
            nested_path: split_nested(dto_path),
            is_internal: false,
            is_computed: true,
        });
        self
    }

    /// Append a collection slot, keyed by its (possibly dot-qualified) DTO name.
    pub fn add_collection(&mut self, dto_collection_name: &str) -> &mut Self {
        if !self.collection_lookup.insert(dto_collection_name.to_string()) {
            return self;
        }
        self.collections.push(CollectionSlot {
            dto_name: dto_collection_name.to_string(),
            nested_path: split_nested(dto_collection_name),
        });
        self
    }

    pub fn build(self) -> FieldSchema {
        let field_count = self.fields.len();
        let mut entity_index = HashMap::new();
        let mut dto_index = HashMap::new();

        for (i, f) in self.fields.iter().enumerate() {
            if let Some(ep) = &f.entity_field {
                entity_index.insert(ep.clone(), i);
            }
            dto_index.insert(
                f.dto_field.clone(),
                DtoIndex {
                    index: i,
                    is_collection: false,
                },
            );
        }
        for (j, c) in self.collections.iter().enumerate() {
            let slot = field_count + j;
            dto_index.insert(
                c.dto_name.clone(),
                DtoIndex {
                    index: slot,
                    is_collection: true,
                },
            );
        }

        FieldSchema {
            entity_type: self.entity_type,
            fields: self.fields,
            collections: self.collections,
            entity_index,
            dto_index,
            excluded_slots: HashSet::new(),
        }
    }
}

/// Immutable indexed layout: slot index ↔ entity path ↔ DTO path.
///
/// The one exception to immutability is `excluded_slots`, written only by
/// the planner's finalization step via the crate-private `exclude_slot`.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    entity_type: String,
    fields: Vec<FieldSlot>,
    collections: Vec<CollectionSlot>,
    entity_index: HashMap<String, usize>,
    dto_index: HashMap<String, DtoIndex>,
    excluded_slots: HashSet<usize>,
}

impl FieldSchema {
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    pub fn total_slots(&self) -> usize {
        self.fields.len() + self.collections.len()
    }

    /// Tagged lookup by DTO path; `None` is the "absent" sentinel (spec.md §4.6 `NONE`).
    pub fn index_of_dto(&self, dto_path: &str) -> Option<DtoIndex> {
        self.dto_index.get(dto_path).copied()
    }

    /// Scalar-only lookup by entity path.
    pub fn index_of_entity(&self, entity_path: &str) -> Option<usize> {
        self.entity_index.get(entity_path).copied()
    }

    pub fn is_collection_slot(&self, slot: usize) -> bool {
        slot >= self.fields.len()
    }

    pub fn is_internal(&self, slot: usize) -> bool {
        self.fields.get(slot).map(|f| f.is_internal).unwrap_or(false)
    }

    pub fn is_computed(&self, slot: usize) -> bool {
        self.fields.get(slot).map(|f| f.is_computed).unwrap_or(false)
    }

    pub fn entity_field(&self, slot: usize) -> Option<&str> {
        self.fields.get(slot).and_then(|f| f.entity_field.as_deref())
    }

    /// The DTO name/path for any slot, scalar or collection.
    pub fn dto_name(&self, slot: usize) -> Option<&str> {
        if slot < self.fields.len() {
            self.fields.get(slot).map(|f| f.dto_field.as_str())
        } else {
            self.collections.get(slot - self.fields.len()).map(|c| c.dto_name.as_str())
        }
    }

    pub fn nested_path(&self, slot: usize) -> Option<&[String]> {
        if slot < self.fields.len() {
            self.fields.get(slot).and_then(|f| f.nested_path.as_deref())
        } else {
            self.collections
                .get(slot - self.fields.len())
                .and_then(|c| c.nested_path.as_deref())
        }
    }

    pub fn is_excluded(&self, slot: usize) -> bool {
        self.excluded_slots.contains(&slot)
    }

    /// Iterates every slot index in schema-declared order (scalars first, then collections).
    pub fn slot_indices(&self) -> impl Iterator<Item = usize> {
        0..self.total_slots()
    }

    /// Marks a slot as serialization-excluded. Written only by the planner's
    /// finalization step (spec.md §3: "written only during plan finalization").
    pub(crate) fn exclude_slot(&mut self, slot: usize) {
        self.excluded_slots.insert(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_entity_paths_are_deduplicated() {
        let mut b = FieldSchemaBuilder::new("Book");
        b.add_field("title", "title", false);
        b.add_field("title", "title", false);
        let schema = b.build();
        assert_eq!(schema.field_count(), 1);
    }

    #[test]
    fn later_non_internal_addition_clears_internal_flag() {
        let mut b = FieldSchemaBuilder::new("Book");
        b.add_field("id", "id", true);
        b.add_field("id", "id", false);
        let schema = b.build();
        let idx = schema.index_of_entity("id").unwrap();
        assert!(!schema.is_internal(idx));
    }

    #[test]
    fn collection_slots_follow_scalar_slots() {
        let mut b = FieldSchemaBuilder::new("Book");
        b.add_field("title", "title", false);
        b.add_field("year", "year", false);
        b.add_collection("authors");
        let schema = b.build();
        assert_eq!(schema.field_count(), 2);
        assert_eq!(schema.collection_count(), 1);
        assert_eq!(schema.total_slots(), 3);
        let idx = schema.index_of_dto("authors").unwrap();
        assert!(idx.is_collection);
        assert_eq!(idx.index, 2);
        assert!(schema.is_collection_slot(2));
        assert!(!schema.is_collection_slot(0));
    }

    #[test]
    fn index_of_dto_is_none_when_absent() {
        let b = FieldSchemaBuilder::new("Book");
        let schema = b.build();
        assert!(schema.index_of_dto("nonexistent").is_none());
    }

    #[test]
    fn nested_dto_paths_are_pre_split() {
        let mut b = FieldSchemaBuilder::new("Book");
        b.add_field("author.name", "author.name", false);
        let schema = b.build();
        let idx = schema.index_of_dto("author.name").unwrap();
        assert_eq!(schema.nested_path(idx.index), Some(&["author".to_string(), "name".to_string()][..]));
    }

    #[test]
    fn computed_field_has_no_entity_path() {
        let mut b = FieldSchemaBuilder::new("Book");
        b.add_computed_field("reviewCount");
        let schema = b.build();
        let idx = schema.index_of_dto("reviewCount").unwrap();
        assert!(!idx.is_collection);
        assert!(schema.is_computed(idx.index));
        assert!(schema.entity_field(idx.index).is_none());
    }

    #[test]
    fn exclude_slot_is_crate_private_but_visible_here() {
        let mut b = FieldSchemaBuilder::new("Book");
        b.add_field("id", "id", true);
        let mut schema = b.build();
        assert!(!schema.is_excluded(0));
        schema.exclude_slot(0);
        assert!(schema.is_excluded(0));
    }
}
