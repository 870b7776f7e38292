//! # Row Buffer & Nested View (C7, spec.md §4.7/§3)
//!
//! `RowBuffer` is a fixed-size array keyed by [`FieldSchema`] slot index:
//! scalar slots hold a [`Value`], collection slots hold the child
//! `RowBuffer`s fetched for that collection path. Name-based `get` is O(1)
//! for an exact match and allocates nothing for a nested-prefix match: it
//! hands back a [`NestedView`] that defers the real lookup to the parent
//! buffer.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RowAccessError;
use crate::schema::FieldSchema;
use crate::value::Value;

#[derive(Debug, Clone)]
enum Slot {
    Scalar(Value),
    Collection(Vec<RowBuffer>),
}

/// A single materialized row: one slot per [`FieldSchema`] index.
///
/// Created by C9 per parent row and per child row, mutated in place during
/// the fetch loop, and converted to a [`FieldValue`] map only at the
/// response boundary.
#[derive(Debug, Clone)]
pub struct RowBuffer {
    schema: Arc<FieldSchema>,
    slots: Vec<Slot>,
}

impl RowBuffer {
    /// A fresh row: `Value::Null` in every scalar slot, an empty list in
    /// every collection slot, sized to `schema.total_slots()`.
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        let slots = (0..schema.total_slots())
            .map(|slot| {
                if schema.is_collection_slot(slot) {
                    Slot::Collection(Vec::new())
                } else {
                    Slot::Scalar(Value::Null)
                }
            })
            .collect();
        Self { schema, slots }
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        &self.schema
    }

    /// Writes a scalar slot. Panics if `slot` is a collection slot — a
    /// fetch-loop bug, not a user-facing condition.
    pub fn set(&mut self, slot: usize, value: Value) {
        match &mut self.slots[slot] {
            Slot::Scalar(v) => *v = value,
            Slot::Collection(_) => panic!("slot {slot} is a collection slot, not scalar"),
        }
    }

    pub fn scalar(&self, slot: usize) -> &Value {
        match &self.slots[slot] {
            Slot::Scalar(v) => v,
            Slot::Collection(_) => panic!("slot {slot} is a collection slot, not scalar"),
        }
    }

    /// Attaches the fetched, sorted/paginated child rows for a collection slot.
    pub fn set_children(&mut self, slot: usize, children: Vec<RowBuffer>) {
        self.slots[slot] = Slot::Collection(children);
    }

    pub fn children(&self, slot: usize) -> &[RowBuffer] {
        match &self.slots[slot] {
            Slot::Collection(c) => c,
            Slot::Scalar(_) => panic!("slot {slot} is a scalar slot, not a collection"),
        }
    }

    /// `get` logic of spec.md §4.7:
    /// 1. exact match in schema (scalar or collection) → the slot's value;
    /// 2. else if `name` is a prefix of some *scalar* schema entry → a [`NestedView`];
    /// 3. else `RowAccessError`.
    pub fn get(&self, name: &str) -> Result<FieldAccess<'_>, RowAccessError> {
        if let Some(idx) = self.schema.index_of_dto(name) {
            return Ok(match &self.slots[idx.index] {
                Slot::Scalar(v) => FieldAccess::Value(v),
                Slot::Collection(rows) => FieldAccess::Rows(rows),
            });
        }
        let prefix = format!("{name}.");
        let has_nested = (0..self.schema.field_count()).any(|slot| {
            self.schema
                .dto_name(slot)
                .is_some_and(|dto| dto.starts_with(&prefix))
        });
        if has_nested {
            return Ok(FieldAccess::Nested(NestedView {
                parent: self,
                prefix: name.to_string(),
            }));
        }
        Err(RowAccessError { name: name.to_string() })
    }

    /// Materializes the full row into a structured, nested map. Collection
    /// slots recurse into each child's own `to_map()`.
    pub fn to_map(&self) -> HashMap<String, FieldValue> {
        let mut root: HashMap<String, FieldValue> = HashMap::new();

        for slot in 0..self.schema.field_count() {
            if self.schema.is_internal(slot) || self.schema.is_excluded(slot) {
                continue;
            }
            let segments = nested_segments(&self.schema, slot);
            insert_scalar(&mut root, &segments, self.scalar(slot).clone());
        }

        for slot in self.schema.field_count()..self.schema.total_slots() {
            if self.schema.is_excluded(slot) {
                continue;
            }
            let segments = nested_segments(&self.schema, slot);
            let list = self.children(slot).iter().map(RowBuffer::to_map).collect();
            insert_collection(&mut root, &segments, list);
        }

        root
    }
}

fn nested_segments(schema: &FieldSchema, slot: usize) -> Vec<String> {
    match schema.nested_path(slot) {
        Some(segs) => segs.to_vec(),
        None => vec![schema.dto_name(slot).unwrap_or_default().to_string()],
    }
}

fn insert_scalar(root: &mut HashMap<String, FieldValue>, segments: &[String], value: Value) {
    match segments {
        [] => {}
        [only] => {
            root.insert(only.clone(), FieldValue::Scalar(value));
        }
        [head, rest @ ..] => {
            let entry = root
                .entry(head.clone())
                .or_insert_with(|| FieldValue::Nested(HashMap::new()));
            if let FieldValue::Nested(nested) = entry {
                insert_scalar(nested, rest, value);
            }
        }
    }
}

fn insert_collection(
    root: &mut HashMap<String, FieldValue>,
    segments: &[String],
    list: Vec<HashMap<String, FieldValue>>,
) {
    match segments {
        [] => {}
        [only] => {
            root.insert(only.clone(), FieldValue::Collection(list));
        }
        [head, rest @ ..] => {
            let entry = root
                .entry(head.clone())
                .or_insert_with(|| FieldValue::Nested(HashMap::new()));
            if let FieldValue::Nested(nested) = entry {
                insert_collection(nested, rest, list);
            }
        }
    }
}

/// The result of [`RowBuffer::get`]: a scalar leaf, a collection of child
/// rows, or a deferred nested view.
pub enum FieldAccess<'a> {
    Value(&'a Value),
    Rows(&'a [RowBuffer]),
    Nested(NestedView<'a>),
}

/// A zero-allocation view into a `RowBuffer` under a known dotted prefix.
/// `get(subfield)` composes as `parent.get(prefix + "." + subfield)`,
/// enabling arbitrary nesting depth without building intermediate maps.
pub struct NestedView<'a> {
    parent: &'a RowBuffer,
    prefix: String,
}

impl<'a> NestedView<'a> {
    pub fn get(&self, subfield: &str) -> Result<FieldAccess<'a>, RowAccessError> {
        self.parent.get(&format!("{}.{subfield}", self.prefix))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// A materialized field: a scalar, a nested object, or an ordered collection
/// of child row maps (spec.md §4.7 `toMap()`).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    Nested(HashMap<String, FieldValue>),
    Collection(Vec<HashMap<String, FieldValue>>),
}
