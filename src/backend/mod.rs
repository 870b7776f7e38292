//! # External Interfaces (spec.md §6)
//!
//! The collaborators this crate treats as peripheral: the relational
//! backend's metamodel and path resolution, and the instance resolver used
//! for computed-field providers. Concrete relational backends, HTTP layers,
//! DI containers, and code generation of property-reference enums live
//! outside this crate and only need to implement these traits.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::InstanceResolutionError;
use crate::op::Op;
use crate::value::DataType;

/// `{getType(), getSupportedOperators(), getEntityType()}` (spec.md §6).
///
/// Implementations are a finite, code-generated (or hand-written)
/// enumeration per entity. Generating such enums from annotations is
/// explicitly out of scope for this crate.
pub trait PropertyReference: Copy + Eq + std::hash::Hash + Send + Sync + fmt::Debug + 'static {
    fn declared_type(&self) -> DataType;
    fn supported_operators(&self) -> &'static HashSet<Op>;
    fn owning_entity_type(&self) -> &'static str;
    /// The DTO-facing name used in projections and DSL filter keys' `ref`.
    fn name(&self) -> &'static str;
}

/// Per-field metadata the planner needs from the metamodel (spec.md §6).
#[derive(Debug, Clone)]
pub struct FieldMetadata {
    pub declared_type: DataType,
    pub is_collection: bool,
    pub related_type: Option<String>,
    pub mapped_by: Option<String>,
}

/// `MetamodelSnapshot`: for an entity type, id field names and per-field
/// metadata (spec.md §6, consumed by C8).
pub trait MetamodelSnapshot: Send + Sync {
    fn id_fields(&self, entity: &str) -> Vec<String>;
    fn field_metadata(&self, entity: &str, field: &str) -> Option<FieldMetadata>;

    /// A field on `element_type` whose related type is `parent_type`, used as
    /// the inverse reference when a collection field declares no `mappedBy`
    /// (spec.md §4.8 step 6, second fallback tier). Backends with full
    /// reflection over an entity's fields should override this; the default
    /// `None` defers to the third tier (lowercased parent class name).
    fn back_reference_field(&self, _element_type: &str, _parent_type: &str) -> Option<String> {
        None
    }
}

/// One segment of a resolved dotted path.
#[derive(Debug, Clone)]
pub struct PathSegment {
    pub name: String,
    pub is_collection: bool,
    /// The entity type this segment navigates *into* (its related type, or
    /// the leaf's declared scalar type name).
    pub target_type: String,
}

/// Result of resolving a dotted projection path against the backend's
/// metamodel (spec.md §6).
#[derive(Debug, Clone)]
pub struct PathResolutionMetadata {
    pub all_segments: Vec<PathSegment>,
}

impl PathResolutionMetadata {
    /// Segments that navigate a to-many relation, in traversal order.
    pub fn collection_segments(&self) -> Vec<&PathSegment> {
        self.all_segments.iter().filter(|s| s.is_collection).collect()
    }

    pub fn depth(&self) -> usize {
        self.collection_segments().len()
    }

    /// The dotted path through (and including) the last collection segment,
    /// i.e. the `collectionPath` grouping key spec.md §4.8 step 5 describes.
    pub fn collection_path_at_depth(&self, depth: usize) -> Option<String> {
        let mut seen = 0usize;
        let mut segments = Vec::new();
        for seg in &self.all_segments {
            segments.push(seg.name.clone());
            if seg.is_collection {
                seen += 1;
                if seen == depth {
                    return Some(segments.join("."));
                }
            }
        }
        None
    }
}

/// `BackendRoot`: path resolution from a dotted string (spec.md §6).
pub trait BackendRoot: Send + Sync {
    fn entity_type(&self) -> &str;
    fn resolve_path(
        &self,
        path: &str,
    ) -> Result<PathResolutionMetadata, crate::error::ProjectionDefinitionError>;
}

/// `InstanceResolver`: looks up a computed-field provider instance
/// (spec.md §6). `Ok(None)` signals the documented static-method fallback —
/// this is not an error condition.
pub trait InstanceResolver: Send + Sync {
    fn resolve(
        &self,
        type_name: &str,
        name: &str,
    ) -> Result<Option<Arc<dyn Any + Send + Sync>>, InstanceResolutionError>;
}

/// In-memory reference implementation of every trait in this module, used
/// by this crate's own tests/doctests and the demo CLI (spec.md §2 ambient
/// layer). Not intended as a production backend.
#[cfg(any(test, feature = "memory-backend"))]
pub mod memory;

/// Test-only fixtures shared by unit tests across modules (`condition`,
/// `dsl`, `schema`, `plan`). Not part of the public API.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::OnceLock;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Prop {
        Name,
        Age,
        Status,
        Title,
    }

    impl PropertyReference for Prop {
        fn declared_type(&self) -> DataType {
            match self {
                Prop::Name | Prop::Status | Prop::Title => DataType::String,
                Prop::Age => DataType::Int64,
            }
        }

        fn supported_operators(&self) -> &'static HashSet<Op> {
            static NAME_OPS: OnceLock<HashSet<Op>> = OnceLock::new();
            static AGE_OPS: OnceLock<HashSet<Op>> = OnceLock::new();
            static TITLE_OPS: OnceLock<HashSet<Op>> = OnceLock::new();
            match self {
                Prop::Name | Prop::Status => NAME_OPS.get_or_init(|| {
                    [Op::Eq, Op::Ne, Op::In, Op::NotIn, Op::IsNull, Op::NotNull]
                        .into_iter()
                        .collect()
                }),
                Prop::Age => AGE_OPS.get_or_init(|| {
                    [Op::Eq, Op::Ne, Op::Gt, Op::Gte, Op::Lt, Op::Lte, Op::Range]
                        .into_iter()
                        .collect()
                }),
                Prop::Title => TITLE_OPS.get_or_init(|| {
                    [Op::Eq, Op::Matches, Op::NotMatches, Op::Custom]
                        .into_iter()
                        .collect()
                }),
            }
        }

        fn owning_entity_type(&self) -> &'static str {
            "TestEntity"
        }

        fn name(&self) -> &'static str {
            match self {
                Prop::Name => "name",
                Prop::Age => "age",
                Prop::Status => "status",
                Prop::Title => "title",
            }
        }
    }
}
