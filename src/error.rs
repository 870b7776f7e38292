//! Error taxonomy for the FilterQL engine.
//!
//! Every parse, definition, validation, and projection failure is terminal
//! for the request it occurred in (see spec.md §7) — nothing here is
//! recovered internally. `InstanceResolver` returning `Ok(None)` is the one
//! documented non-error outcome and is not represented in this taxonomy.

use std::fmt;

/// Error raised while lexing/parsing the boolean DSL (`combineWith`).
#[derive(Debug, Clone, thiserror::Error)]
pub enum DslSyntaxError {
    /// The DSL string was empty or only whitespace.
    #[error("DSL expression is empty or whitespace-only")]
    Empty,

    /// Parentheses did not balance.
    #[error("unmatched parenthesis at position {position}")]
    UnmatchedParen { position: usize },

    /// A binary operator (`&`, `|`) was missing an operand.
    #[error("operator '{operator}' at position {position} is missing an operand")]
    MissingOperand { operator: char, position: usize },

    /// An identifier started with a digit or contained an invalid character.
    #[error("invalid identifier '{text}' at position {position}")]
    InvalidIdentifier { text: String, position: usize },

    /// An unexpected character was encountered outside any identifier.
    #[error("unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },

    /// Trailing tokens remained after a complete expression was parsed.
    #[error("unexpected trailing input at position {position}: '{remainder}'")]
    TrailingInput { position: usize, remainder: String },

    /// The DSL string exceeded `maxDslLength`.
    #[error("DSL expression length {length} exceeds configured maximum {max}")]
    TooLong { length: usize, max: usize },

    /// `FilterTree::generate` found an identifier with no matching filter key.
    #[error("undefined reference id '{id}'; available: [{available}]")]
    UndefinedReference { id: String, available: String },
}

/// Error raised constructing a `FilterDefinition` (spec.md §3).
#[derive(Debug, Clone, thiserror::Error)]
pub enum FilterDefinitionError {
    /// The operator code was blank or null.
    #[error("filter definition for key '{key}' has a blank or missing operator")]
    BlankOperator { key: String },

    /// An operator that requires a value was given none, or vice versa.
    #[error("operator '{op}' on key '{key}' requires a value but none was supplied")]
    MissingRequiredValue { key: String, op: String },

    /// The argument key referenced by a condition tree was absent at resolver time.
    #[error("missing argument value for key '{key}' at resolver time")]
    MissingArgument { key: String },
}

/// Error raised validating or coercing a `(ref, op, value)` triple (spec.md §4.2/§4.4).
#[derive(Debug, Clone, thiserror::Error)]
pub enum FilterValidationError {
    /// The property does not declare support for the requested operator.
    #[error("property '{property}' does not support operator '{op}'")]
    UnsupportedOperator { property: String, op: String },

    /// `CUSTOM` was used with a code that has no registered provider.
    #[error("no custom operator provider registered for code '{code}'")]
    UnknownCustomOperator { code: String },

    /// A value could not be coerced to the property's declared type.
    #[error("cannot coerce value for property '{property}' (declared type {declared_type}): {reason}")]
    CoercionFailed {
        property: String,
        declared_type: String,
        reason: String,
    },

    /// `IN` was given zero elements.
    #[error("operator IN on property '{property}' requires a non-empty sequence")]
    EmptyInSequence { property: String },

    /// `RANGE` was given a count other than two.
    #[error("operator RANGE on property '{property}' requires exactly two elements, got {count}")]
    InvalidRangeArity { property: String, count: usize },

    /// A null value was supplied to an operator under `nullValuePolicy = strict`.
    #[error("null value for property '{property}' rejected by strict null policy")]
    NullRejected { property: String },

    /// An unknown declared type had no fallback coercion path.
    #[error("unknown target type '{declared_type}' for property '{property}'")]
    UnknownTargetType {
        property: String,
        declared_type: String,
    },
}

/// Error raised parsing or validating a projection spec (spec.md §4.5/§4.8).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProjectionDefinitionError {
    /// Two projection entries specified different options for the same collection path.
    #[error("conflicting options for collection {path}")]
    ConflictingOptions { path: String },

    /// `size` was out of the `[1, maxProjectionPageSize]` range.
    #[error("collection page size {size} out of range [1, {max}]")]
    SizeOutOfRange { size: i64, max: usize },

    /// `page` was negative.
    #[error("collection page index {page} must be >= 0")]
    NegativePage { page: i64 },

    /// The grammar rejected the field spec outright (leading/trailing/consecutive
    /// dots, invalid characters, unbalanced brackets).
    #[error("malformed projection segment '{segment}': {reason}")]
    MalformedSegment { segment: String, reason: String },

    /// A path in the projection could not be resolved against the metamodel.
    #[error("unknown path '{path}' in projection")]
    UnknownPath { path: String },

    /// A computed field named a dependency that does not resolve to any schema slot
    /// and has no reducer attached.
    #[error("computed field '{field}' has unknown dependency '{dependency}'")]
    UnknownComputedDependency { field: String, dependency: String },
}

/// Error raised accessing a `RowBuffer` by a name the schema does not know (spec.md §4.7).
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown field: {name}")]
pub struct RowAccessError {
    pub name: String,
}

/// Error raised resolving an `InstanceResolver` lookup for a computed-field provider.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to resolve instance of type '{type_name}' (name: {name:?}): {reason}")]
pub struct InstanceResolutionError {
    pub type_name: String,
    pub name: Option<String>,
    pub reason: String,
}

/// Top-level error uniting every kind surfaced to a FilterQL caller.
///
/// Backend errors are opaque strings: spec.md §7 requires they be surfaced
/// unchanged, and the backend type itself is an external collaborator this
/// crate does not depend on.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FilterQlError {
    #[error(transparent)]
    Dsl(#[from] DslSyntaxError),

    #[error(transparent)]
    Definition(#[from] FilterDefinitionError),

    #[error(transparent)]
    Validation(#[from] FilterValidationError),

    #[error(transparent)]
    Projection(#[from] ProjectionDefinitionError),

    #[error(transparent)]
    InstanceResolution(#[from] InstanceResolutionError),

    #[error(transparent)]
    RowAccess(#[from] RowAccessError),

    /// Surfaced unchanged from the backend, per spec.md §7 kind 5.
    #[error("backend error: {0}")]
    Backend(String),
}

impl FilterQlError {
    pub fn backend(message: impl fmt::Display) -> Self {
        FilterQlError::Backend(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FilterQlError>;
