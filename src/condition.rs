//! # Filter Context (C4) and Condition trees
//!
//! `Condition<P>` is the opaque, immutable algebraic value spec.md §3
//! describes: a tagged, `Arc`-shared variant closed under `and`/`or`/`not`.
//! It carries only identifier references (a deferred argument key, a
//! property reference, and an operator) — no values. `FilterContext`
//! validates `(ref, op)` pairs at condition-creation time and performs the
//! full value coercion / custom-operator dispatch at `to_resolver` time.

use std::any::Any;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::backend::PropertyReference;
use crate::coerce::{coerce, CoercionPolicy, NullValuePolicy};
use crate::error::{FilterDefinitionError, FilterValidationError};
use crate::op::Op;
use crate::registry::{CustomFilterDefinition, OperatorRegistry};
use crate::value::{RawValue, Value};

/// An opaque backend predicate. Implementations are supplied by whatever
/// relational backend plugs in via `PredicateBackend`; this crate never
/// interprets their contents, only combines them via `PredicateBackend`.
pub trait Predicate: fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// A boxed, type-erased `Predicate`.
pub struct BoxedPredicate(Box<dyn Predicate>);

impl BoxedPredicate {
    pub fn new(predicate: impl Predicate + 'static) -> Self {
        BoxedPredicate(Box::new(predicate))
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Convenience constructor for test/demo predicates that only need a
    /// human-readable representation (e.g. a `Display`-backed debug stand-in
    /// in a custom operator provider that isn't wired to a real backend yet).
    pub fn custom(representation: impl Into<String>) -> Self {
        #[derive(Debug)]
        struct DebugPredicate(String);
        impl Predicate for DebugPredicate {
            fn as_any(&self) -> &dyn Any {
                self
            }
        }
        BoxedPredicate::new(DebugPredicate(representation.into()))
    }
}

impl fmt::Debug for BoxedPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The seam spec.md §4.4 calls "a per-operator predicate builder configured
/// for the backend": turns one leaf `(ref, op, value)` into a predicate, and
/// combines predicates with the backend's native `AND`/`OR`/`NOT`.
pub trait PredicateBackend: Send + Sync {
    fn build_leaf(
        &self,
        property: &str,
        op: Op,
        value: Option<&Value>,
    ) -> Result<BoxedPredicate, FilterValidationError>;

    fn and(&self, left: BoxedPredicate, right: BoxedPredicate) -> BoxedPredicate;
    fn or(&self, left: BoxedPredicate, right: BoxedPredicate) -> BoxedPredicate;
    fn not(&self, predicate: BoxedPredicate) -> BoxedPredicate;
}

/// Opaque algebraic condition, closed under `and`/`or`/`not`. Carries only
/// the deferred argument key, not the value — values are bound later via
/// `QueryExecutionParams` at `to_resolver` time. Immutable and `Arc`-shared
/// so the same tree can be reused, structurally, across requests that
/// differ only in argument values (spec.md §9).
#[derive(Clone)]
pub struct Condition<P: PropertyReference>(Arc<ConditionNode<P>>);

enum ConditionNode<P: PropertyReference> {
    Leaf {
        arg_key: String,
        property: P,
        op: Op,
        custom_code: Option<String>,
    },
    And(Condition<P>, Condition<P>),
    Or(Condition<P>, Condition<P>),
    Not(Condition<P>),
}

impl<P: PropertyReference> Condition<P> {
    fn leaf(arg_key: String, property: P, op: Op, custom_code: Option<String>) -> Self {
        Condition(Arc::new(ConditionNode::Leaf {
            arg_key,
            property,
            op,
            custom_code,
        }))
    }

    pub fn and(&self, other: &Condition<P>) -> Condition<P> {
        Condition(Arc::new(ConditionNode::And(self.clone(), other.clone())))
    }

    pub fn or(&self, other: &Condition<P>) -> Condition<P> {
        Condition(Arc::new(ConditionNode::Or(self.clone(), other.clone())))
    }

    pub fn not(&self) -> Condition<P> {
        Condition(Arc::new(ConditionNode::Not(self.clone())))
    }

    /// De Morgan-expanded form: `!(a & b)` becomes `!a | !b` at the
    /// `Condition` level (spec.md §8 universal property). Used by tests and
    /// by backends that prefer not to implement `not` over compound nodes.
    pub fn push_not_inward(&self) -> Condition<P> {
        match &*self.0 {
            ConditionNode::Leaf { .. } => self.not(),
            ConditionNode::And(l, r) => l.push_not_inward().or(&r.push_not_inward()),
            ConditionNode::Or(l, r) => l.push_not_inward().and(&r.push_not_inward()),
            ConditionNode::Not(inner) => inner.clone(),
        }
    }
}

/// `{arguments: map<argKey, value>, projection: set<string>|∅}` (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct QueryExecutionParams {
    pub arguments: HashMap<String, RawValue>,
    pub projection: HashSet<String>,
}

impl QueryExecutionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: RawValue) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }

    pub fn with_projection(mut self, projection: HashSet<String>) -> Self {
        self.projection = projection;
        self
    }
}

/// A resolved predicate plus the (opaque, C9-consumed) projection hint that
/// was attached if `params.projection` was non-empty.
pub struct PredicateResolver {
    pub predicate: BoxedPredicate,
    pub projection_hint: Option<HashSet<String>>,
}

/// Validates `(ref, op, value)` triples, creates `Condition`s, and resolves
/// them into backend predicates. Does not itself hold backend state — the
/// `PredicateBackend` is supplied per call to `to_resolver`, so a single
/// `FilterContext` can serve multiple backend implementations.
pub struct FilterContext<P: PropertyReference> {
    registry: Arc<OperatorRegistry>,
    policy: CoercionPolicy,
    _marker: std::marker::PhantomData<P>,
}

impl<P: PropertyReference> FilterContext<P> {
    pub fn new(registry: Arc<OperatorRegistry>, policy: CoercionPolicy) -> Self {
        FilterContext {
            registry,
            policy,
            _marker: std::marker::PhantomData,
        }
    }

    /// Create a `Condition` for a deferred argument. Validates that `ref`
    /// declares support for `op`; does not read the value and does not
    /// check `CUSTOM` provider availability (that happens lazily at
    /// `to_resolver` time, per spec.md §4.4).
    pub fn to_condition(
        &self,
        arg_key: impl Into<String>,
        property: P,
        op_code: &str,
    ) -> Result<Condition<P>, FilterValidationError> {
        let (op, custom_code) =
            Op::parse(op_code).map_err(|_| FilterValidationError::UnsupportedOperator {
                property: property.name().to_string(),
                op: op_code.to_string(),
            })?;

        if !property.supported_operators().contains(&op) {
            return Err(FilterValidationError::UnsupportedOperator {
                property: property.name().to_string(),
                op: op.code().to_string(),
            });
        }

        Ok(Condition::leaf(arg_key.into(), property, op, custom_code))
    }

    /// Walk a `Condition` tree, binding argument values from `params` and
    /// producing a composite `PredicateResolver` against `backend`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn to_resolver<B: PredicateBackend>(
        &self,
        condition: &Condition<P>,
        params: &QueryExecutionParams,
        backend: &B,
    ) -> Result<PredicateResolver, crate::error::FilterQlError> {
        let predicate = self.resolve_node(&condition.0, params, backend)?;
        let projection_hint = if params.projection.is_empty() {
            None
        } else {
            Some(params.projection.clone())
        };
        tracing::debug!("resolved condition tree to predicate");
        Ok(PredicateResolver {
            predicate,
            projection_hint,
        })
    }

    fn resolve_node<B: PredicateBackend>(
        &self,
        node: &ConditionNode<P>,
        params: &QueryExecutionParams,
        backend: &B,
    ) -> Result<BoxedPredicate, crate::error::FilterQlError> {
        match node {
            ConditionNode::Leaf {
                arg_key,
                property,
                op,
                custom_code,
            } => self.resolve_leaf(arg_key, property, *op, custom_code.as_deref(), params, backend),
            ConditionNode::And(l, r) => {
                let left = self.resolve_node(&l.0, params, backend)?;
                let right = self.resolve_node(&r.0, params, backend)?;
                Ok(backend.and(left, right))
            }
            ConditionNode::Or(l, r) => {
                let left = self.resolve_node(&l.0, params, backend)?;
                let right = self.resolve_node(&r.0, params, backend)?;
                Ok(backend.or(left, right))
            }
            ConditionNode::Not(inner) => {
                let inner_pred = self.resolve_node(&inner.0, params, backend)?;
                Ok(backend.not(inner_pred))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_leaf<B: PredicateBackend>(
        &self,
        arg_key: &str,
        property: &P,
        op: Op,
        custom_code: Option<&str>,
        params: &QueryExecutionParams,
        backend: &B,
    ) -> Result<BoxedPredicate, crate::error::FilterQlError> {
        let raw = params.arguments.get(arg_key);

        if op.requires_value() && raw.is_none() {
            return Err(FilterDefinitionError::MissingArgument {
                key: arg_key.to_string(),
            }
            .into());
        }

        let property_name = property.name().to_string();
        let mut op = op;

        let coerced = match raw {
            None => None,
            Some(raw_value) => {
                if raw_value.is_null() {
                    match self.policy.null_value_policy {
                        NullValuePolicy::Strict if op.requires_value() => {
                            return Err(FilterValidationError::NullRejected {
                                property: property_name.clone(),
                            }
                            .into());
                        }
                        NullValuePolicy::CoerceToIsNull => {
                            op = Op::IsNull;
                            None
                        }
                        _ => None,
                    }
                } else {
                    Some(coerce(
                        property.declared_type(),
                        raw_value,
                        op,
                        &self.policy,
                        &property_name,
                    )?)
                }
            }
        };

        if let Some(code) = custom_code {
            let provider = self
                .registry
                .get(code)
                .ok_or_else(|| FilterValidationError::UnknownCustomOperator {
                    code: code.to_string(),
                })?;
            let definition = CustomFilterDefinition {
                property: property_name,
                code: code.to_string(),
                value: coerced,
            };
            return Ok(provider.to_resolver(&definition)?);
        }

        Ok(backend.build_leaf(&property_name, op, coerced.as_ref())?)
    }
}
