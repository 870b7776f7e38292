//! # Operator Registry (C1)
//!
//! Process-wide, case-insensitive, thread-safe map of custom operator codes
//! to their providers. Registration is atomic over a provider's entire
//! `supported_operators()` set — either every code is registered or none
//! are, so no reader ever observes a provider mid-registration.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::condition::BoxedPredicate;
use crate::error::FilterValidationError;
use crate::value::Value;

/// Describes a `(ref, CUSTOM op, value)` triple, ready for a custom
/// operator provider to turn into a backend predicate.
#[derive(Debug, Clone)]
pub struct CustomFilterDefinition {
    pub property: String,
    pub code: String,
    pub value: Option<Value>,
}

/// A backend-agnostic custom operator implementation (spec.md §6).
pub trait CustomOperatorProvider: Send + Sync {
    /// The operator codes (uppercase) this provider handles.
    fn supported_operators(&self) -> HashSet<String>;

    /// Build the backend predicate for one definition using this operator.
    fn to_resolver(
        &self,
        definition: &CustomFilterDefinition,
    ) -> Result<BoxedPredicate, FilterValidationError>;
}

/// Process-wide registry of custom operator providers.
///
/// Normalizes codes to uppercase on both insert and lookup. Backed by a
/// `DashMap` for lock-free-ish concurrent reads; registration takes the
/// map's per-shard locks only for the duration of the atomic group insert.
#[derive(Default)]
pub struct OperatorRegistry {
    providers: DashMap<String, Arc<dyn CustomOperatorProvider>>,
}

/// Error raised registering a provider whose codes collide with an
/// already-registered provider.
#[derive(Debug, Clone, thiserror::Error)]
#[error("duplicate operator code '{code}' already registered")]
pub struct DuplicateOperatorError {
    pub code: String,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
        }
    }

    /// Register a provider's entire `supported_operators()` set atomically.
    ///
    /// If any code already has a provider, nothing is registered and the
    /// first colliding code is reported.
    pub fn register(
        &self,
        provider: Arc<dyn CustomOperatorProvider>,
    ) -> Result<(), DuplicateOperatorError> {
        let codes: Vec<String> = provider
            .supported_operators()
            .into_iter()
            .map(|c| c.to_ascii_uppercase())
            .collect();

        for code in &codes {
            if self.providers.contains_key(code) {
                return Err(DuplicateOperatorError { code: code.clone() });
            }
        }

        for code in codes {
            self.providers.insert(code, Arc::clone(&provider));
        }
        Ok(())
    }

    /// Remove a single operator code's registration, if present.
    pub fn unregister(&self, code: &str) -> Option<Arc<dyn CustomOperatorProvider>> {
        self.providers.remove(&code.to_ascii_uppercase()).map(|(_, v)| v)
    }

    /// Remove every code belonging to the given set.
    pub fn unregister_codes<'a>(&self, codes: impl IntoIterator<Item = &'a str>) {
        for code in codes {
            self.unregister(code);
        }
    }

    /// Look up the provider for a code, case-insensitively.
    pub fn get(&self, code: &str) -> Option<Arc<dyn CustomOperatorProvider>> {
        self.providers
            .get(&code.to_ascii_uppercase())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Remove every registered provider.
    pub fn unregister_all(&self) {
        self.providers.clear();
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
