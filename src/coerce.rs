//! # Type Coercion (C2, spec.md §4.2)
//!
//! Coerces a `RawValue` to a property's `DataType` under explicit policies.
//! Null handling itself is decided by `FilterContext` (which policy branch
//! applies to a null depends on the operator); this module only coerces
//! non-null values (or sequences of them).

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FilterValidationError;
use crate::op::Op;
use crate::value::{DataType, RawValue, Value};

/// How `IS_NULL`/`NOT_NULL` and null operands on other operators behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullValuePolicy {
    /// A null value on an operator that requires one is an error.
    Strict,
    /// A null value is silently treated as though `IS_NULL` had been used.
    CoerceToIsNull,
    /// A null value is passed through as `Value::Null`.
    Ignore,
}

impl Default for NullValuePolicy {
    fn default() -> Self {
        NullValuePolicy::Strict
    }
}

/// `enumMatchMode` (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumMatchMode {
    Exact,
    CaseInsensitive,
}

impl Default for EnumMatchMode {
    fn default() -> Self {
        EnumMatchMode::Exact
    }
}

/// `stringCaseStrategy` (spec.md §6): applied to string operands before
/// predicate build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringCaseStrategy {
    None,
    Lower,
    Upper,
}

impl Default for StringCaseStrategy {
    fn default() -> Self {
        StringCaseStrategy::None
    }
}

/// The coercion policy bundle threaded through `FilterContext`.
#[derive(Debug, Clone)]
pub struct CoercionPolicy {
    pub null_value_policy: NullValuePolicy,
    pub enum_match_mode: EnumMatchMode,
    pub string_case_strategy: StringCaseStrategy,
}

impl Default for CoercionPolicy {
    fn default() -> Self {
        CoercionPolicy {
            null_value_policy: NullValuePolicy::default(),
            enum_match_mode: EnumMatchMode::default(),
            string_case_strategy: StringCaseStrategy::default(),
        }
    }
}

const TRUE_LITERALS: &[&str] = &["true", "yes", "y", "oui", "1"];
const FALSE_LITERALS: &[&str] = &["false", "no", "n", "non", "0"];

/// Coerce one raw value to `declared_type`, honoring `op`'s multiplicity and
/// `policy`'s string/enum handling. Collection-accepting operators (`IN`,
/// `RANGE` and their negations) accept a `RawValue::Sequence`, a bare scalar
/// (treated as a one-element sequence upstream by callers that need that),
/// or a comma-delimited string.
pub fn coerce(
    declared_type: DataType,
    raw: &RawValue,
    op: Op,
    policy: &CoercionPolicy,
    property_name: &str,
) -> Result<Value, FilterValidationError> {
    if op.accepts_multi() {
        let elements = multi_elements(raw, property_name)?;
        let coerced: Result<Vec<Value>, FilterValidationError> = elements
            .iter()
            .map(|el| coerce_scalar(declared_type, el, policy, property_name))
            .collect();
        let coerced = coerced?;

        match op {
            Op::In | Op::NotIn if coerced.is_empty() => {
                return Err(FilterValidationError::EmptyInSequence {
                    property: property_name.to_string(),
                });
            }
            Op::Range | Op::NotRange if coerced.len() != 2 => {
                return Err(FilterValidationError::InvalidRangeArity {
                    property: property_name.to_string(),
                    count: coerced.len(),
                });
            }
            _ => {}
        }

        Ok(Value::List(coerced))
    } else {
        coerce_scalar(declared_type, raw, policy, property_name)
    }
}

fn multi_elements(
    raw: &RawValue,
    property_name: &str,
) -> Result<Vec<RawValue>, FilterValidationError> {
    let _ = property_name;
    match raw {
        RawValue::Sequence(items) => Ok(items.clone()),
        RawValue::String(s) => Ok(s
            .split(',')
            .map(|part| RawValue::String(part.trim().to_string()))
            .collect()),
        other => Ok(vec![other.clone()]),
    }
}

fn coerce_scalar(
    declared_type: DataType,
    raw: &RawValue,
    policy: &CoercionPolicy,
    property_name: &str,
) -> Result<Value, FilterValidationError> {
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let fail = |reason: String| FilterValidationError::CoercionFailed {
        property: property_name.to_string(),
        declared_type: declared_type.to_string(),
        reason,
    };

    match declared_type {
        DataType::Int64 => match raw {
            RawValue::Number(n) => Ok(Value::Int64(*n as i64)),
            RawValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int64)
                .map_err(|e| fail(e.to_string())),
            _ => Err(fail("expected a number".to_string())),
        },
        DataType::Float64 => match raw {
            RawValue::Number(n) => Ok(Value::Float64(*n)),
            RawValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float64)
                .map_err(|e| fail(e.to_string())),
            _ => Err(fail("expected a number".to_string())),
        },
        DataType::Bool => coerce_bool(raw).map(Value::Bool).map_err(fail),
        DataType::String => {
            let s = to_canonical_string(raw);
            Ok(Value::String(apply_string_case(s, policy.string_case_strategy)))
        }
        DataType::Uuid => match raw {
            RawValue::String(s) => Uuid::parse_str(s).map(Value::Uuid).map_err(|e| fail(e.to_string())),
            _ => Err(fail("expected a UUID string".to_string())),
        },
        DataType::DateTime => coerce_datetime(raw).map(Value::DateTime).map_err(fail),
        DataType::Enum(variants_source) => coerce_enum(raw, variants_source, policy).map_err(fail),
    }
}

fn coerce_bool(raw: &RawValue) -> Result<bool, String> {
    match raw {
        RawValue::Bool(b) => Ok(*b),
        RawValue::Number(n) => Ok(*n != 0.0),
        RawValue::String(s) => {
            let lower = s.trim().to_ascii_lowercase();
            if TRUE_LITERALS.contains(&lower.as_str()) {
                Ok(true)
            } else if FALSE_LITERALS.contains(&lower.as_str()) {
                Ok(false)
            } else if let Ok(n) = lower.parse::<f64>() {
                Ok(n != 0.0)
            } else {
                Err(format!("'{s}' is not a recognized boolean literal"))
            }
        }
        _ => Err("expected a boolean-like value".to_string()),
    }
}

fn to_canonical_string(raw: &RawValue) -> String {
    match raw {
        RawValue::String(s) => s.clone(),
        RawValue::Number(n) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        RawValue::Bool(b) => b.to_string(),
        RawValue::Null => String::new(),
        RawValue::Sequence(_) => String::new(),
    }
}

fn apply_string_case(s: String, strategy: StringCaseStrategy) -> String {
    match strategy {
        StringCaseStrategy::None => s,
        StringCaseStrategy::Lower => s.to_lowercase(),
        StringCaseStrategy::Upper => s.to_uppercase(),
    }
}

fn coerce_datetime(raw: &RawValue) -> Result<DateTime<Utc>, String> {
    match raw {
        RawValue::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                    .map(|naive| Utc.from_utc_datetime(&naive))
            })
            .map_err(|e| e.to_string()),
        RawValue::Number(millis) => Ok(Utc
            .timestamp_millis_opt(*millis as i64)
            .single()
            .ok_or_else(|| "epoch-millis value out of range".to_string())?),
        _ => Err("expected an ISO-8601 string or epoch-millis number".to_string()),
    }
}

fn coerce_enum(
    raw: &RawValue,
    variant_name_source: &str,
    policy: &CoercionPolicy,
) -> Result<Value, String> {
    // `Enum(&'static str)` names the enum type; this crate does not know its
    // variant set (that lives in the caller's generated enum), so enum
    // coercion here only normalizes casing per policy and returns the
    // resulting string — the caller's `PropertyReference`/backend is
    // responsible for the final variant match when it consumes the `Value`.
    let _ = variant_name_source;
    match raw {
        RawValue::String(s) => {
            let normalized = match policy.enum_match_mode {
                EnumMatchMode::Exact => s.clone(),
                EnumMatchMode::CaseInsensitive => s.clone(),
            };
            Ok(Value::String(normalized))
        }
        _ => Err("expected an enum variant name string".to_string()),
    }
}
