//! # Operator Enumeration (spec.md §3)
//!
//! `Op` is the closed set of operators a `FilterDefinition` may carry.
//! `CUSTOM` is a sentinel: its semantics are resolved via the operator
//! registry (`registry`) rather than built in here.

use std::fmt;
use std::str::FromStr;

/// The closed set of filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Matches,
    NotMatches,
    In,
    NotIn,
    IsNull,
    NotNull,
    Range,
    NotRange,
    /// Sentinel paired with a non-empty `op` code resolved via the operator registry.
    Custom,
}

impl Op {
    /// The canonical uppercase code, as carried on `FilterDefinition.op`.
    pub fn code(self) -> &'static str {
        match self {
            Op::Eq => "EQ",
            Op::Ne => "NE",
            Op::Gt => "GT",
            Op::Gte => "GTE",
            Op::Lt => "LT",
            Op::Lte => "LTE",
            Op::Matches => "MATCHES",
            Op::NotMatches => "NOT_MATCHES",
            Op::In => "IN",
            Op::NotIn => "NOT_IN",
            Op::IsNull => "IS_NULL",
            Op::NotNull => "NOT_NULL",
            Op::Range => "RANGE",
            Op::NotRange => "NOT_RANGE",
            Op::Custom => "CUSTOM",
        }
    }

    /// The conventional on-wire symbol, e.g. `"="`, `"LIKE"`, `"BETWEEN"`.
    pub fn symbol(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::Matches => "LIKE",
            Op::NotMatches => "NOT LIKE",
            Op::In => "IN",
            Op::NotIn => "NOT IN",
            Op::IsNull => "IS NULL",
            Op::NotNull => "IS NOT NULL",
            Op::Range => "BETWEEN",
            Op::NotRange => "NOT BETWEEN",
            Op::Custom => "CUSTOM",
        }
    }

    /// Whether this operator requires a non-null operand value.
    pub fn requires_value(self) -> bool {
        !matches!(self, Op::IsNull | Op::NotNull)
    }

    /// Whether this operator accepts a multi-valued operand (`IN`/`RANGE` family).
    pub fn accepts_multi(self) -> bool {
        matches!(self, Op::In | Op::NotIn | Op::Range | Op::NotRange)
    }

    /// Parse a canonical code, a conventional symbol, or fall back to `CUSTOM`
    /// for any other non-empty identifier (spec.md §6: "Unknown codes are
    /// valid at request time and are resolved against the registry at
    /// execution").
    pub fn parse(raw: &str) -> Result<(Op, Option<String>), crate::error::FilterDefinitionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(crate::error::FilterDefinitionError::BlankOperator {
                key: String::new(),
            });
        }
        let upper = trimmed.to_ascii_uppercase();
        for op in ALL {
            if op.code() == upper || op.symbol().eq_ignore_ascii_case(trimmed) {
                if *op == Op::Custom {
                    continue;
                }
                return Ok((*op, None));
            }
        }
        Ok((Op::Custom, Some(upper)))
    }
}

pub const ALL: &[Op] = &[
    Op::Eq,
    Op::Ne,
    Op::Gt,
    Op::Gte,
    Op::Lt,
    Op::Lte,
    Op::Matches,
    Op::NotMatches,
    Op::In,
    Op::NotIn,
    Op::IsNull,
    Op::NotNull,
    Op::Range,
    Op::NotRange,
    Op::Custom,
];

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Op {
    type Err = crate::error::FilterDefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Op::parse(s).map(|(op, _)| op)
    }
}
