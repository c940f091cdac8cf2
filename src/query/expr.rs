//! Deferred attribute comparisons
//!
//! A `Condition` is the value produced by comparing a schema attribute handle
//! against an operand. It has no behavior of its own; the query builder
//! accumulates conditions and each backend translates them into its wire
//! format at dispatch time.

use serde::{Deserialize, Serialize};

use crate::schema::fields::Value;

/// Comparison kinds supported by the query language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// A single deferred comparison: `field OP value`, bound to the collection
/// that declared the attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub collection: String,
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}
