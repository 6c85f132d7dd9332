//! TriggerRule / Predicate data model (C6). See spec §3, §4.6, §9.
//!
//! Parsing a raw `(field, op, literal)` triple into a typed `FieldId` happens in
//! `trigger::rule` — this module only carries the validated, in-memory shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

impl Op {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ">" => Some(Op::Gt),
            ">=" => Some(Op::Gte),
            "<" => Some(Op::Lt),
            "<=" => Some(Op::Lte),
            "==" => Some(Op::Eq),
            _ => None,
        }
    }

    /// Comparison over the spec's `Ratio` domain where `+inf` compares greater
    /// than every finite literal (spec §4.6, §9).
    pub fn eval(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Op::Gt => lhs > rhs,
            Op::Gte => lhs >= rhs,
            Op::Lt => lhs < rhs,
            Op::Lte => lhs <= rhs,
            Op::Eq => lhs == rhs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPredicate {
    pub field: String,
    pub op: String,
    pub literal: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTriggerRule {
    pub name: String,
    pub enabled: bool,
    pub conditions: Vec<RawPredicate>,
}
