use std::fmt;

use crate::containers::StorageKey;
use crate::engine::clause::ClauseId;
use crate::engine::variables::Var;
use crate::math::Rational;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct BoundId(pub(crate) u32);

impl StorageKey for BoundId {
    fn index(&self) -> usize {
        self.0 as usize
    }

    fn create_from_index(index: usize) -> Self {
        BoundId(index as u32)
    }
}

/// Why a bound was installed. Axioms come from the input units and split decisions, clause and
/// definition justifications record which constraint tightened the variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Justification {
    Axiom,
    Assumption,
    Clause(ClauseId),
    VarDef(Var),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BoundKind {
    Numeric {
        value: Rational,
        lower: bool,
        open: bool,
    },
    Bool {
        negated: bool,
    },
}

/// One entry of a node's bound trail. `prev` links to the bound installed before this one on the
/// same node or an ancestor, forming a LIFO chain shared by the whole subtree.
#[derive(Debug, Clone)]
pub(crate) struct Bound {
    pub(crate) var: Var,
    pub(crate) kind: BoundKind,
    pub(crate) timestamp: u64,
    pub(crate) prev: Option<BoundId>,
    pub(crate) justification: Justification,
}

impl Bound {
    pub(crate) fn value(&self) -> &Rational {
        match &self.kind {
            BoundKind::Numeric { value, .. } => value,
            BoundKind::Bool { .. } => unreachable!("boolean bounds carry no numeral"),
        }
    }

    pub(crate) fn is_lower(&self) -> bool {
        match &self.kind {
            BoundKind::Numeric { lower, .. } => *lower,
            BoundKind::Bool { .. } => unreachable!("boolean bounds carry no numeral"),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        match &self.kind {
            BoundKind::Numeric { open, .. } => *open,
            BoundKind::Bool { .. } => unreachable!("boolean bounds carry no numeral"),
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            BoundKind::Numeric {
                value,
                lower: true,
                open,
            } => write!(f, "{} <{} {}", value, if *open { "" } else { "=" }, self.var),
            BoundKind::Numeric {
                value,
                lower: false,
                open,
            } => write!(f, "{} <{} {}", self.var, if *open { "" } else { "=" }, value),
            BoundKind::Bool { negated: false } => write!(f, "{}", self.var),
            BoundKind::Bool { negated: true } => write!(f, "not {}", self.var),
        }
    }
}
