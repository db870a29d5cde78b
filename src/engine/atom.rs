use std::fmt;

use crate::containers::StorageKey;
use crate::engine::evaluate::LitView;
use crate::engine::evaluate::LitViewKind;
use crate::engine::variables::Var;
use crate::math::Rational;

/// Handle to an atom allocated in the constraint store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AtomId(pub(crate) u32);

impl StorageKey for AtomId {
    fn index(&self) -> usize {
        self.0 as usize
    }

    fn create_from_index(index: usize) -> Self {
        AtomId(index as u32)
    }
}

/// A leaf formula over a single variable.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Atom {
    pub(crate) var: Var,
    pub(crate) kind: AtomKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AtomKind {
    /// `x` or `not x` for a boolean variable.
    Bool { negated: bool },
    /// `x = k` or `x != k`.
    Eq { value: Rational, negated: bool },
    /// `x >= k` (`lower`, possibly strict) or `x <= k` (possibly strict).
    Ineq {
        value: Rational,
        lower: bool,
        open: bool,
    },
}

impl Atom {
    /// Boolean and equality atoms sort ahead of inequalities in clauses.
    pub(crate) fn is_boolish(&self) -> bool {
        matches!(self.kind, AtomKind::Bool { .. } | AtomKind::Eq { .. })
    }

    pub(crate) fn view(&self) -> LitView<'_> {
        let kind = match &self.kind {
            AtomKind::Bool { negated } => LitViewKind::Bool { negated: *negated },
            AtomKind::Eq { value, negated } => LitViewKind::Eq {
                value,
                negated: *negated,
            },
            AtomKind::Ineq { value, lower, open } => LitViewKind::Ineq {
                value,
                lower: *lower,
                open: *open,
            },
        };
        LitView {
            var: self.var,
            kind,
        }
    }
}

/// Lower bounds print as `k <= x`, upper bounds as `x <= k`, matching the notation of bound and
/// task-literal display.
impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AtomKind::Bool { negated: false } => write!(f, "{}", self.var),
            AtomKind::Bool { negated: true } => write!(f, "not {}", self.var),
            AtomKind::Eq {
                value,
                negated: false,
            } => write!(f, "{} = {}", self.var, value),
            AtomKind::Eq {
                value,
                negated: true,
            } => write!(f, "{} != {}", self.var, value),
            AtomKind::Ineq {
                value,
                lower: true,
                open,
            } => write!(f, "{} <{} {}", value, if *open { "" } else { "=" }, self.var),
            AtomKind::Ineq {
                value,
                lower: false,
                open,
            } => write!(f, "{} <{} {}", self.var, if *open { "" } else { "=" }, value),
        }
    }
}
