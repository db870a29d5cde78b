//! Truth valuation of atoms and task literals under a node's bounds.

use crate::engine::node::BValue;
use crate::engine::node::NodeId;
use crate::engine::store::ConstraintStore;
use crate::engine::tree::PavingTree;
use crate::engine::variables::Var;
use crate::math::Rational;
use crate::paver_assert_moderate;

/// A borrowed view of an atom or task literal, so both share one valuation routine.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LitView<'a> {
    pub(crate) var: Var,
    pub(crate) kind: LitViewKind<'a>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum LitViewKind<'a> {
    Bool {
        negated: bool,
    },
    Eq {
        value: &'a Rational,
        negated: bool,
    },
    Ineq {
        value: &'a Rational,
        lower: bool,
        open: bool,
    },
}

/// Decide a literal at `n`: `Some(true)`/`Some(false)` when the bounds force a verdict, `None`
/// when it is still undetermined.
pub(crate) fn value_of(
    store: &ConstraintStore,
    tree: &PavingTree,
    n: NodeId,
    lit: LitView<'_>,
) -> Option<bool> {
    let x = lit.var;
    match lit.kind {
        LitViewKind::Bool { negated } => {
            let bvalue = tree.bvalue(n, x);
            paver_assert_moderate!(bvalue != BValue::Arith);
            match bvalue {
                BValue::Undef => None,
                BValue::True => Some(!negated),
                BValue::False => Some(negated),
                // a conflicting node is never evaluated, but stay total
                _ => None,
            }
        }
        LitViewKind::Eq { value, negated } => {
            if store.is_int(x) && !value.is_integer() {
                return Some(negated);
            }
            let lower = tree.lower(n, x).map(|b| tree.bound(b));
            let upper = tree.upper(n, x).map(|b| tree.bound(b));
            if lower.is_none() && upper.is_none() {
                return None;
            }
            if let (Some(l), Some(u)) = (&lower, &upper) {
                if l.value() == value && u.value() == value && !l.is_open() && !u.is_open() {
                    return Some(!negated);
                }
            }
            if let Some(u) = &upper {
                if u.value() < value || (u.is_open() && u.value() == value) {
                    return Some(negated);
                }
            }
            if let Some(l) = &lower {
                if l.value() > value || (l.is_open() && l.value() == value) {
                    return Some(negated);
                }
            }
            None
        }
        LitViewKind::Ineq { value, lower, open } => {
            let l = tree.lower(n, x).map(|b| tree.bound(b));
            let u = tree.upper(n, x).map(|b| tree.bound(b));
            if l.is_none() && u.is_none() {
                return None;
            }
            if lower {
                // x >= value (or > when open)
                if let Some(u) = &u {
                    if u.value() < value || ((u.is_open() || open) && u.value() == value) {
                        return Some(false);
                    }
                }
                if let Some(l) = &l {
                    if l.value() > value || ((l.is_open() || !open) && l.value() == value) {
                        return Some(true);
                    }
                }
                None
            } else {
                // x <= value (or < when open)
                if let Some(l) = &l {
                    if l.value() > value || ((l.is_open() || open) && l.value() == value) {
                        return Some(false);
                    }
                }
                if let Some(u) = &u {
                    if u.value() < value || ((u.is_open() || !open) && u.value() == value) {
                        return Some(true);
                    }
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;

    use super::*;
    use crate::engine::bound::Justification;

    fn rat(n: i64) -> Rational {
        Rational::from_integer(BigInt::from(n))
    }

    fn ratio(n: i64, d: i64) -> Rational {
        Rational::new(BigInt::from(n), BigInt::from(d))
    }

    fn setup(is_int: bool) -> (ConstraintStore, PavingTree, NodeId, Var) {
        let mut store = ConstraintStore::default();
        let x = store.mk_var(is_int);
        let mut tree = PavingTree::default();
        let root = tree.mk_root(vec![BValue::Arith]);
        (store, tree, root, x)
    }

    fn eval(
        store: &ConstraintStore,
        tree: &PavingTree,
        n: NodeId,
        x: Var,
        kind: LitViewKind<'_>,
    ) -> Option<bool> {
        value_of(store, tree, n, LitView { var: x, kind })
    }

    #[test]
    fn inequality_is_decided_by_bounds() {
        let (store, mut tree, n, x) = setup(false);
        let _ = tree
            .mk_bound(n, x, rat(3), true, false, Justification::Axiom)
            .unwrap();

        let two = rat(2);
        let five = rat(5);
        // x >= 3 makes x >= 2 true and x < 2 false
        assert_eq!(
            eval(&store, &tree, n, x, LitViewKind::Ineq { value: &two, lower: true, open: false }),
            Some(true)
        );
        assert_eq!(
            eval(&store, &tree, n, x, LitViewKind::Ineq { value: &two, lower: false, open: true }),
            Some(false)
        );
        // x <= 5 is still open
        assert_eq!(
            eval(&store, &tree, n, x, LitViewKind::Ineq { value: &five, lower: false, open: false }),
            None
        );
    }

    #[test]
    fn strictness_matters_at_the_boundary() {
        let (store, mut tree, n, x) = setup(false);
        let _ = tree
            .mk_bound(n, x, rat(3), true, false, Justification::Axiom)
            .unwrap();

        let three = rat(3);
        // with lower bound x >= 3: `x >= 3` holds but `x > 3` is undetermined
        assert_eq!(
            eval(&store, &tree, n, x, LitViewKind::Ineq { value: &three, lower: true, open: false }),
            Some(true)
        );
        assert_eq!(
            eval(&store, &tree, n, x, LitViewKind::Ineq { value: &three, lower: true, open: true }),
            None
        );
    }

    #[test]
    fn non_integer_equality_on_an_integer_variable() {
        let (store, tree, n, x) = setup(true);
        let half = ratio(1, 2);
        assert_eq!(
            eval(&store, &tree, n, x, LitViewKind::Eq { value: &half, negated: false }),
            Some(false)
        );
        assert_eq!(
            eval(&store, &tree, n, x, LitViewKind::Eq { value: &half, negated: true }),
            Some(true)
        );
    }

    #[test]
    fn collapsed_interval_decides_equality() {
        let (store, mut tree, n, x) = setup(false);
        let _ = tree
            .mk_bound(n, x, rat(7), true, false, Justification::Axiom)
            .unwrap();
        let _ = tree
            .mk_bound(n, x, rat(7), false, false, Justification::Axiom)
            .unwrap();

        let seven = rat(7);
        let eight = rat(8);
        assert_eq!(
            eval(&store, &tree, n, x, LitViewKind::Eq { value: &seven, negated: false }),
            Some(true)
        );
        assert_eq!(
            eval(&store, &tree, n, x, LitViewKind::Eq { value: &eight, negated: false }),
            Some(false)
        );
        assert_eq!(
            eval(&store, &tree, n, x, LitViewKind::Eq { value: &eight, negated: true }),
            Some(true)
        );
    }

    #[test]
    fn boolean_valuation_follows_the_assignment() {
        let mut store = ConstraintStore::default();
        let b = store.mk_bvar();
        let mut tree = PavingTree::default();
        let n = tree.mk_root(vec![BValue::Undef]);

        assert_eq!(eval(&store, &tree, n, b, LitViewKind::Bool { negated: false }), None);

        let _ = tree.mk_bool_bound(n, b, false, Justification::Axiom).unwrap();
        assert_eq!(
            eval(&store, &tree, n, b, LitViewKind::Bool { negated: false }),
            Some(true)
        );
        assert_eq!(
            eval(&store, &tree, n, b, LitViewKind::Bool { negated: true }),
            Some(false)
        );
    }
}
