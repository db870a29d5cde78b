use num_traits::Zero;

use crate::containers::KeyedVec;
use crate::engine::atom::Atom;
use crate::engine::atom::AtomId;
use crate::engine::atom::AtomKind;
use crate::engine::clause::Clause;
use crate::engine::clause::ClauseId;
use crate::engine::definition::Definition;
use crate::engine::definition::Monomial;
use crate::engine::definition::Polynomial;
use crate::engine::definition::Power;
use crate::engine::variables::Var;
use crate::math::Rational;
use crate::paver_assert_moderate;
use crate::paver_assert_simple;

/// An element of a variable's watch list: a clause mentioning the variable, or an auxiliary
/// variable whose definition mentions it. Two watched literals are not enough here because the
/// propagator processes many nodes, so every occurrence is watched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Watched {
    Clause(ClauseId),
    Definition(Var),
}

/// The problem description: variables, definitions, atoms, unit axioms and clauses. The store is
/// immutable during paving; all per-node state lives in the tree.
#[derive(Debug, Default)]
pub(crate) struct ConstraintStore {
    is_int: KeyedVec<Var, bool>,
    is_bool: KeyedVec<Var, bool>,
    definitions: KeyedVec<Var, Option<Definition>>,
    watchers: KeyedVec<Var, Vec<Watched>>,
    atoms: KeyedVec<AtomId, Atom>,
    clauses: KeyedVec<ClauseId, Clause>,
    /// Unit clauses, each tagged with whether it is an axiom (as opposed to an assumption).
    units: Vec<(AtomId, bool)>,
}

impl ConstraintStore {
    pub(crate) fn num_vars(&self) -> usize {
        self.is_int.len()
    }

    pub(crate) fn vars(&self) -> impl Iterator<Item = Var> {
        (0..self.num_vars() as u32).map(Var)
    }

    pub(crate) fn is_int(&self, x: Var) -> bool {
        self.is_int[x]
    }

    pub(crate) fn is_bool(&self, x: Var) -> bool {
        self.is_bool[x]
    }

    pub(crate) fn definition(&self, x: Var) -> Option<&Definition> {
        self.definitions[x].as_ref()
    }

    pub(crate) fn is_definition(&self, x: Var) -> bool {
        self.definitions[x].is_some()
    }

    pub(crate) fn watchers(&self, x: Var) -> &[Watched] {
        &self.watchers[x]
    }

    pub(crate) fn atom(&self, a: AtomId) -> &Atom {
        &self.atoms[a]
    }

    pub(crate) fn clause(&self, c: ClauseId) -> &Clause {
        &self.clauses[c]
    }

    pub(crate) fn clause_ids(&self) -> impl Iterator<Item = ClauseId> {
        (0..self.clauses.len() as u32).map(ClauseId)
    }

    pub(crate) fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub(crate) fn units(&self) -> &[(AtomId, bool)] {
        &self.units
    }

    pub(crate) fn mk_var(&mut self, is_int: bool) -> Var {
        let x = self.is_int.push(is_int);
        let _ = self.is_bool.push(false);
        let _ = self.definitions.push(None);
        let _ = self.watchers.push(Vec::new());
        x
    }

    pub(crate) fn mk_bvar(&mut self) -> Var {
        let x = self.is_int.push(false);
        let _ = self.is_bool.push(true);
        let _ = self.definitions.push(None);
        let _ = self.watchers.push(Vec::new());
        x
    }

    /// Create the monomial `powers[0].var^d0 * ...` as a fresh variable. The new variable is
    /// integer-sorted iff all operands are.
    pub(crate) fn mk_monomial(&mut self, powers: Vec<Power>) -> Var {
        paver_assert_simple!(!powers.is_empty());
        paver_assert_simple!(powers.iter().all(|p| p.degree >= 1));
        paver_assert_simple!(powers.iter().all(|p| !self.is_bool(p.var)));

        let monomial = Monomial::new(powers);
        paver_assert_moderate!(
            monomial.powers().windows(2).all(|w| w[0].var < w[1].var),
            "monomial operands must be distinct"
        );
        let is_int = monomial.powers().iter().all(|p| self.is_int(p.var));
        let y = self.mk_var(is_int);
        for p in monomial.powers() {
            self.watchers[p.var].push(Watched::Definition(y));
        }
        self.definitions[y] = Some(Definition::Monomial(monomial));
        y
    }

    /// Create the sum `as[0]*xs[0] + ...` as a fresh variable. The new variable is integer-sorted
    /// iff all operands and coefficients are.
    pub(crate) fn mk_sum(&mut self, terms: Vec<(Rational, Var)>) -> Var {
        paver_assert_simple!(!terms.is_empty());
        paver_assert_simple!(terms.iter().all(|(a, _)| !a.is_zero()));
        paver_assert_simple!(terms.iter().all(|(_, x)| !self.is_bool(*x)));

        let polynomial = Polynomial::new(terms);
        let is_int = polynomial
            .terms()
            .iter()
            .all(|(a, x)| self.is_int(*x) && a.is_integer());
        let y = self.mk_var(is_int);
        for (_, x) in polynomial.terms() {
            self.watchers[*x].push(Watched::Definition(y));
        }
        self.definitions[y] = Some(Definition::Polynomial(polynomial));
        y
    }

    pub(crate) fn mk_bool_atom(&mut self, x: Var, negated: bool) -> AtomId {
        paver_assert_simple!(self.is_bool(x));
        self.atoms.push(Atom {
            var: x,
            kind: AtomKind::Bool { negated },
        })
    }

    pub(crate) fn mk_eq_atom(&mut self, x: Var, value: Rational, negated: bool) -> AtomId {
        paver_assert_simple!(!self.is_bool(x));
        self.atoms.push(Atom {
            var: x,
            kind: AtomKind::Eq { value, negated },
        })
    }

    pub(crate) fn mk_ineq_atom(&mut self, x: Var, value: Rational, lower: bool, open: bool) -> AtomId {
        paver_assert_simple!(!self.is_bool(x));
        self.atoms.push(Atom {
            var: x,
            kind: AtomKind::Ineq { value, lower, open },
        })
    }

    /// Assert the disjunction of the given atoms. A single atom becomes a unit axiom; larger
    /// clauses are sorted and entered into the watch list of every distinct variable they
    /// mention.
    pub(crate) fn add_clause(&mut self, atoms: &[AtomId]) {
        paver_assert_simple!(!atoms.is_empty());
        if atoms.len() == 1 {
            self.units.push((atoms[0], true));
            return;
        }

        let mut sorted = atoms.to_vec();
        sorted.sort_by_key(|&a| {
            let atom = &self.atoms[a];
            (!atom.is_boolish(), atom.var)
        });

        let mut watched_vars: Vec<Var> = sorted.iter().map(|&a| self.atoms[a].var).collect();
        watched_vars.sort();
        watched_vars.dedup();

        let c = self.clauses.push(Clause::new(sorted));
        for x in watched_vars {
            self.watchers[x].push(Watched::Clause(c));
        }
    }

    pub(crate) fn monomial(&self, x: Var) -> &Monomial {
        match self.definition(x) {
            Some(Definition::Monomial(m)) => m,
            _ => unreachable!("{x} is not defined by a monomial"),
        }
    }

    pub(crate) fn polynomial(&self, x: Var) -> &Polynomial {
        match self.definition(x) {
            Some(Definition::Polynomial(p)) => p,
            _ => unreachable!("{x} is not defined by a polynomial"),
        }
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;

    use super::*;

    fn rat(n: i64) -> Rational {
        Rational::from_integer(BigInt::from(n))
    }

    #[test]
    fn monomials_watch_every_operand() {
        let mut store = ConstraintStore::default();
        let x = store.mk_var(false);
        let y = store.mk_var(false);
        let m = store.mk_monomial(vec![Power::new(y, 2), Power::new(x, 1)]);

        assert_eq!(store.watchers(x), &[Watched::Definition(m)]);
        assert_eq!(store.watchers(y), &[Watched::Definition(m)]);
        // operands end up sorted by variable
        assert_eq!(store.monomial(m).powers()[0].var, x);
    }

    #[test]
    fn integer_sortedness_of_definitions() {
        let mut store = ConstraintStore::default();
        let i = store.mk_var(true);
        let r = store.mk_var(false);

        let int_product = store.mk_monomial(vec![Power::new(i, 2)]);
        let mixed_product = store.mk_monomial(vec![Power::new(i, 1), Power::new(r, 1)]);
        assert!(store.is_int(int_product));
        assert!(!store.is_int(mixed_product));

        let int_sum = store.mk_sum(vec![(rat(2), i)]);
        let rational_sum = store.mk_sum(vec![(Rational::new(BigInt::from(1), BigInt::from(2)), i)]);
        assert!(store.is_int(int_sum));
        assert!(!store.is_int(rational_sum));
    }

    #[test]
    fn singleton_clauses_become_unit_axioms() {
        let mut store = ConstraintStore::default();
        let x = store.mk_var(false);
        let a = store.mk_ineq_atom(x, rat(0), true, false);
        store.add_clause(&[a]);

        assert_eq!(store.units(), &[(a, true)]);
        assert_eq!(store.num_clauses(), 0);
    }

    #[test]
    fn clause_watch_lists_are_deduplicated() {
        let mut store = ConstraintStore::default();
        let x = store.mk_var(false);
        let y = store.mk_var(false);
        let a1 = store.mk_ineq_atom(x, rat(0), true, false);
        let a2 = store.mk_ineq_atom(x, rat(5), false, false);
        let a3 = store.mk_ineq_atom(y, rat(1), true, true);
        store.add_clause(&[a1, a2, a3]);

        assert_eq!(store.watchers(x).len(), 1);
        assert_eq!(store.watchers(y).len(), 1);
    }

    #[test]
    fn clause_atoms_are_sorted_boolean_first() {
        let mut store = ConstraintStore::default();
        let b = store.mk_bvar();
        let x = store.mk_var(false);
        let ineq = store.mk_ineq_atom(x, rat(1), true, false);
        let bool_atom = store.mk_bool_atom(b, false);
        store.add_clause(&[ineq, bool_atom]);

        let clause = store.clause(ClauseId(0));
        assert_eq!(clause.atom(0), bool_atom);
        assert_eq!(clause.atom(1), ineq);
    }
}
