//! Interval constraint propagation.
//!
//! The propagator drains a queue of freshly installed bounds for one node, revisiting the
//! watchers of each bound's variable: clauses run unit-literal propagation, definitions are
//! tightened upward and downward. Constraints remember the timestamp of their last visit so a
//! bound older than that visit cannot re-trigger them.

use std::time::Duration;
use std::time::Instant;

use num_traits::One;
use num_traits::Signed;
use num_traits::Zero;

use crate::containers::KeyedVec;
use crate::engine::atom::AtomKind;
use crate::engine::bound::BoundId;
use crate::engine::bound::Justification;
use crate::engine::clause::ClauseId;
use crate::engine::definition::Definition;
use crate::engine::evaluate::value_of;
use crate::engine::node::NodeId;
use crate::engine::store::ConstraintStore;
use crate::engine::store::Watched;
use crate::engine::tree::PavingTree;
use crate::engine::variables::Var;
use crate::error::EngineError;
use crate::math::Interval;
use crate::math::Rational;
use crate::options::Numerics;
use crate::paver_assert_simple;
use crate::termination::TerminationCondition;

/// Everything a propagation pass needs besides the propagator's own state.
pub(crate) struct PropagationContext<'a> {
    pub(crate) store: &'a ConstraintStore,
    pub(crate) tree: &'a mut PavingTree,
    pub(crate) numerics: &'a Numerics,
    pub(crate) termination: &'a mut dyn TerminationCondition,
}

/// Poll the driver's termination condition; raised at the top of every propagation iteration and
/// before each long loop.
pub(crate) fn checkpoint(termination: &mut dyn TerminationCondition) -> Result<(), EngineError> {
    if termination.should_stop() {
        Err(EngineError::Cancelled)
    } else {
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct Propagator {
    queue: Vec<BoundId>,
    qhead: usize,
    clause_visits: KeyedVec<ClauseId, u64>,
    definition_visits: KeyedVec<Var, u64>,
    /// Per-call ceiling on processed bounds.
    max_propagations: u32,
    num_propagations: u32,
    root_time_budget: Duration,
    time_budget: Duration,
    /// Set when an interval operation failed; the constraint was skipped, which only loses a
    /// tightening and never soundness.
    arith_failed: bool,
    num_visited: u64,
}

impl Default for Propagator {
    fn default() -> Self {
        Propagator {
            queue: Vec::new(),
            qhead: 0,
            clause_visits: KeyedVec::default(),
            definition_visits: KeyedVec::default(),
            max_propagations: 256,
            num_propagations: 0,
            root_time_budget: Duration::from_secs(20),
            time_budget: Duration::from_secs(10),
            arith_failed: false,
            num_visited: 0,
        }
    }
}

impl Propagator {
    /// Size the per-call propagation budget to the problem.
    pub(crate) fn configure(&mut self, num_vars: usize) {
        self.max_propagations = (num_vars as u32).clamp(256, 1024);
    }

    pub(crate) fn arith_failed(&self) -> bool {
        self.arith_failed
    }

    pub(crate) fn num_visited(&self) -> u64 {
        self.num_visited
    }

    pub(crate) fn last_propagation_count(&self) -> u32 {
        self.num_propagations
    }

    pub(crate) fn enqueue(&mut self, b: BoundId) {
        self.queue.push(b);
    }

    /// Drain the bound queue for `n`. Stops on conflict, exhaustion, the per-call propagation
    /// budget, or the wall-clock budget (the root gets a larger one).
    pub(crate) fn propagate(
        &mut self,
        cx: &mut PropagationContext<'_>,
        n: NodeId,
    ) -> Result<(), EngineError> {
        self.num_propagations = 0;
        let started = Instant::now();
        let budget = if cx.tree.root() == Some(n) {
            self.root_time_budget
        } else {
            self.time_budget
        };
        while !cx.tree.node(n).inconsistent() && self.qhead < self.queue.len() {
            if self.num_propagations >= self.max_propagations {
                break;
            }
            if started.elapsed() > budget {
                break;
            }
            checkpoint(cx.termination)?;
            let b = self.queue[self.qhead];
            self.qhead += 1;
            if cx.store.is_bool(cx.tree.bound(b).var) {
                self.propagate_bool_watchers(cx, n, b)?;
            } else {
                self.propagate_watchers(cx, n, b)?;
            }
        }
        self.queue.clear();
        self.qhead = 0;
        Ok(())
    }

    /// Revisit the watchers of a numeric bound's variable, and finally the variable's own
    /// definition.
    fn propagate_watchers(
        &mut self,
        cx: &mut PropagationContext<'_>,
        n: NodeId,
        b: BoundId,
    ) -> Result<(), EngineError> {
        let store = cx.store;
        let x = cx.tree.bound(b).var;
        let timestamp = cx.tree.bound(b).timestamp;
        if !cx.tree.is_latest_bound(n, x, timestamp) {
            // a later bound superseded this entry
            return Ok(());
        }
        self.num_propagations += 1;
        for i in 0..store.watchers(x).len() {
            if cx.tree.node(n).inconsistent() {
                return Ok(());
            }
            match store.watchers(x)[i] {
                Watched::Clause(c) => {
                    if timestamp >= self.clause_visit(c) {
                        self.propagate_clause(cx, c, n)?;
                    }
                }
                Watched::Definition(y) => {
                    if timestamp >= self.definition_visit(y) {
                        self.propagate_definition(cx, y, n)?;
                    }
                }
            }
        }
        if cx.tree.node(n).inconsistent() {
            return Ok(());
        }
        if store.is_definition(x) && timestamp >= self.definition_visit(x) {
            self.propagate_definition(cx, x, n)?;
        }
        Ok(())
    }

    /// Boolean variables are only watched by clauses.
    fn propagate_bool_watchers(
        &mut self,
        cx: &mut PropagationContext<'_>,
        n: NodeId,
        b: BoundId,
    ) -> Result<(), EngineError> {
        let store = cx.store;
        let x = cx.tree.bound(b).var;
        self.num_propagations += 1;
        for i in 0..store.watchers(x).len() {
            if cx.tree.node(n).inconsistent() {
                return Ok(());
            }
            match store.watchers(x)[i] {
                Watched::Clause(c) => self.propagate_clause(cx, c, n)?,
                Watched::Definition(_) => {
                    paver_assert_simple!(false, "boolean variables have no definition watchers");
                }
            }
        }
        Ok(())
    }

    /// Unit-literal propagation: if all atoms but one are false, the remaining one must hold.
    /// A fully false clause forces a conflict through its first atom.
    fn propagate_clause(
        &mut self,
        cx: &mut PropagationContext<'_>,
        c: ClauseId,
        n: NodeId,
    ) -> Result<(), EngineError> {
        let store = cx.store;
        self.num_visited += 1;
        self.set_clause_visit(c, cx.tree.timestamp());

        let len = store.clause(c).len();
        let mut undetermined = None;
        for i in 0..len {
            let a = store.clause(c).atom(i);
            match value_of(store, cx.tree, n, store.atom(a).view()) {
                Some(true) => return Ok(()),
                Some(false) => {}
                None => {
                    if undetermined.is_some() {
                        // more than one unassigned literal, nothing to propagate
                        return Ok(());
                    }
                    undetermined = Some(a);
                }
            }
        }

        let chosen = match undetermined {
            Some(a) => {
                cx.tree.node_mut(n).up_atoms.push(a);
                a
            }
            None => store.clause(c).atom(0),
        };

        let atom = store.atom(chosen);
        let x = atom.var;
        match &atom.kind {
            AtomKind::Bool { negated } => {
                self.propagate_bool_bound(cx, x, *negated, n, Justification::Clause(c))?;
            }
            AtomKind::Eq { value, negated } => {
                if !negated {
                    let value = value.clone();
                    self.propagate_bound(cx, x, value.clone(), true, false, n, Justification::Clause(c))?;
                    if cx.tree.node(n).inconsistent() {
                        return Ok(());
                    }
                    self.propagate_bound(cx, x, value, false, false, n, Justification::Clause(c))?;
                }
            }
            AtomKind::Ineq { value, lower, open } => {
                let (value, lower, open) = (value.clone(), *lower, *open);
                self.propagate_bound(cx, x, value, lower, open, n, Justification::Clause(c))?;
            }
        }
        // A clause can propagate only once; bump the visit time again to spare another pass.
        self.set_clause_visit(c, cx.tree.timestamp());
        Ok(())
    }

    /// Create a numeric bound if it survives normalization and the improvement filter, and queue
    /// it for further propagation.
    pub(crate) fn propagate_bound(
        &mut self,
        cx: &mut PropagationContext<'_>,
        x: Var,
        value: Rational,
        lower: bool,
        open: bool,
        n: NodeId,
        justification: Justification,
    ) -> Result<(), EngineError> {
        let (value, open) = normalize_bound(cx.store, cx.numerics, x, value, lower, open);
        if !improves_bound(cx.tree, n, x, &value, lower, open) {
            return Ok(());
        }
        let b = cx.tree.mk_bound(n, x, value, lower, open, justification)?;
        self.queue.push(b);
        Ok(())
    }

    pub(crate) fn propagate_bool_bound(
        &mut self,
        cx: &mut PropagationContext<'_>,
        x: Var,
        negated: bool,
        n: NodeId,
        justification: Justification,
    ) -> Result<(), EngineError> {
        if !improves_bool_bound(cx.tree, n, x, negated) {
            return Ok(());
        }
        let b = cx.tree.mk_bool_bound(n, x, negated, justification)?;
        self.queue.push(b);
        Ok(())
    }

    pub(crate) fn propagate_definition(
        &mut self,
        cx: &mut PropagationContext<'_>,
        x: Var,
        n: NodeId,
    ) -> Result<(), EngineError> {
        self.num_visited += 1;
        match cx.store.definition(x) {
            Some(Definition::Monomial(_)) => self.propagate_monomial(cx, x, n),
            Some(Definition::Polynomial(_)) => self.propagate_polynomial(cx, x, n),
            None => Ok(()),
        }
    }

    /// Propagate `x = prod_i y_i^{d_i}`.
    fn propagate_monomial(
        &mut self,
        cx: &mut PropagationContext<'_>,
        x: Var,
        n: NodeId,
    ) -> Result<(), EngineError> {
        let store = cx.store;
        self.set_definition_visit(x, cx.tree.timestamp());
        let monomial = store.monomial(x);

        let mut found_zero = false;
        let mut found_unbounded = false;
        for p in monomial.powers() {
            if cx.tree.is_zero(n, p.var) {
                found_zero = true;
            }
            if p.degree % 2 == 0 {
                // even powers always produce a lower bound, unbounded or not
                continue;
            }
            if cx.tree.is_unbounded(n, p.var) {
                found_unbounded = true;
            }
        }

        if found_zero {
            if !cx.tree.is_zero(n, x) {
                self.propagate_bound(
                    cx,
                    x,
                    Rational::zero(),
                    true,
                    false,
                    n,
                    Justification::VarDef(x),
                )?;
                if cx.tree.node(n).inconsistent() {
                    return Ok(());
                }
                self.propagate_bound(
                    cx,
                    x,
                    Rational::zero(),
                    false,
                    false,
                    n,
                    Justification::VarDef(x),
                )?;
            }
            // a pinned zero factor settles the product, no downward pass
            return Ok(());
        }

        let x_unbounded = cx.tree.is_unbounded(n, x);
        if !found_unbounded {
            self.propagate_monomial_upward(cx, x, n)?;
        }
        if cx.tree.node(n).inconsistent() {
            return Ok(());
        }
        if x_unbounded {
            return Ok(());
        }

        // Downward pass: prefer the unique factor whose interval spans zero, otherwise try all.
        let size = store.monomial(x).len();
        let mut zero_pos = None;
        for (i, p) in store.monomial(x).powers().iter().enumerate() {
            if cx.tree.interval_of(n, p.var).contains_zero() {
                if zero_pos.is_some() {
                    // two factors span zero, division cannot isolate either
                    return Ok(());
                }
                zero_pos = Some(i);
            }
        }
        match zero_pos {
            Some(i) => self.propagate_monomial_downward(cx, x, n, i)?,
            None => {
                for i in 0..size {
                    if cx.tree.node(n).inconsistent() {
                        return Ok(());
                    }
                    self.propagate_monomial_downward(cx, x, n, i)?;
                }
            }
        }
        Ok(())
    }

    fn propagate_monomial_upward(
        &mut self,
        cx: &mut PropagationContext<'_>,
        x: Var,
        n: NodeId,
    ) -> Result<(), EngineError> {
        let store = cx.store;
        let mut product: Option<Interval> = None;
        for p in store.monomial(x).powers() {
            let factor = cx.tree.interval_of(n, p.var).powi(p.degree);
            product = Some(match product {
                None => factor,
                Some(r) => r.mul(&factor),
            });
        }
        let product = product.unwrap_or_else(Interval::unbounded);
        self.propagate_interval(cx, x, n, product, Justification::VarDef(x))
    }

    /// Isolate the `j`-th factor: divide the product's interval by the remaining factors and take
    /// the root of the factor's degree. Degree-2 roots need a non-negative quotient; higher
    /// degrees are conservatively skipped.
    fn propagate_monomial_downward(
        &mut self,
        cx: &mut PropagationContext<'_>,
        x: Var,
        n: NodeId,
        j: usize,
    ) -> Result<(), EngineError> {
        let store = cx.store;
        let monomial = store.monomial(x);
        paver_assert_simple!(j < monomial.len());

        let mut quotient = if monomial.len() > 1 {
            let mut divisor: Option<Interval> = None;
            for (i, p) in monomial.powers().iter().enumerate() {
                if i == j {
                    continue;
                }
                let factor = cx.tree.interval_of(n, p.var).powi(p.degree);
                divisor = Some(match divisor {
                    None => factor,
                    Some(d) => d.mul(&factor),
                });
            }
            let divisor = divisor.unwrap_or_else(Interval::unbounded);
            if divisor.contains_zero() {
                Interval::unbounded()
            } else {
                match cx.tree.interval_of(n, x).div(&divisor) {
                    Ok(q) => q,
                    Err(_) => {
                        self.arith_failed = true;
                        return Ok(());
                    }
                }
            }
        } else {
            cx.tree.interval_of(n, x)
        };

        let degree = monomial.powers()[j].degree;
        if degree > 1 {
            if degree % 2 == 0 && quotient.lower_is_negative() {
                // an even root of a negative quotient has no real solution to isolate
                return Ok(());
            }
            if degree > 2 {
                return Ok(());
            }
            quotient = match quotient.nth_root(degree, cx.numerics.root_precision) {
                Ok(q) => q,
                Err(_) => {
                    self.arith_failed = true;
                    return Ok(());
                }
            };
        }

        let y = monomial.powers()[j].var;
        self.propagate_interval(cx, y, n, quotient, Justification::VarDef(x))
    }

    /// Propagate `x = sum_i a_i * y_i`. With two or more unbounded participants nothing can be
    /// inferred; with exactly one, only that one is isolated.
    fn propagate_polynomial(
        &mut self,
        cx: &mut PropagationContext<'_>,
        x: Var,
        n: NodeId,
    ) -> Result<(), EngineError> {
        let store = cx.store;
        self.set_definition_visit(x, cx.tree.timestamp());

        let mut unbounded = None;
        if cx.tree.is_unbounded(n, x) {
            unbounded = Some(x);
        }
        for (_, y) in store.polynomial(x).terms() {
            if cx.tree.is_unbounded(n, *y) {
                if unbounded.is_some() && unbounded != Some(*y) {
                    return Ok(());
                }
                unbounded = Some(*y);
            }
        }

        if let Some(target) = unbounded {
            return self.propagate_polynomial_for(cx, x, n, target);
        }

        self.propagate_polynomial_for(cx, x, n, x)?;
        for i in 0..store.polynomial(x).len() {
            if cx.tree.node(n).inconsistent() {
                return Ok(());
            }
            let y = store.polynomial(x).terms()[i].1;
            self.propagate_polynomial_for(cx, x, n, y)?;
        }
        Ok(())
    }

    /// Rewrite the defining sum of `x` to isolate `target` and propagate the resulting interval.
    fn propagate_polynomial_for(
        &mut self,
        cx: &mut PropagationContext<'_>,
        x: Var,
        n: NodeId,
        target: Var,
    ) -> Result<(), EngineError> {
        let store = cx.store;
        let polynomial = store.polynomial(x);

        let deduced = if target == x {
            let mut sum: Option<Interval> = None;
            for (a, y) in polynomial.terms() {
                let term = cx.tree.interval_of(n, *y).scale(a);
                sum = Some(match sum {
                    None => term,
                    Some(r) => r.add(&term),
                });
            }
            sum.unwrap_or_else(Interval::unbounded)
        } else {
            let mut rest = cx.tree.interval_of(n, x);
            let mut coefficient = None;
            for (a, y) in polynomial.terms() {
                if *y == target {
                    coefficient = Some(a.clone());
                } else {
                    rest = rest.sub(&cx.tree.interval_of(n, *y).scale(a));
                }
            }
            let Some(coefficient) = coefficient else {
                paver_assert_simple!(false, "{target} does not occur in the definition of {x}");
                return Ok(());
            };
            rest.scale(&coefficient.recip())
        };

        self.propagate_interval(cx, target, n, deduced, Justification::VarDef(x))
    }

    /// Install both sides of a deduced interval, subject to the relevance filter.
    fn propagate_interval(
        &mut self,
        cx: &mut PropagationContext<'_>,
        y: Var,
        n: NodeId,
        interval: Interval,
        justification: Justification,
    ) -> Result<(), EngineError> {
        if let Some(l) = interval.lower {
            if is_relevant_bound(cx.tree, cx.numerics, n, y, &l.value, true, l.open) {
                self.propagate_bound(cx, y, l.value, true, l.open, n, justification)?;
                if cx.tree.node(n).inconsistent() {
                    return Ok(());
                }
            }
        }
        if let Some(u) = interval.upper {
            if is_relevant_bound(cx.tree, cx.numerics, n, y, &u.value, false, u.open) {
                self.propagate_bound(cx, y, u.value, false, u.open, n, justification)?;
            }
        }
        Ok(())
    }

    /// Assert all unit clauses onto `n`.
    pub(crate) fn assert_units(
        &mut self,
        cx: &mut PropagationContext<'_>,
        n: NodeId,
    ) -> Result<(), EngineError> {
        for i in 0..cx.store.units().len() {
            checkpoint(cx.termination)?;
            let (a, axiom) = cx.store.units()[i];
            let justification = if axiom {
                Justification::Axiom
            } else {
                Justification::Assumption
            };
            let atom = cx.store.atom(a);
            let x = atom.var;
            match &atom.kind {
                AtomKind::Bool { negated } => {
                    self.propagate_bool_bound(cx, x, *negated, n, justification)?;
                }
                AtomKind::Eq { value, negated } => {
                    paver_assert_simple!(!negated, "unit disequalities are not asserted");
                    if !negated {
                        let value = value.clone();
                        self.propagate_bound(cx, x, value.clone(), true, false, n, justification)?;
                        if cx.tree.node(n).inconsistent() {
                            return Ok(());
                        }
                        self.propagate_bound(cx, x, value, false, false, n, justification)?;
                    }
                }
                AtomKind::Ineq { value, lower, open } => {
                    let (value, lower, open) = (value.clone(), *lower, *open);
                    self.propagate_bound(cx, x, value, lower, open, n, justification)?;
                }
            }
            if cx.tree.node(n).inconsistent() {
                break;
            }
        }
        Ok(())
    }

    /// One pass over every definition; used to seed the root.
    pub(crate) fn propagate_all_definitions(
        &mut self,
        cx: &mut PropagationContext<'_>,
        n: NodeId,
    ) -> Result<(), EngineError> {
        for x in cx.store.vars() {
            if cx.tree.node(n).inconsistent() {
                break;
            }
            if cx.store.is_definition(x) {
                self.propagate_definition(cx, x, n)?;
            }
        }
        Ok(())
    }

    fn clause_visit(&mut self, c: ClauseId) -> u64 {
        self.clause_visits.accomodate(c, 0);
        self.clause_visits[c]
    }

    fn set_clause_visit(&mut self, c: ClauseId, timestamp: u64) {
        self.clause_visits.accomodate(c, 0);
        self.clause_visits[c] = timestamp;
    }

    fn definition_visit(&mut self, x: Var) -> u64 {
        self.definition_visits.accomodate(x, 0);
        self.definition_visits[x]
    }

    fn set_definition_visit(&mut self, x: Var, timestamp: u64) {
        self.definition_visits.accomodate(x, 0);
        self.definition_visits[x] = timestamp;
    }
}

/// Round a bound to the variable's domain. Integer bounds are rounded toward the interior and
/// strict integer bounds close by stepping one unit. Real bounds with an oversized denominator
/// are relaxed outward to a coarser denominator and opened, which preserves soundness.
pub(crate) fn normalize_bound(
    store: &ConstraintStore,
    numerics: &Numerics,
    x: Var,
    value: Rational,
    lower: bool,
    open: bool,
) -> (Rational, bool) {
    if store.is_int(x) {
        let (mut value, was_open) = if value.is_integer() {
            (value, open)
        } else if lower {
            (value.ceil(), false)
        } else {
            (value.floor(), false)
        };
        if was_open {
            if lower {
                value += Rational::one();
            } else {
                value -= Rational::one();
            }
        }
        (value, false)
    } else if value.denom() > &numerics.max_denominator {
        let adjust = Rational::from_integer(numerics.adjust_denominator.clone());
        let scaled = &value * &adjust;
        let (result, open) = if scaled.is_integer() {
            (scaled, open)
        } else if lower {
            (scaled.floor(), true)
        } else {
            (scaled.ceil(), true)
        };
        (result / adjust, open)
    } else {
        (value, open)
    }
}

/// The exact improvement filter: accept a bound only if it conflicts with the opposite side or
/// strictly tightens the current one.
pub(crate) fn improves_bound(
    tree: &PavingTree,
    n: NodeId,
    x: Var,
    value: &Rational,
    lower: bool,
    open: bool,
) -> bool {
    let current_lower = tree.lower(n, x).map(|b| tree.bound(b));
    let current_upper = tree.upper(n, x).map(|b| tree.bound(b));
    if lower {
        if let Some(u) = &current_upper {
            if value > u.value() || ((open || u.is_open()) && value == u.value()) {
                // triggers a conflict, always relevant
                return true;
            }
        }
        if let Some(l) = &current_lower {
            if value < l.value() || ((l.is_open() || !open) && value == l.value()) {
                return false;
            }
        }
    } else {
        if let Some(l) = &current_lower {
            if value < l.value() || ((open || l.is_open()) && value == l.value()) {
                return true;
            }
        }
        if let Some(u) = &current_upper {
            if value > u.value() || ((u.is_open() || !open) && value == u.value()) {
                return false;
            }
        }
    }
    true
}

fn improves_bool_bound(tree: &PavingTree, n: NodeId, x: Var, negated: bool) -> bool {
    use crate::engine::node::BValue;
    let asserted = if negated { BValue::False } else { BValue::True };
    match tree.bvalue(n, x) {
        BValue::Undef => true,
        current => current != asserted,
    }
}

/// The relevance filter applied to deduced definition bounds: on top of improvement it demands
/// progress of at least `epsilon * max(min(upper - lower, |bound|), 1)` and prunes one-sided
/// bounds beyond the `max_bound` threshold.
pub(crate) fn is_relevant_bound(
    tree: &PavingTree,
    numerics: &Numerics,
    n: NodeId,
    x: Var,
    value: &Rational,
    lower: bool,
    open: bool,
) -> bool {
    let current_lower = tree.lower(n, x).map(|b| tree.bound(b));
    let current_upper = tree.upper(n, x).map(|b| tree.bound(b));
    if lower {
        if let Some(u) = &current_upper {
            if value > u.value() || ((open || u.is_open()) && value == u.value()) {
                return true;
            }
        }
        if numerics.epsilon.is_none() {
            if let Some(l) = &current_lower {
                if value < l.value() || ((l.is_open() || !open) && value == l.value()) {
                    return false;
                }
            }
        }
        if current_upper.is_none() && *value > numerics.max_bound {
            return false;
        }
        if let (Some(epsilon), Some(l)) = (&numerics.epsilon, &current_lower) {
            let mut progress = l.value().abs();
            if let Some(u) = &current_upper {
                let width = u.value() - l.value();
                if width < progress {
                    progress = width;
                }
            }
            if progress < Rational::one() {
                progress = Rational::one();
            }
            let threshold = l.value() + progress * epsilon;
            if *value <= threshold {
                return false;
            }
        }
    } else {
        if let Some(l) = &current_lower {
            if value < l.value() || ((open || l.is_open()) && value == l.value()) {
                return true;
            }
        }
        if numerics.epsilon.is_none() {
            if let Some(u) = &current_upper {
                if value > u.value() || ((u.is_open() || !open) && value == u.value()) {
                    return false;
                }
            }
        }
        if current_lower.is_none() && *value < numerics.minus_max_bound {
            return false;
        }
        if let (Some(epsilon), Some(u)) = (&numerics.epsilon, &current_upper) {
            let mut progress = u.value().abs();
            if let Some(l) = &current_lower {
                let width = u.value() - l.value();
                if width < progress {
                    progress = width;
                }
            }
            if progress < Rational::one() {
                progress = Rational::one();
            }
            let threshold = u.value() - progress * epsilon;
            if *value >= threshold {
                return false;
            }
        }
    }
    true
}
