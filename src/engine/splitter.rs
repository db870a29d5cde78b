//! Split-variable scoring and split-point selection.

use std::fmt;

use num_traits::One;
use num_traits::Signed;
use num_traits::Zero;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::containers::KeyedVec;
use crate::engine::definition::Definition;
use crate::engine::node::NodeId;
use crate::engine::scheduler::Scheduler;
use crate::engine::store::ConstraintStore;
use crate::engine::task::LitKind;
use crate::engine::task::Task;
use crate::engine::tree::PavingTree;
use crate::engine::variables::Var;
use crate::error::EngineError;
use crate::math::Rational;
use crate::options::Numerics;
use crate::paver_assert_moderate;

/// Scoring record for one split candidate.
#[derive(Debug, Clone)]
pub(crate) struct VarScore {
    pub(crate) var: Var,
    /// The current interval strictly spans zero.
    pub(crate) contains_zero: bool,
    pub(crate) degree: u32,
    pub(crate) occurrences: u32,
    pub(crate) split_cnt: u32,
    pub(crate) avg_split_cnt: f64,
    pub(crate) width: Rational,
    pub(crate) width_score: f64,
    pub(crate) is_too_short: bool,
    pub(crate) score: f64,
}

impl VarScore {
    fn compute_score(&mut self) {
        let mut score = 1.0;
        if self.contains_zero {
            score *= 2.0;
        }
        score *= 2.0_f64.powi(self.degree as i32);
        score *= self.occurrences as f64;
        score /= 2.0 + self.avg_split_cnt;
        score *= self.width_score;
        self.score = score;
    }

    /// `true` when `self` is the better choice. Too-short intervals sort last; otherwise the
    /// higher score wins, ties broken toward the lower variable id.
    fn beats(&self, other: &VarScore) -> bool {
        if self.is_too_short != other.is_too_short {
            return other.is_too_short;
        }
        if self.score != other.score {
            return self.score > other.score;
        }
        self.var < other.var
    }
}

impl fmt::Display for VarScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "var {}: score={:.3}, width_score={:.2}, avg_split_cnt={:.3}, split_cnt={}, cz={}, deg={}, occ={}, too_short={}, width={}",
            self.var,
            self.score,
            self.width_score,
            self.avg_split_cnt,
            self.split_cnt,
            self.contains_zero,
            self.degree,
            self.occurrences,
            self.is_too_short,
            self.width,
        )
    }
}

/// Scores split candidates over the current task and samples split points.
#[derive(Debug)]
pub(crate) struct Splitter {
    rng: SmallRng,
    occurrences: KeyedVec<Var, u32>,
    max_degree: KeyedVec<Var, u32>,
    /// Candidate cache, built on the first selection and re-filtered per use.
    candidates: Vec<Var>,
    num_splits: u64,
}

impl Splitter {
    pub(crate) fn new(seed: u64) -> Splitter {
        Splitter {
            rng: SmallRng::seed_from_u64(seed),
            occurrences: KeyedVec::default(),
            max_degree: KeyedVec::default(),
            candidates: Vec::new(),
            num_splits: 0,
        }
    }

    pub(crate) fn num_splits(&self) -> u64 {
        self.num_splits
    }

    pub(crate) fn count_split(&mut self) {
        self.num_splits += 1;
    }

    /// Collect direct and transitive occurrence counts and maximum degrees over the task's
    /// clauses and bounds. A variable inside a definition inherits the occurrences of the
    /// variable it defines.
    pub(crate) fn collect_var_info(&mut self, store: &ConstraintStore, task: &Task) {
        let num_vars = store.num_vars();
        self.occurrences.resize(num_vars, 0);
        self.max_degree.resize(num_vars, 0);
        for slot in self.occurrences.iter_mut() {
            *slot = 0;
        }
        for slot in self.max_degree.iter_mut() {
            *slot = 0;
        }

        let count = |occ: &mut KeyedVec<Var, u32>, deg: &mut KeyedVec<Var, u32>, x: Var| {
            if store.is_bool(x) {
                return;
            }
            occ[x] += 1;
            if !store.is_definition(x) && deg[x] < 1 {
                deg[x] = 1;
            }
        };
        for clause in &task.clauses {
            for lit in clause {
                count(&mut self.occurrences, &mut self.max_degree, lit.var);
            }
        }
        for lit in &task.var_bounds {
            count(&mut self.occurrences, &mut self.max_degree, lit.var);
        }

        // Definitions are created after their operands, so one reverse sweep pushes occurrence
        // counts all the way down through nested definitions.
        for index in (0..num_vars).rev() {
            let x = Var(index as u32);
            if self.occurrences[x] == 0 {
                continue;
            }
            match store.definition(x) {
                None => {}
                Some(Definition::Monomial(m)) => {
                    for p in m.powers() {
                        self.occurrences[p.var] += self.occurrences[x];
                        if self.max_degree[p.var] < p.degree {
                            self.max_degree[p.var] = p.degree;
                        }
                    }
                }
                Some(Definition::Polynomial(poly)) => {
                    for (_, y) in poly.terms() {
                        self.occurrences[*y] += self.occurrences[x];
                        match store.definition(*y) {
                            None => {
                                if self.max_degree[*y] < 1 {
                                    self.max_degree[*y] = 1;
                                }
                            }
                            Some(Definition::Monomial(m)) => {
                                for q in m.powers() {
                                    self.occurrences[q.var] += self.occurrences[*y];
                                    if self.max_degree[q.var] < q.degree {
                                        self.max_degree[q.var] = q.degree;
                                    }
                                }
                            }
                            Some(Definition::Polynomial(_)) => {
                                paver_assert_moderate!(
                                    false,
                                    "sums are not nested inside sums by the frontend"
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    /// Pick the best split variable for `n`, or `None` when no candidate remains.
    pub(crate) fn select_best_var(
        &mut self,
        store: &ConstraintStore,
        tree: &PavingTree,
        scheduler: &Scheduler,
        numerics: &Numerics,
        n: NodeId,
    ) -> Option<VarScore> {
        if self.candidates.is_empty() {
            for x in store.vars() {
                if store.is_definition(x) || store.is_bool(x) {
                    continue;
                }
                if is_pinned(tree, n, x) || self.occurrences[x] == 0 {
                    continue;
                }
                self.candidates.push(x);
            }
        }

        let mut best: Option<VarScore> = None;
        for i in 0..self.candidates.len() {
            let x = self.candidates[i];
            if is_pinned(tree, n, x) || self.occurrences[x] == 0 {
                continue;
            }

            let lower = tree.lower(n, x).map(|b| tree.bound(b).value().clone());
            let upper = tree.upper(n, x).map(|b| tree.bound(b).value().clone());
            let contains_zero = lower.as_ref().map_or(true, |l| l.is_negative())
                && upper.as_ref().map_or(true, |u| u.is_positive());

            let (width, width_score) = match (&lower, &upper) {
                (None, None) => (numerics.unbounded_penalty_sq.clone(), 1.0),
                (None, Some(u)) => {
                    let width = if u.is_negative() {
                        let mut magnitude = -u;
                        if magnitude < Rational::one() {
                            magnitude = Rational::one();
                        }
                        &numerics.unbounded_penalty / magnitude
                    } else {
                        u + &numerics.unbounded_penalty
                    };
                    (width, 0.95)
                }
                (Some(l), None) => {
                    let width = if l.is_positive() {
                        let mut magnitude = l.clone();
                        if magnitude < Rational::one() {
                            magnitude = Rational::one();
                        }
                        &numerics.unbounded_penalty / magnitude
                    } else {
                        -l + &numerics.unbounded_penalty
                    };
                    (width, 0.95)
                }
                (Some(l), Some(u)) => (u - l, 0.9),
            };

            let split_cnt = scheduler.unsolved_split_cnt(x);
            let mut candidate = VarScore {
                var: x,
                contains_zero,
                degree: self.max_degree[x],
                occurrences: self.occurrences[x],
                split_cnt,
                avg_split_cnt: split_cnt as f64 / (scheduler.unsolved_task_num + 1) as f64,
                is_too_short: width <= numerics.small_value_threshold,
                width,
                width_score,
                score: 0.0,
            };
            candidate.compute_score();

            match &best {
                Some(current) if !candidate.beats(current) => {}
                _ => best = Some(candidate),
            }
        }
        best
    }

    /// Sample uniformly among the inequality literals on `x` in the surviving clauses; equality
    /// literals never serve as split points.
    pub(crate) fn choose_split_literal(
        &mut self,
        task: &Task,
        x: Var,
    ) -> Option<(Rational, bool, bool)> {
        let eligible: Vec<(&Rational, bool, bool)> = task
            .clauses
            .iter()
            .flatten()
            .filter(|lit| lit.var == x)
            .filter_map(|lit| match &lit.kind {
                LitKind::Ineq {
                    value, lower, open, ..
                } => Some((value, *lower, *open)),
                _ => None,
            })
            .collect();
        if eligible.is_empty() {
            return None;
        }
        let (value, lower, open) = eligible[self.rng.gen_range(0..eligible.len())];
        Some((value.clone(), lower, open))
    }
}

/// A variable is pinned once its bounds meet in a single point; splitting it is pointless.
fn is_pinned(tree: &PavingTree, n: NodeId, x: Var) -> bool {
    match (tree.lower(n, x), tree.upper(n, x)) {
        (Some(l), Some(u)) => tree.bound(l).value() == tree.bound(u).value(),
        _ => false,
    }
}

/// A split point from the interval of `x` at `n`: zero for a zero-spanning interval, a
/// `split_delta` step inward from the finite end of a half-line, otherwise the midpoint.
pub(crate) fn choose_midpoint(
    tree: &PavingTree,
    numerics: &Numerics,
    n: NodeId,
    x: Var,
    contains_zero: bool,
) -> Result<Rational, EngineError> {
    let lower = tree.lower(n, x).map(|b| tree.bound(b).value().clone());
    let upper = tree.upper(n, x).map(|b| tree.bound(b).value().clone());

    if contains_zero {
        return Ok(Rational::zero());
    }
    match (lower, upper) {
        (None, Some(u)) => Ok(u.floor() - &numerics.split_delta),
        (Some(l), None) => Ok(l.ceil() + &numerics.split_delta),
        (Some(l), Some(u)) => {
            paver_assert_moderate!(l != u);
            let two = Rational::from_integer(2.into());
            let mut mid = (&l + &u) / two;
            if &u - &l > Rational::from_integer(10.into()) {
                mid = mid.ceil();
            }
            if !(l < mid && mid < u) {
                return Err(EngineError::UnsplittableNode(n.id()));
            }
            Ok(mid)
        }
        (None, None) => {
            // a zero-spanning unbounded interval is handled above
            Ok(Rational::zero())
        }
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;

    use super::*;
    use crate::engine::bound::Justification;
    use crate::engine::definition::Power;
    use crate::engine::node::BValue;
    use crate::engine::task::Lit;
    use crate::options::PartitionerOptions;

    fn rat(n: i64) -> Rational {
        Rational::from_integer(BigInt::from(n))
    }

    fn ineq(var: Var, value: i64, lower: bool) -> Lit {
        Lit {
            var,
            kind: LitKind::Ineq {
                value: rat(value),
                lower,
                open: false,
                int: false,
            },
        }
    }

    #[test]
    fn occurrences_propagate_through_definitions() {
        // y = x^2, p = 2y + z; a clause on p credits y, x and z
        let mut store = ConstraintStore::default();
        let x = store.mk_var(false);
        let z = store.mk_var(false);
        let y = store.mk_monomial(vec![Power::new(x, 2)]);
        let p = store.mk_sum(vec![(rat(2), y), (rat(1), z)]);

        let task = Task {
            clauses: vec![vec![ineq(p, 0, true), ineq(p, 9, false)]],
            ..Default::default()
        };
        let mut splitter = Splitter::new(0);
        splitter.collect_var_info(&store, &task);

        assert_eq!(splitter.occurrences[p], 2);
        assert_eq!(splitter.occurrences[y], 2);
        // x is credited through the sum's inline expansion and again when y itself is swept
        assert_eq!(splitter.occurrences[x], 4);
        assert_eq!(splitter.occurrences[z], 2);
        assert_eq!(splitter.max_degree[x], 2);
        assert_eq!(splitter.max_degree[z], 1);
    }

    #[test]
    fn higher_degree_outweighs_equal_occurrence() {
        let mut store = ConstraintStore::default();
        let x = store.mk_var(false);
        let z = store.mk_var(false);
        let y = store.mk_monomial(vec![Power::new(x, 2)]);
        let p = store.mk_sum(vec![(rat(1), y), (rat(1), z)]);

        let mut tree = PavingTree::default();
        let root = tree.mk_root(vec![BValue::Arith; store.num_vars()]);
        for v in [x, z] {
            let _ = tree
                .mk_bound(root, v, rat(-10), true, false, Justification::Axiom)
                .unwrap();
            let _ = tree
                .mk_bound(root, v, rat(10), false, false, Justification::Axiom)
                .unwrap();
        }

        let task = Task {
            clauses: vec![vec![ineq(p, 0, true), ineq(p, 9, false)]],
            ..Default::default()
        };
        let mut splitter = Splitter::new(0);
        splitter.collect_var_info(&store, &task);

        let numerics = Numerics::from_options(&PartitionerOptions::default());
        let scheduler = Scheduler::default();
        let best = splitter
            .select_best_var(&store, &tree, &scheduler, &numerics, root)
            .unwrap();
        assert_eq!(best.var, x);
        assert_eq!(best.degree, 2);
        assert!(best.contains_zero);
    }

    #[test]
    fn pinned_and_unmentioned_variables_are_not_candidates() {
        let mut store = ConstraintStore::default();
        let pinned = store.mk_var(false);
        let unmentioned = store.mk_var(false);
        let free = store.mk_var(false);

        let mut tree = PavingTree::default();
        let root = tree.mk_root(vec![BValue::Arith; store.num_vars()]);
        let _ = tree
            .mk_bound(root, pinned, rat(2), true, false, Justification::Axiom)
            .unwrap();
        let _ = tree
            .mk_bound(root, pinned, rat(2), false, false, Justification::Axiom)
            .unwrap();

        let task = Task {
            clauses: vec![vec![ineq(pinned, 1, true), ineq(free, 0, true)]],
            ..Default::default()
        };
        let mut splitter = Splitter::new(0);
        splitter.collect_var_info(&store, &task);

        let numerics = Numerics::from_options(&PartitionerOptions::default());
        let scheduler = Scheduler::default();
        let best = splitter
            .select_best_var(&store, &tree, &scheduler, &numerics, root)
            .unwrap();
        assert_eq!(best.var, free);
        let _ = unmentioned;
    }

    #[test]
    fn split_literal_sampling_is_restricted_to_the_variable() {
        let mut store = ConstraintStore::default();
        let x = store.mk_var(false);
        let y = store.mk_var(false);
        let _ = store;

        let task = Task {
            clauses: vec![
                vec![ineq(x, 1, true), ineq(y, 7, false)],
                vec![ineq(x, 4, false)],
            ],
            ..Default::default()
        };
        let mut splitter = Splitter::new(0);
        for _ in 0..16 {
            let (value, _, _) = splitter.choose_split_literal(&task, x).unwrap();
            assert!(value == rat(1) || value == rat(4));
        }
        assert!(splitter.choose_split_literal(&task, Var(99)).is_none());
    }

    #[test]
    fn midpoints_follow_the_interval_shape() {
        let mut store = ConstraintStore::default();
        let x = store.mk_var(false);
        let mut tree = PavingTree::default();
        let root = tree.mk_root(vec![BValue::Arith]);
        let numerics = Numerics::from_options(&PartitionerOptions::default());

        // zero-spanning interval splits at zero
        assert_eq!(
            choose_midpoint(&tree, &numerics, root, x, true).unwrap(),
            rat(0)
        );

        // one-sided intervals step split_delta inward
        let _ = tree
            .mk_bound(root, x, rat(1000), false, false, Justification::Axiom)
            .unwrap();
        assert_eq!(
            choose_midpoint(&tree, &numerics, root, x, false).unwrap(),
            rat(872)
        );

        // small two-sided intervals take the exact midpoint
        let _ = tree
            .mk_bound(root, x, rat(995), true, false, Justification::Axiom)
            .unwrap();
        assert_eq!(
            choose_midpoint(&tree, &numerics, root, x, false).unwrap(),
            Rational::new(BigInt::from(1995), BigInt::from(2))
        );
    }

    #[test]
    fn wide_two_sided_intervals_round_the_midpoint_up() {
        let mut store = ConstraintStore::default();
        let x = store.mk_var(false);
        let _ = store;
        let mut tree = PavingTree::default();
        let root = tree.mk_root(vec![BValue::Arith]);
        let numerics = Numerics::from_options(&PartitionerOptions::default());

        let _ = tree
            .mk_bound(root, x, rat(1), true, false, Justification::Axiom)
            .unwrap();
        let _ = tree
            .mk_bound(root, x, rat(100), false, false, Justification::Axiom)
            .unwrap();
        // (1 + 100) / 2 = 50.5, width > 10 so it is ceiled
        assert_eq!(
            choose_midpoint(&tree, &numerics, root, x, false).unwrap(),
            rat(51)
        );
    }
}
