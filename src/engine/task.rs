//! Sub-task construction: turning a tightened paving node into a self-contained problem the
//! coordinator can hand to a downstream solver.

use std::fmt;

use crate::engine::atom::AtomId;
use crate::engine::atom::AtomKind;
use crate::engine::evaluate::LitView;
use crate::engine::evaluate::LitViewKind;
use crate::engine::evaluate::value_of;
use crate::engine::node::BValue;
use crate::engine::node::NodeId;
use crate::engine::propagation::checkpoint;
use crate::engine::store::ConstraintStore;
use crate::engine::tree::PavingTree;
use crate::engine::variables::Var;
use crate::error::EngineError;
use crate::math::Rational;
use crate::paver_assert_moderate;
use crate::termination::TerminationCondition;

/// A self-contained literal of an exported sub-task. Unlike atoms, literals own their numerals,
/// so a task outlives the node it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Lit {
    pub var: Var,
    pub kind: LitKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LitKind {
    Bool {
        negated: bool,
    },
    Eq {
        value: Rational,
        negated: bool,
        int: bool,
    },
    Ineq {
        value: Rational,
        lower: bool,
        open: bool,
        int: bool,
    },
}

impl Lit {
    /// Sorting rank within a variable: boolean literals, then inequalities, then equalities.
    fn rank(&self) -> u8 {
        match self.kind {
            LitKind::Bool { .. } => 0,
            LitKind::Ineq { .. } => 1,
            LitKind::Eq { .. } => 2,
        }
    }

    pub(crate) fn view(&self) -> LitView<'_> {
        let kind = match &self.kind {
            LitKind::Bool { negated } => LitViewKind::Bool { negated: *negated },
            LitKind::Eq { value, negated, .. } => LitViewKind::Eq {
                value,
                negated: *negated,
            },
            LitKind::Ineq {
                value, lower, open, ..
            } => LitViewKind::Ineq {
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

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LitKind::Bool { negated: false } => write!(f, "{}", self.var),
            LitKind::Bool { negated: true } => write!(f, "not {}", self.var),
            LitKind::Eq {
                value,
                negated: false,
                ..
            } => write!(f, "{} = {}", self.var, value),
            LitKind::Eq {
                value,
                negated: true,
                ..
            } => write!(f, "{} != {}", self.var, value),
            LitKind::Ineq {
                value,
                lower: true,
                open,
                ..
            } => write!(f, "{} <{} {}", value, if *open { "" } else { "=" }, self.var),
            LitKind::Ineq {
                value,
                lower: false,
                open,
                ..
            } => write!(f, "{} <{} {}", self.var, if *open { "" } else { "=" }, value),
        }
    }
}

/// The payload published for one paving node: the surviving clauses, the tightened variable
/// bounds, and the split the node was expanded with.
#[derive(Debug, Clone, Default)]
pub struct Task {
    pub node_id: Option<u32>,
    pub depth: u32,
    pub clauses: Vec<Vec<Lit>>,
    pub var_bounds: Vec<Lit>,
    pub undef_clause_num: u32,
    pub undef_lit_num: u32,
    pub splitting_var: Option<Var>,
    pub split_left: Option<Lit>,
    pub split_right: Option<Lit>,
}

impl Task {
    pub(crate) fn reset(&mut self) {
        *self = Task::default();
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ConversionStats {
    pub(crate) conj_simplified: u32,
    pub(crate) disj_simplified: u32,
    pub(crate) skipped_clauses: u32,
    pub(crate) dominance_removed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Connective {
    Conjunction,
    Disjunction,
}

pub(crate) fn atom_to_lit(store: &ConstraintStore, a: AtomId) -> Lit {
    let atom = store.atom(a);
    let int = store.is_int(atom.var);
    let kind = match &atom.kind {
        AtomKind::Bool { negated } => LitKind::Bool { negated: *negated },
        AtomKind::Eq { value, negated } => LitKind::Eq {
            value: value.clone(),
            negated: *negated,
            int,
        },
        AtomKind::Ineq { value, lower, open } => LitKind::Ineq {
            value: value.clone(),
            lower: *lower,
            open: *open,
            int,
        },
    };
    Lit {
        var: atom.var,
        kind,
    }
}

/// Compare two inequality literals on the same variable and side: `1` when `a` is tighter than
/// `b`, `0` when equal, `-1` when looser.
fn ineq_cmp(a: (&Rational, bool, bool), b: (&Rational, bool, bool)) -> i8 {
    let (a_value, lower, a_open) = a;
    let (b_value, b_lower, b_open) = b;
    paver_assert_moderate!(lower == b_lower);
    let stronger = if lower {
        a_value > b_value
    } else {
        a_value < b_value
    };
    if stronger {
        1
    } else if a_value == b_value {
        if a_open == b_open {
            0
        } else if a_open {
            1
        } else {
            -1
        }
    } else {
        -1
    }
}

fn ineq_parts(lit: &Lit) -> (&Rational, bool, bool) {
    match &lit.kind {
        LitKind::Ineq {
            value, lower, open, ..
        } => (value, *lower, *open),
        _ => unreachable!("not an inequality literal"),
    }
}

/// Does the point `value` satisfy the inequality literal?
fn point_satisfies(value: &Rational, lit: &Lit) -> bool {
    let (bound, lower, open) = ineq_parts(lit);
    if lower {
        value > bound || (value == bound && !open)
    } else {
        value < bound || (value == bound && !open)
    }
}

/// Simplify a set of literals read as a conjunction (variable bounds) or disjunction (clause).
///
/// Keeps the strictest lower/upper bound per variable under conjunction and the weakest under
/// disjunction, detects trivially unsatisfiable windows and tautological disjunctions, and plays
/// equality literals against the surrounding window. Returns `(covered, output)`: a covered
/// result (unsat conjunction, tautological disjunction) clears the output.
pub(crate) fn simplify_lits(mut input: Vec<Lit>, connective: Connective) -> (bool, Vec<Lit>) {
    input.sort_by(|a, b| a.var.cmp(&b.var).then(a.rank().cmp(&b.rank())));

    let conjunction = connective == Connective::Conjunction;
    let mut output = Vec::with_capacity(input.len());
    let mut index = 0;
    while index < input.len() {
        let var = input[index].var;
        let mut end = index;
        while end < input.len() && input[end].var == var {
            end += 1;
        }

        let mut bools: Vec<Lit> = Vec::new();
        let mut equalities: Vec<Lit> = Vec::new();
        let mut lower: Option<Lit> = None;
        let mut upper: Option<Lit> = None;
        for lit in &input[index..end] {
            match &lit.kind {
                LitKind::Bool { .. } => bools.push(lit.clone()),
                LitKind::Eq { .. } => equalities.push(lit.clone()),
                LitKind::Ineq {
                    lower: is_lower, ..
                } => {
                    let slot = if *is_lower { &mut lower } else { &mut upper };
                    match slot {
                        None => *slot = Some(lit.clone()),
                        Some(current) => {
                            let sign = ineq_cmp(ineq_parts(lit), ineq_parts(current));
                            let replace = if conjunction { sign == 1 } else { sign == -1 };
                            if replace {
                                *slot = Some(lit.clone());
                            }
                        }
                    }
                }
            }
        }
        index = end;

        if let (Some(l), Some(u)) = (&lower, &upper) {
            let (l_value, _, l_open) = ineq_parts(l);
            let (u_value, _, u_open) = ineq_parts(u);
            if conjunction {
                // x > a and x < b is unsatisfiable when the window collapses
                if l_value > u_value || (l_value == u_value && (l_open || u_open)) {
                    return (true, Vec::new());
                }
            } else {
                // x > a or x < b is a tautology when the disjuncts overlap
                if l_value < u_value || (l_value == u_value && (!l_open || !u_open)) {
                    return (true, Vec::new());
                }
            }
        }

        let mut suppress_window = false;
        let mut kept_equalities: Vec<Lit> = Vec::new();
        for eq in equalities {
            let (value, negated) = match &eq.kind {
                LitKind::Eq { value, negated, .. } => (value.clone(), *negated),
                _ => unreachable!(),
            };
            let inside = lower.as_ref().map_or(true, |l| point_satisfies(&value, l))
                && upper.as_ref().map_or(true, |u| point_satisfies(&value, u));
            let hits_window = lower.as_ref().is_some_and(|l| point_satisfies(&value, l))
                || upper.as_ref().is_some_and(|u| point_satisfies(&value, u));
            if conjunction {
                if !negated {
                    if !inside {
                        // the window excludes the required point
                        return (true, Vec::new());
                    }
                    suppress_window = true;
                    kept_equalities.push(eq);
                } else if inside {
                    kept_equalities.push(eq);
                }
                // an excluded disequality is implied by the window and dropped
            } else if !negated {
                if !hits_window {
                    kept_equalities.push(eq);
                }
                // an equality inside a disjunct's region is dominated by it
            } else {
                if hits_window {
                    // x != k or x >= l with k in the region covers every point
                    return (true, Vec::new());
                }
                kept_equalities.push(eq);
            }
        }

        output.extend(bools);
        output.extend(kept_equalities);
        if !suppress_window {
            output.extend(lower);
            output.extend(upper);
        }
    }

    (false, output)
}

/// `shorter` dominates `longer` when each of its literals is matched in `longer`: same variable,
/// same kind and sign, and for inequalities the longer clause's literal is no tighter.
fn dominates(shorter: &[Lit], longer: &[Lit]) -> bool {
    shorter.iter().all(|s| longer.iter().any(|l| lit_matches(s, l)))
}

fn lit_matches(shorter: &Lit, longer: &Lit) -> bool {
    if shorter.var != longer.var {
        return false;
    }
    match (&shorter.kind, &longer.kind) {
        (LitKind::Bool { negated: a }, LitKind::Bool { negated: b }) => a == b,
        (
            LitKind::Eq {
                value: a, negated: na, ..
            },
            LitKind::Eq {
                value: b, negated: nb, ..
            },
        ) => na == nb && a == b,
        (LitKind::Ineq { lower: la, .. }, LitKind::Ineq { lower: lb, .. }) if la == lb => {
            ineq_cmp(ineq_parts(longer), ineq_parts(shorter)) <= 0
        }
        _ => false,
    }
}

/// Discard clauses dominated by a shorter clause already kept. Inputs beyond the size threshold
/// pass through untouched.
pub(crate) fn remove_dominated(input: Vec<Vec<Lit>>, stats: &mut ConversionStats) -> Vec<Vec<Lit>> {
    const MAX_SIZE_THRESHOLD: usize = 10_000;
    if input.is_empty() || input.len() > MAX_SIZE_THRESHOLD {
        return input;
    }

    let mut order: Vec<usize> = (0..input.len()).collect();
    order.sort_by_key(|&i| (input[i].len(), i));

    let mut slots: Vec<Option<Vec<Lit>>> = input.into_iter().map(Some).collect();
    let mut output: Vec<Vec<Lit>> = Vec::with_capacity(slots.len());
    for i in order {
        let candidate = slots[i].take().expect("each clause is visited once");
        let dominated = output.iter().any(|kept| dominates(kept, &candidate));
        if dominated {
            stats.dominance_removed += 1;
        } else {
            output.push(candidate);
        }
    }
    output
}

/// Build the sub-task for node `n`. Returns `true` when the node is locally unsatisfiable (an
/// empty residual clause, or contradicting variable bounds), in which case the task is void.
pub(crate) fn convert_node_to_task(
    store: &ConstraintStore,
    tree: &PavingTree,
    termination: &mut dyn TerminationCondition,
    n: NodeId,
    task: &mut Task,
) -> Result<(bool, ConversionStats), EngineError> {
    task.reset();
    task.node_id = Some(n.id());
    task.depth = tree.node(n).depth;
    let mut stats = ConversionStats::default();

    let mut temp_units: Vec<Lit> = Vec::new();
    let mut temp_clauses: Vec<Vec<Lit>> = Vec::new();
    for c in store.clause_ids() {
        checkpoint(termination)?;
        let mut residual: Vec<AtomId> = Vec::new();
        let mut satisfied = false;
        for &a in store.clause(c).atoms() {
            match value_of(store, tree, n, store.atom(a).view()) {
                Some(true) => {
                    satisfied = true;
                    break;
                }
                Some(false) => {}
                None => residual.push(a),
            }
        }
        if satisfied {
            continue;
        }
        if residual.is_empty() {
            return Ok((true, stats));
        }
        if residual.len() == 1 {
            temp_units.push(atom_to_lit(store, residual[0]));
            continue;
        }
        let lits: Vec<Lit> = residual.iter().map(|&a| atom_to_lit(store, a)).collect();
        let before = lits.len();
        let (covered, simplified) = simplify_lits(lits, Connective::Disjunction);
        if covered {
            stats.skipped_clauses += 1;
            continue;
        }
        stats.disj_simplified += (before - simplified.len()) as u32;
        if simplified.len() == 1 {
            temp_units.extend(simplified);
        } else {
            temp_clauses.push(simplified);
        }
    }

    task.clauses = remove_dominated(temp_clauses, &mut stats);
    task.undef_clause_num = task.clauses.len() as u32;
    task.undef_lit_num = task.clauses.iter().map(|c| c.len() as u32).sum();

    for &(a, _) in store.units() {
        if store.is_definition(store.atom(a).var) {
            temp_units.push(atom_to_lit(store, a));
        }
    }
    for &a in &tree.node(n).up_atoms {
        if store.is_definition(store.atom(a).var) {
            temp_units.push(atom_to_lit(store, a));
        }
    }

    for x in store.vars() {
        if store.is_definition(x) {
            continue;
        }
        if store.is_bool(x) {
            let negated = match tree.bvalue(n, x) {
                BValue::True => false,
                BValue::False => true,
                _ => continue,
            };
            temp_units.push(Lit {
                var: x,
                kind: LitKind::Bool { negated },
            });
            continue;
        }
        let lower = tree.lower(n, x);
        let upper = tree.upper(n, x);
        if lower.is_none() && upper.is_none() {
            continue;
        }
        if let (Some(l), Some(u)) = (lower, upper) {
            if tree.bound(l).value() == tree.bound(u).value() {
                temp_units.push(Lit {
                    var: x,
                    kind: LitKind::Eq {
                        value: tree.bound(l).value().clone(),
                        negated: false,
                        int: store.is_int(x),
                    },
                });
                continue;
            }
        }
        if let Some(l) = lower {
            let bound = tree.bound(l);
            temp_units.push(Lit {
                var: x,
                kind: LitKind::Ineq {
                    value: bound.value().clone(),
                    lower: true,
                    open: bound.is_open(),
                    int: store.is_int(x),
                },
            });
        }
        if let Some(u) = upper {
            let bound = tree.bound(u);
            temp_units.push(Lit {
                var: x,
                kind: LitKind::Ineq {
                    value: bound.value().clone(),
                    lower: false,
                    open: bound.is_open(),
                    int: store.is_int(x),
                },
            });
        }
    }

    if temp_units.is_empty() {
        return Ok((false, stats));
    }
    let before = temp_units.len();
    let (covered, bounds) = simplify_lits(temp_units, Connective::Conjunction);
    if covered {
        return Ok((true, stats));
    }
    stats.conj_simplified += (before - bounds.len()) as u32;
    task.var_bounds = bounds;
    Ok((false, stats))
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;

    use super::*;

    fn rat(n: i64) -> Rational {
        Rational::from_integer(BigInt::from(n))
    }

    fn lower(var: u32, value: i64, open: bool) -> Lit {
        Lit {
            var: Var(var),
            kind: LitKind::Ineq {
                value: rat(value),
                lower: true,
                open,
                int: false,
            },
        }
    }

    fn upper(var: u32, value: i64, open: bool) -> Lit {
        Lit {
            var: Var(var),
            kind: LitKind::Ineq {
                value: rat(value),
                lower: false,
                open,
                int: false,
            },
        }
    }

    fn eq(var: u32, value: i64, negated: bool) -> Lit {
        Lit {
            var: Var(var),
            kind: LitKind::Eq {
                value: rat(value),
                negated,
                int: false,
            },
        }
    }

    fn bool_lit(var: u32, negated: bool) -> Lit {
        Lit {
            var: Var(var),
            kind: LitKind::Bool { negated },
        }
    }

    #[test]
    fn conjunction_keeps_the_strictest_bounds() {
        let input = vec![lower(0, 1, false), lower(0, 3, false), upper(0, 10, true)];
        let (covered, output) = simplify_lits(input, Connective::Conjunction);
        assert!(!covered);
        assert_eq!(output, vec![lower(0, 3, false), upper(0, 10, true)]);
    }

    #[test]
    fn disjunction_keeps_the_weakest_bounds() {
        let input = vec![lower(0, 5, false), lower(0, 3, false), upper(0, 0, true)];
        let (covered, output) = simplify_lits(input, Connective::Disjunction);
        assert!(!covered);
        assert_eq!(output, vec![lower(0, 3, false), upper(0, 0, true)]);
    }

    #[test]
    fn collapsed_conjunction_window_is_unsat() {
        // x > 3 and x < 1
        let (covered, output) = simplify_lits(
            vec![lower(0, 3, true), upper(0, 1, true)],
            Connective::Conjunction,
        );
        assert!(covered);
        assert!(output.is_empty());

        // x >= 3 and x < 3
        let (covered, _) = simplify_lits(
            vec![lower(0, 3, false), upper(0, 3, true)],
            Connective::Conjunction,
        );
        assert!(covered);

        // x >= 3 and x <= 3 is a point, not a conflict
        let (covered, output) = simplify_lits(
            vec![lower(0, 3, false), upper(0, 3, false)],
            Connective::Conjunction,
        );
        assert!(!covered);
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn overlapping_disjunction_is_a_tautology() {
        // x > 1 or x < 3
        let (covered, _) = simplify_lits(
            vec![lower(0, 1, true), upper(0, 3, true)],
            Connective::Disjunction,
        );
        assert!(covered);

        // x > 3 or x < 3 leaves the point open
        let (covered, output) = simplify_lits(
            vec![lower(0, 3, true), upper(0, 3, true)],
            Connective::Disjunction,
        );
        assert!(!covered);
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn equality_against_the_window_under_conjunction() {
        // x = 5 inside [0, 10] subsumes the window
        let (covered, output) = simplify_lits(
            vec![lower(0, 0, false), upper(0, 10, false), eq(0, 5, false)],
            Connective::Conjunction,
        );
        assert!(!covered);
        assert_eq!(output, vec![eq(0, 5, false)]);

        // x = 50 outside [0, 10] is unsat
        let (covered, _) = simplify_lits(
            vec![lower(0, 0, false), upper(0, 10, false), eq(0, 50, false)],
            Connective::Conjunction,
        );
        assert!(covered);

        // x != 50 outside [0, 10] is implied and dropped
        let (covered, output) = simplify_lits(
            vec![lower(0, 0, false), upper(0, 10, false), eq(0, 50, true)],
            Connective::Conjunction,
        );
        assert!(!covered);
        assert_eq!(output, vec![lower(0, 0, false), upper(0, 10, false)]);
    }

    #[test]
    fn equality_against_the_window_under_disjunction() {
        // x = 7 or x >= 5: the equality is dominated
        let (covered, output) = simplify_lits(
            vec![lower(0, 5, false), eq(0, 7, false)],
            Connective::Disjunction,
        );
        assert!(!covered);
        assert_eq!(output, vec![lower(0, 5, false)]);

        // x != 7 or x >= 5 covers everything
        let (covered, _) = simplify_lits(
            vec![lower(0, 5, false), eq(0, 7, true)],
            Connective::Disjunction,
        );
        assert!(covered);

        // x != 2 or x >= 5 stays informative
        let (covered, output) = simplify_lits(
            vec![lower(0, 5, false), eq(0, 2, true)],
            Connective::Disjunction,
        );
        assert!(!covered);
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn boolean_literals_pass_through() {
        let input = vec![bool_lit(1, true), lower(0, 1, false)];
        let (covered, output) = simplify_lits(input, Connective::Conjunction);
        assert!(!covered);
        assert_eq!(output, vec![lower(0, 1, false), bool_lit(1, true)]);
    }

    #[test]
    fn conjunction_simplification_is_a_fixed_point() {
        let input = vec![
            lower(0, 1, false),
            lower(0, 4, true),
            upper(0, 9, false),
            bool_lit(1, false),
            eq(2, 3, true),
        ];
        let (covered, once) = simplify_lits(input, Connective::Conjunction);
        assert!(!covered);
        let (covered, twice) = simplify_lits(once.clone(), Connective::Conjunction);
        assert!(!covered);
        assert_eq!(once, twice);
    }

    #[test]
    fn dominated_clauses_are_removed() {
        // C1 = (b or x > 1), C2 = (b or x > 1 or y < 0): only C1 survives
        let c1 = vec![bool_lit(0, false), lower(1, 1, true)];
        let c2 = vec![bool_lit(0, false), lower(1, 1, true), upper(2, 0, true)];
        let mut stats = ConversionStats::default();
        let output = remove_dominated(vec![c2, c1.clone()], &mut stats);
        assert_eq!(output, vec![c1]);
        assert_eq!(stats.dominance_removed, 1);
    }

    #[test]
    fn looser_inequalities_in_the_longer_clause_still_match() {
        // shorter (x > 2) implies longer disjunct (x > 1)
        let shorter = vec![lower(0, 2, true)];
        let longer = vec![lower(0, 1, true), upper(1, 0, false)];
        let mut stats = ConversionStats::default();
        let output = remove_dominated(vec![longer, shorter.clone()], &mut stats);
        assert_eq!(output, vec![shorter]);
    }

    #[test]
    fn tighter_inequalities_in_the_longer_clause_do_not_match() {
        let shorter = vec![lower(0, 2, true)];
        let longer = vec![lower(0, 3, true), upper(1, 0, false)];
        let mut stats = ConversionStats::default();
        let output = remove_dominated(vec![longer.clone(), shorter.clone()], &mut stats);
        assert_eq!(output, vec![shorter, longer]);
    }

    #[test]
    fn dominance_removal_is_idempotent() {
        let c1 = vec![lower(0, 1, false)];
        let c2 = vec![lower(0, 1, false), upper(1, 5, false)];
        let c3 = vec![eq(2, 4, false), bool_lit(3, true)];
        let mut stats = ConversionStats::default();
        let once = remove_dominated(vec![c1, c2, c3], &mut stats);
        let mut stats2 = ConversionStats::default();
        let twice = remove_dominated(once.clone(), &mut stats2);
        assert_eq!(once, twice);
        assert_eq!(stats2.dominance_removed, 0);
    }
}
