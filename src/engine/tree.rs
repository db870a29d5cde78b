use crate::containers::CowVec;
use crate::containers::KeyedVec;
use crate::engine::bound::Bound;
use crate::engine::bound::BoundId;
use crate::engine::bound::BoundKind;
use crate::engine::bound::Justification;
use crate::engine::node::BValue;
use crate::engine::node::Node;
use crate::engine::node::NodeId;
use crate::engine::variables::Var;
use crate::error::EngineError;
use crate::math::Endpoint;
use crate::math::Interval;
use crate::math::Rational;
use crate::paver_assert_simple;

/// The paving tree and its bound arena. The tree exclusively owns nodes and bounds; every other
/// structure refers to them by id.
#[derive(Debug, Default)]
pub(crate) struct PavingTree {
    nodes: KeyedVec<NodeId, Node>,
    bounds: KeyedVec<BoundId, Bound>,
    /// Monotone counter stamped onto every created bound.
    timestamp: u64,
    root: Option<NodeId>,
    leaf_head: Option<NodeId>,
    leaf_tail: Option<NodeId>,
    num_conflicts: u64,
}

impl PavingTree {
    pub(crate) fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn num_bounds(&self) -> u64 {
        self.bounds.len() as u64
    }

    pub(crate) fn num_conflicts(&self) -> u64 {
        self.num_conflicts
    }

    pub(crate) fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub(crate) fn node(&self, n: NodeId) -> &Node {
        &self.nodes[n]
    }

    pub(crate) fn node_mut(&mut self, n: NodeId) -> &mut Node {
        &mut self.nodes[n]
    }

    pub(crate) fn contains(&self, n: NodeId) -> bool {
        (n.0 as usize) < self.nodes.len()
    }

    pub(crate) fn bound(&self, b: BoundId) -> &Bound {
        &self.bounds[b]
    }

    pub(crate) fn lower(&self, n: NodeId, x: Var) -> Option<BoundId> {
        *self.nodes[n].lowers.get(x.0)
    }

    pub(crate) fn upper(&self, n: NodeId, x: Var) -> Option<BoundId> {
        *self.nodes[n].uppers.get(x.0)
    }

    pub(crate) fn bvalue(&self, n: NodeId, x: Var) -> BValue {
        *self.nodes[n].bvalues.get(x.0)
    }

    pub(crate) fn children(&self, n: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[n].first_child, move |&c| {
            self.nodes[c].next_sibling
        })
    }

    /// Create the root node. `bvalues` carries `Undef` for boolean variables and `Arith` for the
    /// rest.
    pub(crate) fn mk_root(&mut self, bvalues: Vec<BValue>) -> NodeId {
        paver_assert_simple!(self.root.is_none());
        let num_vars = bvalues.len();
        let root = self.nodes.push(Node {
            depth: 0,
            parent: None,
            first_child: None,
            next_sibling: None,
            prev_leaf: None,
            next_leaf: None,
            conflict: None,
            trail: None,
            lowers: CowVec::new(vec![None; num_vars]),
            uppers: CowVec::new(vec![None; num_vars]),
            bvalues: CowVec::new(bvalues),
            split_vars: Vec::new(),
            up_atoms: Vec::new(),
        });
        self.root = Some(root);
        self.push_leaf_front(root);
        root
    }

    /// Create a child of `parent`, inheriting its bound maps by structural sharing, its trail and
    /// its unit-propagation atoms. The child is prepended to the leaf list.
    pub(crate) fn mk_child(&mut self, parent: NodeId) -> NodeId {
        let child_id = NodeId(self.nodes.len() as u32);
        let p = &self.nodes[parent];
        let child = Node {
            depth: p.depth + 1,
            parent: Some(parent),
            first_child: None,
            next_sibling: p.first_child,
            prev_leaf: None,
            next_leaf: None,
            conflict: p.conflict,
            trail: p.trail,
            lowers: p.lowers.clone(),
            uppers: p.uppers.clone(),
            bvalues: p.bvalues.clone(),
            split_vars: p.split_vars.clone(),
            up_atoms: p.up_atoms.clone(),
        };
        let pushed = self.nodes.push(child);
        paver_assert_simple!(pushed == child_id);
        self.nodes[parent].first_child = Some(child_id);
        self.push_leaf_front(child_id);
        child_id
    }

    /// Install a numeric bound on `n`. The value must already be normalized.
    pub(crate) fn mk_bound(
        &mut self,
        n: NodeId,
        x: Var,
        value: Rational,
        lower: bool,
        open: bool,
        justification: Justification,
    ) -> Result<BoundId, EngineError> {
        paver_assert_simple!(!self.nodes[n].inconsistent());
        let b = self.bounds.push(Bound {
            var: x,
            kind: BoundKind::Numeric { value, lower, open },
            timestamp: self.timestamp,
            prev: self.nodes[n].trail,
            justification,
        });
        self.push_to_node(n, b);
        if self.conflicting_bounds(n, x) {
            self.set_conflict(n, x);
        }
        self.advance_timestamp()?;
        Ok(b)
    }

    /// Install a boolean bound on `n`. `negated` asserts the variable false.
    pub(crate) fn mk_bool_bound(
        &mut self,
        n: NodeId,
        x: Var,
        negated: bool,
        justification: Justification,
    ) -> Result<BoundId, EngineError> {
        paver_assert_simple!(!self.nodes[n].inconsistent());
        let b = self.bounds.push(Bound {
            var: x,
            kind: BoundKind::Bool { negated },
            timestamp: self.timestamp,
            prev: self.nodes[n].trail,
            justification,
        });
        self.push_to_node(n, b);
        if self.bvalue(n, x) == BValue::Conflict {
            self.set_conflict(n, x);
        }
        self.advance_timestamp()?;
        Ok(b)
    }

    fn push_to_node(&mut self, n: NodeId, b: BoundId) {
        let x = self.bounds[b].var;
        let update = match &self.bounds[b].kind {
            BoundKind::Numeric { lower, .. } => Some(*lower),
            BoundKind::Bool { negated } => {
                let asserted = if *negated { BValue::False } else { BValue::True };
                let node = &mut self.nodes[n];
                node.trail = Some(b);
                match *node.bvalues.get(x.0) {
                    BValue::Undef => node.bvalues.set(x.0, asserted),
                    current if current != asserted => node.bvalues.set(x.0, BValue::Conflict),
                    _ => {}
                }
                None
            }
        };
        if let Some(lower) = update {
            let node = &mut self.nodes[n];
            node.trail = Some(b);
            if lower {
                node.lowers.set(x.0, Some(b));
            } else {
                node.uppers.set(x.0, Some(b));
            }
        }
    }

    fn advance_timestamp(&mut self) -> Result<(), EngineError> {
        self.timestamp += 1;
        if self.timestamp == u64::MAX {
            return Err(EngineError::TimestampOverflow);
        }
        Ok(())
    }

    pub(crate) fn set_conflict(&mut self, n: NodeId, x: Var) {
        paver_assert_simple!(!self.nodes[n].inconsistent());
        self.num_conflicts += 1;
        self.nodes[n].conflict = Some(x);
    }

    /// True if the lower and upper bounds of `x` contradict at `n`: the upper is below the lower,
    /// or they meet at a point one of them excludes.
    pub(crate) fn conflicting_bounds(&self, n: NodeId, x: Var) -> bool {
        let (Some(l), Some(u)) = (self.lower(n, x), self.upper(n, x)) else {
            return false;
        };
        let l = self.bound(l);
        let u = self.bound(u);
        u.value() < l.value() || ((l.is_open() || u.is_open()) && u.value() == l.value())
    }

    pub(crate) fn is_unbounded(&self, n: NodeId, x: Var) -> bool {
        self.lower(n, x).is_none() && self.upper(n, x).is_none()
    }

    /// True if the bounds of `x` pin it to exactly zero at `n`.
    pub(crate) fn is_zero(&self, n: NodeId, x: Var) -> bool {
        use num_traits::Zero;
        let (Some(l), Some(u)) = (self.lower(n, x), self.upper(n, x)) else {
            return false;
        };
        let l = self.bound(l);
        let u = self.bound(u);
        l.value().is_zero() && u.value().is_zero() && !l.is_open() && !u.is_open()
    }

    /// Walk the trail of `n` from the newest bound back to the first bound of the root.
    pub(crate) fn trail_bounds(&self, n: NodeId) -> impl Iterator<Item = &Bound> + '_ {
        std::iter::successors(self.nodes[n].trail.map(|b| self.bound(b)), move |b| {
            b.prev.map(|p| self.bound(p))
        })
    }

    /// True if no bound newer than `timestamp` exists on either side of `x` at `n`.
    pub(crate) fn is_latest_bound(&self, n: NodeId, x: Var, timestamp: u64) -> bool {
        if let Some(l) = self.lower(n, x) {
            if self.bound(l).timestamp > timestamp {
                return false;
            }
        }
        if let Some(u) = self.upper(n, x) {
            if self.bound(u).timestamp > timestamp {
                return false;
            }
        }
        true
    }

    /// Materialise the interval induced by the bounds of `x` at `n`.
    pub(crate) fn interval_of(&self, n: NodeId, x: Var) -> Interval {
        let endpoint = |b: Option<BoundId>| {
            b.map(|b| {
                let bound = self.bound(b);
                Endpoint {
                    value: bound.value().clone(),
                    open: bound.is_open(),
                }
            })
        };
        Interval {
            lower: endpoint(self.lower(n, x)),
            upper: endpoint(self.upper(n, x)),
        }
    }

    pub(crate) fn push_leaf_front(&mut self, n: NodeId) {
        paver_assert_simple!(self.nodes[n].prev_leaf.is_none());
        paver_assert_simple!(self.nodes[n].next_leaf.is_none());
        self.nodes[n].next_leaf = self.leaf_head;
        if let Some(head) = self.leaf_head {
            self.nodes[head].prev_leaf = Some(n);
        } else {
            self.leaf_tail = Some(n);
        }
        self.leaf_head = Some(n);
    }

    pub(crate) fn remove_from_leaf_list(&mut self, n: NodeId) {
        let prev = self.nodes[n].prev_leaf;
        let next = self.nodes[n].next_leaf;
        if let Some(prev) = prev {
            self.nodes[prev].next_leaf = next;
        } else if self.leaf_head == Some(n) {
            self.leaf_head = next;
        }
        if let Some(next) = next {
            self.nodes[next].prev_leaf = prev;
        } else if self.leaf_tail == Some(n) {
            self.leaf_tail = prev;
        }
        self.nodes[n].prev_leaf = None;
        self.nodes[n].next_leaf = None;
    }

    /// All consistent leaves of the tree, in preorder.
    #[allow(dead_code)]
    pub(crate) fn collect_leaves(&self) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut todo: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(n) = todo.pop() {
            if self.nodes[n].is_leaf() {
                if !self.nodes[n].inconsistent() {
                    leaves.push(n);
                }
            } else {
                todo.extend(self.children(n));
            }
        }
        leaves
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;

    use super::*;

    fn rat(n: i64) -> Rational {
        Rational::from_integer(BigInt::from(n))
    }

    fn arith_root(tree: &mut PavingTree, num_vars: usize) -> NodeId {
        tree.mk_root(vec![BValue::Arith; num_vars])
    }

    #[test]
    fn children_inherit_bounds_by_structural_sharing() {
        let mut tree = PavingTree::default();
        let x = Var(0);
        let root = arith_root(&mut tree, 1);
        let _ = tree
            .mk_bound(root, x, rat(1), true, false, Justification::Axiom)
            .unwrap();

        let child = tree.mk_child(root);
        assert_eq!(tree.lower(child, x), tree.lower(root, x));

        let _ = tree
            .mk_bound(child, x, rat(3), true, false, Justification::Axiom)
            .unwrap();
        assert_eq!(tree.bound(tree.lower(child, x).unwrap()).value(), &rat(3));
        assert_eq!(tree.bound(tree.lower(root, x).unwrap()).value(), &rat(1));
    }

    #[test]
    fn trail_chains_are_prefix_shared_and_timestamps_increase() {
        let mut tree = PavingTree::default();
        let x = Var(0);
        let root = arith_root(&mut tree, 1);
        let b0 = tree
            .mk_bound(root, x, rat(0), true, false, Justification::Axiom)
            .unwrap();
        let child = tree.mk_child(root);
        let b1 = tree
            .mk_bound(child, x, rat(2), true, false, Justification::Axiom)
            .unwrap();

        assert_eq!(tree.bound(b1).prev, Some(b0));
        assert!(tree.bound(b1).timestamp > tree.bound(b0).timestamp);
        assert_eq!(tree.node(root).trail, Some(b0));
        assert_eq!(tree.bound(b0).justification, Justification::Axiom);
    }

    #[test]
    fn crossing_bounds_mark_the_node_conflicting() {
        let mut tree = PavingTree::default();
        let x = Var(0);
        let root = arith_root(&mut tree, 1);
        let _ = tree
            .mk_bound(root, x, rat(4), true, false, Justification::Axiom)
            .unwrap();
        assert!(!tree.node(root).inconsistent());

        let _ = tree
            .mk_bound(root, x, rat(3), false, false, Justification::Axiom)
            .unwrap();
        assert_eq!(tree.node(root).conflict, Some(x));
    }

    #[test]
    fn equal_bounds_conflict_only_when_an_endpoint_is_open() {
        let mut tree = PavingTree::default();
        let x = Var(0);
        let y = Var(1);
        let root = arith_root(&mut tree, 2);

        let _ = tree
            .mk_bound(root, x, rat(2), true, false, Justification::Axiom)
            .unwrap();
        let _ = tree
            .mk_bound(root, x, rat(2), false, false, Justification::Axiom)
            .unwrap();
        assert!(!tree.node(root).inconsistent());

        let _ = tree
            .mk_bound(root, y, rat(2), true, true, Justification::Axiom)
            .unwrap();
        let _ = tree
            .mk_bound(root, y, rat(2), false, false, Justification::Axiom)
            .unwrap();
        assert!(tree.node(root).inconsistent());
    }

    #[test]
    fn contradicting_boolean_bounds_conflict() {
        let mut tree = PavingTree::default();
        let b = Var(0);
        let root = tree.mk_root(vec![BValue::Undef]);

        let _ = tree
            .mk_bool_bound(root, b, false, Justification::Axiom)
            .unwrap();
        assert_eq!(tree.bvalue(root, b), BValue::True);

        let _ = tree
            .mk_bool_bound(root, b, true, Justification::Axiom)
            .unwrap();
        assert_eq!(tree.bvalue(root, b), BValue::Conflict);
        assert!(tree.node(root).inconsistent());
    }

    #[test]
    fn leaf_list_tracks_membership() {
        let mut tree = PavingTree::default();
        let root = arith_root(&mut tree, 1);
        let a = tree.mk_child(root);
        let b = tree.mk_child(root);
        tree.remove_from_leaf_list(root);

        assert_eq!(tree.leaf_head, Some(b));
        tree.remove_from_leaf_list(b);
        assert_eq!(tree.leaf_head, Some(a));
        assert_eq!(tree.leaf_tail, Some(a));
    }
}
