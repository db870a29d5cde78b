//! Leaf scheduling and sub-task state tracking.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::containers::KeyedVec;
use crate::engine::node::NodeId;
use crate::engine::tree::PavingTree;
use crate::engine::variables::Var;

/// Lifecycle of one paving node as a sub-task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NodeState {
    /// Created but not yet published to the coordinator.
    Unconverted,
    /// Published; awaiting the coordinator's verdict.
    Waiting,
    /// Closed as unsatisfiable, locally or by the coordinator.
    Unsat,
    /// Aborted by the coordinator without a verdict.
    Terminated,
}

/// Heap entry for an open leaf. Ordered breadth-first, tie-breaking toward the most constrained
/// node: lowest depth, then most undetermined clauses, then most undetermined literals, then
/// lowest id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NodeInfo {
    pub(crate) id: NodeId,
    pub(crate) depth: u32,
    pub(crate) undef_clause_num: u32,
    pub(crate) undef_lit_num: u32,
}

impl Ord for NodeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .depth
            .cmp(&self.depth)
            .then(self.undef_clause_num.cmp(&other.undef_clause_num))
            .then(self.undef_lit_num.cmp(&other.undef_lit_num))
            .then(other.id.cmp(&self.id))
    }
}

impl PartialOrd for NodeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Tracks node states, the priority queue over open leaves, and the task counters that feed both
/// flow control and the split heuristic.
#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    states: KeyedVec<NodeId, NodeState>,
    heap: BinaryHeap<NodeInfo>,
    /// Sub-tasks published and not yet closed by the coordinator.
    pub(crate) alive_task_num: u32,
    /// Open leaves plus published-but-unresolved sub-tasks.
    pub(crate) unsolved_task_num: u32,
    /// Per variable: how many live tree paths split on it.
    unsolved_split_cnt: KeyedVec<Var, u32>,
}

impl Scheduler {
    pub(crate) fn register_node(&mut self, n: NodeId) {
        self.states.accomodate(n, NodeState::Unconverted);
        self.states[n] = NodeState::Unconverted;
    }

    pub(crate) fn state(&self, n: NodeId) -> NodeState {
        self.states[n]
    }

    pub(crate) fn set_state(&mut self, n: NodeId, state: NodeState) {
        self.states[n] = state;
    }

    pub(crate) fn enqueue_leaf(&mut self, info: NodeInfo) {
        self.heap.push(info);
    }

    pub(crate) fn pop_leaf(&mut self) -> Option<NodeInfo> {
        self.heap.pop()
    }

    pub(crate) fn peek_leaf(&self) -> Option<&NodeInfo> {
        self.heap.peek()
    }

    pub(crate) fn unsolved_split_cnt(&self, x: Var) -> u32 {
        self.unsolved_split_cnt.get(x).copied().unwrap_or(0)
    }

    /// Count a freshly heaped leaf: one more unsolved task, one more live path through each of
    /// its split variables.
    pub(crate) fn count_unsolved(&mut self, tree: &PavingTree, n: NodeId) {
        self.unsolved_task_num += 1;
        for &x in &tree.node(n).split_vars {
            self.unsolved_split_cnt.accomodate(x, 0);
            self.unsolved_split_cnt[x] += 1;
        }
    }

    /// Mark a single node unsatisfiable, maintaining the task counters. Returns `true` when the
    /// node was already unsat (marking is idempotent).
    pub(crate) fn mark_unsat(&mut self, tree: &PavingTree, n: NodeId) -> bool {
        match self.states[n] {
            NodeState::Unsat => return true,
            NodeState::Waiting => {
                self.alive_task_num = self.alive_task_num.saturating_sub(1);
            }
            _ => {}
        }
        self.unsolved_task_num = self.unsolved_task_num.saturating_sub(1);
        for &x in &tree.node(n).split_vars {
            self.unsolved_split_cnt.accomodate(x, 0);
            self.unsolved_split_cnt[x] = self.unsolved_split_cnt[x].saturating_sub(1);
        }
        self.states[n] = NodeState::Unsat;
        false
    }

    /// An unsat verdict for `n`: mark it, sweep its whole subtree, and bubble up through parents
    /// whose children are now all unsat.
    pub(crate) fn node_solved_unsat(&mut self, tree: &PavingTree, n: NodeId) {
        if self.mark_unsat(tree, n) {
            return;
        }
        let children: Vec<NodeId> = tree.children(n).collect();
        for child in children {
            self.unsat_push_down(tree, child);
        }
        if let Some(parent) = tree.node(n).parent {
            self.unsat_push_up(tree, parent);
        }
    }

    fn unsat_push_down(&mut self, tree: &PavingTree, n: NodeId) {
        if self.mark_unsat(tree, n) {
            return;
        }
        let children: Vec<NodeId> = tree.children(n).collect();
        for child in children {
            self.unsat_push_down(tree, child);
        }
    }

    fn unsat_push_up(&mut self, tree: &PavingTree, n: NodeId) {
        if self.states[n] == NodeState::Unsat {
            return;
        }
        let all_children_unsat = tree
            .children(n)
            .all(|child| self.states[child] == NodeState::Unsat);
        if !all_children_unsat {
            return;
        }
        let _ = self.mark_unsat(tree, n);
        if let Some(parent) = tree.node(n).parent {
            self.unsat_push_up(tree, parent);
        }
    }

    /// The coordinator aborted a sub-task: close it without claiming unsatisfiability.
    pub(crate) fn terminate(&mut self, n: NodeId) {
        if self.states[n] == NodeState::Waiting {
            self.states[n] = NodeState::Terminated;
            self.alive_task_num = self.alive_task_num.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::node::BValue;

    fn info(id: u32, depth: u32, clauses: u32, lits: u32) -> NodeInfo {
        NodeInfo {
            id: NodeId(id),
            depth,
            undef_clause_num: clauses,
            undef_lit_num: lits,
        }
    }

    #[test]
    fn heap_prefers_shallow_then_most_constrained_then_lowest_id() {
        let mut scheduler = Scheduler::default();
        scheduler.enqueue_leaf(info(3, 2, 9, 9));
        scheduler.enqueue_leaf(info(1, 1, 2, 5));
        scheduler.enqueue_leaf(info(2, 1, 2, 7));
        scheduler.enqueue_leaf(info(5, 1, 4, 1));
        scheduler.enqueue_leaf(info(4, 1, 4, 1));

        let order: Vec<u32> = std::iter::from_fn(|| scheduler.pop_leaf())
            .map(|i| i.id.0)
            .collect();
        assert_eq!(order, vec![4, 5, 2, 1, 3]);
    }

    #[test]
    fn unsat_verdict_sweeps_descendants_and_bubbles_up() {
        let mut tree = PavingTree::default();
        let root = tree.mk_root(vec![BValue::Arith]);
        let left = tree.mk_child(root);
        let right = tree.mk_child(root);

        let mut scheduler = Scheduler::default();
        for n in [root, left, right] {
            scheduler.register_node(n);
            scheduler.count_unsolved(&tree, n);
        }

        scheduler.node_solved_unsat(&tree, left);
        assert_eq!(scheduler.state(left), NodeState::Unsat);
        assert_eq!(scheduler.state(root), NodeState::Unconverted);

        scheduler.node_solved_unsat(&tree, right);
        assert_eq!(scheduler.state(right), NodeState::Unsat);
        assert_eq!(scheduler.state(root), NodeState::Unsat);
        assert_eq!(scheduler.unsolved_task_num, 0);
    }

    #[test]
    fn marking_unsat_is_idempotent() {
        let mut tree = PavingTree::default();
        let root = tree.mk_root(vec![BValue::Arith]);
        let mut scheduler = Scheduler::default();
        scheduler.register_node(root);
        scheduler.count_unsolved(&tree, root);

        scheduler.node_solved_unsat(&tree, root);
        let unsolved = scheduler.unsolved_task_num;
        scheduler.node_solved_unsat(&tree, root);
        assert_eq!(scheduler.unsolved_task_num, unsolved);
    }

    #[test]
    fn terminating_a_waiting_task_releases_its_slot() {
        let mut tree = PavingTree::default();
        let root = tree.mk_root(vec![BValue::Arith]);
        let mut scheduler = Scheduler::default();
        scheduler.register_node(root);
        scheduler.set_state(root, NodeState::Waiting);
        scheduler.alive_task_num = 1;

        scheduler.terminate(root);
        assert_eq!(scheduler.state(root), NodeState::Terminated);
        assert_eq!(scheduler.alive_task_num, 0);

        // a second terminate is a no-op
        scheduler.terminate(root);
        assert_eq!(scheduler.alive_task_num, 0);
    }
}
