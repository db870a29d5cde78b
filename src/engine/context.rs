//! The partitioner context: constraint building, the paving loop, and the coordinator dialogue.

use std::io;
use std::thread;
use std::time::Duration;

use log::debug;

use crate::engine::atom::AtomId;
use crate::engine::bound::Justification;
use crate::engine::definition::Power;
use crate::engine::node::BValue;
use crate::engine::node::NodeId;
use crate::engine::propagation::PropagationContext;
use crate::engine::propagation::Propagator;
use crate::engine::propagation::checkpoint;
use crate::engine::propagation::normalize_bound;
use crate::engine::protocol::InboundMessage;
use crate::engine::protocol::OutboundMessage;
use crate::engine::protocol::StdioTransport;
use crate::engine::protocol::Transport;
use crate::engine::scheduler::NodeInfo;
use crate::engine::scheduler::NodeState;
use crate::engine::scheduler::Scheduler;
use crate::engine::splitter::Splitter;
use crate::engine::splitter::choose_midpoint;
use crate::engine::store::ConstraintStore;
use crate::engine::task::Lit;
use crate::engine::task::LitKind;
use crate::engine::task::Task;
use crate::engine::task::convert_node_to_task;
use crate::engine::tree::PavingTree;
use crate::engine::variables::Var;
use crate::error::EngineError;
use crate::math::Rational;
use crate::options::Numerics;
use crate::options::PartitionerOptions;
use crate::termination::TerminationCondition;

/// Outcome of one partitioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A sub-task was published and is available through [`Partitioner::task`].
    TaskReady,
    /// The search space is exhausted and every sub-task is closed: the problem is unsatisfiable.
    Unsat,
    /// No open leaf remains but sub-tasks are still running; the verdict is theirs.
    Unknown,
}

/// Engine counters, mirroring what the paver reports to its statistics sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub num_conflicts: u64,
    pub num_bounds: u64,
    pub num_splits: u64,
    pub num_visited: u64,
    pub num_nodes: u64,
}

/// The partitioner worker. A frontend builds the constraint problem through the `mk_*` methods,
/// then a driver repeatedly calls [`step`](Partitioner::step): every successful step publishes
/// one sub-task to the coordinator and splits the corresponding box in two.
///
/// Multiple independent partitioners may coexist; there is no global state.
pub struct Partitioner<T = StdioTransport> {
    options: PartitionerOptions,
    numerics: Numerics,
    store: ConstraintStore,
    tree: PavingTree,
    propagator: Propagator,
    scheduler: Scheduler,
    splitter: Splitter,
    task: Task,
    transport: T,
    initialized: bool,
}

impl Partitioner<StdioTransport> {
    /// A partitioner wired to the production transport: non-blocking stdin, flushed stdout.
    pub fn with_stdio(options: PartitionerOptions) -> io::Result<Partitioner<StdioTransport>> {
        Ok(Partitioner::new(options, StdioTransport::new()?))
    }
}

impl<T: Transport> Partitioner<T> {
    pub fn new(options: PartitionerOptions, transport: T) -> Partitioner<T> {
        let numerics = Numerics::from_options(&options);
        let splitter = Splitter::new(options.rand_seed);
        Partitioner {
            numerics,
            splitter,
            options,
            store: ConstraintStore::default(),
            tree: PavingTree::default(),
            propagator: Propagator::default(),
            scheduler: Scheduler::default(),
            task: Task::default(),
            transport,
            initialized: false,
        }
    }

    pub fn mk_var(&mut self, is_int: bool) -> Var {
        self.store.mk_var(is_int)
    }

    pub fn mk_bvar(&mut self) -> Var {
        self.store.mk_bvar()
    }

    pub fn mk_monomial(&mut self, powers: Vec<Power>) -> Var {
        self.store.mk_monomial(powers)
    }

    pub fn mk_sum(&mut self, terms: Vec<(Rational, Var)>) -> Var {
        self.store.mk_sum(terms)
    }

    pub fn mk_bool_atom(&mut self, x: Var, negated: bool) -> AtomId {
        self.store.mk_bool_atom(x, negated)
    }

    pub fn mk_eq_atom(&mut self, x: Var, value: Rational, negated: bool) -> AtomId {
        self.store.mk_eq_atom(x, value, negated)
    }

    pub fn mk_ineq_atom(&mut self, x: Var, value: Rational, lower: bool, open: bool) -> AtomId {
        self.store.mk_ineq_atom(x, value, lower, open)
    }

    /// Assert the disjunction of `atoms`; a single atom is stored as a unit axiom.
    pub fn add_clause(&mut self, atoms: &[AtomId]) {
        self.store.add_clause(atoms)
    }

    pub fn num_vars(&self) -> usize {
        self.store.num_vars()
    }

    /// The most recently published sub-task.
    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// True if an interval operation failed at some point; the affected tightenings were skipped.
    pub fn arith_failed(&self) -> bool {
        self.propagator.arith_failed()
    }

    pub fn statistics(&self) -> Statistics {
        Statistics {
            num_conflicts: self.tree.num_conflicts(),
            num_bounds: self.tree.num_bounds(),
            num_splits: self.splitter.num_splits(),
            num_visited: self.propagator.num_visited(),
            num_nodes: self.tree.num_nodes() as u64,
        }
    }

    /// Run one partitioning step: drain coordinator verdicts, throttle when enough sub-tasks are
    /// alive, then select the best open leaf, convert it into a sub-task, publish it and split
    /// the leaf in two.
    pub fn step(
        &mut self,
        termination: &mut dyn TerminationCondition,
    ) -> Result<StepResult, EngineError> {
        if !self.initialized {
            let root = self.initialize(termination)?;
            if self.tree.node(root).inconsistent() {
                self.tree.remove_from_leaf_list(root);
                return Ok(StepResult::Unsat);
            }
            self.scheduler.enqueue_leaf(NodeInfo {
                id: root,
                depth: 0,
                undef_clause_num: 0,
                undef_lit_num: 0,
            });
            self.scheduler.count_unsolved(&self.tree, root);
        }

        loop {
            self.drain_coordinator()?;
            checkpoint(termination)?;
            if self.scheduler.alive_task_num > self.options.max_alive_tasks() {
                // flow control: wait for the coordinator to retire sub-tasks
                thread::sleep(Duration::from_millis(100));
                continue;
            }
            let Some(n) = self.create_new_task(termination)? else {
                return Ok(if self.scheduler.alive_task_num > 0 {
                    StepResult::Unknown
                } else {
                    StepResult::Unsat
                });
            };

            let parent = self.tree.node(n).parent.map(|p| p.id());
            send(
                &mut self.transport,
                &OutboundMessage::NewUnknownNode { node: n.id(), parent },
            )?;
            self.scheduler.set_state(n, NodeState::Waiting);
            self.scheduler.alive_task_num += 1;
            self.split_node(termination, n)?;
            return Ok(StepResult::TaskReady);
        }
    }

    fn initialize(&mut self, termination: &mut dyn TerminationCondition) -> Result<NodeId, EngineError> {
        self.initialized = true;
        self.propagator.configure(self.store.num_vars());

        let bvalues = self
            .store
            .vars()
            .map(|x| {
                if self.store.is_bool(x) {
                    BValue::Undef
                } else {
                    BValue::Arith
                }
            })
            .collect();
        let root = self.tree.mk_root(bvalues);
        self.scheduler.register_node(root);

        let debug_messages = self.options.debug_messages;
        send_debug(
            &mut self.transport,
            debug_messages,
            format!("clause number: {}", self.store.num_clauses()),
        )?;
        send_debug(
            &mut self.transport,
            debug_messages,
            format!("random seed: {}", self.options.rand_seed),
        )?;
        if let Some(dir) = &self.options.output_dir {
            let line = format!("output dir: {}", dir.display());
            send_debug(&mut self.transport, debug_messages, line)?;
        }

        let mut cx = PropagationContext {
            store: &self.store,
            tree: &mut self.tree,
            numerics: &self.numerics,
            termination,
        };
        self.propagator.assert_units(&mut cx, root)?;
        if !cx.tree.node(root).inconsistent() {
            self.propagator.propagate_all_definitions(&mut cx, root)?;
        }
        self.propagator.propagate(&mut cx, root)?;

        let line = format!(
            "node 0 propagated cnt: {}",
            self.propagator.last_propagation_count()
        );
        send_debug(&mut self.transport, debug_messages, line)?;
        Ok(root)
    }

    /// Apply all pending coordinator verdicts.
    fn drain_coordinator(&mut self) -> Result<(), EngineError> {
        while let Some(line) = self.transport.poll_line()? {
            let message = InboundMessage::parse(&line)?;
            let node = match message {
                InboundMessage::UnsatNode(id) | InboundMessage::TerminateNode(id) => NodeId(id),
            };
            if !self.tree.contains(node) {
                return Err(EngineError::Protocol(line));
            }
            match message {
                InboundMessage::UnsatNode(_) => {
                    self.scheduler.node_solved_unsat(&self.tree, node);
                }
                InboundMessage::TerminateNode(_) => self.scheduler.terminate(node),
            }
            let report = format!(
                "alive tasks: {}({}), nodes: {}",
                self.scheduler.alive_task_num,
                self.options.max_alive_tasks(),
                self.tree.num_nodes(),
            );
            send_debug(&mut self.transport, self.options.debug_messages, report)?;
        }
        Ok(())
    }

    /// Pop leaves until one converts into a live sub-task. Locally unsatisfiable leaves are
    /// reported and closed on the way.
    fn create_new_task(
        &mut self,
        termination: &mut dyn TerminationCondition,
    ) -> Result<Option<NodeId>, EngineError> {
        loop {
            if let Some(top) = self.scheduler.peek_leaf() {
                debug!(
                    "leaf heap top: node {} depth {} undef clauses {} undef lits {}",
                    top.id.id(),
                    top.depth,
                    top.undef_clause_num,
                    top.undef_lit_num
                );
            }
            let Some(info) = self.scheduler.pop_leaf() else {
                return Ok(None);
            };
            let n = info.id;
            if self.tree.node(n).inconsistent() {
                self.scheduler.node_solved_unsat(&self.tree, n);
                continue;
            }
            if self.scheduler.state(n) != NodeState::Unconverted {
                continue;
            }
            if let Some(parent) = self.tree.node(n).parent {
                if self.scheduler.state(parent) == NodeState::Unsat {
                    self.scheduler.node_solved_unsat(&self.tree, n);
                    continue;
                }
            }

            let (unsat, stats) =
                convert_node_to_task(&self.store, &self.tree, termination, n, &mut self.task)?;
            if unsat {
                self.task.reset();
                let parent = self.tree.node(n).parent.map(|p| p.id());
                send_debug(
                    &mut self.transport,
                    self.options.debug_messages,
                    format!("UNSAT: conflicting residual in node {}", n.id()),
                )?;
                send(
                    &mut self.transport,
                    &OutboundMessage::NewUnsatNode { node: n.id(), parent },
                )?;
                self.scheduler.node_solved_unsat(&self.tree, n);
                continue;
            }

            if stats.disj_simplified > 0 || stats.conj_simplified > 0 || stats.skipped_clauses > 0 {
                let line = format!(
                    "node {} simplification: disj {}, conj {}, skipped clauses {}, dominated {}",
                    n.id(),
                    stats.disj_simplified,
                    stats.conj_simplified,
                    stats.skipped_clauses,
                    stats.dominance_removed,
                );
                send_debug(&mut self.transport, self.options.debug_messages, line)?;
            }
            return Ok(Some(n));
        }
    }

    /// Split `n` on the best-scoring variable: the left child receives a sampled clause literal
    /// or `x <= mid`, the right child its complement. Both children are propagated; a child that
    /// is born inconsistent is reported unsat instead of scheduled.
    fn split_node(
        &mut self,
        termination: &mut dyn TerminationCondition,
        n: NodeId,
    ) -> Result<(), EngineError> {
        self.splitter.collect_var_info(&self.store, &self.task);
        let Some(choice) = self.splitter.select_best_var(
            &self.store,
            &self.tree,
            &self.scheduler,
            &self.numerics,
            n,
        ) else {
            send_debug(
                &mut self.transport,
                self.options.debug_messages,
                "no split variable selected".to_owned(),
            )?;
            return Ok(());
        };
        send_debug(
            &mut self.transport,
            self.options.debug_messages,
            format!("best {choice}"),
        )?;

        if self.tree.node(n).depth + 1 > self.options.max_depth
            || self.tree.num_nodes() + 2 > self.options.max_nodes as usize
        {
            send_debug(
                &mut self.transport,
                self.options.debug_messages,
                format!("split limits reached at node {}", n.id()),
            )?;
            return Ok(());
        }

        let x = choice.var;
        let (value, lower, open) = match self.splitter.choose_split_literal(&self.task, x) {
            Some(literal) => literal,
            None => {
                let mid = choose_midpoint(&self.tree, &self.numerics, n, x, choice.contains_zero)?;
                (mid, false, false)
            }
        };

        self.task.splitting_var = Some(x);
        self.tree.remove_from_leaf_list(n);
        self.splitter.count_split();

        let complement = (value.clone(), !lower, !open);
        self.spawn_child(termination, n, x, value, lower, open, true)?;
        self.spawn_child(termination, n, x, complement.0, complement.1, complement.2, false)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_child(
        &mut self,
        termination: &mut dyn TerminationCondition,
        parent: NodeId,
        x: Var,
        value: Rational,
        lower: bool,
        open: bool,
        is_left: bool,
    ) -> Result<NodeId, EngineError> {
        let child = self.tree.mk_child(parent);
        self.scheduler.register_node(child);
        self.tree.node_mut(child).split_vars.push(x);

        let (value, open) = normalize_bound(&self.store, &self.numerics, x, value, lower, open);
        let literal = Lit {
            var: x,
            kind: LitKind::Ineq {
                value: value.clone(),
                lower,
                open,
                int: self.store.is_int(x),
            },
        };
        if is_left {
            self.task.split_left = Some(literal);
        } else {
            self.task.split_right = Some(literal);
        }

        let b = self
            .tree
            .mk_bound(child, x, value, lower, open, Justification::Axiom)?;
        self.propagator.enqueue(b);
        {
            let mut cx = PropagationContext {
                store: &self.store,
                tree: &mut self.tree,
                numerics: &self.numerics,
                termination,
            };
            self.propagator.propagate(&mut cx, child)?;
        }
        let line = format!(
            "node {} propagated cnt: {}",
            child.id(),
            self.propagator.last_propagation_count()
        );
        send_debug(&mut self.transport, self.options.debug_messages, line)?;

        if self.tree.node(child).inconsistent() {
            if log::log_enabled!(log::Level::Trace) {
                for bound in self.tree.trail_bounds(child) {
                    log::trace!("node {} trail: {} ({:?})", child.id(), bound, bound.justification);
                }
            }
            send(
                &mut self.transport,
                &OutboundMessage::NewUnsatNode {
                    node: child.id(),
                    parent: Some(parent.id()),
                },
            )?;
            self.tree.remove_from_leaf_list(child);
            self.scheduler.set_state(child, NodeState::Unsat);
        } else {
            self.scheduler.enqueue_leaf(NodeInfo {
                id: child,
                depth: self.task.depth,
                undef_clause_num: self.task.undef_clause_num,
                undef_lit_num: self.task.undef_lit_num,
            });
            self.scheduler.count_unsolved(&self.tree, child);
        }
        Ok(child)
    }
}

fn send<T: Transport>(transport: &mut T, message: &OutboundMessage) -> Result<(), EngineError> {
    transport.send_line(&message.to_string())?;
    Ok(())
}

fn send_debug<T: Transport>(
    transport: &mut T,
    enabled: bool,
    text: String,
) -> Result<(), EngineError> {
    debug!("{text}");
    if enabled {
        transport.send_line(&OutboundMessage::Debug(text).to_string())?;
    }
    Ok(())
}
